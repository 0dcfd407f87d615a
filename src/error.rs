//! Error types for the chat responder.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Delivery and webhook transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send reply on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Failure of a single upstream completion call.
///
/// Every variant is recoverable: the completion client answers it with the
/// secondary model and, failing that, with the degraded reply.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Model {model} request failed: {reason}")]
    RequestFailed { model: String, reason: String },

    #[error("Model {model} provider error: {reason}")]
    Provider { model: String, reason: String },

    #[error("Invalid response from model {model}: {reason}")]
    InvalidResponse { model: String, reason: String },

    #[error("Model {model} timed out after {timeout:?}")]
    Timeout { model: String, timeout: Duration },
}

impl UpstreamError {
    /// Model that produced the failure.
    pub fn model(&self) -> &str {
        match self {
            Self::RequestFailed { model, .. }
            | Self::Provider { model, .. }
            | Self::InvalidResponse { model, .. }
            | Self::Timeout { model, .. } => model,
        }
    }
}

/// Reasons an inbound event is dropped without a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("Sender {sender:?} is not allowlisted")]
    AccessDenied { sender: Option<String> },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Ignored event: {0}")]
    Ignored(String),
}

/// Game move errors. Shown to the user as a corrective prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Guess {input:?} is not a number")]
    NotANumber { input: String },
}

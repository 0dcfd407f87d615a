//! Completion client with a primary → secondary fallback chain.
//!
//! Each model gets one attempt bounded by the same timeout. When both fail
//! the caller still gets text back: the canned degraded reply.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::conversation::MemoryEntry;
use crate::error::UpstreamError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

/// Temperature sent with every generated reply.
pub const REPLY_TEMPERATURE: f32 = 0.8;

/// Reply used when neither model answered.
pub const DEGRADED_REPLY: &str = "Hmm ponnu 🤔 game kalikkam alle?";

/// Which step of the chain produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedBy {
    Primary,
    Secondary,
    Degraded,
}

impl ServedBy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Degraded => "degraded",
        }
    }
}

/// A generated (or degraded) reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub served_by: ServedBy,
}

/// Calls the primary model, then the secondary once, then gives up politely.
pub struct CompletionClient {
    primary: Arc<dyn LlmProvider>,
    secondary: Arc<dyn LlmProvider>,
    timeout: Duration,
    degraded_reply: String,
}

impl CompletionClient {
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        secondary: Arc<dyn LlmProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            timeout,
            degraded_reply: DEGRADED_REPLY.to_string(),
        }
    }

    pub fn with_degraded_reply(mut self, reply: impl Into<String>) -> Self {
        self.degraded_reply = reply.into();
        self
    }

    /// Generate a reply. Never fails.
    pub async fn complete(
        &self,
        system_prompt: &str,
        history: &[MemoryEntry],
        user_message: &str,
    ) -> Completion {
        match self.try_complete(system_prompt, history, user_message).await {
            Ok(completion) => completion,
            Err(e) => {
                error!(error = %e, "Both models failed, sending degraded reply");
                Completion {
                    text: self.degraded_reply.clone(),
                    served_by: ServedBy::Degraded,
                }
            }
        }
    }

    /// Run the chain and return the secondary's error if both models fail.
    pub async fn try_complete(
        &self,
        system_prompt: &str,
        history: &[MemoryEntry],
        user_message: &str,
    ) -> Result<Completion, UpstreamError> {
        let request = build_request(system_prompt, history, user_message);

        match self.call(self.primary.as_ref(), request.clone()).await {
            Ok(text) => {
                return Ok(Completion {
                    text,
                    served_by: ServedBy::Primary,
                });
            }
            Err(e) => {
                warn!(
                    model = %e.model(),
                    error = %e,
                    fallback = %self.secondary.model_name(),
                    "Primary model failed, retrying on fallback"
                );
            }
        }

        let text = self.call(self.secondary.as_ref(), request).await?;
        Ok(Completion {
            text,
            served_by: ServedBy::Secondary,
        })
    }

    async fn call(
        &self,
        provider: &dyn LlmProvider,
        request: CompletionRequest,
    ) -> Result<String, UpstreamError> {
        let model = provider.model_name().to_string();
        let response = tokio::time::timeout(self.timeout, provider.complete(request))
            .await
            .map_err(|_| UpstreamError::Timeout {
                model: model.clone(),
                timeout: self.timeout,
            })??;

        info!(
            model = %model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Upstream completion succeeded"
        );
        Ok(response.content)
    }
}

/// System prompt, one system message summarising the history, then the user.
///
/// The summary is left out when there is no history.
pub fn build_request(
    system_prompt: &str,
    history: &[MemoryEntry],
    user_message: &str,
) -> CompletionRequest {
    let mut messages = vec![ChatMessage::system(system_prompt)];

    if !history.is_empty() {
        let mut summary = String::from("Conversation so far (oldest first):");
        for entry in history {
            summary.push('\n');
            summary.push_str(entry.role.label());
            summary.push_str(": ");
            summary.push_str(&entry.text);
        }
        messages.push(ChatMessage::system(summary));
    }

    messages.push(ChatMessage::user(user_message));
    CompletionRequest::new(messages).with_temperature(REPLY_TEMPERATURE)
}

//! Upstream language-model integration.
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `LlmProvider` trait.
//!
//! - `provider`: provider-neutral request/response types and the `LlmProvider` trait
//! - `failover`: primary → secondary chain with timeout and degraded reply

pub mod failover;
pub mod provider;
mod rig_adapter;

pub use failover::{Completion, CompletionClient, DEGRADED_REPLY, ServedBy};
pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient as _;
use secrecy::ExposeSecret;

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;

/// Build the primary → fallback completion chain on one OpenRouter client.
pub fn create_completion_client(config: &UpstreamConfig) -> Result<CompletionClient, UpstreamError> {
    use rig::providers::openrouter;

    let client: openrouter::Client = openrouter::Client::builder()
        .api_key(config.api_key.expose_secret())
        .base_url(config.base_url.as_str())
        .build()
        .map_err(|e| UpstreamError::RequestFailed {
            model: config.primary_model.clone(),
            reason: format!("Failed to create OpenRouter client: {}", e),
        })?;

    let primary: Arc<dyn LlmProvider> = Arc::new(RigAdapter::new(
        client.completion_model(config.primary_model.as_str()),
        &config.primary_model,
    ));
    let secondary: Arc<dyn LlmProvider> = Arc::new(RigAdapter::new(
        client.completion_model(config.fallback_model.as_str()),
        &config.fallback_model,
    ));

    tracing::info!(
        primary = %config.primary_model,
        fallback = %config.fallback_model,
        "Using OpenRouter completion chain"
    );
    Ok(CompletionClient::new(primary, secondary, config.timeout))
}

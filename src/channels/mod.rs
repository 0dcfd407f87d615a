//! Transport adapters around the decision pipeline.

pub mod chatwoot;
pub mod webhook;

pub use chatwoot::{ChatwootClient, WebhookEvent};
pub use webhook::{AppState, webhook_routes};

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::pipeline::types::OutboundReply;

/// Outbound delivery collaborator.
///
/// Delivery failures are reported to the caller, which logs them; they
/// never roll back conversation state.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Sink name for logs.
    fn name(&self) -> &str;

    /// Deliver one reply to its conversation.
    async fn deliver(&self, reply: &OutboundReply) -> Result<(), ChannelError>;
}

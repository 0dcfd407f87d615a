//! Message processor: access control in front of the decision router.
//!
//! Flow:
//! 1. Access filter (drop non-allowlisted senders silently)
//! 2. Decision router (rules → completion → overlays)

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pipeline::router::DecisionRouter;
use crate::pipeline::types::{InboundMessage, OutboundReply};
use crate::safety::AccessFilter;

/// Turns an inbound message into at most one outbound reply.
pub struct MessageProcessor {
    access: AccessFilter,
    router: DecisionRouter,
}

impl MessageProcessor {
    pub fn new(access: AccessFilter, router: DecisionRouter) -> Self {
        Self { access, router }
    }

    pub fn router(&self) -> &DecisionRouter {
        &self.router
    }

    /// Process a single inbound message.
    ///
    /// Returns `AccessDenied` without touching conversation state when the
    /// sender is not allowlisted.
    pub async fn process(&self, message: &InboundMessage) -> Result<OutboundReply, PipelineError> {
        if !self.access.allow(message.sender.as_deref()) {
            warn!(
                conversation_id = %message.conversation_id,
                sender = message.sender.as_deref().unwrap_or("unknown"),
                "Sender not allowed, ignoring"
            );
            return Err(PipelineError::AccessDenied {
                sender: message.sender.clone(),
            });
        }

        info!(
            id = %message.id,
            conversation_id = %message.conversation_id,
            text = %message.preview(),
            "Processing inbound message"
        );

        Ok(self.router.respond(message).await)
    }
}

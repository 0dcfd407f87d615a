//! Shared types for the message decision pipeline.

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationId;

// ── Inbound message ─────────────────────────────────────────────────

/// A chat message that passed transport-level decoding.
///
/// The channel adapter resolves the conversation, the sender and the text
/// (or a placeholder) before the message enters the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel-native message id, or a generated UUID.
    pub id: String,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Sender identity used for access control (may be absent).
    pub sender: Option<String>,
    /// Message text, or a placeholder for attachments and bare replies.
    pub text: String,
}

impl InboundMessage {
    pub fn new(
        conversation_id: impl Into<ConversationId>,
        sender: Option<&str>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            sender: sender.map(String::from),
            text: text.into(),
        }
    }

    /// First 60 characters of the text, for logs.
    pub fn preview(&self) -> String {
        preview(&self.text, 60)
    }
}

/// Truncate `text` to `max` characters with an ellipsis.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let truncated: String = text.chars().take(max).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

// ── Decisions ───────────────────────────────────────────────────────

/// How a reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// Denylisted content was deflected.
    Deflection,
    /// A guess was evaluated against the running game.
    GameMove,
    /// A new game was started.
    GameStart,
    /// The upstream model generated the reply.
    Generated,
    /// Generated reply with a game invitation appended.
    GeneratedWithOffer,
    /// Both models failed; canned reply.
    Degraded,
}

impl ReplyKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deflection => "deflection",
            Self::GameMove => "game_move",
            Self::GameStart => "game_start",
            Self::Generated => "generated",
            Self::GeneratedWithOffer => "generated_with_offer",
            Self::Degraded => "degraded",
        }
    }
}

/// A definite reply produced by a deterministic rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReply {
    pub kind: ReplyKind,
    pub text: String,
}

// ── Outbound reply ──────────────────────────────────────────────────

/// The reply handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundReply {
    pub conversation_id: ConversationId,
    pub text: String,
    pub kind: ReplyKind,
}

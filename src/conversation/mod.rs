//! Per-conversation state: history, game and offer cooldown.

pub mod cooldown;
pub mod game;
pub mod memory;
pub mod store;

pub use cooldown::{Clock, CooldownState, SystemClock};
pub use game::{GameEngine, GameState, GuessOutcome};
pub use memory::{ConversationMemory, EntryRole, MemoryEntry};
pub use store::{ConversationState, ConversationStore};

use serde::{Deserialize, Serialize};

/// Stable key for one conversation with one sender.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

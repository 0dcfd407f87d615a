//! Per-conversation state arena.
//!
//! Every conversation gets one [`ConversationState`] behind its own async
//! mutex. The outer map lock is only held long enough to find or insert the
//! entry, so unrelated conversations never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use super::ConversationId;
use super::cooldown::CooldownState;
use super::game::GameState;
use super::memory::{ConversationMemory, MemoryEntry};

/// Everything the responder remembers about one conversation.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub memory: ConversationMemory,
    pub game: GameState,
    pub cooldown: CooldownState,
}

impl ConversationState {
    pub fn new(memory_capacity: usize) -> Self {
        Self {
            memory: ConversationMemory::new(memory_capacity),
            game: GameState::Idle,
            cooldown: CooldownState::default(),
        }
    }
}

/// In-memory store of conversation state, locked per conversation.
pub struct ConversationStore {
    conversations: RwLock<HashMap<ConversationId, Arc<Mutex<ConversationState>>>>,
    memory_capacity: usize,
}

impl ConversationStore {
    pub fn new(memory_capacity: usize) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            memory_capacity,
        }
    }

    /// Lock a conversation's state, creating it on first reference.
    ///
    /// The guard serialises every read-modify-write on this conversation.
    pub async fn lock(&self, id: &ConversationId) -> OwnedMutexGuard<ConversationState> {
        self.slot(id).await.lock_owned().await
    }

    async fn slot(&self, id: &ConversationId) -> Arc<Mutex<ConversationState>> {
        if let Some(slot) = self.conversations.read().await.get(id) {
            return Arc::clone(slot);
        }

        let mut conversations = self.conversations.write().await;
        let slot = conversations.entry(id.clone()).or_insert_with(|| {
            debug!(conversation_id = %id, "Creating conversation state");
            Arc::new(Mutex::new(ConversationState::new(self.memory_capacity)))
        });
        Arc::clone(slot)
    }

    /// Append one entry to a conversation's history.
    pub async fn append(&self, id: &ConversationId, entry: MemoryEntry) {
        self.lock(id).await.memory.push(entry);
    }

    /// Current history of a conversation, oldest first.
    pub async fn snapshot(&self, id: &ConversationId) -> Vec<MemoryEntry> {
        self.lock(id).await.memory.snapshot()
    }

    /// Current game state of a conversation.
    pub async fn game_state(&self, id: &ConversationId) -> GameState {
        self.lock(id).await.game
    }

    /// Number of conversations seen since startup.
    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn state_is_created_lazily() {
        let store = ConversationStore::new(10);
        assert!(store.is_empty().await);
        let id = ConversationId::from("c1");
        assert!(store.snapshot(&id).await.is_empty());
        assert_eq!(store.game_state(&id).await, GameState::Idle);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let store = ConversationStore::new(10);
        let a = ConversationId::from("a");
        let b = ConversationId::from("b");
        store.append(&a, MemoryEntry::user("for a")).await;
        assert_eq!(store.snapshot(&a).await.len(), 1);
        assert!(store.snapshot(&b).await.is_empty());
    }

    #[tokio::test]
    async fn capacity_is_applied_per_conversation() {
        let store = ConversationStore::new(2);
        let id = ConversationId::from("c");
        for i in 0..5 {
            store.append(&id, MemoryEntry::user(format!("m{i}"))).await;
        }
        let snap = store.snapshot(&id).await;
        assert_eq!(snap, vec![MemoryEntry::user("m3"), MemoryEntry::user("m4")]);
    }

    #[tokio::test]
    async fn held_lock_does_not_block_other_conversations() {
        let store = Arc::new(ConversationStore::new(10));
        let a = ConversationId::from("a");
        let b = ConversationId::from("b");

        let _guard = store.lock(&a).await;
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            store.append(&b, MemoryEntry::user("hi")),
        )
        .await;
        assert!(result.is_ok(), "conversation b waited on a's lock");
    }

    #[tokio::test]
    async fn same_conversation_appends_are_serialised() {
        let store = Arc::new(ConversationStore::new(100));
        let id = ConversationId::from("c");

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = Arc::clone(&store);
                let id = id.clone();
                tokio::spawn(async move {
                    let mut state = store.lock(&id).await;
                    state.memory.push(MemoryEntry::user(format!("u{i}")));
                    tokio::task::yield_now().await;
                    state.memory.push(MemoryEntry::assistant(format!("a{i}")));
                })
            })
            .collect();
        futures::future::join_all(tasks).await;

        // Each user entry is immediately followed by its own reply.
        let snap = store.snapshot(&id).await;
        assert_eq!(snap.len(), 40);
        for pair in snap.chunks(2) {
            assert_eq!(pair[0].text[1..], pair[1].text[1..]);
        }
    }
}

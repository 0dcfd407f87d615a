//! Bounded conversation history.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Who said a remembered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    User,
    Assistant,
}

impl EntryRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One remembered line of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub role: EntryRole,
    pub text: String,
}

impl MemoryEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: EntryRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: EntryRole::Assistant,
            text: text.into(),
        }
    }
}

/// Conversation history capped at `capacity` entries.
///
/// Appending at capacity drops the oldest entry, so the history is always
/// the last `capacity` appends in chronological order.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    entries: VecDeque<MemoryEntry>,
    capacity: usize,
}

impl ConversationMemory {
    /// Create an empty history. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn push(&mut self, entry: MemoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Copy of the history, oldest first.
    pub fn snapshot(&self) -> Vec<MemoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&MemoryEntry> {
        self.entries.back()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut memory = ConversationMemory::new(4);
        memory.push(MemoryEntry::user("hi"));
        memory.push(MemoryEntry::assistant("hello ponnu"));
        let snap = memory.snapshot();
        assert_eq!(snap[0], MemoryEntry::user("hi"));
        assert_eq!(snap[1], MemoryEntry::assistant("hello ponnu"));
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut memory = ConversationMemory::new(3);
        for i in 0..5 {
            memory.push(MemoryEntry::user(format!("m{i}")));
        }
        let texts: Vec<_> = memory.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn length_never_exceeds_capacity_and_matches_tail() {
        for capacity in 1..6 {
            let mut memory = ConversationMemory::new(capacity);
            let mut appended = Vec::new();
            for i in 0..(capacity * 3 + 1) {
                let entry = if i % 2 == 0 {
                    MemoryEntry::user(format!("u{i}"))
                } else {
                    MemoryEntry::assistant(format!("a{i}"))
                };
                appended.push(entry.clone());
                memory.push(entry);

                assert!(memory.len() <= capacity);
                let start = appended.len().saturating_sub(capacity);
                assert_eq!(memory.snapshot(), appended[start..].to_vec());
            }
        }
    }

    #[test]
    fn snapshot_does_not_mutate() {
        let mut memory = ConversationMemory::new(2);
        memory.push(MemoryEntry::user("a"));
        let first = memory.snapshot();
        let second = memory.snapshot();
        assert_eq!(first, second);
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut memory = ConversationMemory::new(0);
        memory.push(MemoryEntry::user("a"));
        memory.push(MemoryEntry::user("b"));
        assert_eq!(memory.capacity(), 1);
        assert_eq!(memory.last(), Some(&MemoryEntry::user("b")));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(MemoryEntry::assistant("x")).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}

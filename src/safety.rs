//! Sender access control.
//!
//! Only allowlisted senders get a reply. Everyone else is dropped before the
//! message touches conversation state.

use std::collections::HashSet;

/// Allowlist check on the sender identity of an inbound event.
#[derive(Debug, Clone, Default)]
pub struct AccessFilter {
    allowed: HashSet<String>,
}

impl AccessFilter {
    /// Build a filter from a list of permitted sender identities.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// True iff the identity is present, non-empty and allowlisted.
    pub fn allow(&self, sender: Option<&str>) -> bool {
        match sender {
            Some(id) if !id.is_empty() => self.allowed.contains(id),
            _ => false,
        }
    }

    /// Number of allowlisted identities.
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_listed_sender() {
        let filter = AccessFilter::new(["598323826", "123456789"]);
        assert!(filter.allow(Some("598323826")));
        assert!(filter.allow(Some("123456789")));
    }

    #[test]
    fn denies_unlisted_sender() {
        let filter = AccessFilter::new(["598323826"]);
        assert!(!filter.allow(Some("987654321")));
    }

    #[test]
    fn denies_missing_or_empty_identity() {
        let filter = AccessFilter::new(["598323826", ""]);
        assert!(!filter.allow(None));
        assert!(!filter.allow(Some("")));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn exact_match_not_substring() {
        let filter = AccessFilter::new(["alice"]);
        assert!(!filter.allow(Some("alice_bot")));
        assert!(!filter.allow(Some("malice")));
        assert!(!filter.allow(Some("Alice")));
    }

    #[test]
    fn empty_allowlist_denies_everyone() {
        let filter = AccessFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.allow(Some("anyone")));
    }
}

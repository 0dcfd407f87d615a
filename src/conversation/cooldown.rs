//! Rate limit for unsolicited game offers.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of "now" for cooldown checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Last time a game offer was made to a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownState {
    last_offer: Option<DateTime<Utc>>,
}

impl CooldownState {
    /// An offer is due when none was made yet or more than `window` has passed.
    pub fn offer_due(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_offer {
            None => true,
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .map(|elapsed| elapsed > window)
                .unwrap_or(false),
        }
    }

    /// Record an offer. The timestamp never moves backwards.
    pub fn record_offer(&mut self, now: DateTime<Utc>) {
        self.last_offer = Some(match self.last_offer {
            Some(last) if last > now => last,
            _ => now,
        });
    }

    pub fn last_offer(&self) -> Option<DateTime<Utc>> {
        self.last_offer
    }
}

//! Engine clock. Supplies `created_at` / `updated_at` / `sealed_at` stamps.
//!
//! Scoring never reads the clock: rule windows are anchored at the scored
//! transaction's own timestamp. The clock only stamps records.

use crate::types::Timestamp;
use chrono::{Duration, Utc};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EngineClock {
    /// Wall-clock UTC.
    #[default]
    System,
    /// A manually driven clock, used in tests and replays.
    Fixed(Timestamp),
}

impl EngineClock {
    pub fn fixed(at: Timestamp) -> Self {
        EngineClock::Fixed(at)
    }

    pub fn now(&self) -> Timestamp {
        match self {
            EngineClock::System => Utc::now(),
            EngineClock::Fixed(at) => *at,
        }
    }

    /// Move a fixed clock forward. No-op on the system clock.
    pub fn advance(&mut self, by: Duration) {
        if let EngineClock::Fixed(at) = self {
            *at += by;
        }
    }
}

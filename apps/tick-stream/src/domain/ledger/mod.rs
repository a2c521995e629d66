//! Session Tick Ledger
//!
//! Ordered, append-only, time-indexed store of ticks for the current
//! trading session. The ledger owns deduplication and monotonic-time
//! enforcement: a candidate tick is admitted iff its instant is strictly
//! greater than the high-water mark (the instant of the last admitted
//! tick). Repeated or out-of-order bars from re-querying the quote source
//! are rejected silently, which is what makes overlapping polls idempotent.
//!
//! The ledger itself is a plain single-threaded structure; callers that
//! share it across tasks wrap it in a mutex (see
//! [`crate::infrastructure::broadcast::TickHub`]).

use chrono::{DateTime, Utc};

use crate::domain::tick::Tick;

/// Append-only store of one session's ticks, strictly increasing in time.
#[derive(Debug, Default)]
pub struct TickLedger {
    ticks: Vec<Tick>,
    high_water: Option<DateTime<Utc>>,
}

impl TickLedger {
    /// Create an empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks: Vec::new(),
            high_water: None,
        }
    }

    /// Append `tick` iff its instant is strictly newer than the high-water
    /// mark. Returns whether the tick was admitted.
    ///
    /// Rejection is not an error: overlapping trailing-window polls are
    /// expected to re-observe bars the ledger already holds.
    pub fn append_if_newer(&mut self, tick: Tick) -> bool {
        if self.high_water.is_some_and(|mark| tick.time <= mark) {
            return false;
        }
        self.high_water = Some(tick.time);
        self.ticks.push(tick);
        true
    }

    /// Load a backfill batch, sorting by time first so an unsorted or
    /// duplicate-laden provider result cannot violate ledger ordering.
    ///
    /// Returns the ticks that were actually admitted, in admission order,
    /// so the caller can flush exactly those to subscribers.
    pub fn bulk_load(&mut self, mut ticks: Vec<Tick>) -> Vec<Tick> {
        ticks.sort_by_key(|tick| tick.time);
        ticks
            .into_iter()
            .filter(|tick| self.append_if_newer(tick.clone()))
            .collect()
    }

    /// Consistent point-in-time copy of all ticks currently held.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Tick> {
        self.ticks.clone()
    }

    /// Clear all ticks and the high-water mark. Invoked once per new session.
    pub fn reset(&mut self) {
        self.ticks.clear();
        self.high_water = None;
    }

    /// Instant of the last admitted tick, if any.
    #[must_use]
    pub const fn high_water_mark(&self) -> Option<DateTime<Utc>> {
        self.high_water
    }

    /// Number of ticks currently held.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Whether the ledger holds no ticks.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

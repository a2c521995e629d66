//! Tick Broadcast Hub
//!
//! Combines the session ledger with a tokio broadcast channel so every
//! subscriber sees the same logical tick sequence regardless of when it
//! attached.
//!
//! # Snapshot-then-live guarantee
//!
//! [`TickHub::attach`] captures the ledger snapshot and subscribes to the
//! live channel inside one critical section; [`TickHub::publish`] and
//! [`TickHub::load_backlog`] append to the ledger and send on the channel
//! inside the same lock. A tick published concurrently with an attach is
//! therefore observed either in the snapshot or on the live receiver,
//! never both and never neither.
//!
//! # Subscriber isolation
//!
//! Each subscriber owns its receiver; delivery to one cannot block another.
//! A subscriber that falls more than the channel capacity behind sees a
//! `Lagged` error on its receiver and is expected to disconnect and
//! reattach for a fresh snapshot. Detach is simply dropping the receiver.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::domain::ledger::TickLedger;
use crate::domain::tick::Tick;

/// Default capacity of the live tick channel. A full session at one-minute
/// bars is under 400 ticks, so this only bounds pathological subscribers.
pub const DEFAULT_CAPACITY: usize = 1_024;

/// Shared hub reference.
pub type SharedTickHub = Arc<TickHub>;

/// Session ledger plus live fan-out channel.
#[derive(Debug)]
pub struct TickHub {
    ledger: Mutex<TickLedger>,
    live_tx: broadcast::Sender<Tick>,
}

impl TickHub {
    /// Create a hub whose live channel buffers up to `capacity` ticks per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ledger: Mutex::new(TickLedger::new()),
            live_tx: broadcast::channel(capacity).0,
        }
    }

    /// Create a hub with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Register a subscriber: returns the backlog snapshot to replay in
    /// ascending time order, plus the live receiver for everything
    /// published after the snapshot was captured.
    #[must_use]
    pub fn attach(&self) -> (Vec<Tick>, broadcast::Receiver<Tick>) {
        let ledger = self.ledger.lock();
        // Subscribing under the ledger lock is what rules out both the
        // gap and the duplicate between snapshot and live stream.
        let live_rx = self.live_tx.subscribe();
        (ledger.snapshot(), live_rx)
    }

    /// Admit `tick` if it is newer than the high-water mark and, if
    /// admitted, deliver it to all current subscribers. Returns whether
    /// the tick was admitted.
    pub fn publish(&self, tick: Tick) -> bool {
        let mut ledger = self.ledger.lock();
        if !ledger.append_if_newer(tick.clone()) {
            return false;
        }
        // Send failure only means there are no subscribers right now.
        let _ = self.live_tx.send(tick);
        true
    }

    /// Bulk-load a backfill batch and flush the admitted ticks to
    /// already-connected subscribers. Returns the number admitted.
    pub fn load_backlog(&self, ticks: Vec<Tick>) -> usize {
        let mut ledger = self.ledger.lock();
        let accepted = ledger.bulk_load(ticks);
        for tick in &accepted {
            let _ = self.live_tx.send(tick.clone());
        }
        accepted.len()
    }

    /// Point-in-time copy of the current backlog.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Tick> {
        self.ledger.lock().snapshot()
    }

    /// Clear the ledger for a new session.
    pub fn reset(&self) {
        self.ledger.lock().reset();
    }

    /// Instant of the last admitted tick.
    #[must_use]
    pub fn high_water_mark(&self) -> Option<DateTime<Utc>> {
        self.ledger.lock().high_water_mark()
    }

    /// Number of ticks in the current backlog.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.ledger.lock().len()
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.live_tx.receiver_count()
    }
}

impl Default for TickHub {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn tick_at(secs: i64, close: f64) -> Tick {
        Tick::close_only("NVDA", Utc.timestamp_opt(secs, 0).unwrap(), close)
    }

    #[test]
    fn publish_admits_only_newer_ticks() {
        let hub = TickHub::with_defaults();

        assert!(hub.publish(tick_at(100, 1.0)));
        assert!(!hub.publish(tick_at(100, 1.0)));
        assert!(hub.publish(tick_at(160, 2.0)));
        assert_eq!(hub.backlog_len(), 2);
    }

    #[tokio::test]
    async fn attach_before_publish_receives_live() {
        let hub = TickHub::with_defaults();
        let (snapshot, mut rx) = hub.attach();
        assert!(snapshot.is_empty());

        assert!(hub.publish(tick_at(100, 1.0)));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.time.timestamp(), 100);
    }

    #[tokio::test]
    async fn attach_after_publish_receives_snapshot_only() {
        let hub = TickHub::with_defaults();
        assert!(hub.publish(tick_at(100, 1.0)));

        let (snapshot, mut rx) = hub.attach();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].time.timestamp(), 100);
        // Nothing pending on the live channel for this subscriber.
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn rejected_ticks_are_not_broadcast() {
        let hub = TickHub::with_defaults();
        assert!(hub.publish(tick_at(100, 1.0)));

        let (_, mut rx) = hub.attach();
        assert!(!hub.publish(tick_at(100, 1.0)));

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn load_backlog_flushes_to_connected_subscribers() {
        let hub = TickHub::with_defaults();
        let (snapshot, mut rx) = hub.attach();
        assert!(snapshot.is_empty());

        let loaded = hub.load_backlog(vec![tick_at(160, 2.0), tick_at(100, 1.0)]);
        assert_eq!(loaded, 2);

        // Flushed in ascending time order despite unsorted input.
        assert_eq!(rx.recv().await.unwrap().time.timestamp(), 100);
        assert_eq!(rx.recv().await.unwrap().time.timestamp(), 160);
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_affect_others() {
        let hub = TickHub::with_defaults();
        let (_, rx_gone) = hub.attach();
        let (_, mut rx_alive) = hub.attach();
        assert_eq!(hub.subscriber_count(), 2);

        drop(rx_gone);
        assert!(hub.publish(tick_at(100, 1.0)));

        assert_eq!(rx_alive.recv().await.unwrap().time.timestamp(), 100);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lag_not_stall() {
        let hub = TickHub::new(2);
        let (_, mut rx) = hub.attach();

        for i in 0..5 {
            assert!(hub.publish(tick_at(100 + i * 60, 1.0)));
        }

        // Publisher was never blocked; the slow reader sees Lagged.
        assert_eq!(hub.backlog_len(), 5);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }

    #[test]
    fn reset_clears_backlog() {
        let hub = TickHub::with_defaults();
        assert!(hub.publish(tick_at(100, 1.0)));

        hub.reset();

        assert_eq!(hub.backlog_len(), 0);
        assert_eq!(hub.high_water_mark(), None);
    }
}

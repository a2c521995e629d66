//! Live Poller
//!
//! Repeatedly queries the quote source for a short trailing window and
//! publishes whatever is newer than the ledger's high-water mark. The
//! overlap between consecutive trailing windows is intentional; the
//! high-water mark check is what makes the re-observed bars idempotent.
//!
//! The loop is bounded by the session close instant and by the shutdown
//! token; a failed or empty cycle logs and sleeps until the next one.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::application::ports::{Clock, QuoteSource};
use crate::application::services::normalize::normalize_bars;
use crate::domain::session::SessionWindow;
use crate::infrastructure::broadcast::TickHub;
use crate::infrastructure::metrics;

/// Live polling parameters.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Symbol to poll.
    pub symbol: String,
    /// Bar interval requested from the quote source (e.g. "1m").
    pub interval: String,
    /// Sleep between poll cycles.
    pub poll_interval: Duration,
    /// Trailing query span per cycle.
    pub trailing_window: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            interval: "1m".to_string(),
            poll_interval: Duration::from_secs(30),
            trailing_window: Duration::from_secs(300),
        }
    }
}

/// Poll the quote source until the session closes or `cancel` fires.
///
/// Each accepted tick is broadcast immediately. Returns the total number
/// of ticks accepted over the poller's lifetime.
pub async fn run(
    source: &dyn QuoteSource,
    clock: &dyn Clock,
    hub: &TickHub,
    window: &SessionWindow,
    settings: &PollerSettings,
    cancel: CancellationToken,
) -> usize {
    let mut total_accepted = 0;

    loop {
        // Checked before each cycle so shutdown never waits on another
        // quote source round-trip.
        if cancel.is_cancelled() {
            tracing::info!("Shutdown requested, stopping live polling");
            break;
        }

        let now = clock.now();
        if window.is_closed_at(now) {
            tracing::info!(trading_day = %window.trading_day, "Session closed, stopping live polling");
            break;
        }

        total_accepted += poll_once(source, clock, hub, window, settings).await;

        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("Shutdown requested, stopping live polling");
                break;
            }
            () = tokio::time::sleep(settings.poll_interval) => {}
        }
    }

    total_accepted
}

/// One poll cycle: fetch the trailing window, normalize, publish what is
/// newer than the high-water mark. Returns the number of ticks accepted.
async fn poll_once(
    source: &dyn QuoteSource,
    clock: &dyn Clock,
    hub: &TickHub,
    window: &SessionWindow,
    settings: &PollerSettings,
) -> usize {
    metrics::record_poll_cycle();
    let now = clock.now();
    let start = now - chrono::Duration::from_std(settings.trailing_window)
        .unwrap_or_else(|_| chrono::Duration::seconds(300));

    let fetch_started = Instant::now();
    let bars = match source
        .fetch_bars(&settings.symbol, &settings.interval, start, now)
        .await
    {
        Ok(bars) => bars,
        Err(e) => {
            metrics::record_source_error(metrics::Stage::Poll);
            tracing::warn!(error = %e, "Live poll query failed, retrying next cycle");
            return 0;
        }
    };
    metrics::record_fetch_duration(metrics::Stage::Poll, fetch_started.elapsed());
    metrics::record_bars_fetched(metrics::Stage::Poll, bars.len() as u64);

    if bars.is_empty() {
        tracing::debug!("Live poll returned no bars");
        return 0;
    }

    let candidates = normalize_bars(&settings.symbol, bars, window);
    let offered = candidates.len();
    let mut accepted = 0;
    for tick in candidates {
        if hub.publish(tick) {
            accepted += 1;
        }
    }

    metrics::record_ticks_accepted(accepted as u64);
    metrics::record_ticks_rejected((offered - accepted) as u64);
    metrics::set_backlog_len(hub.backlog_len() as f64);

    if accepted > 0 {
        tracing::debug!(accepted, offered, "Live ticks published");
    }
    accepted
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::{Clock, MockQuoteSource, ProviderBar, SourceError};
    use crate::domain::session::session_window;

    /// Clock scripted with a sequence of instants, repeating the last.
    struct ScriptedClock {
        instants: Mutex<VecDeque<DateTime<Utc>>>,
        last: DateTime<Utc>,
    }

    impl ScriptedClock {
        fn new(instants: Vec<DateTime<Utc>>) -> Self {
            let last = *instants.last().unwrap();
            Self {
                instants: Mutex::new(instants.into()),
                last,
            }
        }
    }

    impl Clock for ScriptedClock {
        fn now(&self) -> DateTime<Utc> {
            self.instants.lock().pop_front().unwrap_or(self.last)
        }
    }

    fn close_bar(time: DateTime<Utc>, close: f64) -> ProviderBar {
        ProviderBar {
            time,
            open: None,
            high: None,
            low: None,
            close: Some(close),
            volume: Some(100),
        }
    }

    fn fast_settings() -> PollerSettings {
        PollerSettings {
            symbol: "NVDA".to_string(),
            poll_interval: std::time::Duration::from_millis(5),
            ..PollerSettings::default()
        }
    }

    fn mid_session() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 15, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn overlapping_polls_accept_each_bar_once() {
        let now = mid_session();
        let window = session_window(now);
        let open = window.open;

        // Backlog already holds 09:30-09:32; the poll re-observes two of
        // them plus one new bar.
        let hub = TickHub::with_defaults();
        hub.load_backlog(vec![
            crate::domain::tick::Tick::close_only("NVDA", open, 100.0),
            crate::domain::tick::Tick::close_only("NVDA", open + ChronoDuration::minutes(1), 101.0),
            crate::domain::tick::Tick::close_only("NVDA", open + ChronoDuration::minutes(2), 102.0),
        ]);

        let mut source = MockQuoteSource::new();
        source.expect_fetch_bars().returning(move |_, _, _, _| {
            Ok(vec![
                close_bar(open + ChronoDuration::minutes(1), 101.0),
                close_bar(open + ChronoDuration::minutes(2), 102.0),
                close_bar(open + ChronoDuration::minutes(3), 103.0),
            ])
        });

        let (_, mut rx) = hub.attach();

        // One in-session cycle, then the clock jumps past close.
        let clock = ScriptedClock::new(vec![now, now, window.close + ChronoDuration::seconds(1)]);
        let accepted = run(
            &source,
            &clock,
            &hub,
            &window,
            &fast_settings(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(accepted, 1);
        assert_eq!(hub.backlog_len(), 4);

        // Exactly one broadcast fired, for the 09:33 bar.
        let tick = rx.try_recv().unwrap();
        assert_eq!(tick.time, open + ChronoDuration::minutes(3));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_cycle_is_not_fatal() {
        let now = mid_session();
        let window = session_window(now);
        let open = window.open;

        let mut source = MockQuoteSource::new();
        let mut calls = 0;
        source.expect_fetch_bars().returning(move |_, _, _, _| {
            calls += 1;
            if calls == 1 {
                Err(SourceError::Request("boom".to_string()))
            } else {
                Ok(vec![close_bar(open, 100.0)])
            }
        });

        let hub = TickHub::with_defaults();
        // Two in-session cycles (failure, then success), then close.
        let clock = ScriptedClock::new(vec![
            now,
            now,
            now,
            now,
            window.close + ChronoDuration::seconds(1),
        ]);

        let accepted = run(
            &source,
            &clock,
            &hub,
            &window,
            &fast_settings(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn exits_immediately_when_session_already_closed() {
        let now = mid_session();
        let window = session_window(now);

        let mut source = MockQuoteSource::new();
        source.expect_fetch_bars().times(0);

        let hub = TickHub::with_defaults();
        let clock = ScriptedClock::new(vec![window.close + ChronoDuration::seconds(1)]);

        let accepted = run(
            &source,
            &clock,
            &hub,
            &window,
            &fast_settings(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(accepted, 0);
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop_before_the_next_fetch() {
        let now = mid_session();
        let window = session_window(now);

        let mut source = MockQuoteSource::new();
        source.expect_fetch_bars().times(0);

        let hub = TickHub::with_defaults();
        let clock = ScriptedClock::new(vec![now]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let settings = PollerSettings {
            symbol: "NVDA".to_string(),
            // Long enough that only cancellation can end the test promptly.
            poll_interval: std::time::Duration::from_secs(3600),
            ..PollerSettings::default()
        };

        // Mid-session with a cancelled token: the loop exits without ever
        // touching the quote source.
        let accepted = run(&source, &clock, &hub, &window, &settings, cancel).await;

        assert_eq!(accepted, 0);
    }
}

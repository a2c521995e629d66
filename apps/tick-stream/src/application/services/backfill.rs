//! Backfill Loader
//!
//! One-shot reconstruction of the tick backlog for the trailing trading
//! days. Queries the quote source once per calendar day (the provider
//! limits intraday query spans), normalizes each day's rows against that
//! day's session window, and bulk-loads the merged result into the hub,
//! which flushes it to whatever subscribers are already connected.
//!
//! A failed or empty query for one day is logged and skipped: a degraded
//! backlog is preferred over blocking session start.

use std::time::Instant;

use crate::application::ports::{Clock, QuoteSource};
use crate::application::services::normalize::normalize_bars;
use crate::domain::session::{last_trading_days, window_for_day};
use crate::domain::tick::Tick;
use crate::infrastructure::broadcast::TickHub;
use crate::infrastructure::metrics;

/// Backfill parameters.
#[derive(Debug, Clone)]
pub struct BackfillSettings {
    /// Symbol to load.
    pub symbol: String,
    /// Bar interval requested from the quote source (e.g. "1m").
    pub interval: String,
    /// Number of trailing trading days to reconstruct, including today.
    pub days: usize,
}

/// Load the backlog for the trailing trading days into `hub`.
///
/// Returns the number of ticks admitted to the ledger.
pub async fn run(
    source: &dyn QuoteSource,
    clock: &dyn Clock,
    hub: &TickHub,
    settings: &BackfillSettings,
) -> usize {
    let now = clock.now();
    let mut backlog: Vec<Tick> = Vec::new();

    for day in last_trading_days(now, settings.days) {
        let window = window_for_day(day);
        if now < window.open {
            // Today's session has not opened yet; nothing to reconstruct.
            continue;
        }
        let end = window.close.min(now);

        let started = Instant::now();
        match source
            .fetch_bars(&settings.symbol, &settings.interval, window.open, end)
            .await
        {
            Ok(bars) => {
                metrics::record_fetch_duration(metrics::Stage::Backfill, started.elapsed());
                metrics::record_bars_fetched(metrics::Stage::Backfill, bars.len() as u64);
                let ticks = normalize_bars(&settings.symbol, bars, &window);
                tracing::debug!(
                    trading_day = %day,
                    ticks = ticks.len(),
                    "Backfill day normalized"
                );
                backlog.extend(ticks);
            }
            Err(e) => {
                metrics::record_source_error(metrics::Stage::Backfill);
                tracing::warn!(trading_day = %day, error = %e, "Backfill query failed, skipping day");
            }
        }
    }

    let candidates = backlog.len();
    let loaded = hub.load_backlog(backlog);
    metrics::record_ticks_accepted(loaded as u64);
    metrics::record_ticks_rejected((candidates - loaded) as u64);
    metrics::set_backlog_len(hub.backlog_len() as f64);

    tracing::info!(
        symbol = %settings.symbol,
        days = settings.days,
        ticks = loaded,
        "Backlog loaded"
    );
    loaded
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::application::ports::{MockClock, MockQuoteSource, ProviderBar, SourceError};

    fn reference() -> DateTime<Utc> {
        // Wednesday 2024-01-10, 10:00 New York.
        Utc.with_ymd_and_hms(2024, 1, 10, 15, 0, 0).unwrap()
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

    fn fixed_clock(now: DateTime<Utc>) -> MockClock {
        let mut clock = MockClock::new();
        clock.expect_now().return_const(now);
        clock
    }

    fn settings(days: usize) -> BackfillSettings {
        BackfillSettings {
            symbol: "NVDA".to_string(),
            interval: "1m".to_string(),
            days,
        }
    }

    #[tokio::test]
    async fn loads_single_day_backlog() {
        let now = reference();
        let open = Utc.with_ymd_and_hms(2024, 1, 10, 14, 30, 0).unwrap();

        let mut source = MockQuoteSource::new();
        source.expect_fetch_bars().times(1).returning(move |_, _, start, end| {
            assert_eq!(start, open);
            assert_eq!(end, now);
            Ok(vec![
                close_bar(open, 100.0),
                close_bar(open + Duration::minutes(1), 101.0),
            ])
        });

        let hub = TickHub::with_defaults();
        let loaded = run(&source, &fixed_clock(now), &hub, &settings(1)).await;

        assert_eq!(loaded, 2);
        assert_eq!(hub.backlog_len(), 2);
    }

    #[tokio::test]
    async fn failed_day_is_skipped_not_fatal() {
        let now = reference();
        let open = Utc.with_ymd_and_hms(2024, 1, 10, 14, 30, 0).unwrap();

        let mut source = MockQuoteSource::new();
        let mut calls = 0;
        source.expect_fetch_bars().times(2).returning(move |_, _, _, _| {
            calls += 1;
            if calls == 1 {
                Err(SourceError::Timeout)
            } else {
                Ok(vec![close_bar(open, 100.0)])
            }
        });

        let hub = TickHub::with_defaults();
        let loaded = run(&source, &fixed_clock(now), &hub, &settings(2)).await;

        assert_eq!(loaded, 1);
    }

    #[tokio::test]
    async fn out_of_window_rows_never_reach_the_ledger() {
        let now = reference();
        let open = Utc.with_ymd_and_hms(2024, 1, 10, 14, 30, 0).unwrap();
        let pre_market = open - Duration::hours(1);

        let mut source = MockQuoteSource::new();
        source
            .expect_fetch_bars()
            .times(1)
            .returning(move |_, _, _, _| {
                Ok(vec![close_bar(pre_market, 99.0), close_bar(open, 100.0)])
            });

        let hub = TickHub::with_defaults();
        run(&source, &fixed_clock(now), &hub, &settings(1)).await;

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.iter().all(|t| t.time >= open));
    }

    #[tokio::test]
    async fn pre_open_reference_skips_today() {
        // Wednesday 08:00 New York: today's window has not opened.
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 13, 0, 0).unwrap();
        let tuesday_open = Utc.with_ymd_and_hms(2024, 1, 9, 14, 30, 0).unwrap();
        let tuesday_close = Utc.with_ymd_and_hms(2024, 1, 9, 21, 0, 0).unwrap();

        let mut source = MockQuoteSource::new();
        source.expect_fetch_bars().times(1).returning(move |_, _, start, end| {
            assert_eq!(start, tuesday_open);
            assert_eq!(end, tuesday_close);
            Ok(vec![close_bar(tuesday_open, 100.0)])
        });

        let hub = TickHub::with_defaults();
        let loaded = run(&source, &fixed_clock(now), &hub, &settings(2)).await;

        assert_eq!(loaded, 1);
    }

    #[tokio::test]
    async fn merged_days_stay_strictly_ordered() {
        let now = reference();
        let tue_open = Utc.with_ymd_and_hms(2024, 1, 9, 14, 30, 0).unwrap();
        let wed_open = Utc.with_ymd_and_hms(2024, 1, 10, 14, 30, 0).unwrap();

        let mut source = MockQuoteSource::new();
        source.expect_fetch_bars().times(2).returning(move |_, _, start, _| {
            if start == tue_open {
                Ok(vec![close_bar(tue_open, 100.0)])
            } else {
                Ok(vec![close_bar(wed_open, 102.0)])
            }
        });

        let hub = TickHub::with_defaults();
        let loaded = run(&source, &fixed_clock(now), &hub, &settings(2)).await;

        assert_eq!(loaded, 2);
        let snapshot = hub.snapshot();
        assert!(snapshot.windows(2).all(|p| p[0].time < p[1].time));
    }
}

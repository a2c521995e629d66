//! Provider Row Normalization
//!
//! The single explicit step converting provider bars into canonical
//! [`Tick`]s. No downstream code branches on provider response shape;
//! everything after this function deals in ticks only.
//!
//! Per-row recovery rules:
//!
//! - bars outside the session window are dropped (providers include
//!   pre/post-market rows)
//! - a bar without a close price is dropped
//! - missing volume defaults to zero, missing open/high/low stay unknown
//!
//! A partial bar is preferable to a gap in the chart, so no row failure
//! ever aborts the batch.

use crate::application::ports::ProviderBar;
use crate::domain::session::SessionWindow;
use crate::domain::tick::Tick;

/// Normalize a provider batch into ticks, ascending by time.
#[must_use]
pub fn normalize_bars(symbol: &str, bars: Vec<ProviderBar>, window: &SessionWindow) -> Vec<Tick> {
    let mut ticks: Vec<Tick> = bars
        .into_iter()
        .filter_map(|bar| normalize_bar(symbol, bar, window))
        .collect();
    ticks.sort_by_key(|tick| tick.time);
    ticks
}

fn normalize_bar(symbol: &str, bar: ProviderBar, window: &SessionWindow) -> Option<Tick> {
    if !window.contains(bar.time) {
        tracing::trace!(time = %bar.time, "Dropping out-of-window bar");
        return None;
    }
    let Some(close) = bar.close else {
        tracing::debug!(time = %bar.time, "Dropping bar without close price");
        return None;
    };
    Some(Tick {
        symbol: symbol.to_string(),
        time: bar.time,
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close,
        volume: bar.volume.unwrap_or(0),
    })
}

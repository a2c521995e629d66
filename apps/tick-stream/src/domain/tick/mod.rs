//! Canonical Tick Type
//!
//! The immutable unit of market data flowing through the system. Every
//! provider response is normalized into this shape before any other
//! component touches it; the wire format sent to subscribers is the JSON
//! serialization of this struct.
//!
//! # Wire Format
//!
//! ```json
//! {"symbol":"NVDA","time":1700000000,"open":100.0,"high":101.0,"low":99.5,"close":100.5,"volume":1200}
//! ```
//!
//! `time` is epoch seconds and the authoritative ordering key. `close` is
//! always present; `open`/`high`/`low` are omitted entirely when the source
//! granularity does not provide them, so consumers can distinguish
//! "unknown" from an actual zero price.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped price/volume observation for a symbol.
///
/// Ticks are immutable values: once constructed they are never mutated,
/// only copied into the ledger and onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Ticker symbol this observation belongs to.
    pub symbol: String,

    /// Observation instant, second precision. The sole ordering key.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,

    /// Opening price of the bar, if the source granularity provides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,

    /// High price of the bar, if the source granularity provides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,

    /// Low price of the bar, if the source granularity provides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,

    /// Closing (last) price of the bar. Always present.
    pub close: f64,

    /// Traded volume for the bar, zero when the source reports none.
    #[serde(default)]
    pub volume: u64,
}

impl Tick {
    /// Create a close-only tick, the minimal shape the wire format allows.
    #[must_use]
    pub fn close_only(symbol: impl Into<String>, time: DateTime<Utc>, close: f64) -> Self {
        Self {
            symbol: symbol.into(),
            time,
            open: None,
            high: None,
            low: None,
            close,
            volume: 0,
        }
    }
}

//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`QuoteSource`]: OHLCV bar queries against the external market data
//!   provider
//! - [`Clock`]: Current-time lookups, injected so session and polling
//!   decisions are testable

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One OHLCV row as returned by the quote source, prior to normalization.
///
/// Every field except the instant is optional at this stage: providers
/// routinely return partial rows, and the normalization step decides what
/// to default and what to drop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderBar {
    /// Bar instant.
    pub time: DateTime<Utc>,
    /// Opening price, if reported.
    pub open: Option<f64>,
    /// High price, if reported.
    pub high: Option<f64>,
    /// Low price, if reported.
    pub low: Option<f64>,
    /// Closing price. A bar without it is unusable and gets dropped.
    pub close: Option<f64>,
    /// Traded volume, if reported.
    pub volume: Option<u64>,
}

/// Quote source failure for one query attempt.
///
/// Always recoverable: callers log and proceed with whatever partial data
/// they have for that cycle.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Request could not be sent or the provider returned an error status.
    #[error("quote source request failed: {0}")]
    Request(String),

    /// Request exceeded the configured timeout.
    #[error("quote source request timed out")]
    Timeout,

    /// Provider responded with a payload we could not parse.
    #[error("quote source returned malformed payload: {0}")]
    Malformed(String),
}

/// Market data provider returning OHLCV bars for a symbol/interval/range
/// query.
///
/// The provider may return fewer bars than the requested range covers:
/// gaps are normal, not an error. Rows outside the requested range (e.g.
/// pre/post-market data) may also appear and are filtered downstream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch bars for `symbol` at `interval` granularity between `start`
    /// and `end` (epoch instants).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on network failure, timeout, or an
    /// unparseable payload.
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProviderBar>, SourceError>;
}

/// Current-time source, injected so the session driver and poller can be
/// driven deterministically in tests.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock [`Clock`] used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

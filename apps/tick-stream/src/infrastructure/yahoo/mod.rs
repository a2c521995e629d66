//! Yahoo Finance Chart Adapter
//!
//! [`QuoteSource`] implementation over the Yahoo Finance chart endpoint:
//!
//! ```text
//! GET {base}/v8/finance/chart/{symbol}?period1=..&period2=..&interval=1m&includePrePost=false
//! ```
//!
//! The response carries parallel arrays: `timestamp[]` plus per-field
//! arrays under `indicators.quote[0]`, where individual entries may be
//! null for thin bars. Nulls stay `None` on the [`ProviderBar`]; the
//! normalization step downstream decides what to default or drop.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::application::ports::{ProviderBar, QuoteSource, SourceError};

/// Default chart API host.
pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Quote source connection settings.
#[derive(Debug, Clone)]
pub struct QuoteSourceSettings {
    /// Chart API base URL.
    pub base_url: String,
    /// Per-request timeout; exceeding it counts as a failed query.
    pub request_timeout: Duration,
}

impl Default for QuoteSourceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the Yahoo Finance chart API.
#[derive(Debug, Clone)]
pub struct YahooQuoteSource {
    client: reqwest::Client,
    base_url: String,
}

impl YahooQuoteSource {
    /// Build a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Request`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(settings: &QuoteSourceSettings) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("tick-stream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProviderBar>, SourceError> {
        let url = format!("{}/v8/finance/chart/{symbol}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", start.timestamp().to_string()),
                ("period2", end.timestamp().to_string()),
                ("interval", interval.to_string()),
                ("includePrePost", "false".to_string()),
            ])
            .send()
            .await
            .map_err(map_transport_error)?
            .error_for_status()
            .map_err(map_transport_error)?;

        let payload: ChartResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Malformed(e.to_string())
            }
        })?;

        flatten_chart(payload)
    }
}

fn map_transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Request(e.to_string())
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Option<Vec<Option<f64>>>,
    #[serde(default)]
    high: Option<Vec<Option<f64>>>,
    #[serde(default)]
    low: Option<Vec<Option<f64>>>,
    #[serde(default)]
    close: Option<Vec<Option<f64>>>,
    #[serde(default)]
    volume: Option<Vec<Option<u64>>>,
}

impl QuoteBlock {
    fn field_at(field: Option<&Vec<Option<f64>>>, index: usize) -> Option<f64> {
        field.and_then(|values| values.get(index).copied().flatten())
    }

    fn volume_at(&self, index: usize) -> Option<u64> {
        self.volume
            .as_ref()
            .and_then(|values| values.get(index).copied().flatten())
    }
}

fn flatten_chart(payload: ChartResponse) -> Result<Vec<ProviderBar>, SourceError> {
    if let Some(error) = payload.chart.error {
        return Err(SourceError::Request(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let Some(result) = payload.chart.result.and_then(|mut r| {
        if r.is_empty() { None } else { Some(r.remove(0)) }
    }) else {
        // No series for the requested range; gaps are normal.
        return Ok(Vec::new());
    };

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let bars = timestamps
        .into_iter()
        .enumerate()
        .filter_map(|(i, secs)| {
            let time = Utc.timestamp_opt(secs, 0).single()?;
            Some(ProviderBar {
                time,
                open: QuoteBlock::field_at(quote.open.as_ref(), i),
                high: QuoteBlock::field_at(quote.high.as_ref(), i),
                low: QuoteBlock::field_at(quote.low.as_ref(), i),
                close: QuoteBlock::field_at(quote.close.as_ref(), i),
                volume: quote.volume_at(i),
            })
        })
        .collect();

    Ok(bars)
}

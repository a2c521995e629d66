//! Stream Configuration Settings
//!
//! Configuration types for the tick stream service, loaded from
//! environment variables with the `TICK_STREAM_` prefix.

use std::time::Duration;

use crate::application::services::{BackfillSettings, PollerSettings};
use crate::infrastructure::yahoo::QuoteSourceSettings;

/// Symbol, interval, and timing settings for one session stream.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Symbol to stream.
    pub symbol: String,
    /// Bar interval requested from the quote source.
    pub interval: String,
    /// Trailing trading days reconstructed at startup, including today.
    pub backfill_days: usize,
    /// Sleep between live poll cycles.
    pub poll_interval: Duration,
    /// Trailing query span per live poll cycle.
    pub trailing_window: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            symbol: "NVDA".to_string(),
            interval: "1m".to_string(),
            backfill_days: 5,
            poll_interval: Duration::from_secs(30),
            trailing_window: Duration::from_secs(300),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP port serving the WebSocket, snapshot, health, and metrics
    /// endpoints.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8080 }
    }
}

/// Broadcast channel settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Per-subscriber live channel capacity; a subscriber lagging past it
    /// is disconnected.
    pub capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self { capacity: 1_024 }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    /// Stream symbol and timing.
    pub stream: StreamSettings,
    /// Server ports.
    pub server: ServerSettings,
    /// Quote source connection settings.
    pub source: QuoteSourceSettings,
    /// Broadcast channel settings.
    pub broadcast: BroadcastSettings,
}

impl StreamConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a provided value is empty or unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = StreamSettings::default();

        let symbol = std::env::var("TICK_STREAM_SYMBOL").unwrap_or(defaults.symbol);
        if symbol.trim().is_empty() {
            return Err(ConfigError::EmptyValue("TICK_STREAM_SYMBOL".to_string()));
        }

        let interval = std::env::var("TICK_STREAM_INTERVAL").unwrap_or(defaults.interval);
        if interval.trim().is_empty() {
            return Err(ConfigError::EmptyValue("TICK_STREAM_INTERVAL".to_string()));
        }

        let backfill_days = parse_env_usize("TICK_STREAM_BACKFILL_DAYS", defaults.backfill_days);
        if backfill_days == 0 {
            return Err(ConfigError::InvalidValue(
                "TICK_STREAM_BACKFILL_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let stream = StreamSettings {
            symbol,
            interval,
            backfill_days,
            poll_interval: parse_env_duration_secs(
                "TICK_STREAM_POLL_INTERVAL_SECS",
                defaults.poll_interval,
            ),
            trailing_window: parse_env_duration_secs(
                "TICK_STREAM_TRAILING_WINDOW_SECS",
                defaults.trailing_window,
            ),
        };

        let server = ServerSettings {
            http_port: parse_env_u16("TICK_STREAM_HTTP_PORT", ServerSettings::default().http_port),
        };

        let source_defaults = QuoteSourceSettings::default();
        let source = QuoteSourceSettings {
            base_url: std::env::var("TICK_STREAM_SOURCE_BASE_URL")
                .unwrap_or(source_defaults.base_url),
            request_timeout: parse_env_duration_secs(
                "TICK_STREAM_SOURCE_TIMEOUT_SECS",
                source_defaults.request_timeout,
            ),
        };

        let broadcast = BroadcastSettings {
            capacity: parse_env_usize(
                "TICK_STREAM_BROADCAST_CAPACITY",
                BroadcastSettings::default().capacity,
            ),
        };

        Ok(Self {
            stream,
            server,
            source,
            broadcast,
        })
    }

    /// Backfill parameters derived from the stream settings.
    #[must_use]
    pub fn backfill_settings(&self) -> BackfillSettings {
        BackfillSettings {
            symbol: self.stream.symbol.clone(),
            interval: self.stream.interval.clone(),
            days: self.stream.backfill_days,
        }
    }

    /// Live poller parameters derived from the stream settings.
    #[must_use]
    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            symbol: self.stream.symbol.clone(),
            interval: self.stream.interval.clone(),
            poll_interval: self.stream.poll_interval,
            trailing_window: self.stream.trailing_window,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("environment variable {0} is invalid: {1}")]
    InvalidValue(String, String),
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

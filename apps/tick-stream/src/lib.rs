#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! Tick Stream - Session Tick Fan-Out Server
//!
//! Streams one symbol's intraday price ticks to any number of WebSocket
//! subscribers. On startup the session backlog is reconstructed from the
//! quote source; every subscriber, whenever it connects, receives the
//! full backlog followed by the live stream with no gap and no duplicate.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core session logic and data types
//!   - `tick`: Canonical tick value and wire format
//!   - `ledger`: Append-only session store with high-water-mark dedup
//!   - `session`: Trading session calendar (exchange time zone)
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Quote source and clock interfaces
//!   - `services`: Normalization, backfill, live polling, orchestration
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `yahoo`: Yahoo Finance chart API client
//!   - `broadcast`: Ledger plus broadcast-channel fan-out hub
//!   - `http`: WebSocket/snapshot/health/metrics HTTP server
//!   - `config`: Environment configuration
//!   - `telemetry`, `metrics`: Observability
//!
//! # Data Flow
//!
//! ```text
//! Quote Source ──► Backfill ──┐
//!    (HTTP)                   ├──► Tick Ledger + Broadcast ──► Subscriber 1
//!              ──► Poller  ──┘         (TickHub)          ──► Subscriber N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core session types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::ledger::TickLedger;
pub use domain::session::{
    MARKET_TZ, SessionWindow, last_trading_days, session_window, trading_day_on_or_before,
    window_for_day,
};
pub use domain::tick::Tick;

// Ports
pub use application::ports::{Clock, ProviderBar, QuoteSource, SourceError, SystemClock};

// Services
pub use application::services::{BackfillSettings, PollerSettings, SessionDriver, normalize_bars};
pub use application::services::{backfill, poller};

// Broadcast hub (for integration tests)
pub use infrastructure::broadcast::{SharedTickHub, TickHub};

// Infrastructure config
pub use infrastructure::config::{
    BroadcastSettings, ConfigError, ServerSettings, StreamConfig, StreamSettings,
};

// HTTP server
pub use infrastructure::http::{ApiServer, ApiState, ServerError, router};

// Quote source adapter
pub use infrastructure::yahoo::{QuoteSourceSettings, YahooQuoteSource};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Tick ledger plus broadcast channel fan-out.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// HTTP server: WebSocket stream, snapshot, health, and metrics endpoints.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// Yahoo Finance chart API quote source adapter.
pub mod yahoo;

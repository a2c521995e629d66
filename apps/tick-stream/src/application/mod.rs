//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for external systems (quote source, clock).
pub mod ports;

/// Application services for backfill, live polling, and orchestration.
pub mod services;

//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `normalize`: Provider row to canonical tick conversion
//! - `backfill`: One-shot session backlog reconstruction
//! - `poller`: Cancellable live polling loop
//! - `driver`: Per-session orchestration of the above

pub mod backfill;
pub mod driver;
pub mod normalize;
pub mod poller;

pub use backfill::BackfillSettings;
pub use driver::SessionDriver;
pub use normalize::normalize_bars;
pub use poller::PollerSettings;

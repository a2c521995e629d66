//! Domain layer - Pure core types and logic with no I/O.

pub mod ledger;
pub mod session;
pub mod tick;

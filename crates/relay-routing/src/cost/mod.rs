//! Cost tracking and daily budget enforcement.

/// Cost ledger implementation
pub mod ledger;

pub use ledger::{CostEntry, CostLedger};

//! # Priority Boosting
//!
//! Priority grants and helping schedulers of a thread.

pub mod helper;
pub mod ledger;

pub use helper::HelperRegistry;
pub use ledger::{Grant, PriorityChange, PriorityLedger};

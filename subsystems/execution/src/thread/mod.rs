//! # Thread Management
//!
//! Thread control blocks, their registry, wait states and the wait-state
//! guard.

pub mod registry;
pub mod states;
pub mod thread;
pub mod wait;

pub use registry::*;
pub use states::*;
pub use thread::*;
pub use wait::{BlockOutcome, UnblockOutcome};

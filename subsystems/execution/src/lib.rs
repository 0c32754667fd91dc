//! # SuperCore Execution Subsystem
//!
//! Thread queues and the resource surrender protocol of the SuperCore
//! real-time executive.
//!
//! ## Components
//!
//! - **Wait Queue**: FIFO or priority ordered set of threads blocked on a
//!   resource
//! - **Priority Ledger**: per-thread set of priority grants and the
//!   effective priority they yield on each scheduler
//! - **Helper Registry**: schedulers a thread may additionally run on because
//!   of a grant (SMP)
//! - **Resources**: mutexes (None / Inherit / Ceiling / MrsP) and counting
//!   semaphores
//! - **Surrender**: ownership transfer or count increment on release
//! - **Wait-State Guard**: the intend-to-block handshake between a blocking
//!   thread and the thread that makes it ready again
//!
//! ## Locking
//!
//! Every resource carries its own spin lock. All queue, owner and grant
//! mutations for a resource happen while its [`threadq::ResourceGuard`] is
//! held. Thread scheduling state is protected by per-thread leaf locks, and
//! the home-scheduler priority is published through an atomic so that
//! schedulers and drivers can read it without locking.
//!
//! Owner-chain walks (deadlock detection and transitive priority inheritance)
//! are serialized by a single path lock. Lock order is path, resource,
//! thread.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use supercore_execution::{
//!     CoreConfig, LockingProtocol, MutexAttributes, Priority, SchedulerId, SuperCore,
//!     ThreadAttributes, WaitTimeout,
//! };
//!
//! let core = SuperCore::new(CoreConfig::default())?;
//! let low = core.create_thread(ThreadAttributes::new(SchedulerId::new(0), Priority::new(10)))?;
//! let high = core.create_thread(ThreadAttributes::new(SchedulerId::new(0), Priority::new(5)))?;
//! let mutex = core.create_mutex(MutexAttributes::new(LockingProtocol::Inherit))?;
//!
//! core.seize(mutex, low, WaitTimeout::Forever)?;
//! core.seize(mutex, high, WaitTimeout::Forever)?;
//! core.commit_block(high)?;
//!
//! core.surrender(mutex, low)?;
//! assert_eq!(core.owner(mutex)?, Some(high));
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod hooks;
pub mod priority;
pub mod supercore;
pub mod thread;
pub mod threadq;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::CoreConfig;
pub use error::{TqError, TqResult};
pub use hooks::{NoHooks, SchedulerHooks, TimeoutService};
pub use priority::{Grant, HelperRegistry, PriorityChange, PriorityLedger};
pub use supercore::SuperCore;
pub use thread::{
    BlockOutcome, Thread, ThreadAttributes, ThreadRegistry, ThreadState, UnblockOutcome,
    WaitFlags, WaitState,
};
pub use threadq::{
    Discipline, LockingProtocol, MutexAttributes, PriorityEffect, ResourceKind,
    SeizeOutcome, SemaphoreAttributes, SurrenderOutcome, WaitQueue, WaitTimeout,
};
pub use types::{Priority, ResourceId, SchedulerId, ThreadId};

// =============================================================================
// Static Checks
// =============================================================================

static_assertions::assert_impl_all!(SuperCore: Send, Sync);
static_assertions::assert_impl_all!(Thread: Send, Sync);
static_assertions::assert_impl_all!(threadq::Resource: Send, Sync);
static_assertions::assert_eq_size!(ThreadId, u32);
static_assertions::assert_eq_size!(ResourceId, u32);
static_assertions::assert_eq_size!(Priority, u32);

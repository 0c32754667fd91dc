//! # Thread Queues
//!
//! Resources, their wait queues and the algorithms that run under a
//! resource lock: seize and enqueue, surrender, extract and flush, and the
//! priority boosting they share.
//!
//! The algorithms never take a second resource lock. Whatever has to happen
//! on another resource (transitive priority inheritance) is returned to the
//! caller and done after the lock is released.

mod boost;
mod context;
pub mod enqueue;
pub(crate) mod extract;
pub mod queue;
pub mod resource;
pub mod surrender;

pub(crate) use boost::{is_vital_waiter, update_waiter};
pub(crate) use context::QueueContext;

pub use enqueue::{SeizeOutcome, WaitTimeout};
pub use queue::{Discipline, WaitQueue};
pub use resource::{
    LockingProtocol, MutexAttributes, Resource, ResourceGuard, ResourceKind, ResourceState,
    ResourceTable, SemaphoreAttributes,
};
pub use surrender::{PriorityEffect, SurrenderOutcome};

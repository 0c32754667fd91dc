//! # External Collaborators
//!
//! The thread-queue core does not schedule and does not keep time. It
//! reports state changes to the scheduler and asks a timeout service to arm
//! and cancel wait timeouts through the traits below.

use crate::types::{Priority, SchedulerId, ThreadId};

/// Scheduler notifications
///
/// All methods may be called while a resource lock or the scheduling state
/// of the thread is held and must not call back into the core.
pub trait SchedulerHooks: Send + Sync {
    /// The thread commits to block and must be removed from its ready set
    fn block(&self, _thread: ThreadId) {}

    /// The thread is ready again
    ///
    /// If `home` is served by another processor the platform delivers the
    /// unblock through an inter-processor interrupt.
    fn unblock(&self, _thread: ThreadId, _home: SchedulerId) {}

    /// The effective priority of the thread changed on `scheduler`
    fn priority_changed(&self, _thread: ThreadId, _scheduler: SchedulerId, _priority: Priority) {}

    /// The thread became eligible on a helping scheduler
    fn helper_added(&self, _thread: ThreadId, _scheduler: SchedulerId) {}

    /// The thread is no longer eligible on a helping scheduler
    fn helper_removed(&self, _thread: ThreadId, _scheduler: SchedulerId) {}
}

/// Wait timeout service
///
/// When an armed timeout expires the service calls
/// [`crate::SuperCore::timeout`] for the thread.
pub trait TimeoutService: Send + Sync {
    /// Arm a timeout of `ticks` clock ticks for the waiting thread
    fn arm(&self, _thread: ThreadId, _ticks: u64) {}

    /// Cancel a previously armed timeout
    fn cancel(&self, _thread: ThreadId) {}
}

/// Hooks that ignore every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl SchedulerHooks for NoHooks {}

impl TimeoutService for NoHooks {}

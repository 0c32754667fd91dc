//! # Queue Context
//!
//! Collaborators an algorithm needs while it holds a resource lock.

use alloc::sync::Arc;

use crate::error::TqResult;
use crate::hooks::{SchedulerHooks, TimeoutService};
use crate::thread::wait::{self, UnblockOutcome};
use crate::thread::{Thread, ThreadRegistry};
use crate::types::ThreadId;

/// Thread table and external collaborators
pub(crate) struct QueueContext<'a> {
    pub(crate) threads: &'a ThreadRegistry,
    pub(crate) hooks: &'a dyn SchedulerHooks,
    pub(crate) timeouts: &'a dyn TimeoutService,
}

impl<'a> QueueContext<'a> {
    pub(crate) fn new(
        threads: &'a ThreadRegistry,
        hooks: &'a dyn SchedulerHooks,
        timeouts: &'a dyn TimeoutService,
    ) -> Self {
        Self {
            threads,
            hooks,
            timeouts,
        }
    }

    /// Thread referenced by a queue or owner slot
    pub(crate) fn thread(&self, id: ThreadId) -> Arc<Thread> {
        self.threads.linked(id)
    }

    /// Arm the wait timeout of a thread that just got enqueued
    pub(crate) fn arm_timeout(&self, thread: &Thread, ticks: u64) {
        thread.wait_info().timeout_armed = true;
        self.timeouts.arm(thread.id(), ticks);
    }

    /// End the wait of a thread that left the queue
    ///
    /// Records `status`, cancels a pending timeout and hands the thread to
    /// the wait-state guard.
    pub(crate) fn release_waiter(&self, thread: &Thread, status: TqResult<()>) -> UnblockOutcome {
        let cancel = {
            let mut info = thread.wait_info();
            info.queue = None;
            info.status = status;
            core::mem::replace(&mut info.timeout_armed, false)
        };
        if cancel {
            self.timeouts.cancel(thread.id());
        }
        wait::unblock(thread, self.hooks)
    }
}

//! # Wait-State Guard
//!
//! Hand-over between a thread that blocks on a resource and the thread that
//! makes it ready again.
//!
//! A waiter is enqueued with `INTEND_TO_BLOCK` while the resource lock is
//! held, then releases the lock and commits to block. Between the two steps
//! another processor (or an interrupt) may surrender the resource to it. The
//! unblocking side then only flips the flags to `READY_AGAIN`; the blocking
//! side observes this in [`commit_block`] and does not park. Exactly one
//! side makes the thread ready, so the unblock is neither lost nor delivered
//! twice.

use super::states::{ThreadState, WaitFlags, WaitState};
use super::thread::Thread;
use crate::error::TqResult;
use crate::hooks::SchedulerHooks;

/// Result of [`unblock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnblockOutcome {
    /// The thread was parked and is ready again
    Unblocked,
    /// The thread had not parked yet; it will skip parking
    Deferred,
    /// The wait ended but the thread stays suspended
    StillSuspended,
}

/// Result of [`commit_block`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The thread is parked until unblocked
    Parked,
    /// The wait was satisfied before parking
    Satisfied,
}

/// Enter the intend-to-block state
///
/// Called with the resource lock held, right before the thread is enqueued.
pub(crate) fn prepare_to_block(thread: &Thread) {
    thread.set_wait_flags(WaitFlags::OBJECT_INTEND_TO_BLOCK);
}

/// Complete a blocking operation
///
/// Called by the blocking thread after the resource lock was released. The
/// state bit is set and the scheduler notified before the flags change, so a
/// racing [`unblock`] that sees `BLOCKED` always finds the state bit to
/// clear.
pub(crate) fn commit_block(thread: &Thread, hooks: &dyn SchedulerHooks) -> BlockOutcome {
    if thread.wait_flags() != WaitFlags::OBJECT_INTEND_TO_BLOCK {
        log::trace!("ThreadQueue: {} ready again before blocking", thread.id());
        return BlockOutcome::Satisfied;
    }

    thread.set_state(ThreadState::WAITING_FOR_OBJECT);
    hooks.block(thread.id());

    if thread.try_change_wait_flags(WaitFlags::OBJECT_INTEND_TO_BLOCK, WaitFlags::OBJECT_BLOCKED) {
        return BlockOutcome::Parked;
    }

    // Surrendered to in the window between the check and the exchange
    let state = thread.clear_state(ThreadState::WAITING_FOR_OBJECT);
    if state.is_ready() {
        hooks.unblock(thread.id(), thread.home());
    }
    BlockOutcome::Satisfied
}

/// Wait without parking until the wait ends
///
/// Used by waiters that stay eligible on their processor. The thread keeps
/// spinning while its flags still describe a pending resource wait.
pub(crate) fn spin_until_ready(thread: &Thread) -> BlockOutcome {
    loop {
        let flags = thread.wait_flags();
        if !flags.is_object_wait() || flags.wait_state() == WaitState::ReadyAgain {
            return BlockOutcome::Satisfied;
        }
        core::hint::spin_loop();
    }
}

/// End the wait of a dequeued thread
///
/// Called with the resource lock held after the thread left the queue and
/// its wait status was recorded.
pub(crate) fn unblock(thread: &Thread, hooks: &dyn SchedulerHooks) -> UnblockOutcome {
    if thread.try_change_wait_flags(
        WaitFlags::OBJECT_INTEND_TO_BLOCK,
        WaitFlags::OBJECT_READY_AGAIN,
    ) {
        if thread.is_suspended() {
            log::trace!("ThreadQueue: {} ready again but suspended", thread.id());
            return UnblockOutcome::StillSuspended;
        }
        log::trace!("ThreadQueue: deferred unblock of {}", thread.id());
        return UnblockOutcome::Deferred;
    }

    let flags = thread.wait_flags();
    if flags != WaitFlags::OBJECT_BLOCKED {
        log::error!(
            "ThreadQueue: dequeued {} in wait state {:?}",
            thread.id(),
            flags.wait_state()
        );
        panic!("thread queue consistency fault: dequeued thread not waiting");
    }

    thread.set_wait_flags(WaitFlags::OBJECT_READY_AGAIN);
    let state = thread.clear_state(ThreadState::WAITING_FOR_OBJECT);
    if state.is_ready() {
        hooks.unblock(thread.id(), thread.home());
        UnblockOutcome::Unblocked
    } else {
        log::trace!("ThreadQueue: {} stays suspended", thread.id());
        UnblockOutcome::StillSuspended
    }
}

/// Collect the wait status once the thread runs again
///
/// Returns `None` while the thread is still waiting.
pub(crate) fn finish_wait(thread: &Thread) -> Option<TqResult<()>> {
    match thread.wait_flags() {
        flags if flags == WaitFlags::OBJECT_READY_AGAIN => {
            let status = {
                let mut wait = thread.wait_info();
                let status = wait.status;
                wait.status = Ok(());
                status
            };
            thread.set_wait_flags(WaitFlags::empty());
            Some(status)
        },
        flags if flags.is_empty() => Some(Ok(())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TqError;
    use crate::hooks::NoHooks;
    use crate::testing::{core, spawn, Event, Recorder};
    use crate::thread::ThreadAttributes;
    use crate::threadq::{LockingProtocol, MutexAttributes, WaitTimeout};
    use crate::types::{Priority, SchedulerId, ThreadId};

    fn thread() -> Thread {
        Thread::new(
            ThreadId::new(0),
            ThreadAttributes::new(SchedulerId::new(0), Priority::new(10)),
        )
    }

    #[test]
    fn test_block_then_unblock() {
        let recorder = Recorder::new();
        let t = thread();

        prepare_to_block(&t);
        assert_eq!(commit_block(&t, &*recorder), BlockOutcome::Parked);
        assert!(t.state().contains(ThreadState::WAITING_FOR_OBJECT));

        assert_eq!(unblock(&t, &*recorder), UnblockOutcome::Unblocked);
        assert!(t.state().is_ready());
        assert_eq!(
            recorder.take(),
            alloc::vec![Event::Block(t.id()), Event::Unblock(t.id())]
        );
        assert_eq!(finish_wait(&t), Some(Ok(())));
        assert_eq!(t.wait_flags(), WaitFlags::empty());
    }

    #[test]
    fn test_unblock_before_park_is_deferred() {
        let recorder = Recorder::new();
        let t = thread();

        prepare_to_block(&t);
        assert_eq!(unblock(&t, &*recorder), UnblockOutcome::Deferred);
        assert!(recorder.take().is_empty());

        assert_eq!(commit_block(&t, &*recorder), BlockOutcome::Satisfied);
        assert!(recorder.take().is_empty());
        assert!(t.state().is_ready());
        assert_eq!(finish_wait(&t), Some(Ok(())));
    }

    #[test]
    fn test_unblock_suspended_thread() {
        let recorder = Recorder::new();
        let t = thread();

        prepare_to_block(&t);
        commit_block(&t, &*recorder);
        t.set_state(ThreadState::SUSPENDED);
        recorder.take();

        assert_eq!(unblock(&t, &*recorder), UnblockOutcome::StillSuspended);
        assert!(recorder.take().is_empty());
        assert_eq!(t.state(), ThreadState::SUSPENDED);
    }

    #[test]
    fn test_unblock_suspended_before_park() {
        let recorder = Recorder::new();
        let t = thread();

        prepare_to_block(&t);
        t.set_state(ThreadState::SUSPENDED);
        assert_eq!(unblock(&t, &*recorder), UnblockOutcome::StillSuspended);

        assert_eq!(commit_block(&t, &*recorder), BlockOutcome::Satisfied);
        assert!(recorder.take().is_empty());
        assert_eq!(t.state(), ThreadState::SUSPENDED);
        assert_eq!(finish_wait(&t), Some(Ok(())));
    }

    #[test]
    fn test_spin_until_ready() {
        let t = thread();
        assert_eq!(spin_until_ready(&t), BlockOutcome::Satisfied);

        prepare_to_block(&t);
        let outcome = std::thread::scope(|s| {
            let waiter = s.spawn(|| spin_until_ready(&t));
            assert_eq!(unblock(&t, &NoHooks), UnblockOutcome::Deferred);
            waiter.join().unwrap()
        });
        assert_eq!(outcome, BlockOutcome::Satisfied);
        assert_eq!(t.state(), ThreadState::empty());
    }

    #[test]
    fn test_concurrent_commit_and_surrender() {
        for _ in 0..500 {
            let (core, recorder) = core();
            let owner = spawn(&core, 0, 10);
            let waiter = spawn(&core, 0, 5);
            let m = core
                .create_mutex(MutexAttributes::new(LockingProtocol::None))
                .unwrap();
            core.seize(m, owner, WaitTimeout::Forever).unwrap();
            core.seize(m, waiter, WaitTimeout::Forever).unwrap();

            let (blocked, released) = std::thread::scope(|s| {
                let blocker = s.spawn(|| core.commit_block(waiter).unwrap());
                let released = core.surrender(m, owner).unwrap();
                (blocker.join().unwrap(), released)
            });

            let events = recorder.take();
            let blocks = events.iter().filter(|e| **e == Event::Block(waiter)).count();
            let unblocks = events.iter().filter(|e| **e == Event::Unblock(waiter)).count();
            assert_eq!(blocks, unblocks);
            assert!(blocks <= 1);

            match blocked {
                BlockOutcome::Parked => {
                    assert_eq!(released.unblock, Some(UnblockOutcome::Unblocked))
                },
                BlockOutcome::Satisfied => {
                    assert_eq!(released.unblock, Some(UnblockOutcome::Deferred))
                },
            }
            assert!(core.thread_state(waiter).unwrap().is_ready());
            assert_eq!(core.finish_wait(waiter), Ok(()));
            assert_eq!(core.owner(m), Ok(Some(waiter)));
        }
    }

    #[test]
    fn test_finish_wait_reports_status() {
        let recorder = Recorder::new();
        let t = thread();

        prepare_to_block(&t);
        commit_block(&t, &*recorder);
        assert_eq!(finish_wait(&t), None);

        t.wait_info().status = Err(TqError::Timeout);
        unblock(&t, &*recorder);
        assert_eq!(finish_wait(&t), Some(Err(TqError::Timeout)));
        assert_eq!(t.wait_info().status, Ok(()));
    }
}

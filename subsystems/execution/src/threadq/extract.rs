//! # Extract and Flush
//!
//! Removal of waiters by a path other than surrender: timeouts, explicit
//! cancellation and resource deletion. Like surrender these run under the
//! resource lock, so a waiter is handed out by exactly one of them.

use alloc::sync::Arc;

use super::boost::boost_owner;
use super::context::QueueContext;
use super::resource::ResourceState;
use crate::error::TqResult;
use crate::thread::{Thread, UnblockOutcome};
use crate::types::ResourceId;

/// Remove `thread` from the queue and end its wait with `status`
///
/// Returns `None` if the thread is no longer queued here. Otherwise returns
/// how the thread was made ready and the owner if its grants changed.
pub(crate) fn extract(
    ctx: &QueueContext<'_>,
    source: ResourceId,
    state: &mut ResourceState,
    thread: &Thread,
    status: TqResult<()>,
) -> Option<(UnblockOutcome, Option<Arc<Thread>>)> {
    if !state.queue.remove(thread.id()) {
        return None;
    }

    log::debug!("ThreadQueue: {} extracted from {} ({:?})", thread.id(), source, status);
    let owner = boost_owner(ctx, source, state);
    let unblock = ctx.release_waiter(thread, status);
    Some((unblock, owner))
}

/// Release every waiter with `status`
///
/// Returns the number of released waiters and the owner if its grants
/// changed.
pub(crate) fn flush(
    ctx: &QueueContext<'_>,
    source: ResourceId,
    state: &mut ResourceState,
    status: TqResult<()>,
) -> (usize, Option<Arc<Thread>>) {
    let mut released = 0;
    while let Some(next) = state.queue.dequeue_head() {
        ctx.release_waiter(&ctx.thread(next), status);
        released += 1;
    }

    if released > 0 {
        log::debug!("ThreadQueue: flushed {} waiters of {}", released, source);
    }
    (released, boost_owner(ctx, source, state))
}

#[cfg(test)]
mod tests {
    use crate::error::TqError;
    use crate::testing::{core, spawn, Event};
    use crate::thread::{BlockOutcome, ThreadState};
    use crate::threadq::{
        LockingProtocol, MutexAttributes, SemaphoreAttributes, SeizeOutcome, WaitTimeout,
    };
    use crate::types::{Priority, SchedulerId};
    use alloc::vec;

    const S0: SchedulerId = SchedulerId::new(0);

    #[test]
    fn test_timeout_extracts_waiter() {
        let (core, recorder) = core();
        let t1 = spawn(&core, 0, 10);
        let t2 = spawn(&core, 0, 4);
        let t3 = spawn(&core, 0, 6);
        let m = core
            .create_mutex(MutexAttributes::new(LockingProtocol::Inherit))
            .unwrap();

        core.seize(m, t1, WaitTimeout::Forever).unwrap();
        core.seize(m, t2, WaitTimeout::Ticks(5)).unwrap();
        core.commit_block(t2).unwrap();
        core.seize(m, t3, WaitTimeout::Forever).unwrap();
        core.commit_block(t3).unwrap();
        assert_eq!(core.current_priority(t1, S0), Ok(Priority::new(4)));
        recorder.take();

        assert_eq!(core.timeout(t2), Ok(true));
        assert_eq!(core.finish_wait(t2), Err(TqError::Timeout));
        assert_eq!(core.waiters(m), Ok(vec![t3]));
        assert_eq!(core.current_priority(t1, S0), Ok(Priority::new(6)));
        assert!(recorder.saw(Event::Unblock(t2)));
        assert!(!recorder.saw(Event::Cancel(t2)));
    }

    #[test]
    fn test_extract_cancels_timeout() {
        let (core, recorder) = core();
        let t1 = spawn(&core, 0, 10);
        let s = core.create_semaphore(SemaphoreAttributes::new(0, 1)).unwrap();

        core.seize(s, t1, WaitTimeout::Ticks(9)).unwrap();
        assert_eq!(core.extract(t1, TqError::ObjectDeleted), Ok(true));
        assert!(recorder.saw(Event::Cancel(t1)));
        assert_eq!(core.extract(t1, TqError::ObjectDeleted), Ok(false));

        assert_eq!(core.commit_block(t1), Ok(BlockOutcome::Satisfied));
        assert_eq!(core.finish_wait(t1), Err(TqError::ObjectDeleted));
    }

    #[test]
    fn test_extract_unqueued_thread() {
        let (core, _) = core();
        let t1 = spawn(&core, 0, 10);
        assert_eq!(core.extract(t1, TqError::Timeout), Ok(false));
        assert_eq!(core.thread_state(t1), Ok(ThreadState::empty()));
    }

    #[test]
    fn test_flush_releases_all() {
        let (core, recorder) = core();
        let t1 = spawn(&core, 0, 10);
        let t2 = spawn(&core, 0, 3);
        let t3 = spawn(&core, 0, 5);
        let m = core
            .create_mutex(MutexAttributes::new(LockingProtocol::Inherit))
            .unwrap();

        core.seize(m, t1, WaitTimeout::Forever).unwrap();
        for t in [t2, t3] {
            assert_eq!(core.seize(m, t, WaitTimeout::Forever), Ok(SeizeOutcome::Enqueued));
            core.commit_block(t).unwrap();
        }
        recorder.take();

        assert_eq!(core.flush(m, TqError::ObjectDeleted), Ok(2));
        assert_eq!(recorder.unblocked(), vec![t2, t3]);
        assert_eq!(core.owner(m), Ok(Some(t1)));
        assert_eq!(core.current_priority(t1, S0), Ok(Priority::new(10)));
        assert_eq!(core.finish_wait(t3), Err(TqError::ObjectDeleted));
    }

    #[test]
    fn test_flush_keeps_ceiling() {
        let (core, _) = core();
        let t1 = spawn(&core, 0, 10);
        let t2 = spawn(&core, 0, 12);
        let m = core
            .create_mutex(
                MutexAttributes::new(LockingProtocol::Mrsp).with_ceiling(S0, Priority::new(2)),
            )
            .unwrap();

        core.seize(m, t1, WaitTimeout::Forever).unwrap();
        core.seize(m, t2, WaitTimeout::Forever).unwrap();
        assert_eq!(core.flush(m, TqError::ObjectDeleted), Ok(1));
        assert_eq!(core.current_priority(t1, S0), Ok(Priority::new(2)));
        assert_eq!(core.is_ready_again(t2), Ok(true));
    }
}

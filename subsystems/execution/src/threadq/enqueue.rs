//! # Seize and Enqueue
//!
//! The waiter side of a resource: obtain it immediately, or enter the wait
//! queue in the intend-to-block state and boost the owner.

use alloc::sync::Arc;

use super::boost::{boost_owner, desired_grants, reconcile_owner, waiter_priorities};
use super::context::QueueContext;
use super::resource::{MutexState, ResourceState, Variant};
use crate::error::{TqError, TqResult};
use crate::thread::wait;
use crate::thread::Thread;
use crate::types::ResourceId;

/// How long a seize may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeout {
    /// Fail with `Unavailable` instead of waiting
    NoWait,
    /// Wait until surrendered, flushed or extracted
    Forever,
    /// Wait at most this many clock ticks
    Ticks(u64),
}

/// Result of a successful seize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeizeOutcome {
    /// The caller obtained the resource
    Acquired,
    /// The caller is queued and must commit to block
    Enqueued,
}

/// Check the ceiling of a Ceiling or MrsP mutex against the caller
pub(crate) fn check_ceiling(mutex: &MutexState, thread: &Thread) -> TqResult<()> {
    if !mutex.protocol.has_ceiling() {
        return Ok(());
    }
    let ceiling = mutex.ceiling(thread.home()).ok_or(TqError::NotDefined)?;
    if thread.current_priority().is_higher_than(ceiling) {
        return Err(TqError::CeilingViolated);
    }
    Ok(())
}

/// Obtain the resource without waiting
///
/// Returns `None` if the caller has to wait.
pub(crate) fn try_acquire(
    ctx: &QueueContext<'_>,
    source: ResourceId,
    state: &mut ResourceState,
    thread: &Thread,
) -> Option<TqResult<SeizeOutcome>> {
    let ResourceState { queue, variant, .. } = state;

    match variant {
        Variant::Semaphore(sem) => {
            if sem.count == 0 {
                return None;
            }
            sem.count -= 1;
            Some(Ok(SeizeOutcome::Acquired))
        },
        Variant::Mutex(mutex) => match mutex.owner {
            None => {
                if let Err(error) = check_ceiling(mutex, thread) {
                    return Some(Err(error));
                }
                mutex.owner = Some(thread.id());
                mutex.nest_count = 1;
                if mutex.protocol.has_ceiling() {
                    let desired = desired_grants(mutex, queue, thread.home());
                    reconcile_owner(ctx, thread, source, &desired);
                }
                Some(Ok(SeizeOutcome::Acquired))
            },
            Some(owner) if owner == thread.id() => {
                if !mutex.recursive {
                    return Some(Err(TqError::NestingNotAllowed));
                }
                mutex.nest_count += 1;
                Some(Ok(SeizeOutcome::Acquired))
            },
            Some(_) => None,
        },
    }
}

/// Queue `thread` on the resource
///
/// The thread enters the intend-to-block state; it parks later through
/// [`wait::commit_block`]. Returns the owner if its grants changed.
pub(crate) fn enqueue(
    ctx: &QueueContext<'_>,
    source: ResourceId,
    state: &mut ResourceState,
    thread: &Thread,
    timeout: WaitTimeout,
) -> Option<Arc<Thread>> {
    wait::prepare_to_block(thread);
    {
        let mut info = thread.wait_info();
        info.queue = Some(source);
        info.status = Ok(());
    }

    let (key, demands) = waiter_priorities(thread, state);
    state.queue.enqueue(thread.id(), key, demands);
    log::trace!("ThreadQueue: {} waits on {} at {}", thread.id(), source, key);

    if let WaitTimeout::Ticks(ticks) = timeout {
        ctx.arm_timeout(thread, ticks);
    }

    boost_owner(ctx, source, state)
}

//! # Surrender
//!
//! Release of a resource by its holder.
//!
//! A mutex surrender first checks the owner and the nest count. The
//! outermost release revokes every grant the mutex gave to the previous
//! owner, dequeues the head of the wait queue, makes it the new owner,
//! grants it what the remaining waiters and the ceiling require, and hands
//! it to the wait-state guard. A semaphore surrender either passes the
//! release to the head waiter or increments the count.
//!
//! Dequeue always takes the queue head. Ordering is decided at enqueue
//! time.

use alloc::sync::Arc;
use alloc::vec::Vec;

use super::boost::{desired_grants, reconcile_owner};
use super::context::QueueContext;
use super::queue::WaitQueue;
use super::resource::{MutexState, ResourceState, SemaphoreState, Variant};
use crate::error::{TqError, TqResult};
use crate::thread::{Thread, UnblockOutcome};
use crate::types::{ResourceId, SchedulerId, ThreadId};

/// Effect of a surrender on the priority of a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityEffect {
    /// Observable priority unchanged
    #[default]
    Nop,
    /// The previous owner fell back to a worse priority
    Drop,
    /// The new owner was raised
    Raise,
}

/// What a successful surrender did
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SurrenderOutcome {
    /// Only the nest count was decremented
    pub nested: bool,
    /// Thread taken from the queue
    pub dequeued: Option<ThreadId>,
    /// How the dequeued thread was made ready
    pub unblock: Option<UnblockOutcome>,
    /// Priority effect on the previous owner
    pub previous_priority: PriorityEffect,
    /// Priority effect on the new owner
    pub new_priority: PriorityEffect,
    /// Helping schedulers the previous owner lost
    pub helpers_removed: Vec<SchedulerId>,
    /// Helping schedulers the new owner gained
    pub helpers_added: Vec<SchedulerId>,
}

impl SurrenderOutcome {
    /// The dequeued thread was made ready immediately
    pub fn is_unblocked(&self) -> bool {
        self.unblock == Some(UnblockOutcome::Unblocked)
    }
}

/// Surrender the resource on behalf of `caller`
///
/// Returns the outcome and the previous owner if its priorities changed
/// while it waits on another resource.
pub(crate) fn surrender(
    ctx: &QueueContext<'_>,
    source: ResourceId,
    state: &mut ResourceState,
    caller: ThreadId,
) -> TqResult<(SurrenderOutcome, Option<Arc<Thread>>)> {
    let ResourceState { queue, variant, .. } = state;

    match variant {
        Variant::Mutex(mutex) => surrender_mutex(ctx, source, queue, mutex, caller),
        Variant::Semaphore(sem) => surrender_semaphore(ctx, source, queue, sem).map(|o| (o, None)),
    }
}

fn surrender_mutex(
    ctx: &QueueContext<'_>,
    source: ResourceId,
    queue: &mut WaitQueue,
    mutex: &mut MutexState,
    caller: ThreadId,
) -> TqResult<(SurrenderOutcome, Option<Arc<Thread>>)> {
    let previous = match mutex.owner {
        Some(owner) if owner == caller || !mutex.owner_check => owner,
        _ => {
            log::warn!("Surrender: {} does not own {}", caller, source);
            return Err(TqError::NotOwner);
        },
    };

    let mut outcome = SurrenderOutcome::default();

    if mutex.nest_count > 1 {
        mutex.nest_count -= 1;
        outcome.nested = true;
        return Ok((outcome, None));
    }

    let previous_thread = ctx.thread(previous);
    let dropped = reconcile_owner(ctx, &previous_thread, source, &[]);
    if dropped.changes_priority() {
        outcome.previous_priority = PriorityEffect::Drop;
    }
    outcome.helpers_removed = dropped.helpers.removed.clone();

    match queue.dequeue_head() {
        None => {
            mutex.owner = None;
            mutex.nest_count = 0;
            log::debug!("Surrender: {} released by {}", source, previous);
        },
        Some(next) => {
            mutex.owner = Some(next);
            mutex.nest_count = 1;

            let next_thread = ctx.thread(next);
            let desired = desired_grants(mutex, queue, next_thread.home());
            let raised = reconcile_owner(ctx, &next_thread, source, &desired);
            if raised.changes_priority() {
                outcome.new_priority = PriorityEffect::Raise;
            }
            outcome.helpers_added = raised.helpers.added;
            outcome.dequeued = Some(next);
            outcome.unblock = Some(ctx.release_waiter(&next_thread, Ok(())));

            log::debug!(
                "Surrender: {} passed from {} to {} ({:?})",
                source,
                previous,
                next,
                outcome.unblock
            );
        },
    }

    let propagate = (dropped.is_changed() && previous_thread.waiting_on().is_some())
        .then_some(previous_thread);
    Ok((outcome, propagate))
}

fn surrender_semaphore(
    ctx: &QueueContext<'_>,
    source: ResourceId,
    queue: &mut WaitQueue,
    sem: &mut SemaphoreState,
) -> TqResult<SurrenderOutcome> {
    let mut outcome = SurrenderOutcome::default();

    match queue.dequeue_head() {
        Some(next) => {
            let thread = ctx.thread(next);
            outcome.dequeued = Some(next);
            outcome.unblock = Some(ctx.release_waiter(&thread, Ok(())));
            log::debug!("Surrender: {} passed to {}", source, next);
        },
        None if sem.count >= sem.max_count => {
            log::warn!("Surrender: {} already at maximum count {}", source, sem.max_count);
            return Err(TqError::MaxCountExceeded);
        },
        None => sem.count += 1,
    }

    Ok(outcome)
}

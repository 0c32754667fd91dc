//! # Priority Boosting
//!
//! Grants a mutex owner receives from the resource: the ceiling of the
//! Ceiling and MrsP protocols, and the best demand of the waiters for the
//! Inherit and MrsP protocols.

use alloc::sync::Arc;
use alloc::vec::Vec;

use super::context::QueueContext;
use super::queue::WaitQueue;
use super::resource::{LockingProtocol, MutexState, ResourceState};
use crate::priority::PriorityChange;
use crate::thread::{HelperChanges, Thread};
use crate::types::{Priority, ResourceId, SchedulerId, ThreadId};

/// Ledger and helper changes of one owner reconciliation
#[derive(Debug, Clone, Default)]
pub(crate) struct GrantUpdate {
    pub(crate) changes: Vec<PriorityChange>,
    pub(crate) helpers: HelperChanges,
}

impl GrantUpdate {
    /// Anything observable changed
    pub(crate) fn is_changed(&self) -> bool {
        !self.changes.is_empty() || !self.helpers.added.is_empty() || !self.helpers.removed.is_empty()
    }

    /// The priority changed on a scheduler the thread stays eligible on
    pub(crate) fn changes_priority(&self) -> bool {
        self.changes.iter().any(PriorityChange::is_priority_update)
    }

    fn notify(&self, ctx: &QueueContext<'_>, thread: ThreadId) {
        for &scheduler in &self.helpers.removed {
            log::trace!("ThreadQueue: {} no longer helped by {}", thread, scheduler);
            ctx.hooks.helper_removed(thread, scheduler);
        }
        for &scheduler in &self.helpers.added {
            log::trace!("ThreadQueue: {} helped by {}", thread, scheduler);
            ctx.hooks.helper_added(thread, scheduler);
        }
        for change in &self.changes {
            if let Some(priority) = change.after {
                ctx.hooks.priority_changed(thread, change.scheduler, priority);
            }
        }
    }
}

/// Ordering key and per-scheduler demands of a thread about to be queued
/// on (or already queued on) the resource
pub(crate) fn waiter_priorities(
    thread: &Thread,
    state: &ResourceState,
) -> (Priority, Vec<(SchedulerId, Priority)>) {
    let home = thread.home();
    let (key, mut demands) = {
        let scheduling = thread.scheduling();
        let key = scheduling
            .ledger
            .effective(home)
            .unwrap_or(scheduling.ledger.real_priority());
        (key, scheduling.eligible_priorities())
    };

    if !cfg!(feature = "smp") {
        demands.retain(|(s, _)| *s == home);
    }

    // MrsP waiters ask for at least the ceiling of their scheduler
    if let Some(mutex) = state.mutex().filter(|m| m.protocol == LockingProtocol::Mrsp) {
        for (scheduler, priority) in demands.iter_mut() {
            if let Some(ceiling) = mutex.ceiling(*scheduler) {
                *priority = (*priority).min(ceiling);
            }
        }
    }

    (key, demands)
}

/// Grants the owner of `mutex` should hold, given its home scheduler
pub(crate) fn desired_grants(
    mutex: &MutexState,
    queue: &WaitQueue,
    home: SchedulerId,
) -> Vec<(SchedulerId, Priority)> {
    let mut desired = Vec::new();

    if mutex.protocol.has_ceiling() {
        if let Some(ceiling) = mutex.ceiling(home) {
            desired.push((home, ceiling));
        }
    }

    if mutex.protocol.inherits() {
        desired.extend(
            queue
                .demand()
                .into_iter()
                .filter(|(s, _)| cfg!(feature = "smp") || *s == home),
        );
    }

    desired
}

/// Replace the grants `source` gives to `owner` by `desired`
///
/// Reconciles the helping schedulers, publishes the new home priority and
/// notifies the scheduler. The scheduler is notified before the scheduling
/// state is unlocked, so it sees the changes of one thread in ledger order.
pub(crate) fn reconcile_owner(
    ctx: &QueueContext<'_>,
    owner: &Thread,
    source: ResourceId,
    desired: &[(SchedulerId, Priority)],
) -> GrantUpdate {
    let mut scheduling = owner.scheduling();
    let changes = scheduling.ledger.reconcile(source, desired);
    let helpers = if cfg!(feature = "smp") {
        scheduling.reconcile_helpers()
    } else {
        HelperChanges::default()
    };
    owner.publish_priority(&scheduling);

    let update = GrantUpdate { changes, helpers };
    update.notify(ctx, owner.id());
    update
}

/// Check if `waiter` changes what the queue head is granted once the
/// resource is surrendered to it
///
/// The head receives the ceiling and the demands of the waiters behind it;
/// `waiter` is vital if leaving its demands out changes an effective
/// priority of the head.
pub(crate) fn is_vital_waiter(
    source: ResourceId,
    state: &ResourceState,
    head: &Thread,
    waiter: ThreadId,
) -> bool {
    let Some(mutex) = state.mutex() else {
        return false;
    };

    let mut rest = state.queue.clone();
    rest.remove(head.id());
    let with = desired_grants(mutex, &rest, head.home());
    rest.remove(waiter);
    let without = desired_grants(mutex, &rest, head.home());

    let ledger = head.scheduling().ledger.clone();
    let mut granted = ledger.clone();
    granted.reconcile(source, &with);
    let mut withheld = ledger;
    withheld.reconcile(source, &without);

    with.iter()
        .any(|&(scheduler, _)| granted.effective(scheduler) != withheld.effective(scheduler))
}

/// Bring the grants of an inheriting owner in line with the queue
///
/// Returns the owner if its priorities changed, so the caller can continue
/// along the owner chain once the resource lock is released.
pub(crate) fn boost_owner(
    ctx: &QueueContext<'_>,
    source: ResourceId,
    state: &ResourceState,
) -> Option<Arc<Thread>> {
    let owner = ctx.thread(state.inheriting_owner()?);
    let desired = desired_grants(state.mutex()?, &state.queue, owner.home());
    let update = reconcile_owner(ctx, &owner, source, &desired);
    update.is_changed().then_some(owner)
}

/// Refresh the queue entry of `thread` after its priority changed
///
/// Repositions the thread and boosts the owner.
pub(crate) fn update_waiter(
    ctx: &QueueContext<'_>,
    source: ResourceId,
    state: &mut ResourceState,
    thread: &Thread,
) -> Option<Arc<Thread>> {
    let (key, demands) = waiter_priorities(thread, state);
    if !state.queue.update(thread.id(), key, demands) {
        return None;
    }
    boost_owner(ctx, source, state)
}

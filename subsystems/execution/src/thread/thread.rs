//! # Thread Control Block
//!
//! The part of a thread control block the thread-queue core works with:
//! identity, home scheduler, priority grants and helpers, wait flags and
//! wait information.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use spin::{Mutex, MutexGuard};

use super::states::{ThreadState, WaitFlags};
use crate::error::TqResult;
use crate::hooks::SchedulerHooks;
use crate::priority::{HelperRegistry, PriorityChange, PriorityLedger};
use crate::types::{Priority, ResourceId, SchedulerId, ThreadId};

// =============================================================================
// Attributes
// =============================================================================

/// Thread creation attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAttributes {
    /// Home scheduler
    pub home: SchedulerId,
    /// Real priority on the home scheduler
    pub priority: Priority,
}

impl ThreadAttributes {
    /// Create thread attributes
    pub const fn new(home: SchedulerId, priority: Priority) -> Self {
        Self { home, priority }
    }
}

// =============================================================================
// Scheduling State
// =============================================================================

/// Priority grants and helping schedulers of a thread
#[derive(Debug, Clone)]
pub struct SchedulingState {
    /// Priority grants
    pub ledger: PriorityLedger,
    /// Helping schedulers
    pub helpers: HelperRegistry,
}

/// Helping schedulers gained and lost by a reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperChanges {
    /// Helpers added
    pub added: Vec<SchedulerId>,
    /// Helpers removed
    pub removed: Vec<SchedulerId>,
}

impl SchedulingState {
    fn new(home: SchedulerId, priority: Priority) -> Self {
        Self {
            ledger: PriorityLedger::new(home, priority),
            helpers: HelperRegistry::new(),
        }
    }

    /// Check if the thread may execute on `scheduler`
    pub fn is_eligible(&self, scheduler: SchedulerId) -> bool {
        scheduler == self.ledger.home() || self.helpers.is_helping(scheduler)
    }

    /// Eligible schedulers, home first
    pub fn eligible(&self) -> Vec<SchedulerId> {
        let mut schedulers = Vec::with_capacity(1 + self.helpers.len());
        schedulers.push(self.ledger.home());
        schedulers.extend(self.helpers.iter());
        schedulers
    }

    /// Effective priority on every eligible scheduler, home first
    pub fn eligible_priorities(&self) -> Vec<(SchedulerId, Priority)> {
        self.eligible()
            .into_iter()
            .filter_map(|s| self.ledger.effective(s).map(|p| (s, p)))
            .collect()
    }

    /// Effective priority on `scheduler` if the thread is eligible there
    pub fn priority_on(&self, scheduler: SchedulerId) -> Option<Priority> {
        if self.is_eligible(scheduler) {
            self.ledger.effective(scheduler)
        } else {
            None
        }
    }

    /// Bring the helpers in line with the foreign grants of the ledger
    pub fn reconcile_helpers(&mut self) -> HelperChanges {
        let mut changes = HelperChanges::default();

        let current: Vec<SchedulerId> = self.helpers.iter().collect();
        for scheduler in current {
            if self.helpers.remove_helper(scheduler, &self.ledger) {
                changes.removed.push(scheduler);
            }
        }
        for scheduler in self.ledger.foreign_schedulers() {
            if self.helpers.add_helper(scheduler) {
                changes.added.push(scheduler);
            }
        }

        changes
    }
}

// =============================================================================
// Wait Information
// =============================================================================

/// What the thread waits for and how the wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitInfo {
    /// Resource whose queue holds the thread
    pub queue: Option<ResourceId>,
    /// Status handed back by `finish_wait`
    pub status: TqResult<()>,
    /// A timeout is armed for this wait
    pub timeout_armed: bool,
}

impl WaitInfo {
    const fn new() -> Self {
        Self {
            queue: None,
            status: Ok(()),
            timeout_armed: false,
        }
    }
}

// =============================================================================
// Thread
// =============================================================================

/// Thread control block
#[derive(Debug)]
pub struct Thread {
    id: ThreadId,
    home: SchedulerId,
    state: AtomicU32,
    wait_flags: AtomicU32,
    current_priority: AtomicU32,
    scheduling: Mutex<SchedulingState>,
    wait: Mutex<WaitInfo>,
}

impl Thread {
    pub(crate) fn new(id: ThreadId, attributes: ThreadAttributes) -> Self {
        Self {
            id,
            home: attributes.home,
            state: AtomicU32::new(ThreadState::empty().bits()),
            wait_flags: AtomicU32::new(WaitFlags::empty().bits()),
            current_priority: AtomicU32::new(attributes.priority.value()),
            scheduling: Mutex::new(SchedulingState::new(attributes.home, attributes.priority)),
            wait: Mutex::new(WaitInfo::new()),
        }
    }

    /// Thread identifier
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Home scheduler
    pub fn home(&self) -> SchedulerId {
        self.home
    }

    /// Effective priority on the home scheduler
    ///
    /// Lock-free; safe to read from any context.
    pub fn current_priority(&self) -> Priority {
        Priority::new(self.current_priority.load(Ordering::Acquire))
    }

    /// Wait flags
    pub fn wait_flags(&self) -> WaitFlags {
        WaitFlags::from_bits_retain(self.wait_flags.load(Ordering::Acquire))
    }

    pub(crate) fn set_wait_flags(&self, flags: WaitFlags) {
        self.wait_flags.store(flags.bits(), Ordering::Release);
    }

    /// Change the wait flags from `expected` to `desired`
    ///
    /// Acquire-release so that the winner of the race between the blocking
    /// thread and the unblocking thread sees the other side's queue updates.
    pub(crate) fn try_change_wait_flags(&self, expected: WaitFlags, desired: WaitFlags) -> bool {
        self.wait_flags
            .compare_exchange(
                expected.bits(),
                desired.bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Execution state
    pub fn state(&self) -> ThreadState {
        ThreadState::from_bits_retain(self.state.load(Ordering::Acquire))
    }

    /// Set state bits, returning the new state
    pub(crate) fn set_state(&self, bits: ThreadState) -> ThreadState {
        let previous = self.state.fetch_or(bits.bits(), Ordering::AcqRel);
        ThreadState::from_bits_retain(previous) | bits
    }

    /// Clear state bits, returning the new state
    pub(crate) fn clear_state(&self, bits: ThreadState) -> ThreadState {
        let previous = self.state.fetch_and(!bits.bits(), Ordering::AcqRel);
        ThreadState::from_bits_retain(previous).difference(bits)
    }

    /// Check if the thread is suspended
    pub fn is_suspended(&self) -> bool {
        self.state().contains(ThreadState::SUSPENDED)
    }

    /// Lock the scheduling state
    pub(crate) fn scheduling(&self) -> MutexGuard<'_, SchedulingState> {
        self.scheduling.lock()
    }

    /// Lock the wait information
    pub(crate) fn wait_info(&self) -> MutexGuard<'_, WaitInfo> {
        self.wait.lock()
    }

    /// Resource the thread is queued on
    pub fn waiting_on(&self) -> Option<ResourceId> {
        self.wait.lock().queue
    }

    /// Publish the home-scheduler effective priority
    pub(crate) fn publish_priority(&self, scheduling: &SchedulingState) {
        let priority = scheduling
            .ledger
            .effective(self.home)
            .unwrap_or(scheduling.ledger.real_priority());
        self.current_priority
            .store(priority.value(), Ordering::Release);
    }

    /// Change the real priority
    ///
    /// The scheduler learns about a new effective priority before the
    /// scheduling state is unlocked.
    pub(crate) fn set_real_priority(
        &self,
        priority: Priority,
        hooks: &dyn SchedulerHooks,
    ) -> PriorityChange {
        let mut scheduling = self.scheduling();
        let change = scheduling.ledger.set_real_priority(priority);
        self.publish_priority(&scheduling);
        if let Some(after) = change.after.filter(|_| change.is_priority_update()) {
            hooks.priority_changed(self.id, change.scheduler, after);
        }
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S0: SchedulerId = SchedulerId::new(0);
    const S1: SchedulerId = SchedulerId::new(1);
    const R0: ResourceId = ResourceId::new(0);

    fn thread() -> Thread {
        Thread::new(ThreadId::new(1), ThreadAttributes::new(S0, Priority::new(10)))
    }

    #[test]
    fn test_thread_creation() {
        let t = thread();
        assert_eq!(t.id(), ThreadId::new(1));
        assert_eq!(t.current_priority(), Priority::new(10));
        assert!(t.state().is_ready());
        assert_eq!(t.wait_flags(), WaitFlags::empty());
        assert_eq!(t.waiting_on(), None);
    }

    #[test]
    fn test_state_bits() {
        let t = thread();
        let state = t.set_state(ThreadState::SUSPENDED);
        assert!(t.is_suspended());
        assert_eq!(state, ThreadState::SUSPENDED);

        t.set_state(ThreadState::WAITING_FOR_OBJECT);
        let state = t.clear_state(ThreadState::WAITING_FOR_OBJECT);
        assert_eq!(state, ThreadState::SUSPENDED);
        assert!(t.clear_state(ThreadState::SUSPENDED).is_ready());
    }

    #[test]
    fn test_wait_flag_exchange() {
        let t = thread();
        t.set_wait_flags(WaitFlags::OBJECT_INTEND_TO_BLOCK);
        assert!(t.try_change_wait_flags(
            WaitFlags::OBJECT_INTEND_TO_BLOCK,
            WaitFlags::OBJECT_BLOCKED
        ));
        assert!(!t.try_change_wait_flags(
            WaitFlags::OBJECT_INTEND_TO_BLOCK,
            WaitFlags::OBJECT_READY_AGAIN
        ));
        assert_eq!(t.wait_flags(), WaitFlags::OBJECT_BLOCKED);
    }

    #[test]
    fn test_publish_priority() {
        let t = thread();
        {
            let mut scheduling = t.scheduling();
            scheduling.ledger.grant(R0, Priority::new(3), S0);
            t.publish_priority(&scheduling);
        }
        assert_eq!(t.current_priority(), Priority::new(3));

        let change = t.set_real_priority(Priority::new(1), &crate::hooks::NoHooks);
        assert!(change.is_changed());
        assert_eq!(t.current_priority(), Priority::new(1));
    }

    #[test]
    fn test_helper_reconciliation() {
        let t = thread();
        let mut scheduling = t.scheduling();
        scheduling.ledger.grant(R0, Priority::new(4), S1);

        let changes = scheduling.reconcile_helpers();
        assert_eq!(changes.added, alloc::vec![S1]);
        assert!(scheduling.is_eligible(S1));
        assert_eq!(scheduling.priority_on(S1), Some(Priority::new(4)));
        assert_eq!(
            scheduling.eligible_priorities(),
            alloc::vec![(S0, Priority::new(10)), (S1, Priority::new(4))]
        );

        scheduling.ledger.revoke(R0, S1);
        let changes = scheduling.reconcile_helpers();
        assert_eq!(changes.removed, alloc::vec![S1]);
        assert_eq!(scheduling.priority_on(S1), None);
    }
}

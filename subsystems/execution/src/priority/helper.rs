//! # Helping Schedulers
//!
//! Schedulers a thread may execute on in addition to its home scheduler,
//! because a grant on that scheduler makes it eligible there. Removing a
//! helper is refused while any grant still applies to its scheduler.

use alloc::vec::Vec;

use super::ledger::PriorityLedger;
use crate::types::{ResourceId, SchedulerId};

/// Per-thread set of helping schedulers
#[derive(Debug, Clone, Default)]
pub struct HelperRegistry {
    helpers: Vec<SchedulerId>,
}

impl HelperRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            helpers: Vec::new(),
        }
    }

    /// Make `scheduler` a helper
    ///
    /// Returns `false` if it already was one.
    pub fn add_helper(&mut self, scheduler: SchedulerId) -> bool {
        if self.helpers.contains(&scheduler) {
            return false;
        }
        self.helpers.push(scheduler);
        true
    }

    /// Remove `scheduler` unless a grant in `ledger` still requires it
    ///
    /// Returns `true` if the helper was removed.
    pub fn remove_helper(&mut self, scheduler: SchedulerId, ledger: &PriorityLedger) -> bool {
        if ledger.has_grant_on(scheduler) {
            return false;
        }
        match self.helpers.iter().position(|s| *s == scheduler) {
            Some(position) => {
                self.helpers.remove(position);
                true
            },
            None => false,
        }
    }

    /// Check if every grant on `scheduler` comes from `source`
    ///
    /// Dropping `source` would then remove the helper.
    pub fn is_last_reference(
        &self,
        ledger: &PriorityLedger,
        source: ResourceId,
        scheduler: SchedulerId,
    ) -> bool {
        self.is_helping(scheduler)
            && ledger
                .grants()
                .iter()
                .filter(|g| g.scheduler == scheduler)
                .all(|g| g.source == source)
    }

    /// Check if `scheduler` is a helper
    pub fn is_helping(&self, scheduler: SchedulerId) -> bool {
        self.helpers.contains(&scheduler)
    }

    /// Helpers in the order they were added
    pub fn iter(&self) -> impl Iterator<Item = SchedulerId> + '_ {
        self.helpers.iter().copied()
    }

    /// Number of helpers
    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    /// Check if there are no helpers
    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    const S0: SchedulerId = SchedulerId::new(0);
    const S1: SchedulerId = SchedulerId::new(1);
    const R0: ResourceId = ResourceId::new(0);
    const R1: ResourceId = ResourceId::new(1);

    #[test]
    fn test_add_helper_idempotent() {
        let mut helpers = HelperRegistry::new();
        assert!(helpers.add_helper(S1));
        assert!(!helpers.add_helper(S1));
        assert_eq!(helpers.len(), 1);
    }

    #[test]
    fn test_remove_helper_refused_while_granted() {
        let mut ledger = PriorityLedger::new(S0, Priority::new(10));
        let mut helpers = HelperRegistry::new();
        ledger.grant(R0, Priority::new(3), S1);
        helpers.add_helper(S1);

        assert!(!helpers.remove_helper(S1, &ledger));
        assert!(helpers.is_helping(S1));

        ledger.revoke(R0, S1);
        assert!(helpers.remove_helper(S1, &ledger));
        assert!(helpers.is_empty());
    }

    #[test]
    fn test_last_reference() {
        let mut ledger = PriorityLedger::new(S0, Priority::new(10));
        let mut helpers = HelperRegistry::new();
        ledger.grant(R0, Priority::new(3), S1);
        helpers.add_helper(S1);

        assert!(helpers.is_last_reference(&ledger, R0, S1));

        ledger.grant(R1, Priority::new(4), S1);
        assert!(!helpers.is_last_reference(&ledger, R0, S1));
    }
}

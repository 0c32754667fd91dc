//! # Priority Ledger
//!
//! Per-thread set of priority grants.
//!
//! A grant is held by a thread because it owns a resource: either waiters
//! of that resource demand a better priority (inheritance, MrsP) or the
//! resource has a ceiling. The effective priority of the thread on a
//! scheduler is the best of its real priority (home scheduler only) and all
//! grants for that scheduler.
//!
//! A ledger never holds two grants from the same resource for the same
//! scheduler.

use alloc::vec::Vec;

use crate::types::{Priority, ResourceId, SchedulerId};

// =============================================================================
// Grant
// =============================================================================

/// Priority granted to a thread through a resource it owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// Granted priority
    pub priority: Priority,
    /// Resource justifying the grant
    pub source: ResourceId,
    /// Scheduler the priority applies to
    pub scheduler: SchedulerId,
}

/// Effective priority of a thread on one scheduler before and after a ledger
/// update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityChange {
    /// Scheduler
    pub scheduler: SchedulerId,
    /// Effective priority before, `None` if the thread was not eligible
    pub before: Option<Priority>,
    /// Effective priority after, `None` if the thread is no longer eligible
    pub after: Option<Priority>,
}

impl PriorityChange {
    /// Check if the observable priority changed
    pub fn is_changed(&self) -> bool {
        self.before != self.after
    }

    /// Priority changed on a scheduler the thread stays eligible on
    pub fn is_priority_update(&self) -> bool {
        self.is_changed() && self.before.is_some() && self.after.is_some()
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Per-thread priority grant set
#[derive(Debug, Clone)]
pub struct PriorityLedger {
    home: SchedulerId,
    real: Priority,
    grants: Vec<Grant>,
}

impl PriorityLedger {
    /// Create a ledger with no grants
    pub fn new(home: SchedulerId, real: Priority) -> Self {
        Self {
            home,
            real,
            grants: Vec::new(),
        }
    }

    /// Home scheduler
    pub fn home(&self) -> SchedulerId {
        self.home
    }

    /// Real (unboosted) priority on the home scheduler
    pub fn real_priority(&self) -> Priority {
        self.real
    }

    /// Change the real priority
    pub fn set_real_priority(&mut self, priority: Priority) -> PriorityChange {
        let before = self.effective(self.home);
        self.real = priority;
        PriorityChange {
            scheduler: self.home,
            before,
            after: self.effective(self.home),
        }
    }

    /// All grants
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Grants justified by `source`
    pub fn grants_from(&self, source: ResourceId) -> impl Iterator<Item = &Grant> + '_ {
        self.grants.iter().filter(move |g| g.source == source)
    }

    /// Check if any grant applies to `scheduler`
    pub fn has_grant_on(&self, scheduler: SchedulerId) -> bool {
        self.grants.iter().any(|g| g.scheduler == scheduler)
    }

    /// Schedulers other than home that carry at least one grant
    pub fn foreign_schedulers(&self) -> Vec<SchedulerId> {
        let mut schedulers = Vec::new();
        for grant in &self.grants {
            if grant.scheduler != self.home && !schedulers.contains(&grant.scheduler) {
                schedulers.push(grant.scheduler);
            }
        }
        schedulers
    }

    /// Effective priority on `scheduler`
    ///
    /// `None` if neither the real priority nor any grant applies there.
    pub fn effective(&self, scheduler: SchedulerId) -> Option<Priority> {
        let base = (scheduler == self.home).then_some(self.real);
        self.grants
            .iter()
            .filter(|g| g.scheduler == scheduler)
            .map(|g| g.priority)
            .chain(base)
            .min()
    }

    fn effective_without(&self, scheduler: SchedulerId, source: ResourceId) -> Option<Priority> {
        let base = (scheduler == self.home).then_some(self.real);
        self.grants
            .iter()
            .filter(|g| g.scheduler == scheduler && g.source != source)
            .map(|g| g.priority)
            .chain(base)
            .min()
    }

    /// Add or replace the grant of `source` on `scheduler`
    pub fn grant(
        &mut self,
        source: ResourceId,
        priority: Priority,
        scheduler: SchedulerId,
    ) -> PriorityChange {
        let before = self.effective(scheduler);

        match self
            .grants
            .iter_mut()
            .find(|g| g.source == source && g.scheduler == scheduler)
        {
            Some(existing) => existing.priority = priority,
            None => self.grants.push(Grant {
                priority,
                source,
                scheduler,
            }),
        }

        log::trace!(
            "Ledger: grant {} from {} on {} (was {:?})",
            priority,
            source,
            scheduler,
            before
        );

        PriorityChange {
            scheduler,
            before,
            after: self.effective(scheduler),
        }
    }

    /// Remove the grant of `source` on `scheduler`
    ///
    /// Returns `None` if there was no such grant.
    pub fn revoke(&mut self, source: ResourceId, scheduler: SchedulerId) -> Option<PriorityChange> {
        let position = self
            .grants
            .iter()
            .position(|g| g.source == source && g.scheduler == scheduler)?;
        let before = self.effective(scheduler);
        let grant = self.grants.swap_remove(position);

        log::trace!(
            "Ledger: revoke {} from {} on {}",
            grant.priority,
            source,
            scheduler
        );

        Some(PriorityChange {
            scheduler,
            before,
            after: self.effective(scheduler),
        })
    }

    /// Replace all grants of `source` by `desired`
    ///
    /// `desired` lists one priority per scheduler; duplicates keep the best
    /// priority. Returns the schedulers whose effective priority changed.
    pub fn reconcile(
        &mut self,
        source: ResourceId,
        desired: &[(SchedulerId, Priority)],
    ) -> Vec<PriorityChange> {
        let mut touched: Vec<(SchedulerId, Option<Priority>)> = Vec::new();
        for scheduler in self
            .grants_from(source)
            .map(|g| g.scheduler)
            .chain(desired.iter().map(|(s, _)| *s))
        {
            if !touched.iter().any(|(s, _)| *s == scheduler) {
                touched.push((scheduler, self.effective(scheduler)));
            }
        }

        self.grants.retain(|g| g.source != source);
        for &(scheduler, priority) in desired {
            match self
                .grants
                .iter_mut()
                .find(|g| g.source == source && g.scheduler == scheduler)
            {
                Some(existing) => existing.priority = existing.priority.min(priority),
                None => self.grants.push(Grant {
                    priority,
                    source,
                    scheduler,
                }),
            }
        }

        touched
            .into_iter()
            .map(|(scheduler, before)| PriorityChange {
                scheduler,
                before,
                after: self.effective(scheduler),
            })
            .filter(PriorityChange::is_changed)
            .collect()
    }

    /// Check if dropping every grant of `source` leaves all effective
    /// priorities unchanged
    ///
    /// True when some other grant or the real priority already dominates on
    /// each scheduler `source` grants on.
    pub fn is_dispensable(&self, source: ResourceId) -> bool {
        self.grants_from(source).all(|g| {
            self.effective_without(g.scheduler, source) == self.effective(g.scheduler)
        })
    }

    /// Check if granting `priority` on `scheduler` would change the effective
    /// priority there
    pub fn is_vital(&self, priority: Priority, scheduler: SchedulerId) -> bool {
        match self.effective(scheduler) {
            Some(current) => priority.is_higher_than(current),
            None => true,
        }
    }
}

//! # Resources
//!
//! Mutexes and counting semaphores, their attributes and the resource table.
//!
//! Each resource owns its wait queue. Queue, owner, nest count and count are
//! only touched through a [`ResourceGuard`].

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use spin::{Mutex, MutexGuard, RwLock};

use super::queue::{Discipline, WaitQueue};
use crate::config::CoreConfig;
use crate::error::{TqError, TqResult};
use crate::types::{Priority, ResourceId, SchedulerId, ThreadId};

// =============================================================================
// Locking Protocols
// =============================================================================

/// Mutex locking protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockingProtocol {
    /// No priority adjustment
    None,
    /// Priority inheritance
    Inherit,
    /// Immediate priority ceiling
    Ceiling,
    /// Multiprocessor resource sharing protocol
    Mrsp,
}

impl LockingProtocol {
    /// Waiters must be queued in priority order
    pub const fn requires_priority_discipline(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Waiters boost the owner
    pub const fn inherits(self) -> bool {
        matches!(self, Self::Inherit | Self::Mrsp)
    }

    /// The owner runs at a ceiling priority
    pub const fn has_ceiling(self) -> bool {
        matches!(self, Self::Ceiling | Self::Mrsp)
    }

    /// Waiters stay eligible on their processor instead of parking
    pub const fn is_sticky(self) -> bool {
        matches!(self, Self::Mrsp)
    }

    /// Protocol name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Inherit => "inherit",
            Self::Ceiling => "ceiling",
            Self::Mrsp => "mrsp",
        }
    }
}

// =============================================================================
// Attributes
// =============================================================================

/// Resource variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Owner-based mutual exclusion
    Mutex,
    /// Counting semaphore without owner
    Semaphore,
}

/// Mutex creation attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutexAttributes {
    /// Locking protocol
    pub protocol: LockingProtocol,
    /// Queueing discipline
    pub discipline: Discipline,
    /// Recursive seize allowed
    pub recursive: bool,
    /// Only the owner may surrender
    pub owner_check: bool,
    /// Ceiling priority per scheduler
    pub ceilings: Vec<(SchedulerId, Priority)>,
}

impl MutexAttributes {
    /// Recursive, owner-checked mutex
    ///
    /// Priority protocols queue in priority order, the plain mutex in FIFO
    /// order.
    pub fn new(protocol: LockingProtocol) -> Self {
        let discipline = if protocol.requires_priority_discipline() {
            Discipline::Priority
        } else {
            Discipline::Fifo
        };
        Self {
            protocol,
            discipline,
            recursive: true,
            owner_check: true,
            ceilings: Vec::new(),
        }
    }

    /// Set the queueing discipline
    pub fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Allow or forbid recursive seize
    pub fn with_recursion(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Enable or disable the owner check on surrender
    pub fn with_owner_check(mut self, owner_check: bool) -> Self {
        self.owner_check = owner_check;
        self
    }

    /// Add a ceiling priority for `scheduler`
    pub fn with_ceiling(mut self, scheduler: SchedulerId, priority: Priority) -> Self {
        self.ceilings.push((scheduler, priority));
        self
    }

    /// Validate against the core configuration
    pub fn validate(&self, config: &CoreConfig) -> TqResult<()> {
        if self.protocol.requires_priority_discipline() && self.discipline != Discipline::Priority
        {
            return Err(TqError::InvalidAttributes);
        }

        for (i, &(scheduler, _)) in self.ceilings.iter().enumerate() {
            config.check_scheduler(scheduler)?;
            if self.ceilings[..i].iter().any(|(s, _)| *s == scheduler) {
                return Err(TqError::InvalidAttributes);
            }
        }

        let ceilings_ok = match self.protocol {
            LockingProtocol::None | LockingProtocol::Inherit => self.ceilings.is_empty(),
            LockingProtocol::Ceiling => self.ceilings.len() == 1,
            LockingProtocol::Mrsp => !self.ceilings.is_empty(),
        };
        if ceilings_ok {
            Ok(())
        } else {
            Err(TqError::InvalidAttributes)
        }
    }
}

/// Semaphore creation attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreAttributes {
    /// Queueing discipline
    pub discipline: Discipline,
    /// Initial count
    pub initial: u32,
    /// Maximum count
    pub max_count: u32,
}

impl SemaphoreAttributes {
    /// FIFO semaphore
    pub const fn new(initial: u32, max_count: u32) -> Self {
        Self {
            discipline: Discipline::Fifo,
            initial,
            max_count,
        }
    }

    /// Set the queueing discipline
    pub const fn with_discipline(mut self, discipline: Discipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Validate the counts
    pub fn validate(&self) -> TqResult<()> {
        if self.max_count == 0 || self.initial > self.max_count {
            return Err(TqError::InvalidAttributes);
        }
        Ok(())
    }
}

// =============================================================================
// Resource State
// =============================================================================

/// Owner slot of a mutex
#[derive(Debug, Clone)]
pub(crate) struct MutexState {
    pub(crate) protocol: LockingProtocol,
    pub(crate) recursive: bool,
    pub(crate) owner_check: bool,
    pub(crate) ceilings: Vec<(SchedulerId, Priority)>,
    pub(crate) owner: Option<ThreadId>,
    pub(crate) nest_count: u32,
}

impl MutexState {
    /// Ceiling for threads of `scheduler`
    pub(crate) fn ceiling(&self, scheduler: SchedulerId) -> Option<Priority> {
        self.ceilings
            .iter()
            .find(|(s, _)| *s == scheduler)
            .map(|(_, p)| *p)
    }
}

/// Count of a semaphore
#[derive(Debug, Clone, Copy)]
pub(crate) struct SemaphoreState {
    pub(crate) count: u32,
    pub(crate) max_count: u32,
}

#[derive(Debug, Clone)]
pub(crate) enum Variant {
    Mutex(MutexState),
    Semaphore(SemaphoreState),
}

/// Lock-protected state of a resource
#[derive(Debug)]
pub struct ResourceState {
    pub(crate) queue: WaitQueue,
    pub(crate) variant: Variant,
    pub(crate) deleted: bool,
}

impl ResourceState {
    /// Wait queue
    pub fn queue(&self) -> &WaitQueue {
        &self.queue
    }

    /// Current owner, `None` for semaphores
    pub fn owner(&self) -> Option<ThreadId> {
        match &self.variant {
            Variant::Mutex(mutex) => mutex.owner,
            Variant::Semaphore(_) => None,
        }
    }

    pub(crate) fn mutex(&self) -> Option<&MutexState> {
        match &self.variant {
            Variant::Mutex(mutex) => Some(mutex),
            Variant::Semaphore(_) => None,
        }
    }

    /// Owner that waiters boost
    pub(crate) fn inheriting_owner(&self) -> Option<ThreadId> {
        self.mutex()
            .filter(|m| m.protocol.inherits())
            .and_then(|m| m.owner)
    }

    /// Check the owner, count and queue invariants
    #[cfg(feature = "debug")]
    pub(crate) fn check_invariants(&self) {
        match &self.variant {
            Variant::Mutex(mutex) => {
                assert_eq!(mutex.owner.is_none(), mutex.nest_count == 0);
                assert!(mutex.owner.map_or(true, |o| !self.queue.contains(o)));
                assert!(mutex.owner.is_some() || self.queue.is_empty());
            },
            Variant::Semaphore(sem) => {
                assert!(sem.count <= sem.max_count);
                assert!(sem.count == 0 || self.queue.is_empty());
            },
        }
        assert!(self.queue.is_consistent());
    }
}

/// Explicit per-resource lock
pub type ResourceGuard<'a> = MutexGuard<'a, ResourceState>;

/// A mutex or semaphore
#[derive(Debug)]
pub struct Resource {
    id: ResourceId,
    kind: ResourceKind,
    state: Mutex<ResourceState>,
}

impl Resource {
    fn mutex(id: ResourceId, attributes: MutexAttributes) -> Self {
        Self {
            id,
            kind: ResourceKind::Mutex,
            state: Mutex::new(ResourceState {
                queue: WaitQueue::new(attributes.discipline),
                variant: Variant::Mutex(MutexState {
                    protocol: attributes.protocol,
                    recursive: attributes.recursive,
                    owner_check: attributes.owner_check,
                    ceilings: attributes.ceilings,
                    owner: None,
                    nest_count: 0,
                }),
                deleted: false,
            }),
        }
    }

    fn semaphore(id: ResourceId, attributes: SemaphoreAttributes) -> Self {
        Self {
            id,
            kind: ResourceKind::Semaphore,
            state: Mutex::new(ResourceState {
                queue: WaitQueue::new(attributes.discipline),
                variant: Variant::Semaphore(SemaphoreState {
                    count: attributes.initial,
                    max_count: attributes.max_count,
                }),
                deleted: false,
            }),
        }
    }

    /// Resource identifier
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Resource variant
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Acquire the resource lock
    pub fn lock(&self) -> ResourceGuard<'_> {
        self.state.lock()
    }
}

// =============================================================================
// Resource Table
// =============================================================================

/// Table of live resources
#[derive(Debug)]
pub struct ResourceTable {
    resources: RwLock<BTreeMap<ResourceId, Arc<Resource>>>,
    next_id: AtomicU32,
    capacity: usize,
}

impl ResourceTable {
    /// Create an empty table holding at most `capacity` live resources
    pub fn new(capacity: usize) -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            next_id: AtomicU32::new(0),
            capacity,
        }
    }

    fn insert(&self, build: impl FnOnce(ResourceId) -> Resource) -> TqResult<ResourceId> {
        let mut resources = self.resources.write();
        if resources.len() >= self.capacity {
            return Err(TqError::TooMany);
        }
        // identifiers are never reused
        let raw = self.next_id.load(Ordering::Relaxed);
        let next = raw.checked_add(1).ok_or(TqError::TooMany)?;
        self.next_id.store(next, Ordering::Relaxed);
        let id = ResourceId::new(raw);
        resources.insert(id, Arc::new(build(id)));
        Ok(id)
    }

    /// Create a mutex
    pub fn create_mutex(&self, attributes: MutexAttributes) -> TqResult<ResourceId> {
        self.insert(|id| Resource::mutex(id, attributes))
    }

    /// Create a semaphore
    pub fn create_semaphore(&self, attributes: SemaphoreAttributes) -> TqResult<ResourceId> {
        self.insert(|id| Resource::semaphore(id, attributes))
    }

    /// Look up a resource
    pub fn get(&self, id: ResourceId) -> TqResult<Arc<Resource>> {
        self.resources
            .read()
            .get(&id)
            .cloned()
            .ok_or(TqError::InvalidId)
    }

    /// Remove a resource from the table
    pub fn remove(&self, id: ResourceId) -> Option<Arc<Resource>> {
        self.resources.write().remove(&id)
    }

    /// Number of live resources
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Check if no resource is live
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S0: SchedulerId = SchedulerId::new(0);
    const S1: SchedulerId = SchedulerId::new(1);

    #[test]
    fn test_protocol_table() {
        assert!(!LockingProtocol::None.requires_priority_discipline());
        assert!(LockingProtocol::Inherit.inherits());
        assert!(!LockingProtocol::Ceiling.inherits());
        assert!(LockingProtocol::Ceiling.has_ceiling());
        assert!(LockingProtocol::Mrsp.inherits() && LockingProtocol::Mrsp.has_ceiling());
        assert!(LockingProtocol::Mrsp.is_sticky());
        assert_eq!(LockingProtocol::Mrsp.as_str(), "mrsp");
    }

    #[test]
    fn test_mutex_attribute_defaults() {
        let plain = MutexAttributes::new(LockingProtocol::None);
        assert_eq!(plain.discipline, Discipline::Fifo);
        assert!(plain.recursive && plain.owner_check);

        let inherit = MutexAttributes::new(LockingProtocol::Inherit);
        assert_eq!(inherit.discipline, Discipline::Priority);
    }

    #[test]
    fn test_mutex_attribute_validation() {
        let config = CoreConfig::uniprocessor();

        assert!(MutexAttributes::new(LockingProtocol::Inherit).validate(&config).is_ok());
        assert_eq!(
            MutexAttributes::new(LockingProtocol::Inherit)
                .with_discipline(Discipline::Fifo)
                .validate(&config),
            Err(TqError::InvalidAttributes)
        );
        assert_eq!(
            MutexAttributes::new(LockingProtocol::Ceiling).validate(&config),
            Err(TqError::InvalidAttributes)
        );
        assert!(MutexAttributes::new(LockingProtocol::Ceiling)
            .with_ceiling(S0, Priority::new(3))
            .validate(&config)
            .is_ok());
        assert_eq!(
            MutexAttributes::new(LockingProtocol::Ceiling)
                .with_ceiling(S1, Priority::new(3))
                .validate(&config),
            Err(TqError::InvalidScheduler)
        );
        assert_eq!(
            MutexAttributes::new(LockingProtocol::Mrsp)
                .with_ceiling(S0, Priority::new(3))
                .with_ceiling(S0, Priority::new(4))
                .validate(&config),
            Err(TqError::InvalidAttributes)
        );
    }

    #[test]
    fn test_semaphore_attribute_validation() {
        assert!(SemaphoreAttributes::new(0, 5).validate().is_ok());
        assert_eq!(
            SemaphoreAttributes::new(6, 5).validate(),
            Err(TqError::InvalidAttributes)
        );
        assert_eq!(
            SemaphoreAttributes::new(0, 0).validate(),
            Err(TqError::InvalidAttributes)
        );
    }

    #[test]
    fn test_resource_table() {
        let table = ResourceTable::new(2);
        let mutex = table
            .create_mutex(MutexAttributes::new(LockingProtocol::None))
            .unwrap();
        let sem = table.create_semaphore(SemaphoreAttributes::new(1, 1)).unwrap();

        assert_eq!(table.get(mutex).unwrap().kind(), ResourceKind::Mutex);
        assert_eq!(table.get(sem).unwrap().lock().owner(), None);
        assert_eq!(
            table.create_semaphore(SemaphoreAttributes::new(1, 1)),
            Err(TqError::TooMany)
        );

        assert!(table.remove(mutex).is_some());
        assert_eq!(table.get(mutex).map(|r| r.id()), Err(TqError::InvalidId));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_identifiers_exhausted() {
        let table = ResourceTable::new(4);
        let first = table
            .create_mutex(MutexAttributes::new(LockingProtocol::None))
            .unwrap();
        table.next_id.store(u32::MAX - 1, Ordering::Relaxed);

        let last = table.create_semaphore(SemaphoreAttributes::new(0, 1)).unwrap();
        assert_eq!(last, ResourceId::new(u32::MAX - 1));
        assert_eq!(
            table.create_semaphore(SemaphoreAttributes::new(0, 1)),
            Err(TqError::TooMany)
        );
        assert_eq!(table.len(), 2);
        assert!(table.get(first).is_ok());
    }

    #[test]
    fn test_ceiling_lookup() {
        let table = ResourceTable::new(1);
        let id = table
            .create_mutex(
                MutexAttributes::new(LockingProtocol::Mrsp).with_ceiling(S0, Priority::new(2)),
            )
            .unwrap();
        let resource = table.get(id).unwrap();
        let state = resource.lock();
        let mutex = state.mutex().unwrap();
        assert_eq!(mutex.ceiling(S0), Some(Priority::new(2)));
        assert_eq!(mutex.ceiling(S1), None);
        assert_eq!(state.inheriting_owner(), None);
    }
}

//! # Core Identifiers
//!
//! Opaque identifiers for threads, resources and schedulers, and the
//! priority value type.
//!
//! Threads, resources and scheduler instances reference each other only
//! through these identifiers. Queues and ledgers store plain ids, so the
//! thread / queue / scheduler relationships never need back-pointers.

use core::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// Thread identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ThreadId(u32);

impl ThreadId {
    /// Create a thread identifier from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Resource (mutex or semaphore) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ResourceId(u32);

impl ResourceId {
    /// Create a resource identifier from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Scheduler instance identifier
///
/// On SMP configurations every scheduler instance owns a set of processors.
/// A thread has exactly one home scheduler and may gain helping schedulers
/// through priority grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SchedulerId(u32);

impl SchedulerId {
    /// Create a scheduler identifier from its index
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Scheduler index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SchedulerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

// =============================================================================
// Priority
// =============================================================================

/// Thread priority
///
/// Lower numeric values are more important. The derived ordering is the
/// numeric one, so `min` yields the higher of two priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Priority(u32);

impl Priority {
    /// Most important priority
    pub const HIGHEST: Priority = Priority(0);
    /// Least important priority
    pub const LOWEST: Priority = Priority(u32::MAX);

    /// Create a priority from its numeric value
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Numeric value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Check if this priority is strictly more important than `other`
    pub const fn is_higher_than(self, other: Priority) -> bool {
        self.0 < other.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

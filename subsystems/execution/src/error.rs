//! Error types for thread-queue operations.
//!
//! Directive failures and the statuses delivered to a waiting thread share
//! one enum, so a wait status can be handed back to the waiter unchanged.

use core::fmt;

/// Result type alias for thread-queue operations.
pub type TqResult<T> = Result<T, TqError>;

/// Thread-queue error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TqError {
    // ========================================================================
    // Surrender / Seize Statuses (1-19)
    // ========================================================================
    /// Caller does not own the resource
    NotOwner             = 1,

    /// Counting resource already at its maximum count
    MaxCountExceeded     = 2,

    /// Resource not available and the caller does not want to wait
    Unavailable          = 3,

    /// Owner tried to seize a non-recursive mutex again
    NestingNotAllowed    = 4,

    /// Waiting would close a cycle in the owner chain
    Deadlock             = 5,

    /// Caller priority is higher than the resource ceiling
    CeilingViolated      = 6,

    /// No priority defined for the requested scheduler
    NotDefined           = 7,

    // ========================================================================
    // Wait Statuses (20-39)
    // ========================================================================
    /// Wait ended by timeout
    Timeout              = 20,

    /// Resource deleted while waiting
    ObjectDeleted        = 21,

    // ========================================================================
    // Object / Configuration Errors (40-59)
    // ========================================================================
    /// Unknown thread or resource identifier
    InvalidId            = 40,

    /// Scheduler index out of range
    InvalidScheduler     = 41,

    /// Inconsistent resource attributes
    InvalidAttributes    = 42,

    /// Inconsistent core configuration
    InvalidConfig        = 43,

    /// Object table full
    TooMany              = 44,

    /// Resource still owned
    ResourceInUse        = 45,
}

impl TqError {
    /// Check if this is a status delivered to a waiting thread
    pub const fn is_wait_status(self) -> bool {
        matches!(self, Self::Timeout | Self::ObjectDeleted)
    }

    /// Get the error as a static string
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotOwner => "caller is not the owner",
            Self::MaxCountExceeded => "maximum count exceeded",
            Self::Unavailable => "resource unavailable",
            Self::NestingNotAllowed => "nested seize not allowed",
            Self::Deadlock => "deadlock detected",
            Self::CeilingViolated => "priority ceiling violated",
            Self::NotDefined => "priority not defined for scheduler",
            Self::Timeout => "wait timed out",
            Self::ObjectDeleted => "object deleted while waiting",
            Self::InvalidId => "invalid identifier",
            Self::InvalidScheduler => "invalid scheduler",
            Self::InvalidAttributes => "invalid attributes",
            Self::InvalidConfig => "invalid configuration",
            Self::TooMany => "too many objects",
            Self::ResourceInUse => "resource in use",
        }
    }
}

impl fmt::Display for TqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

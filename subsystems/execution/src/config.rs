//! # Core Configuration
//!
//! Sizing of the thread and resource tables and the number of scheduler
//! instances.

use crate::error::{TqError, TqResult};
use crate::types::SchedulerId;

/// Upper bound on scheduler instances
pub const MAX_SCHEDULERS: usize = 32;

/// Default thread table capacity
pub const DEFAULT_MAX_THREADS: usize = 256;

/// Default resource table capacity
pub const DEFAULT_MAX_RESOURCES: usize = 256;

/// Thread-queue core configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreConfig {
    /// Number of scheduler instances
    pub scheduler_count: usize,
    /// Maximum number of threads
    pub max_threads: usize,
    /// Maximum number of live resources
    pub max_resources: usize,
}

impl CoreConfig {
    /// Single scheduler configuration
    pub const fn uniprocessor() -> Self {
        Self {
            scheduler_count: 1,
            max_threads: DEFAULT_MAX_THREADS,
            max_resources: DEFAULT_MAX_RESOURCES,
        }
    }

    /// Configuration with `count` scheduler instances
    pub const fn with_schedulers(count: usize) -> Self {
        Self {
            scheduler_count: count,
            max_threads: DEFAULT_MAX_THREADS,
            max_resources: DEFAULT_MAX_RESOURCES,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> TqResult<()> {
        if self.scheduler_count == 0 || self.scheduler_count > MAX_SCHEDULERS {
            return Err(TqError::InvalidConfig);
        }
        if !cfg!(feature = "smp") && self.scheduler_count > 1 {
            return Err(TqError::InvalidConfig);
        }
        if self.max_threads == 0 || self.max_resources == 0 {
            return Err(TqError::InvalidConfig);
        }
        if self.max_threads > u32::MAX as usize || self.max_resources > u32::MAX as usize {
            return Err(TqError::InvalidConfig);
        }
        Ok(())
    }

    /// Check that `scheduler` exists in this configuration
    pub fn check_scheduler(&self, scheduler: SchedulerId) -> TqResult<()> {
        if scheduler.index() < self.scheduler_count {
            Ok(())
        } else {
            Err(TqError::InvalidScheduler)
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        if cfg!(feature = "smp") {
            Self::with_schedulers(4)
        } else {
            Self::uniprocessor()
        }
    }
}

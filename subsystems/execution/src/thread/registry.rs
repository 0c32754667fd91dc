//! # Thread Registry
//!
//! Arena of thread control blocks indexed by [`ThreadId`].

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::RwLock;

use super::thread::{Thread, ThreadAttributes};
use crate::error::{TqError, TqResult};
use crate::types::ThreadId;

/// Thread table
#[derive(Debug)]
pub struct ThreadRegistry {
    threads: RwLock<Vec<Arc<Thread>>>,
    capacity: usize,
}

impl ThreadRegistry {
    /// Create an empty registry holding at most `capacity` threads
    pub fn new(capacity: usize) -> Self {
        Self {
            threads: RwLock::new(Vec::new()),
            capacity,
        }
    }

    /// Register a new thread
    pub fn register(&self, attributes: ThreadAttributes) -> TqResult<ThreadId> {
        let mut threads = self.threads.write();
        if threads.len() >= self.capacity {
            return Err(TqError::TooMany);
        }

        let id = ThreadId::new(threads.len() as u32);
        threads.push(Arc::new(Thread::new(id, attributes)));
        Ok(id)
    }

    /// Look up a thread
    pub fn get(&self, id: ThreadId) -> TqResult<Arc<Thread>> {
        self.threads
            .read()
            .get(id.index())
            .cloned()
            .ok_or(TqError::InvalidId)
    }

    /// Look up a thread referenced by a queue, owner slot or ledger
    ///
    /// Such a reference always names a registered thread; a miss is a fatal
    /// consistency fault.
    pub(crate) fn linked(&self, id: ThreadId) -> Arc<Thread> {
        match self.get(id) {
            Ok(thread) => thread,
            Err(_) => {
                log::error!("ThreadQueue: dangling thread reference {}", id);
                panic!("thread queue consistency fault: unknown thread {}", id);
            },
        }
    }

    /// Number of registered threads
    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    /// Check if no thread is registered
    pub fn is_empty(&self) -> bool {
        self.threads.read().is_empty()
    }
}

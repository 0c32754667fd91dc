//! # SuperCore
//!
//! Entry point of the thread-queue core: object tables, collaborators and
//! every directive-level operation.
//!
//! Each operation takes the lock of the one resource it works on. Owner
//! chain walks (deadlock detection and transitive priority inheritance) run
//! under the path lock and lock one resource after the other. No operation
//! takes the path lock while it holds a resource lock.

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::{Mutex, MutexGuard};

use crate::config::CoreConfig;
use crate::error::{TqError, TqResult};
use crate::hooks::{NoHooks, SchedulerHooks, TimeoutService};
use crate::thread::wait::{self, BlockOutcome};
use crate::thread::{Thread, ThreadAttributes, ThreadRegistry, ThreadState, WaitFlags, WaitState};
use crate::threadq::enqueue::{check_ceiling, enqueue, try_acquire};
use crate::threadq::{
    self, MutexAttributes, QueueContext, Resource, ResourceKind, ResourceTable, SeizeOutcome,
    SemaphoreAttributes, SurrenderOutcome, WaitTimeout,
};
use crate::types::{Priority, ResourceId, SchedulerId, ThreadId};

/// Thread-queue core
pub struct SuperCore {
    config: CoreConfig,
    threads: ThreadRegistry,
    resources: ResourceTable,
    hooks: Arc<dyn SchedulerHooks>,
    timeouts: Arc<dyn TimeoutService>,
    path: Mutex<()>,
}

impl core::fmt::Debug for SuperCore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SuperCore")
            .field("config", &self.config)
            .field("threads", &self.threads.len())
            .field("resources", &self.resources.len())
            .finish()
    }
}

impl SuperCore {
    /// Create a core without collaborators
    pub fn new(config: CoreConfig) -> TqResult<Self> {
        Self::with_hooks(config, Arc::new(NoHooks), Arc::new(NoHooks))
    }

    /// Create a core reporting to `hooks` and arming timeouts on `timeouts`
    pub fn with_hooks(
        config: CoreConfig,
        hooks: Arc<dyn SchedulerHooks>,
        timeouts: Arc<dyn TimeoutService>,
    ) -> TqResult<Self> {
        config.validate()?;
        log::debug!(
            "SuperCore: {} schedulers, {} threads, {} resources",
            config.scheduler_count,
            config.max_threads,
            config.max_resources
        );

        Ok(Self {
            config,
            threads: ThreadRegistry::new(config.max_threads),
            resources: ResourceTable::new(config.max_resources),
            hooks,
            timeouts,
            path: Mutex::new(()),
        })
    }

    /// Configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn context(&self) -> QueueContext<'_> {
        QueueContext::new(&self.threads, &*self.hooks, &*self.timeouts)
    }

    /// Look up a thread
    pub fn thread(&self, id: ThreadId) -> TqResult<Arc<Thread>> {
        self.threads.get(id)
    }

    fn resource(&self, id: ResourceId) -> TqResult<Arc<Resource>> {
        self.resources.get(id)
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Create a thread
    pub fn create_thread(&self, attributes: ThreadAttributes) -> TqResult<ThreadId> {
        self.config.check_scheduler(attributes.home)?;
        let id = self.threads.register(attributes)?;
        log::debug!(
            "ThreadQueue: created {} on {} at {}",
            id,
            attributes.home,
            attributes.priority
        );
        Ok(id)
    }

    /// Create a mutex
    pub fn create_mutex(&self, attributes: MutexAttributes) -> TqResult<ResourceId> {
        attributes.validate(&self.config)?;
        let protocol = attributes.protocol;
        let id = self.resources.create_mutex(attributes)?;
        log::debug!("ThreadQueue: created {} mutex {}", protocol.as_str(), id);
        Ok(id)
    }

    /// Create a counting semaphore
    pub fn create_semaphore(&self, attributes: SemaphoreAttributes) -> TqResult<ResourceId> {
        attributes.validate()?;
        let id = self.resources.create_semaphore(attributes)?;
        log::debug!(
            "ThreadQueue: created semaphore {} ({}/{})",
            id,
            attributes.initial,
            attributes.max_count
        );
        Ok(id)
    }

    /// Delete a resource
    ///
    /// An owned mutex cannot be deleted. Waiters are released with
    /// `ObjectDeleted`.
    pub fn delete_resource(&self, id: ResourceId) -> TqResult<()> {
        let resource = self.resource(id)?;
        let ctx = self.context();

        let released = {
            let mut state = resource.lock();
            if state.deleted {
                return Err(TqError::InvalidId);
            }
            if state.owner().is_some() {
                return Err(TqError::ResourceInUse);
            }
            state.deleted = true;
            threadq::extract::flush(&ctx, id, &mut state, Err(TqError::ObjectDeleted)).0
        };

        self.resources.remove(id);
        log::debug!("ThreadQueue: deleted {} ({} waiters released)", id, released);
        Ok(())
    }

    // =========================================================================
    // Seize
    // =========================================================================

    /// Obtain a resource, or queue the caller on it
    ///
    /// On `Enqueued` the caller is in the intend-to-block state. It completes
    /// the wait with [`SuperCore::commit_block`], or, for MrsP, by spinning
    /// on [`SuperCore::is_ready_again`], and collects the result with
    /// [`SuperCore::finish_wait`].
    pub fn seize(
        &self,
        resource_id: ResourceId,
        thread_id: ThreadId,
        timeout: WaitTimeout,
    ) -> TqResult<SeizeOutcome> {
        let thread = self.thread(thread_id)?;
        let resource = self.resource(resource_id)?;
        let ctx = self.context();

        {
            let mut state = resource.lock();
            if state.deleted {
                return Err(TqError::InvalidId);
            }
            if let Some(result) = try_acquire(&ctx, resource_id, &mut state, &thread) {
                return result;
            }
            if timeout == WaitTimeout::NoWait {
                return Err(TqError::Unavailable);
            }
            if resource.kind() == ResourceKind::Semaphore {
                enqueue(&ctx, resource_id, &mut state, &thread, timeout);
                return Ok(SeizeOutcome::Enqueued);
            }
        }

        self.seize_contended(&ctx, &resource, &thread, timeout)
    }

    fn seize_contended(
        &self,
        ctx: &QueueContext<'_>,
        resource: &Resource,
        thread: &Arc<Thread>,
        timeout: WaitTimeout,
    ) -> TqResult<SeizeOutcome> {
        let source = resource.id();
        let path = self.path.lock();
        let mut state = resource.lock();

        loop {
            if state.deleted {
                return Err(TqError::InvalidId);
            }
            if let Some(result) = try_acquire(ctx, source, &mut state, thread) {
                return result;
            }
            if let Some(mutex) = state.mutex() {
                check_ceiling(mutex, thread)?;
            }
            let Some(owner) = state.owner() else {
                break;
            };

            drop(state);
            if self.closes_cycle(&path, owner, thread.id()) {
                log::warn!("ThreadQueue: {} waiting on {} would deadlock", thread.id(), source);
                return Err(TqError::Deadlock);
            }

            state = resource.lock();
            if state.owner() == Some(owner) {
                break;
            }
        }

        let boosted = enqueue(ctx, source, &mut state, thread, timeout);
        #[cfg(feature = "debug")]
        state.check_invariants();
        drop(state);

        if let Some(owner) = boosted {
            self.propagate_locked(&path, owner);
        }
        Ok(SeizeOutcome::Enqueued)
    }

    /// Check if waiting for `owner` leads back to `caller`
    fn closes_cycle(&self, _path: &MutexGuard<'_, ()>, owner: ThreadId, caller: ThreadId) -> bool {
        let mut current = owner;
        for _ in 0..=self.threads.len() {
            if current == caller {
                return true;
            }
            let Some(source) = self.threads.linked(current).waiting_on() else {
                return false;
            };
            let Ok(resource) = self.resources.get(source) else {
                return false;
            };
            let Some(next) = resource.lock().owner() else {
                return false;
            };
            current = next;
        }
        false
    }

    /// Complete a blocking seize
    ///
    /// Waiters of an MrsP mutex do not park; they spin on their processor
    /// until the wait ends.
    pub fn commit_block(&self, thread_id: ThreadId) -> TqResult<BlockOutcome> {
        let thread = self.thread(thread_id)?;
        if self.waits_sticky(&thread) {
            log::trace!("ThreadQueue: {} spins for the resource", thread_id);
            return Ok(wait::spin_until_ready(&thread));
        }
        Ok(wait::commit_block(&thread, &*self.hooks))
    }

    fn waits_sticky(&self, thread: &Thread) -> bool {
        let Some(resource) = thread.waiting_on().and_then(|id| self.resources.get(id).ok())
        else {
            return false;
        };
        let state = resource.lock();
        state.mutex().is_some_and(|m| m.protocol.is_sticky())
    }

    /// Check if the wait of a queued thread ended
    pub fn is_ready_again(&self, thread_id: ThreadId) -> TqResult<bool> {
        Ok(self.thread(thread_id)?.wait_flags().wait_state() == WaitState::ReadyAgain)
    }

    /// Collect the status of a finished wait
    ///
    /// Returns `Ok` if the resource was surrendered to the thread, `Timeout`
    /// or `ObjectDeleted` (or the status given to [`SuperCore::extract`]) if
    /// the wait was cancelled, and `Unavailable` while the thread still
    /// waits.
    pub fn finish_wait(&self, thread_id: ThreadId) -> TqResult<()> {
        let thread = self.thread(thread_id)?;
        wait::finish_wait(&thread).unwrap_or(Err(TqError::Unavailable))
    }

    // =========================================================================
    // Surrender
    // =========================================================================

    /// Release a resource
    ///
    /// `caller` is checked against the owner of an owner-checked mutex and
    /// is otherwise ignored.
    pub fn surrender(&self, resource_id: ResourceId, caller: ThreadId) -> TqResult<SurrenderOutcome> {
        self.thread(caller)?;
        let resource = self.resource(resource_id)?;
        let ctx = self.context();

        let (outcome, previous) = {
            let mut state = resource.lock();
            if state.deleted {
                return Err(TqError::InvalidId);
            }
            let result = threadq::surrender::surrender(&ctx, resource_id, &mut state, caller);
            #[cfg(feature = "debug")]
            state.check_invariants();
            result?
        };

        if let Some(previous) = previous {
            self.propagate(previous);
        }
        Ok(outcome)
    }

    // =========================================================================
    // Extract
    // =========================================================================

    /// Remove a thread from the queue it waits on and end the wait with
    /// `status`
    ///
    /// Returns `false` if the thread was not queued.
    pub fn extract(&self, thread_id: ThreadId, status: TqError) -> TqResult<bool> {
        let thread = self.thread(thread_id)?;
        Ok(self.extract_thread(&thread, Err(status)))
    }

    /// Wait timeout expired
    ///
    /// Called by the timeout service. Returns `false` if the wait already
    /// ended.
    pub fn timeout(&self, thread_id: ThreadId) -> TqResult<bool> {
        let thread = self.thread(thread_id)?;
        thread.wait_info().timeout_armed = false;
        Ok(self.extract_thread(&thread, Err(TqError::Timeout)))
    }

    fn extract_thread(&self, thread: &Arc<Thread>, status: TqResult<()>) -> bool {
        let Some(source) = thread.waiting_on() else {
            return false;
        };
        let Ok(resource) = self.resources.get(source) else {
            return false;
        };
        let ctx = self.context();

        let extracted = {
            let mut state = resource.lock();
            threadq::extract::extract(&ctx, source, &mut state, thread, status)
        };

        match extracted {
            Some((_, owner)) => {
                if let Some(owner) = owner {
                    self.propagate(owner);
                }
                true
            },
            None => false,
        }
    }

    /// Release every waiter of a resource with `status`
    pub fn flush(&self, resource_id: ResourceId, status: TqError) -> TqResult<usize> {
        let resource = self.resource(resource_id)?;
        let ctx = self.context();

        let (released, owner) = {
            let mut state = resource.lock();
            threadq::extract::flush(&ctx, resource_id, &mut state, Err(status))
        };

        if let Some(owner) = owner {
            self.propagate(owner);
        }
        Ok(released)
    }

    // =========================================================================
    // Priorities
    // =========================================================================

    /// Change the real priority of a thread
    pub fn set_real_priority(&self, thread_id: ThreadId, priority: Priority) -> TqResult<()> {
        let thread = self.thread(thread_id)?;
        thread.set_real_priority(priority, &*self.hooks);

        if thread.waiting_on().is_some() {
            self.propagate(thread);
        }
        Ok(())
    }

    fn propagate(&self, thread: Arc<Thread>) {
        let path = self.path.lock();
        self.propagate_locked(&path, thread);
    }

    /// Carry a priority change of `thread` along the owner chain
    fn propagate_locked(&self, _path: &MutexGuard<'_, ()>, mut thread: Arc<Thread>) {
        let ctx = self.context();
        for _ in 0..self.threads.len() {
            let Some(source) = thread.waiting_on() else {
                return;
            };
            let Ok(resource) = self.resources.get(source) else {
                return;
            };

            let next = {
                let mut state = resource.lock();
                threadq::update_waiter(&ctx, source, &mut state, &thread)
            };
            match next {
                Some(owner) => {
                    log::trace!("ThreadQueue: {} passes its priority to {}", thread.id(), owner.id());
                    thread = owner;
                },
                None => return,
            }
        }
    }

    /// Effective priority of a thread on `scheduler`
    pub fn current_priority(&self, thread_id: ThreadId, scheduler: SchedulerId) -> TqResult<Priority> {
        self.config.check_scheduler(scheduler)?;
        self.thread(thread_id)?
            .scheduling()
            .priority_on(scheduler)
            .ok_or(TqError::NotDefined)
    }

    /// Schedulers a thread may execute on, home first
    pub fn eligible_schedulers(&self, thread_id: ThreadId) -> TqResult<Vec<SchedulerId>> {
        Ok(self.thread(thread_id)?.scheduling().eligible())
    }

    /// Check if dropping the grants of `resource_id` leaves the priorities of
    /// the thread unchanged
    pub fn is_dispensable(&self, resource_id: ResourceId, thread_id: ThreadId) -> TqResult<bool> {
        self.resource(resource_id)?;
        Ok(self
            .thread(thread_id)?
            .scheduling()
            .ledger
            .is_dispensable(resource_id))
    }

    /// Check if `waiter` would raise the thread a surrender hands the
    /// resource to
    ///
    /// The next owner is the queue head. `false` if `waiter` is the head or
    /// not queued, or if the protocol does not inherit.
    pub fn is_vital(&self, resource_id: ResourceId, waiter: ThreadId) -> TqResult<bool> {
        self.thread(waiter)?;
        let resource = self.resource(resource_id)?;
        let state = resource.lock();

        let inherits = state.mutex().is_some_and(|m| m.protocol.inherits());
        let (Some(head), true) = (state.queue().first(), state.queue().contains(waiter)) else {
            return Ok(false);
        };
        if !inherits || head == waiter {
            return Ok(false);
        }

        Ok(threadq::is_vital_waiter(
            resource_id,
            &state,
            &self.threads.linked(head),
            waiter,
        ))
    }

    // =========================================================================
    // Suspension
    // =========================================================================

    /// Suspend a thread
    pub fn suspend(&self, thread_id: ThreadId) -> TqResult<()> {
        let thread = self.thread(thread_id)?;
        if thread.is_suspended() {
            return Ok(());
        }
        if thread.set_state(ThreadState::SUSPENDED) == ThreadState::SUSPENDED {
            self.hooks.block(thread_id);
        }
        log::debug!("ThreadQueue: suspended {}", thread_id);
        Ok(())
    }

    /// Resume a suspended thread
    pub fn resume(&self, thread_id: ThreadId) -> TqResult<()> {
        let thread = self.thread(thread_id)?;
        if !thread.is_suspended() {
            return Ok(());
        }
        if thread.clear_state(ThreadState::SUSPENDED).is_ready() {
            self.hooks.unblock(thread_id, thread.home());
        }
        log::debug!("ThreadQueue: resumed {}", thread_id);
        Ok(())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Owner of a resource, `None` for semaphores
    pub fn owner(&self, resource_id: ResourceId) -> TqResult<Option<ThreadId>> {
        Ok(self.resource(resource_id)?.lock().owner())
    }

    /// Count of a semaphore
    pub fn count(&self, resource_id: ResourceId) -> TqResult<u32> {
        match &self.resource(resource_id)?.lock().variant {
            threadq::resource::Variant::Semaphore(sem) => Ok(sem.count),
            threadq::resource::Variant::Mutex(_) => Err(TqError::NotDefined),
        }
    }

    /// Nest count of a mutex
    pub fn nest_count(&self, resource_id: ResourceId) -> TqResult<u32> {
        self.resource(resource_id)?
            .lock()
            .mutex()
            .map(|m| m.nest_count)
            .ok_or(TqError::NotDefined)
    }

    /// Waiters in queue order
    pub fn waiters(&self, resource_id: ResourceId) -> TqResult<Vec<ThreadId>> {
        Ok(self.resource(resource_id)?.lock().queue().iter().collect())
    }

    /// Check if a thread is queued on a resource
    pub fn is_queued(&self, thread_id: ThreadId) -> TqResult<bool> {
        Ok(self.thread(thread_id)?.waiting_on().is_some())
    }

    /// Wait flags of a thread
    pub fn wait_flags(&self, thread_id: ThreadId) -> TqResult<WaitFlags> {
        Ok(self.thread(thread_id)?.wait_flags())
    }

    /// Execution state of a thread
    pub fn thread_state(&self, thread_id: ThreadId) -> TqResult<ThreadState> {
        Ok(self.thread(thread_id)?.state())
    }
}

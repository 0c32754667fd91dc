//! Recording collaborators for unit tests.

use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::config::CoreConfig;
use crate::hooks::{SchedulerHooks, TimeoutService};
use crate::supercore::SuperCore;
use crate::thread::ThreadAttributes;
use crate::types::{Priority, SchedulerId, ThreadId};

/// Notification received by the [`Recorder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Block(ThreadId),
    Unblock(ThreadId),
    Priority(ThreadId, SchedulerId, Priority),
    HelperAdded(ThreadId, SchedulerId),
    HelperRemoved(ThreadId, SchedulerId),
    Arm(ThreadId, u64),
    Cancel(ThreadId),
}

/// Scheduler and timeout service that records every call in order
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }

    /// Drain the recorded events
    pub(crate) fn take(&self) -> Vec<Event> {
        core::mem::take(&mut *self.events.lock())
    }

    /// Check if `event` was recorded since the last [`Recorder::take`]
    pub(crate) fn saw(&self, event: Event) -> bool {
        self.events.lock().contains(&event)
    }

    /// Threads unblocked since the last [`Recorder::take`]
    pub(crate) fn unblocked(&self) -> Vec<ThreadId> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Unblock(thread) => Some(*thread),
                _ => None,
            })
            .collect()
    }
}

impl SchedulerHooks for Recorder {
    fn block(&self, thread: ThreadId) {
        self.push(Event::Block(thread));
    }

    fn unblock(&self, thread: ThreadId, _home: SchedulerId) {
        self.push(Event::Unblock(thread));
    }

    fn priority_changed(&self, thread: ThreadId, scheduler: SchedulerId, priority: Priority) {
        self.push(Event::Priority(thread, scheduler, priority));
    }

    fn helper_added(&self, thread: ThreadId, scheduler: SchedulerId) {
        self.push(Event::HelperAdded(thread, scheduler));
    }

    fn helper_removed(&self, thread: ThreadId, scheduler: SchedulerId) {
        self.push(Event::HelperRemoved(thread, scheduler));
    }
}

impl TimeoutService for Recorder {
    fn arm(&self, thread: ThreadId, ticks: u64) {
        self.push(Event::Arm(thread, ticks));
    }

    fn cancel(&self, thread: ThreadId) {
        self.push(Event::Cancel(thread));
    }
}

/// Core with `schedulers` scheduler instances wired to a recorder
pub(crate) fn core_with(schedulers: usize) -> (SuperCore, Arc<Recorder>) {
    let recorder = Recorder::new();
    let core = SuperCore::with_hooks(
        CoreConfig::with_schedulers(schedulers),
        recorder.clone(),
        recorder.clone(),
    )
    .unwrap();
    (core, recorder)
}

/// Uniprocessor core wired to a recorder
pub(crate) fn core() -> (SuperCore, Arc<Recorder>) {
    core_with(1)
}

/// Create a thread with home scheduler `home`
pub(crate) fn spawn(core: &SuperCore, home: u32, priority: u32) -> ThreadId {
    core.create_thread(ThreadAttributes::new(
        SchedulerId::new(home),
        Priority::new(priority),
    ))
    .unwrap()
}

//! # Thread States
//!
//! Wait flags and execution state bits.
//!
//! The wait flags track a thread through a blocking operation:
//!
//! ```text
//!   Ready ──enqueue──▶ IntendToBlock ──commit_block──▶ Blocked
//!                           │                            │
//!                      unblock (deferred)             unblock
//!                           ▼                            ▼
//!                       ReadyAgain ◀─────────────────────┘
//!                           │
//!                      finish_wait
//!                           ▼
//!                         Ready
//! ```
//!
//! The execution state is orthogonal: a thread may be suspended while it is
//! ready, intends to block or is blocked.

use bitflags::bitflags;

bitflags! {
    /// Wait flags: wait state in the low byte, wait class in the second byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WaitFlags: u32 {
        /// The thread started a blocking operation
        const INTEND_TO_BLOCK = 0x0001;
        /// The thread completed the blocking operation
        const BLOCKED         = 0x0002;
        /// The wait was satisfied, cancelled or timed out
        const READY_AGAIN     = 0x0004;
        /// Mask of the wait state bits
        const STATE_MASK      = 0x00ff;

        /// The thread waits for a resource
        const CLASS_OBJECT    = 0x0400;
        /// Mask of the wait class bits
        const CLASS_MASK      = 0xff00;
    }
}

/// Wait state decoded from [`WaitFlags`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Not waiting
    Ready,
    /// Enqueued but not yet parked
    IntendToBlock,
    /// Parked
    Blocked,
    /// Made ready again, the waiter has not yet collected its status
    ReadyAgain,
}

impl WaitFlags {
    /// Flags of a thread that starts to wait for a resource
    pub const OBJECT_INTEND_TO_BLOCK: WaitFlags =
        WaitFlags::CLASS_OBJECT.union(WaitFlags::INTEND_TO_BLOCK);
    /// Flags of a thread parked on a resource
    pub const OBJECT_BLOCKED: WaitFlags = WaitFlags::CLASS_OBJECT.union(WaitFlags::BLOCKED);
    /// Flags of a thread whose resource wait ended
    pub const OBJECT_READY_AGAIN: WaitFlags =
        WaitFlags::CLASS_OBJECT.union(WaitFlags::READY_AGAIN);

    /// Decode the wait state
    pub fn wait_state(self) -> WaitState {
        match self.bits() & WaitFlags::STATE_MASK.bits() {
            0 => WaitState::Ready,
            s if s == WaitFlags::INTEND_TO_BLOCK.bits() => WaitState::IntendToBlock,
            s if s == WaitFlags::BLOCKED.bits() => WaitState::Blocked,
            _ => WaitState::ReadyAgain,
        }
    }

    /// Check if the thread waits for a resource
    pub fn is_object_wait(self) -> bool {
        self.bits() & WaitFlags::CLASS_MASK.bits() == WaitFlags::CLASS_OBJECT.bits()
    }
}

bitflags! {
    /// Execution state bits; a thread is ready when no bit is set
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ThreadState: u32 {
        /// Blocked on a resource
        const WAITING_FOR_OBJECT = 1 << 0;
        /// Suspended by a directive
        const SUSPENDED          = 1 << 1;
    }
}

impl ThreadState {
    /// Check if no blocking state is set
    pub fn is_ready(self) -> bool {
        self.is_empty()
    }
}

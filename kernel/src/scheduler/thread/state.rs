//! State - Thread state machine
//!
//! Manages thread lifecycle and queue membership

use crate::scheduler::core::LockId;
use core::fmt;

/// Thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    /// Thread is currently running (exactly one at any time)
    Running,

    /// Thread is ready to run and sits in the ready queue
    Ready,

    /// Thread is blocked (waiting for a lock, semaphore, ...)
    Blocked,

    /// Thread has exited and waits to be reclaimed
    Dying,
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Ready => write!(f, "Ready"),
            Self::Blocked => write!(f, "Blocked"),
            Self::Dying => write!(f, "Dying"),
        }
    }
}

/// Which queue currently references a thread
///
/// A thread is in at most one of: the ready queue, one lock wait list, or
/// nowhere (running, dying, or parked by an external wait queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueLocation {
    #[default]
    NotQueued,
    Ready,
    Waiting(LockId),
}

/// Validate state transition
pub fn validate_transition(from: ThreadState, to: ThreadState) -> bool {
    use ThreadState::*;

    match (from, to) {
        // Dispatched
        (Ready, Running) => true,

        // Yield or preemption
        (Running, Ready) => true,

        // Wait on a lock or semaphore
        (Running, Blocked) => true,

        // Exit
        (Running, Dying) => true,

        // Woken by release/signal
        (Blocked, Ready) => true,

        // The idle thread is dispatched straight from Blocked
        (Blocked, Running) => true,

        // All other transitions invalid (Dying is terminal)
        _ => false,
    }
}

/// Check that a state and a queue location agree
pub fn location_matches(state: ThreadState, location: QueueLocation) -> bool {
    match location {
        QueueLocation::Ready => state == ThreadState::Ready,
        QueueLocation::Waiting(_) => state == ThreadState::Blocked,
        QueueLocation::NotQueued => state != ThreadState::Ready,
    }
}

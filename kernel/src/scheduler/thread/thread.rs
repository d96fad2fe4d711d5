//! Thread Control Block
//!
//! One `Thread` per kernel thread, owned by the registry. Everything else
//! refers to it by [`ThreadId`]. Process-level state (address space, file
//! descriptors, children) does not live here; the process layer keys its
//! own records by `ThreadId`.

use super::stack::ThreadStack;
use super::state::{location_matches, validate_transition, QueueLocation, ThreadState};
use crate::scheduler::core::LockId;
use crate::scheduler::fixed_point::FixedPoint;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use static_assertions::const_assert;

/// Lowest priority
pub const PRI_MIN: u8 = 0;
/// Default priority
pub const PRI_DEFAULT: u8 = 31;
/// Highest priority
pub const PRI_MAX: u8 = 63;
/// Number of priority levels
pub const PRI_COUNT: usize = PRI_MAX as usize + 1;

/// Nice bounds (MLFQS)
pub const NICE_MIN: i8 = -20;
pub const NICE_DEFAULT: i8 = 0;
pub const NICE_MAX: i8 = 20;

/// Longest stored name (bytes)
pub const THREAD_NAME_MAX: usize = 15;

/// Stack-overflow sentinel, must never change
pub const THREAD_MAGIC: u32 = 0xcd6a_bf4b;

const_assert!(PRI_MIN < PRI_DEFAULT && PRI_DEFAULT < PRI_MAX);
const_assert!(PRI_COUNT <= 64);
const_assert!(NICE_MIN < NICE_DEFAULT && NICE_DEFAULT < NICE_MAX);

/// Thread ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u64);

impl ThreadId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread body
pub type ThreadFunc = fn(usize);

/// Entry point handed to the context-switch layer when the thread is set up
#[derive(Debug, Clone, Copy)]
pub struct ThreadEntry {
    pub func: ThreadFunc,
    pub arg: usize,
}

/// Thread Control Block (TCB)
pub struct Thread {
    /// Unique thread ID
    id: ThreadId,

    /// Thread name (for debugging)
    name: String,

    /// Current state
    state: ThreadState,

    /// Queue that references this thread
    location: QueueLocation,

    /// Priority set by the owner (or the BSD accountant), ignores donation
    base_priority: u8,

    /// Effective priority
    priority: u8,

    /// Locks currently owned
    locks_held: Vec<LockId>,

    /// BSD scheduler data
    recent_cpu: FixedPoint,
    nice: i8,

    /// Stack page, `None` for the initial thread which runs on the boot stack
    stack: Option<ThreadStack>,

    /// Entry point, `None` for the initial thread
    entry: Option<ThreadEntry>,

    /// Detects stack overflow
    magic: u32,
}

impl Thread {
    /// Create a new thread, Blocked and not queued until the scheduler
    /// makes it Ready (or adopts it as the running thread)
    pub(crate) fn new(
        id: ThreadId,
        name: &str,
        priority: u8,
        stack: Option<ThreadStack>,
        entry: Option<ThreadEntry>,
    ) -> Self {
        Self {
            id,
            name: truncate_name(name),
            state: ThreadState::Blocked,
            location: QueueLocation::NotQueued,
            base_priority: priority,
            priority,
            locks_held: Vec::new(),
            recent_cpu: FixedPoint::ZERO,
            nice: NICE_DEFAULT,
            stack,
            entry,
            magic: THREAD_MAGIC,
        }
    }

    /// Get thread ID
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Get thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get thread state
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Queue currently holding this thread
    pub fn location(&self) -> QueueLocation {
        self.location
    }

    /// Lock this thread is waiting to acquire
    pub fn blocked_on(&self) -> Option<LockId> {
        match self.location {
            QueueLocation::Waiting(lock) => Some(lock),
            _ => None,
        }
    }

    /// Get base priority
    pub fn base_priority(&self) -> u8 {
        self.base_priority
    }

    /// Get effective priority
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Locks currently owned
    pub fn locks_held(&self) -> &[LockId] {
        &self.locks_held
    }

    pub fn recent_cpu(&self) -> FixedPoint {
        self.recent_cpu
    }

    pub fn nice(&self) -> i8 {
        self.nice
    }

    pub fn stack(&self) -> Option<&ThreadStack> {
        self.stack.as_ref()
    }

    pub fn entry(&self) -> Option<ThreadEntry> {
        self.entry
    }

    /// Check the stack-overflow sentinel
    pub fn is_magic_intact(&self) -> bool {
        self.magic == THREAD_MAGIC
    }

    pub(crate) fn magic(&self) -> u32 {
        self.magic
    }

    /// Move to `state` with the matching queue location
    pub(crate) fn transition(&mut self, state: ThreadState, location: QueueLocation) {
        debug_assert!(
            validate_transition(self.state, state),
            "thread {} invalid transition {} -> {}",
            self.id,
            self.state,
            state
        );
        debug_assert!(location_matches(state, location));
        self.state = state;
        self.location = location;
    }

    pub(crate) fn set_base_priority(&mut self, priority: u8) {
        self.base_priority = priority;
    }

    pub(crate) fn set_effective_priority(&mut self, priority: u8) {
        debug_assert!(priority >= self.base_priority);
        self.priority = priority;
    }

    pub(crate) fn add_lock(&mut self, lock: LockId) {
        debug_assert!(!self.locks_held.contains(&lock));
        self.locks_held.push(lock);
    }

    pub(crate) fn remove_lock(&mut self, lock: LockId) -> bool {
        match self.locks_held.iter().position(|&held| held == lock) {
            Some(pos) => {
                self.locks_held.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_recent_cpu(&mut self, value: FixedPoint) {
        self.recent_cpu = value;
    }

    pub(crate) fn set_nice(&mut self, nice: i8) {
        self.nice = nice;
    }

    pub(crate) fn take_stack(&mut self) -> Option<ThreadStack> {
        self.stack.take()
    }

    #[cfg(test)]
    pub(crate) fn smash_magic(&mut self) {
        self.magic = 0;
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("location", &self.location)
            .field("base_priority", &self.base_priority)
            .field("priority", &self.priority)
            .field("locks_held", &self.locks_held)
            .field("recent_cpu", &self.recent_cpu)
            .field("nice", &self.nice)
            .finish()
    }
}

/// Keep at most THREAD_NAME_MAX bytes, cut on a char boundary
fn truncate_name(name: &str) -> String {
    let mut end = name.len().min(THREAD_NAME_MAX);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    String::from(&name[..end])
}

//! Thread registry
//!
//! Owns every live TCB. Thread IDs are handed out in increasing order, so
//! iterating the map visits threads in creation order.

use super::thread::{Thread, ThreadId};
use alloc::collections::BTreeMap;

/// First ID handed out
const FIRST_TID: u64 = 1;

pub struct ThreadRegistry {
    threads: BTreeMap<ThreadId, Thread>,
    next_tid: u64,
}

impl ThreadRegistry {
    pub const fn new() -> Self {
        Self {
            threads: BTreeMap::new(),
            next_tid: FIRST_TID,
        }
    }

    /// Allocate the next thread ID
    pub fn alloc_tid(&mut self) -> ThreadId {
        let tid = ThreadId::from_raw(self.next_tid);
        self.next_tid += 1;
        tid
    }

    pub fn insert(&mut self, thread: Thread) {
        let previous = self.threads.insert(thread.id(), thread);
        debug_assert!(previous.is_none(), "duplicate thread id");
    }

    pub fn remove(&mut self, tid: ThreadId) -> Option<Thread> {
        self.threads.remove(&tid)
    }

    pub fn get(&self, tid: ThreadId) -> Option<&Thread> {
        self.threads.get(&tid)
    }

    pub fn get_mut(&mut self, tid: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(&tid)
    }

    pub fn contains(&self, tid: ThreadId) -> bool {
        self.threads.contains_key(&tid)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Live threads in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.threads.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Thread> {
        self.threads.values_mut()
    }

    /// IDs in creation order
    pub fn ids(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.threads.keys().copied()
    }
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

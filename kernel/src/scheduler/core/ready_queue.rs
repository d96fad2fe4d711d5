//! Ready queue
//!
//! One FIFO per priority level plus a 64-bit occupancy mask, so the
//! highest ready priority is a single `leading_zeros`. Entries carry their
//! arrival sequence: a thread whose priority changes while Ready keeps its
//! place among threads that arrived after it.

use crate::scheduler::thread::{ThreadId, PRI_COUNT};
use alloc::collections::VecDeque;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadyEntry {
    seq: u64,
    tid: ThreadId,
}

pub struct ReadyQueue {
    levels: [VecDeque<ReadyEntry>; PRI_COUNT],
    /// Bit `p` set when level `p` is non-empty
    occupied: u64,
    next_seq: u64,
    len: usize,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            levels: core::array::from_fn(|_| VecDeque::new()),
            occupied: 0,
            next_seq: 0,
            len: 0,
        }
    }

    /// Append `tid` behind every thread of equal priority
    pub fn enqueue(&mut self, tid: ThreadId, priority: u8) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.push_level(priority, ReadyEntry { seq, tid });
    }

    /// Remove and return the earliest thread at the highest priority
    pub fn pop_highest(&mut self) -> Option<ThreadId> {
        let priority = self.highest_priority()?;
        let level = &mut self.levels[priority as usize];
        let entry = level.pop_front()?;
        if level.is_empty() {
            self.occupied &= !(1u64 << priority);
        }
        self.len -= 1;
        Some(entry.tid)
    }

    /// Highest priority with a ready thread
    pub fn highest_priority(&self) -> Option<u8> {
        if self.occupied == 0 {
            None
        } else {
            Some(63 - self.occupied.leading_zeros() as u8)
        }
    }

    /// Move a queued thread from level `from` to level `to`
    ///
    /// Returns false if the thread was not found at `from`.
    pub fn reposition(&mut self, tid: ThreadId, from: u8, to: u8) -> bool {
        if from == to {
            return self.levels[from as usize].iter().any(|e| e.tid == tid);
        }
        match self.take(tid, from) {
            Some(entry) => {
                self.push_level(to, entry);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Queued threads in dispatch order
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.levels.iter().rev().flat_map(|level| level.iter().map(|e| e.tid))
    }

    /// Snapshot in dispatch order
    pub fn to_vec(&self) -> Vec<ThreadId> {
        self.iter().collect()
    }

    fn take(&mut self, tid: ThreadId, priority: u8) -> Option<ReadyEntry> {
        let level = &mut self.levels[priority as usize];
        let pos = level.iter().position(|e| e.tid == tid)?;
        let entry = level.remove(pos)?;
        if level.is_empty() {
            self.occupied &= !(1u64 << priority);
        }
        self.len -= 1;
        Some(entry)
    }

    /// Insert keeping the level sorted by arrival sequence
    fn push_level(&mut self, priority: u8, entry: ReadyEntry) {
        let level = &mut self.levels[priority as usize];
        let pos = level.partition_point(|e| e.seq < entry.seq);
        level.insert(pos, entry);
        self.occupied |= 1u64 << priority;
        self.len += 1;
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

//! Priority donation
//!
//! A thread blocked on a lock lends its effective priority to the holder,
//! and on through every holder the holder itself is blocked behind. The
//! graph is kept as handles: threads record the lock they wait on
//! (`QueueLocation::Waiting`), the lock table records holder and waiters.
//!
//! Effective priority is never accumulated: it is recomputed as
//! `max(base, waiters of every lock held)` whenever a lock changes hands.
//! Under MLFQS none of this runs; the accountant owns priorities.

use super::error::{SchedulerError, SchedulerResult};
use super::scheduler::{check_priority, Scheduler};
use crate::scheduler::switch::ContextSwitch;
use crate::scheduler::thread::{QueueLocation, StackAllocator, ThreadId, ThreadRegistry};
use alloc::vec::Vec;
use core::fmt;
use hashbrown::HashMap;

/// Longest holder chain a single donation walks
pub const MAX_DONATION_DEPTH: usize = 8;

/// Lock handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockId(u32);

impl LockId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of [`Scheduler::lock_acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquire {
    /// The caller now holds the lock
    Acquired,
    /// The caller blocked; it holds the lock when next dispatched
    Blocked,
}

#[derive(Debug, Default)]
struct LockState {
    holder: Option<ThreadId>,
    /// Arrival order
    waiters: Vec<ThreadId>,
}

/// Holder and waiters of every live lock
#[derive(Debug)]
pub(crate) struct LockTable {
    locks: HashMap<LockId, LockState>,
    next_id: u32,
}

impl LockTable {
    pub(crate) fn new() -> Self {
        Self {
            locks: HashMap::new(),
            next_id: 1,
        }
    }

    fn create(&mut self) -> LockId {
        let id = LockId(self.next_id);
        self.next_id += 1;
        self.locks.insert(id, LockState::default());
        id
    }

    fn get(&self, lock: LockId) -> SchedulerResult<&LockState> {
        self.locks
            .get(&lock)
            .ok_or(SchedulerError::LockNotFound { lock_id: lock })
    }

    fn get_mut(&mut self, lock: LockId) -> SchedulerResult<&mut LockState> {
        self.locks
            .get_mut(&lock)
            .ok_or(SchedulerError::LockNotFound { lock_id: lock })
    }

    fn holder(&self, lock: LockId) -> Option<ThreadId> {
        self.locks.get(&lock).and_then(|state| state.holder)
    }

    /// Highest effective priority among the waiters of `lock`
    fn max_waiter_priority(&self, lock: LockId, registry: &ThreadRegistry) -> Option<u8> {
        self.locks
            .get(&lock)?
            .waiters
            .iter()
            .filter_map(|&tid| registry.get(tid))
            .map(|thread| thread.priority())
            .max()
    }

    /// Remove and return the waiter to hand `lock` to
    ///
    /// Highest effective priority wins, earliest arrival on ties.
    fn take_best_waiter(&mut self, lock: LockId, registry: &ThreadRegistry) -> Option<ThreadId> {
        let waiters = &mut self.locks.get_mut(&lock)?.waiters;
        let mut best: Option<(usize, u8)> = None;
        for (index, &tid) in waiters.iter().enumerate() {
            let priority = registry.get(tid).map_or(0, |thread| thread.priority());
            if best.map_or(true, |(_, p)| priority > p) {
                best = Some((index, priority));
            }
        }
        best.map(|(index, _)| waiters.remove(index))
    }
}

impl<C: ContextSwitch, A: StackAllocator> Scheduler<C, A> {
    // ═══════════════════════════════════════════════════════════════
    // Locks
    // ═══════════════════════════════════════════════════════════════

    pub fn lock_create(&mut self) -> LockId {
        self.locks.create()
    }

    /// Forget a lock nobody holds or waits on
    pub fn lock_destroy(&mut self, lock: LockId) -> SchedulerResult<()> {
        let state = self.locks.get(lock)?;
        if state.holder.is_some() || !state.waiters.is_empty() {
            return Err(SchedulerError::LockBusy { lock_id: lock });
        }
        self.locks.locks.remove(&lock);
        Ok(())
    }

    /// Acquire `lock` for the running thread
    ///
    /// If it is held the caller blocks and donates its priority down the
    /// holder chain; ownership is handed over directly on release.
    pub fn lock_acquire(&mut self, lock: LockId) -> SchedulerResult<LockAcquire> {
        crate::sched_assert!(!self.in_interrupt, "lock_acquire from interrupt context");
        let me = self.current;

        let holder = self.locks.get(lock)?.holder;
        let Some(holder) = holder else {
            self.locks.get_mut(lock)?.holder = Some(me);
            self.thread_mut(me).add_lock(lock);
            return Ok(LockAcquire::Acquired);
        };
        crate::sched_assert!(holder != me, "lock acquired twice by its holder");

        self.locks.get_mut(lock)?.waiters.push(me);
        if !self.config.policy.is_mlfqs() {
            let amount = self.thread(me).priority();
            self.donate_chain(holder, amount);
        }
        log::trace!("[SCHED] Thread {} waits on lock {} held by {}", me, lock, holder);

        self.block_current(QueueLocation::Waiting(lock));
        Ok(LockAcquire::Blocked)
    }

    /// Acquire `lock` only if it is free
    pub fn lock_try_acquire(&mut self, lock: LockId) -> SchedulerResult<bool> {
        let me = self.current;
        let state = self.locks.get_mut(lock)?;
        if state.holder.is_some() {
            return Ok(false);
        }
        state.holder = Some(me);
        self.thread_mut(me).add_lock(lock);
        Ok(true)
    }

    /// Release `lock`, handing it to its best waiter
    pub fn lock_release(&mut self, lock: LockId) -> SchedulerResult<()> {
        let me = self.current;
        let holder = self.locks.get(lock)?.holder;
        crate::sched_assert!(holder == Some(me), "lock released by a thread that does not hold it");

        self.hand_off(me, lock);
        if !self.config.policy.is_mlfqs() {
            self.refresh_priority(me);
        }
        self.preempt_if_needed();
        Ok(())
    }

    pub fn lock_holder(&self, lock: LockId) -> Option<ThreadId> {
        self.locks.holder(lock)
    }

    /// Waiters of `lock` in arrival order
    pub fn lock_waiters(&self, lock: LockId) -> SchedulerResult<Vec<ThreadId>> {
        Ok(self.locks.get(lock)?.waiters.clone())
    }

    /// Release every lock held by a dying thread
    pub(crate) fn release_all_locks(&mut self, tid: ThreadId) {
        let held: Vec<_> = self.thread(tid).locks_held().to_vec();
        for lock in held {
            self.hand_off(tid, lock);
        }
    }

    /// Pass `lock` from `owner` to its best waiter, or leave it free
    fn hand_off(&mut self, owner: ThreadId, lock: LockId) {
        self.thread_mut(owner).remove_lock(lock);

        let next = self.locks.take_best_waiter(lock, &self.registry);
        if let Ok(state) = self.locks.get_mut(lock) {
            state.holder = next;
        }

        if let Some(waiter) = next {
            self.thread_mut(waiter).add_lock(lock);
            // Waiters left behind now donate to the new holder
            if !self.config.policy.is_mlfqs() {
                self.refresh_priority(waiter);
            }
            self.make_ready(waiter);
            log::trace!("[SCHED] Lock {} handed from {} to {}", lock, owner, waiter);
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Donation
    // ═══════════════════════════════════════════════════════════════

    /// Raise `tid` to at least `amount`, following the holder chain
    ///
    /// No effect under MLFQS. A donation not backed by a lock waiter lasts
    /// until the thread's priority is next recomputed.
    pub fn donate_priority(&mut self, tid: ThreadId, amount: u8) -> SchedulerResult<()> {
        check_priority(amount)?;
        if !self.registry.contains(tid) {
            return Err(SchedulerError::ThreadNotFound { thread_id: tid });
        }
        if self.config.policy.is_mlfqs() {
            return Ok(());
        }
        self.donate_chain(tid, amount);
        Ok(())
    }

    fn donate_chain(&mut self, start: ThreadId, amount: u8) {
        let mut target = start;
        for _ in 0..MAX_DONATION_DEPTH {
            let thread = self.thread(target);
            if thread.priority() >= amount {
                break;
            }
            let blocked_on = thread.blocked_on();

            self.update_effective_priority(target, amount);
            self.stats.record_donation();

            match blocked_on.and_then(|lock| self.locks.holder(lock)) {
                Some(holder) => target = holder,
                None => break,
            }
        }
    }

    /// Recompute effective priority from base and current waiters
    pub(crate) fn refresh_priority(&mut self, tid: ThreadId) {
        let thread = self.thread(tid);
        let donated = thread
            .locks_held()
            .iter()
            .filter_map(|&lock| self.locks.max_waiter_priority(lock, &self.registry))
            .max();
        let effective = donated.map_or(thread.base_priority(), |d| d.max(thread.base_priority()));
        self.update_effective_priority(tid, effective);
    }

    // ═══════════════════════════════════════════════════════════════
    // Priority
    // ═══════════════════════════════════════════════════════════════

    /// Set the running thread's base priority
    ///
    /// Ignored under MLFQS. Yields if the thread no longer has the highest
    /// priority.
    pub fn set_priority(&mut self, priority: u8) -> SchedulerResult<()> {
        check_priority(priority)?;
        if self.config.policy.is_mlfqs() {
            log::debug!("[SCHED] set_priority({}) ignored under mlfqs", priority);
            return Ok(());
        }

        let me = self.current;
        if self.thread(me).base_priority() == priority {
            return Ok(());
        }
        self.thread_mut(me).set_base_priority(priority);
        self.refresh_priority(me);
        self.preempt_if_needed();
        Ok(())
    }

    /// Effective priority of the running thread
    pub fn get_priority(&self) -> u8 {
        self.current().priority()
    }
}

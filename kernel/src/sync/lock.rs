//! Lock
//!
//! Thin front-end over the scheduler's lock table. Contention blocks the
//! caller and donates its priority to the holder chain.

use crate::scheduler::{
    ContextSwitch, LockAcquire, LockId, Scheduler, SchedulerResult, StackAllocator, ThreadId,
};

#[derive(Debug, PartialEq, Eq)]
pub struct Lock {
    id: LockId,
}

impl Lock {
    pub fn new<C: ContextSwitch, A: StackAllocator>(sched: &mut Scheduler<C, A>) -> Self {
        Self {
            id: sched.lock_create(),
        }
    }

    pub fn id(&self) -> LockId {
        self.id
    }

    /// Acquire, blocking the caller while another thread holds it
    pub fn acquire<C: ContextSwitch, A: StackAllocator>(
        &self,
        sched: &mut Scheduler<C, A>,
    ) -> SchedulerResult<LockAcquire> {
        sched.lock_acquire(self.id)
    }

    pub fn try_acquire<C: ContextSwitch, A: StackAllocator>(
        &self,
        sched: &mut Scheduler<C, A>,
    ) -> SchedulerResult<bool> {
        sched.lock_try_acquire(self.id)
    }

    pub fn release<C: ContextSwitch, A: StackAllocator>(
        &self,
        sched: &mut Scheduler<C, A>,
    ) -> SchedulerResult<()> {
        sched.lock_release(self.id)
    }

    pub fn holder<C: ContextSwitch, A: StackAllocator>(
        &self,
        sched: &Scheduler<C, A>,
    ) -> Option<ThreadId> {
        sched.lock_holder(self.id)
    }

    pub fn held_by_current<C: ContextSwitch, A: StackAllocator>(
        &self,
        sched: &Scheduler<C, A>,
    ) -> bool {
        self.holder(sched) == Some(sched.current_tid())
    }

    /// Remove the lock; fails while held or waited on
    pub fn destroy<C: ContextSwitch, A: StackAllocator>(
        self,
        sched: &mut Scheduler<C, A>,
    ) -> SchedulerResult<()> {
        sched.lock_destroy(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{SchedConfig, SchedulerError};

    #[test]
    fn test_lock_roundtrip() {
        let mut sched = Scheduler::with_config(SchedConfig::new());
        sched.start().unwrap();
        let lock = Lock::new(&mut sched);

        assert_eq!(lock.acquire(&mut sched), Ok(LockAcquire::Acquired));
        assert!(lock.held_by_current(&sched));
        assert_eq!(lock.try_acquire(&mut sched), Ok(false));

        let id = lock.id();
        lock.release(&mut sched).unwrap();
        assert_eq!(lock.holder(&sched), None);
        lock.destroy(&mut sched).unwrap();
        assert_eq!(
            sched.lock_release(id),
            Err(SchedulerError::LockNotFound { lock_id: id })
        );
    }
}

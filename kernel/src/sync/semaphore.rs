//! Counting semaphore
//!
//! `up` hands its unit straight to the best waiter when there is one, so a
//! thread that blocked in `down` owns the unit when it runs again.

use super::wait_queue::WaitQueue;
use crate::scheduler::{ContextSwitch, Scheduler, SchedulerResult, StackAllocator};

#[derive(Debug, Default)]
pub struct Semaphore {
    value: usize,
    waiters: WaitQueue,
}

impl Semaphore {
    pub const fn new(value: usize) -> Self {
        Self {
            value,
            waiters: WaitQueue::new(),
        }
    }

    /// Take one unit
    ///
    /// Returns `true` if a unit was available, `false` if the caller
    /// blocked and will hold the unit once woken.
    pub fn down<C: ContextSwitch, A: StackAllocator>(&mut self, sched: &mut Scheduler<C, A>) -> bool {
        if self.value > 0 {
            self.value -= 1;
            return true;
        }
        self.waiters.wait(sched);
        false
    }

    /// Take one unit without blocking
    pub fn try_down(&mut self) -> bool {
        if self.value > 0 {
            self.value -= 1;
            true
        } else {
            false
        }
    }

    /// Return one unit
    pub fn up<C: ContextSwitch, A: StackAllocator>(
        &mut self,
        sched: &mut Scheduler<C, A>,
    ) -> SchedulerResult<()> {
        if self.waiters.notify_one(sched)?.is_none() {
            self.value += 1;
        }
        Ok(())
    }

    pub fn value(&self) -> usize {
        self.value
    }

    pub fn waiters(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedConfig;

    fn noop(_: usize) {}

    #[test]
    fn test_counting() {
        let mut sched = Scheduler::with_config(SchedConfig::new());
        sched.start().unwrap();
        let mut sema = Semaphore::new(2);

        assert!(sema.down(&mut sched));
        assert!(sema.try_down());
        assert!(!sema.try_down());
        sema.up(&mut sched).unwrap();
        assert_eq!(sema.value(), 1);
    }

    #[test]
    fn test_up_hands_unit_to_waiter() {
        let mut sched = Scheduler::with_config(SchedConfig::new());
        sched.start().unwrap();
        let main = sched.current_tid();
        let mut sema = Semaphore::new(0);

        let t = sched.create("t", 40, noop, 0).unwrap();
        assert!(!sema.down(&mut sched));
        assert_eq!(sched.current_tid(), main);
        assert_eq!(sema.waiters(), 1);

        sema.up(&mut sched).unwrap();
        assert_eq!(sema.value(), 0);
        assert_eq!(sched.current_tid(), t);
    }
}

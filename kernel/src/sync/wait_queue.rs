//! Wait Queue
//!
//! A mechanism for threads to sleep until an event occurs. Threads parked
//! here are plain Blocked threads: they do not donate priority.

use crate::scheduler::{ContextSwitch, Scheduler, SchedulerResult, StackAllocator, ThreadId};
use alloc::vec::Vec;

/// A queue of waiting threads
#[derive(Debug, Default)]
pub struct WaitQueue {
    /// Arrival order
    waiting: Vec<ThreadId>,
}

impl WaitQueue {
    /// Create a new wait queue
    pub const fn new() -> Self {
        Self {
            waiting: Vec::new(),
        }
    }

    /// Block the current thread and add it to the wait queue
    pub fn wait<C: ContextSwitch, A: StackAllocator>(&mut self, sched: &mut Scheduler<C, A>) {
        self.waiting.push(sched.current_tid());
        sched.block();
    }

    /// Wake up the highest-priority waiting thread (earliest on ties)
    pub fn notify_one<C: ContextSwitch, A: StackAllocator>(
        &mut self,
        sched: &mut Scheduler<C, A>,
    ) -> SchedulerResult<Option<ThreadId>> {
        let Some(index) = self.best_waiter(sched) else {
            return Ok(None);
        };
        let tid = self.waiting[index];
        sched.wake(tid)?;
        self.waiting.remove(index);
        sched.preempt_if_needed();
        Ok(Some(tid))
    }

    /// Wake up all waiting threads
    ///
    /// Returns how many were woken.
    pub fn notify_all<C: ContextSwitch, A: StackAllocator>(
        &mut self,
        sched: &mut Scheduler<C, A>,
    ) -> SchedulerResult<usize> {
        let mut woken = 0;
        let mut result = Ok(());
        while let Some(index) = self.best_waiter(sched) {
            result = sched.wake(self.waiting[index]);
            if result.is_err() {
                break;
            }
            self.waiting.remove(index);
            woken += 1;
        }
        // Threads already woken still get their chance to run
        sched.preempt_if_needed();
        result.map(|()| woken)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    fn best_waiter<C: ContextSwitch, A: StackAllocator>(
        &self,
        sched: &Scheduler<C, A>,
    ) -> Option<usize> {
        let mut best: Option<(usize, u8)> = None;
        for (index, &tid) in self.waiting.iter().enumerate() {
            let priority = sched.lookup_by_id(tid).map_or(0, |t| t.priority());
            if best.map_or(true, |(_, p)| priority > p) {
                best = Some((index, priority));
            }
        }
        best.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{SchedConfig, SchedulerError, ThreadState};

    fn noop(_: usize) {}

    fn started() -> Scheduler {
        let mut sched = Scheduler::with_config(SchedConfig::new());
        sched.start().unwrap();
        sched
    }

    #[test]
    fn test_wait_blocks_current() {
        let mut sched = started();
        let mut queue = WaitQueue::new();
        let main = sched.current_tid();
        queue.wait(&mut sched);

        assert_eq!(sched.lookup_by_id(main).unwrap().state(), ThreadState::Blocked);
        assert_eq!(sched.current_tid(), sched.idle_tid().unwrap());
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.notify_one(&mut sched), Ok(Some(main)));
        assert_eq!(sched.current_tid(), main);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_notify_one_highest_priority_first() {
        let mut sched = started();
        let main = sched.current_tid();
        let mut queue = WaitQueue::new();

        let low = sched.create("low", 40, noop, 0).unwrap();
        queue.wait(&mut sched);
        let high = sched.create("high", 50, noop, 0).unwrap();
        queue.wait(&mut sched);
        assert_eq!(sched.current_tid(), main);

        // Both outrank main, so each wake-up switches to the woken thread
        assert_eq!(queue.notify_one(&mut sched), Ok(Some(high)));
        assert_eq!(sched.current_tid(), high);
        assert_eq!(queue.notify_one(&mut sched), Ok(Some(low)));
        assert_eq!(queue.notify_one(&mut sched), Ok(None));
    }

    #[test]
    fn test_notify_all() {
        let mut sched = started();
        let main = sched.current_tid();
        let mut queue = WaitQueue::new();

        let a = sched.create("a", 40, noop, 0).unwrap();
        queue.wait(&mut sched);
        let b = sched.create("b", 45, noop, 0).unwrap();
        queue.wait(&mut sched);

        assert_eq!(queue.notify_all(&mut sched), Ok(2));
        assert_eq!(sched.current_tid(), b);
        assert_eq!(sched.ready_threads(), [a, main]);
    }

    #[test]
    fn test_failed_wakeup_keeps_waiter() {
        let mut sched = started();
        let mut queue = WaitQueue::new();

        let t = sched.create("t", 40, noop, 0).unwrap();
        queue.wait(&mut sched);
        // Woken behind the queue's back: it is Running when notified
        sched.unblock(t).unwrap();
        assert_eq!(sched.current_tid(), t);

        assert!(matches!(
            queue.notify_one(&mut sched),
            Err(SchedulerError::InvalidStateTransition { .. })
        ));
        assert_eq!(queue.len(), 1);
        assert!(queue.notify_all(&mut sched).is_err());
        assert_eq!(queue.len(), 1);

        // Once it really waits again the entry is still usable
        sched.block();
        assert_eq!(queue.notify_one(&mut sched), Ok(Some(t)));
        assert!(queue.is_empty());
    }
}

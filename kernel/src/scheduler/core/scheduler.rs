//! Scheduler Core - Priority dispatch on a single CPU
//!
//! The whole scheduler state lives in one [`Scheduler`] value. Every
//! mutating operation takes `&mut self`; the kernel reaches it through a
//! [`SchedulerHandle`](super::SchedulerHandle), which masks interrupts and
//! holds the lock for the duration of each call, so the pick of the next
//! thread and the switch itself happen in one critical section.
//!
//! # Dispatch
//! - Highest effective priority first, FIFO among equals
//! - Empty ready queue falls back to the idle thread
//! - A switch requested from interrupt context is deferred to interrupt
//!   return (`on_interrupt_return`)
//!
//! `switch_to` returns once the outgoing thread is switched back in. With
//! the host [`RecordingSwitch`] it returns immediately and the scheduler
//! simply carries on as the incoming thread.

use super::donation::LockTable;
use super::error::{SchedulerError, SchedulerResult};
use super::mlfqs;
use super::ready_queue::ReadyQueue;
use super::statistics::{SchedulerStats, StatsSnapshot};
use crate::scheduler::config::SchedConfig;
use crate::scheduler::fixed_point::FixedPoint;
use crate::scheduler::switch::{ContextSwitch, RecordingSwitch};
use crate::scheduler::thread::{
    PageStackAllocator, QueueLocation, StackAllocator, Thread, ThreadEntry, ThreadFunc, ThreadId,
    ThreadRegistry, ThreadState, NICE_DEFAULT, PRI_DEFAULT, PRI_MAX, PRI_MIN,
};
use alloc::vec::Vec;

/// Name of the thread that was running when the scheduler took over
pub const MAIN_THREAD_NAME: &str = "main";

/// Scheduler state
pub struct Scheduler<C: ContextSwitch = RecordingSwitch, A: StackAllocator = PageStackAllocator> {
    pub(crate) config: SchedConfig,
    pub(crate) registry: ThreadRegistry,
    pub(crate) ready: ReadyQueue,
    pub(crate) locks: LockTable,

    /// Running thread
    pub(crate) current: ThreadId,

    /// Reserved idle thread, set by `start`
    pub(crate) idle: Option<ThreadId>,

    pub(crate) switcher: C,
    pub(crate) stacks: A,
    pub(crate) stats: SchedulerStats,

    /// Timer ticks since boot
    pub(crate) ticks: u64,

    /// Ticks since the running thread was dispatched
    pub(crate) slice_ticks: u32,

    /// System load average (MLFQS)
    pub(crate) load_avg: FixedPoint,

    /// Inside `tick` or `run_in_interrupt`
    pub(crate) in_interrupt: bool,

    /// Yield requested for interrupt return
    pub(crate) yield_on_return: bool,
}

impl Scheduler {
    /// Scheduler with the recording context switch and heap-backed stacks
    pub fn with_config(config: SchedConfig) -> Self {
        let config = config.validated();
        Self::new(config, RecordingSwitch::new(), PageStackAllocator::new(config.max_threads))
    }
}

impl<C: ContextSwitch, A: StackAllocator> Scheduler<C, A> {
    /// Take over the running context as the `main` thread
    ///
    /// The idle thread does not exist until [`start`](Self::start).
    pub fn new(config: SchedConfig, switcher: C, stacks: A) -> Self {
        let config = config.validated();
        let mut registry = ThreadRegistry::new();
        let tid = registry.alloc_tid();

        let priority = if config.policy.is_mlfqs() {
            mlfqs::compute_priority(FixedPoint::ZERO, NICE_DEFAULT)
        } else {
            PRI_DEFAULT
        };
        let mut main = Thread::new(tid, MAIN_THREAD_NAME, priority, None, None);
        main.transition(ThreadState::Running, QueueLocation::NotQueued);
        registry.insert(main);

        let stats = SchedulerStats::new();
        stats.record_created();

        log::info!(
            "[SCHED] Initialized: policy={} timer_freq={}Hz time_slice={} max_threads={}",
            config.policy,
            config.timer_freq,
            config.time_slice,
            config.max_threads
        );

        Self {
            config,
            registry,
            ready: ReadyQueue::new(),
            locks: LockTable::new(),
            current: tid,
            idle: None,
            switcher,
            stacks,
            stats,
            ticks: 0,
            slice_ticks: 0,
            load_avg: FixedPoint::ZERO,
            in_interrupt: false,
            yield_on_return: false,
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Thread lifecycle
    // ═══════════════════════════════════════════════════════════════

    /// Create a kernel thread running `func(arg)`
    ///
    /// The new thread is Ready; if it outranks the caller it runs before
    /// this returns.
    pub fn create(
        &mut self,
        name: &str,
        priority: u8,
        func: ThreadFunc,
        arg: usize,
    ) -> SchedulerResult<ThreadId> {
        check_priority(priority)?;

        let live_threads = self.registry.len();
        if live_threads >= self.config.max_threads {
            log::warn!("[SCHED] create '{}': thread limit reached ({})", name, live_threads);
            return Err(SchedulerError::ResourceExhausted { live_threads });
        }
        let Some(stack) = self.stacks.allocate() else {
            log::warn!("[SCHED] create '{}': no stack page available", name);
            return Err(SchedulerError::ResourceExhausted { live_threads });
        };

        let tid = self.registry.alloc_tid();
        let priority = if self.config.policy.is_mlfqs() {
            mlfqs::compute_priority(FixedPoint::ZERO, NICE_DEFAULT)
        } else {
            priority
        };
        let entry = ThreadEntry { func, arg };
        self.switcher.init_context(tid, &stack, entry);
        self.registry.insert(Thread::new(tid, name, priority, Some(stack), Some(entry)));
        self.stats.record_created();

        log::debug!("[SCHED] Created thread {} '{}' (priority {})", tid, name, priority);

        self.make_ready(tid);
        self.preempt_if_needed();
        Ok(tid)
    }

    /// Put the running thread to sleep until [`unblock`](Self::unblock)
    pub fn block(&mut self) {
        crate::sched_assert!(!self.in_interrupt, "block() called from interrupt context");
        self.block_current(QueueLocation::NotQueued);
    }

    /// Make a blocked thread Ready
    ///
    /// Threads waiting on a scheduler lock are woken by its release only.
    pub fn unblock(&mut self, tid: ThreadId) -> SchedulerResult<()> {
        self.wake(tid)?;
        self.preempt_if_needed();
        Ok(())
    }

    /// [`unblock`](Self::unblock) without the preemption check
    ///
    /// For wait queues that wake several threads and check once at the end.
    pub fn wake(&mut self, tid: ThreadId) -> SchedulerResult<()> {
        let thread = self
            .registry
            .get(tid)
            .ok_or(SchedulerError::ThreadNotFound { thread_id: tid })?;

        let parked = thread.state() == ThreadState::Blocked
            && thread.location() == QueueLocation::NotQueued
            && !self.is_idle(tid);
        if !parked {
            return Err(SchedulerError::InvalidStateTransition {
                thread_id: tid,
                from: thread.state(),
                to: ThreadState::Ready,
            });
        }

        self.make_ready(tid);
        Ok(())
    }

    /// Give up the CPU; the caller stays Ready behind its equals
    pub fn yield_current(&mut self) {
        crate::sched_assert!(!self.in_interrupt, "yield from interrupt context");
        self.stats.record_yield();
        self.requeue_current();
    }

    /// Terminate the running thread
    ///
    /// Locks still held are released first. The thread is reclaimed once
    /// the switch away from it completes.
    pub fn exit(&mut self) {
        crate::sched_assert!(!self.in_interrupt, "exit from interrupt context");
        let tid = self.current;
        crate::sched_assert!(!self.is_idle(tid), "idle thread exited");

        self.release_all_locks(tid);
        self.thread_mut(tid).transition(ThreadState::Dying, QueueLocation::NotQueued);
        log::debug!("[SCHED] Thread {} exiting", tid);
        self.schedule();
    }

    // ═══════════════════════════════════════════════════════════════
    // Registry access
    // ═══════════════════════════════════════════════════════════════

    /// Running thread
    ///
    /// Halts the kernel if the thread's stack has overflowed into its TCB.
    pub fn current(&self) -> &Thread {
        let thread = self.thread(self.current);
        if !thread.is_magic_intact() {
            crate::sched_fatal!(SchedulerError::CorruptionDetected {
                thread_id: thread.id(),
                magic: thread.magic(),
            });
        }
        crate::sched_assert!(
            thread.state() == ThreadState::Running,
            "current thread is not Running"
        );
        thread
    }

    pub fn current_tid(&self) -> ThreadId {
        self.current().id()
    }

    pub fn current_name(&self) -> &str {
        self.current().name()
    }

    pub fn lookup_by_id(&self, tid: ThreadId) -> Option<&Thread> {
        self.registry.get(tid)
    }

    /// Visit every live thread in creation order
    pub fn for_each<F: FnMut(&Thread)>(&self, mut visitor: F) {
        for thread in self.registry.iter() {
            visitor(thread);
        }
    }

    /// Live threads, including main and idle
    pub fn thread_count(&self) -> usize {
        self.registry.len()
    }

    pub fn idle_tid(&self) -> Option<ThreadId> {
        self.idle
    }

    /// Ready threads in dispatch order
    pub fn ready_threads(&self) -> Vec<ThreadId> {
        self.ready.to_vec()
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    pub fn switcher(&self) -> &C {
        &self.switcher
    }

    pub fn stacks(&self) -> &A {
        &self.stacks
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Log tick and switch counters
    pub fn print_stats(&self) {
        let stats = self.stats.snapshot();
        log::info!(
            "[SCHED] Thread: {} idle ticks, {} kernel ticks, {}% busy",
            stats.idle_ticks,
            stats.kernel_ticks,
            self.stats.cpu_utilization()
        );
        log::info!(
            "[SCHED] {} switches ({} preemptions, {} yields), {} created, {} reclaimed",
            stats.total_switches,
            stats.preemptions,
            stats.yields,
            stats.total_threads,
            stats.total_destroyed
        );
    }

    // ═══════════════════════════════════════════════════════════════
    // Preemption and the timer
    // ═══════════════════════════════════════════════════════════════

    /// Switch away if a Ready thread outranks the running one
    ///
    /// In interrupt context the switch is deferred to interrupt return.
    pub fn preempt_if_needed(&mut self) {
        if !self.should_preempt() {
            return;
        }
        if self.in_interrupt {
            self.yield_on_return = true;
        } else {
            self.stats.record_preemption();
            self.requeue_current();
        }
    }

    /// Run the highest-priority Ready thread if it outranks the caller
    ///
    /// Never call from interrupt context.
    pub fn swap_to_highest_priority(&mut self) {
        crate::sched_assert!(!self.in_interrupt, "swap from interrupt context");
        self.preempt_if_needed();
    }

    /// Timer interrupt
    ///
    /// Never switches: a rotation or preemption is recorded and carried out
    /// by [`on_interrupt_return`](Self::on_interrupt_return).
    pub fn tick(&mut self) {
        self.run_in_interrupt(|sched| {
            let idle = sched.is_idle(sched.current);
            sched.stats.record_tick(idle);
            sched.ticks += 1;

            if sched.config.policy.is_mlfqs() {
                sched.mlfqs_tick();
            }

            sched.slice_ticks += 1;
            if !idle && sched.slice_ticks >= sched.config.time_slice {
                sched.yield_on_return = true;
            }

            sched.preempt_if_needed();
        });
    }

    /// Run `f` as an interrupt handler would
    pub fn run_in_interrupt<R, F: FnOnce(&mut Self) -> R>(&mut self, f: F) -> R {
        let outer = core::mem::replace(&mut self.in_interrupt, true);
        let result = f(self);
        self.in_interrupt = outer;
        result
    }

    /// Carry out a yield deferred by interrupt context
    ///
    /// Returns whether the running thread was rotated out.
    pub fn on_interrupt_return(&mut self) -> bool {
        if self.in_interrupt || !core::mem::take(&mut self.yield_on_return) {
            return false;
        }
        self.stats.record_preemption();
        self.requeue_current();
        true
    }

    /// A yield is pending for interrupt return
    pub fn yield_pending(&self) -> bool {
        self.yield_on_return
    }

    pub fn in_interrupt(&self) -> bool {
        self.in_interrupt
    }

    // ═══════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════

    pub(crate) fn is_idle(&self, tid: ThreadId) -> bool {
        self.idle == Some(tid)
    }

    pub(crate) fn thread(&self, tid: ThreadId) -> &Thread {
        match self.registry.get(tid) {
            Some(thread) => thread,
            None => crate::sched_fatal!(SchedulerError::InternalError {
                reason: "dangling thread id"
            }),
        }
    }

    pub(crate) fn thread_mut(&mut self, tid: ThreadId) -> &mut Thread {
        match self.registry.get_mut(tid) {
            Some(thread) => thread,
            None => crate::sched_fatal!(SchedulerError::InternalError {
                reason: "dangling thread id"
            }),
        }
    }

    /// Mark `tid` Ready and queue it behind its equals
    pub(crate) fn make_ready(&mut self, tid: ThreadId) {
        let thread = self.thread_mut(tid);
        thread.transition(ThreadState::Ready, QueueLocation::Ready);
        let priority = thread.priority();
        self.ready.enqueue(tid, priority);
    }

    /// Change a thread's effective priority, re-sorting it if Ready
    pub(crate) fn update_effective_priority(&mut self, tid: ThreadId, priority: u8) {
        let thread = self.thread_mut(tid);
        let old = thread.priority();
        if old == priority {
            return;
        }
        thread.set_effective_priority(priority);
        if thread.state() == ThreadState::Ready {
            let moved = self.ready.reposition(tid, old, priority);
            debug_assert!(moved, "ready thread missing from its level");
        }
    }

    /// Block the running thread at `location` and dispatch
    pub(crate) fn block_current(&mut self, location: QueueLocation) {
        let tid = self.current;
        self.thread_mut(tid).transition(ThreadState::Blocked, location);
        self.schedule();
    }

    /// Rotate the running thread out; the idle thread is parked instead
    fn requeue_current(&mut self) {
        let tid = self.current;
        if self.is_idle(tid) {
            self.thread_mut(tid).transition(ThreadState::Blocked, QueueLocation::NotQueued);
        } else {
            self.make_ready(tid);
        }
        self.schedule();
    }

    fn should_preempt(&self) -> bool {
        match self.ready.highest_priority() {
            Some(max) => self.is_idle(self.current) || max > self.thread(self.current).priority(),
            None => false,
        }
    }

    /// Dispatch the head of the ready queue
    ///
    /// The caller has already moved the running thread out of Running.
    fn schedule(&mut self) {
        let prev = self.current;
        debug_assert_ne!(self.thread(prev).state(), ThreadState::Running);

        let next = match self.ready.pop_highest().or(self.idle) {
            Some(next) => next,
            None => crate::sched_fatal!(SchedulerError::InternalError {
                reason: "no runnable thread and no idle thread"
            }),
        };

        if next != prev {
            log::trace!("[SCHED] switch {} -> {}", prev, next);
            self.stats.record_switch();
            self.switcher.switch_to(prev, next);
        }
        self.schedule_tail(prev, next);
    }

    /// Finish a switch as `next`
    fn schedule_tail(&mut self, prev: ThreadId, next: ThreadId) {
        self.thread_mut(next).transition(ThreadState::Running, QueueLocation::NotQueued);
        self.current = next;
        self.slice_ticks = 0;
        // A rotation requested for the previous thread is void
        self.yield_on_return = false;

        if prev != next && self.thread(prev).state() == ThreadState::Dying {
            self.reclaim(prev);
        }
    }

    /// Drop a dead thread once nothing runs on its stack
    fn reclaim(&mut self, tid: ThreadId) {
        crate::sched_assert!(tid != self.current, "reclaiming the running thread");
        if let Some(mut thread) = self.registry.remove(tid) {
            if let Some(stack) = thread.take_stack() {
                self.stacks.free(stack);
            }
            self.stats.record_destroyed();
            log::debug!("[SCHED] Reclaimed thread {} '{}'", tid, thread.name());
        }
    }
}

/// Reject priorities outside [PRI_MIN, PRI_MAX]
pub(crate) fn check_priority(priority: u8) -> SchedulerResult<()> {
    if (PRI_MIN..=PRI_MAX).contains(&priority) {
        Ok(())
    } else {
        Err(SchedulerError::InvalidPriority {
            value: i32::from(priority),
            min: i32::from(PRI_MIN),
            max: i32::from(PRI_MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: usize) {}

    fn started(config: SchedConfig) -> Scheduler {
        let mut sched = Scheduler::with_config(config);
        sched.start().unwrap();
        sched
    }

    #[test]
    fn test_main_thread_takes_over() {
        let sched = Scheduler::with_config(SchedConfig::new());
        assert_eq!(sched.current_name(), MAIN_THREAD_NAME);
        assert_eq!(sched.current().priority(), PRI_DEFAULT);
        assert_eq!(sched.thread_count(), 1);
        assert!(sched.idle_tid().is_none());
    }

    #[test]
    fn test_lower_priority_create_does_not_preempt() {
        let mut sched = started(SchedConfig::new());
        let main = sched.current_tid();
        let t = sched.create("low", 10, noop, 0).unwrap();
        assert_eq!(sched.current_tid(), main);
        assert_eq!(sched.lookup_by_id(t).unwrap().state(), ThreadState::Ready);
        assert_eq!(sched.ready_threads(), [t]);
    }

    #[test]
    fn test_higher_priority_create_preempts() {
        let mut sched = started(SchedConfig::new());
        let main = sched.current_tid();
        let t = sched.create("high", 40, noop, 7).unwrap();
        assert_eq!(sched.current_tid(), t);
        assert_eq!(sched.switcher().last_switch(), Some((main, t)));
        assert_eq!(sched.lookup_by_id(main).unwrap().state(), ThreadState::Ready);
        assert_eq!(sched.lookup_by_id(t).unwrap().entry().unwrap().arg, 7);
    }

    #[test]
    fn test_invalid_priority() {
        let mut sched = started(SchedConfig::new());
        assert_eq!(
            sched.create("bad", 64, noop, 0),
            Err(SchedulerError::InvalidPriority { value: 64, min: 0, max: 63 })
        );
    }

    #[test]
    fn test_stack_exhaustion() {
        let mut sched = Scheduler::new(
            SchedConfig::new(),
            RecordingSwitch::new(),
            PageStackAllocator::new(2),
        );
        sched.start().unwrap();
        sched.create("a", 1, noop, 0).unwrap();
        assert_eq!(
            sched.create("b", 1, noop, 0),
            Err(SchedulerError::ResourceExhausted { live_threads: 3 })
        );
    }

    #[test]
    fn test_idle_runs_when_nothing_ready() {
        let mut sched = started(SchedConfig::new());
        let idle = sched.idle_tid().unwrap();
        let main = sched.current_tid();
        sched.block();
        assert_eq!(sched.current_tid(), idle);

        // Any ready thread beats idle, even at PRI_MIN
        sched.unblock(main).unwrap();
        assert_eq!(sched.current_tid(), main);
        assert_eq!(sched.lookup_by_id(idle).unwrap().state(), ThreadState::Blocked);
    }

    #[test]
    fn test_unblock_rejects_non_blocked() {
        let mut sched = started(SchedConfig::new());
        let main = sched.current_tid();
        let idle = sched.idle_tid().unwrap();
        assert!(matches!(
            sched.unblock(main),
            Err(SchedulerError::InvalidStateTransition { from: ThreadState::Running, .. })
        ));
        assert!(sched.unblock(idle).is_err());
        assert_eq!(
            sched.unblock(ThreadId::from_raw(999)),
            Err(SchedulerError::ThreadNotFound { thread_id: ThreadId::from_raw(999) })
        );
    }

    #[test]
    fn test_exit_reclaims_stack() {
        let mut sched = started(SchedConfig::new());
        let t = sched.create("worker", 40, noop, 0).unwrap();
        assert_eq!(sched.stacks().in_use(), 2);

        sched.exit();
        assert!(sched.lookup_by_id(t).is_none());
        assert_eq!(sched.stacks().in_use(), 1);
        assert_eq!(sched.current_name(), MAIN_THREAD_NAME);
        assert_eq!(sched.stats().total_destroyed, 1);
    }

    #[test]
    fn test_time_slice_rotation() {
        let mut sched = started(SchedConfig::new());
        let main = sched.current_tid();
        let peer = sched.create("peer", PRI_DEFAULT, noop, 0).unwrap();

        for _ in 0..3 {
            sched.tick();
            assert!(!sched.on_interrupt_return());
        }
        sched.tick();
        assert!(sched.yield_pending());
        assert_eq!(sched.current_tid(), main);
        assert!(sched.on_interrupt_return());
        assert_eq!(sched.current_tid(), peer);
        assert_eq!(sched.ready_threads(), [main]);
    }

    #[test]
    fn test_dispatch_clears_stale_rotation() {
        let mut sched = started(SchedConfig::new());
        let main = sched.current_tid();
        let peer = sched.create("peer", PRI_DEFAULT, noop, 0).unwrap();

        // Slice expires but the interrupt return path never runs
        for _ in 0..4 {
            sched.tick();
        }
        assert!(sched.yield_pending());

        sched.yield_current();
        assert_eq!(sched.current_tid(), peer);
        assert!(!sched.yield_pending());

        // A later unrelated interrupt return must not rotate peer out
        assert!(!sched.on_interrupt_return());
        assert_eq!(sched.current_tid(), peer);
        assert_eq!(sched.ready_threads(), [main]);
    }

    #[test]
    fn test_hand_built_config_is_repaired() {
        let config = SchedConfig {
            timer_freq: 0,
            time_slice: 0,
            ..SchedConfig::mlfqs()
        };
        let mut sched = started(config);
        assert_eq!(sched.config().timer_freq, 100);
        assert_eq!(sched.config().time_slice, 4);

        for _ in 0..100 {
            sched.tick();
            sched.on_interrupt_return();
        }
        assert_eq!(sched.get_load_avg(), 2);
    }

    #[test]
    fn test_unblock_from_interrupt_defers_switch() {
        let mut sched = started(SchedConfig::new());
        let main = sched.current_tid();
        let t = sched.create("waker", 50, noop, 0).unwrap();
        sched.block();
        assert_eq!(sched.current_tid(), main);

        sched.run_in_interrupt(|s| s.unblock(t)).unwrap();
        assert_eq!(sched.current_tid(), main);
        assert!(sched.yield_pending());
        assert!(sched.on_interrupt_return());
        assert_eq!(sched.current_tid(), t);
    }

    #[test]
    fn test_for_each_in_creation_order() {
        let mut sched = started(SchedConfig::new());
        sched.create("a", 1, noop, 0).unwrap();
        sched.create("b", 2, noop, 0).unwrap();
        let mut names = Vec::new();
        sched.for_each(|t| names.push(String::from(t.name())));
        assert_eq!(names, ["main", "idle", "a", "b"]);
    }

    #[test]
    fn test_tick_accounting() {
        let mut sched = started(SchedConfig::new());
        sched.tick();
        sched.block();
        sched.tick();
        sched.tick();
        let stats = sched.stats();
        assert_eq!(stats.kernel_ticks, 1);
        assert_eq!(stats.idle_ticks, 2);
        assert_eq!(sched.ticks(), 3);
    }

    #[test]
    #[should_panic(expected = "corrupted")]
    fn test_magic_corruption_is_fatal() {
        let mut sched = started(SchedConfig::new());
        let main = sched.current;
        sched.registry.get_mut(main).unwrap().smash_magic();
        let _ = sched.current();
    }
}

//! Idle Thread Implementation
//!
//! The idle thread runs only when no other thread is Ready. It is never
//! put in the ready queue: the dispatcher falls back to it, and any Ready
//! thread preempts it regardless of priority.
//!
//! # Design
//! - Single CPU, single idle thread
//! - Lowest priority, excluded from MLFQS accounting
//! - Halts until the next interrupt

use crate::scheduler::core::{Scheduler, SchedulerError, SchedulerResult};
use crate::scheduler::switch::ContextSwitch;
use crate::scheduler::thread::{
    QueueLocation, StackAllocator, Thread, ThreadEntry, ThreadId, ThreadState, PRI_MIN,
};

/// Idle thread name
pub const IDLE_THREAD_NAME: &str = "idle";

/// Idle thread entry point
///
/// Each time it is switched in, the thread halts until an interrupt; the
/// interrupt return path dispatches whatever became Ready.
pub fn idle_entry(_arg: usize) {
    loop {
        halt();
    }
}

/// Enter low-power idle state until the next interrupt
#[inline]
pub fn halt() {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    unsafe {
        core::arch::asm!(
            "sti", // Ensure interrupts enabled
            "hlt", // Halt
            options(nomem, nostack)
        );
    }

    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    core::hint::spin_loop();
}

impl<C: ContextSwitch, A: StackAllocator> Scheduler<C, A> {
    /// Create the idle thread; preemptive scheduling starts here
    ///
    /// Calling it again returns the existing idle thread.
    pub fn start(&mut self) -> SchedulerResult<ThreadId> {
        if let Some(idle) = self.idle {
            log::warn!("[SCHED] start() called twice");
            return Ok(idle);
        }

        let Some(stack) = self.stacks.allocate() else {
            return Err(SchedulerError::ResourceExhausted {
                live_threads: self.registry.len(),
            });
        };

        let tid = self.registry.alloc_tid();
        let entry = ThreadEntry {
            func: idle_entry,
            arg: 0,
        };
        self.switcher.init_context(tid, &stack, entry);

        let mut idle = Thread::new(tid, IDLE_THREAD_NAME, PRI_MIN, Some(stack), Some(entry));
        // Idle runs once at start-up and parks itself before anything else
        // is dispatched
        idle.transition(ThreadState::Running, QueueLocation::NotQueued);
        idle.transition(ThreadState::Blocked, QueueLocation::NotQueued);

        self.registry.insert(idle);
        self.stats.record_created();
        self.idle = Some(tid);

        log::info!("[SCHED] Idle thread {} ready, scheduler started", tid);
        Ok(tid)
    }
}

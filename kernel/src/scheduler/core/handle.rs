//! Kernel-facing scheduler handle
//!
//! Serialises access to the [`Scheduler`] on a single CPU: interrupts are
//! masked first, then the spinlock is taken, so the timer can never find
//! the scheduler half-updated. Both are released in reverse order when the
//! closure returns.
//!
//! A thread switched out from inside [`SchedulerHandle::with`] releases both
//! when it is switched back in and its frame unwinds. A brand-new thread has
//! no such frame: it starts at its entry point with the lock still held by
//! the thread that switched to it and interrupts masked. The arch entry
//! trampoline prepared by `ContextSwitch::init_context` must therefore call
//! [`SchedulerHandle::thread_entry_tail`] before running the thread body.

use super::scheduler::Scheduler;
use crate::scheduler::switch::{ContextSwitch, InterruptControl, InterruptGuard, RecordingSwitch};
use crate::scheduler::thread::{PageStackAllocator, StackAllocator};
use spin::Mutex;

pub struct SchedulerHandle<
    I: InterruptControl,
    C: ContextSwitch = RecordingSwitch,
    A: StackAllocator = PageStackAllocator,
> {
    irq: I,
    inner: Mutex<Scheduler<C, A>>,
}

impl<I: InterruptControl, C: ContextSwitch, A: StackAllocator> SchedulerHandle<I, C, A> {
    pub fn new(scheduler: Scheduler<C, A>, irq: I) -> Self {
        Self {
            irq,
            inner: Mutex::new(scheduler),
        }
    }

    /// Run `f` with interrupts masked and the scheduler locked
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scheduler<C, A>) -> R,
    {
        let _guard = InterruptGuard::new(&self.irq);
        let mut scheduler = self.inner.lock();
        f(&mut scheduler)
    }

    /// Timer interrupt: account the tick, then rotate or preempt on the
    /// way out if it asked for it
    ///
    /// Returns whether a switch happened.
    pub fn timer_interrupt(&self) -> bool {
        self.with(|sched| {
            sched.tick();
            sched.on_interrupt_return()
        })
    }

    /// Run an interrupt handler body, then honour any yield it requested
    pub fn interrupt<F, R>(&self, f: F) -> (R, bool)
    where
        F: FnOnce(&mut Scheduler<C, A>) -> R,
    {
        self.with(|sched| {
            let result = sched.run_in_interrupt(f);
            let switched = sched.on_interrupt_return();
            (result, switched)
        })
    }

    /// First code a new thread runs, before its body
    ///
    /// Releases the scheduler lock taken by the thread that switched to us
    /// and enables interrupts.
    ///
    /// # Safety
    /// Only call from a thread's entry trampoline, on its first run, while
    /// the lock is held by the `with` frame of the thread it was switched in
    /// from. Calling it anywhere else unlocks a lock someone else relies on.
    pub unsafe fn thread_entry_tail(&self) {
        debug_assert!(self.inner.is_locked(), "entry tail without the scheduler lock");
        // SAFETY: the caller guarantees the lock is held on our behalf by a
        // frame that will not touch it until this thread switches back
        unsafe { self.inner.force_unlock() };
        self.irq.restore(true);
    }

    pub fn interrupt_control(&self) -> &I {
        &self.irq
    }

    pub fn into_inner(self) -> Scheduler<C, A> {
        self.inner.into_inner()
    }
}

//! Context switch and interrupt-masking collaborators
//!
//! The register save/restore and the interrupt flag live in arch code. The
//! scheduler only needs the narrow contracts below.

use crate::scheduler::thread::{ThreadEntry, ThreadId, ThreadStack};
use alloc::vec::Vec;

/// Low-level context switch
pub trait ContextSwitch {
    /// Prepare the initial frame of a new thread on its stack
    ///
    /// The frame must enter a trampoline that calls
    /// [`SchedulerHandle::thread_entry_tail`](crate::scheduler::SchedulerHandle::thread_entry_tail)
    /// and then `entry.func(entry.arg)`.
    fn init_context(&mut self, tid: ThreadId, stack: &ThreadStack, entry: ThreadEntry);

    /// Switch from `prev` to `next`; returns when `prev` is switched back in
    ///
    /// Only called with interrupts masked.
    fn switch_to(&mut self, prev: ThreadId, next: ThreadId);
}

/// Interrupt flag control
pub trait InterruptControl {
    /// Mask interrupts, returning whether they were enabled
    fn disable(&self) -> bool;

    /// Restore the state returned by `disable`
    fn restore(&self, was_enabled: bool);
}

/// Masks interrupts for its lifetime
pub struct InterruptGuard<'a, I: InterruptControl + ?Sized> {
    irq: &'a I,
    was_enabled: bool,
}

impl<'a, I: InterruptControl + ?Sized> InterruptGuard<'a, I> {
    pub fn new(irq: &'a I) -> Self {
        let was_enabled = irq.disable();
        Self { irq, was_enabled }
    }

    /// Interrupt state before the guard was taken
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl<I: InterruptControl + ?Sized> Drop for InterruptGuard<'_, I> {
    fn drop(&mut self) {
        self.irq.restore(self.was_enabled);
    }
}

/// Context switch that only records what it was asked to do
///
/// Used by host builds, where threads are simulated: after `switch_to`
/// returns, the scheduler simply continues as `next`.
#[derive(Debug, Default)]
pub struct RecordingSwitch {
    prepared: Vec<ThreadId>,
    switches: Vec<(ThreadId, ThreadId)>,
}

impl RecordingSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Threads whose initial context was prepared
    pub fn prepared(&self) -> &[ThreadId] {
        &self.prepared
    }

    /// Every `(prev, next)` switch, oldest first
    pub fn switches(&self) -> &[(ThreadId, ThreadId)] {
        &self.switches
    }

    pub fn last_switch(&self) -> Option<(ThreadId, ThreadId)> {
        self.switches.last().copied()
    }
}

impl ContextSwitch for RecordingSwitch {
    fn init_context(&mut self, tid: ThreadId, _stack: &ThreadStack, _entry: ThreadEntry) {
        self.prepared.push(tid);
    }

    fn switch_to(&mut self, prev: ThreadId, next: ThreadId) {
        self.switches.push((prev, next));
    }
}

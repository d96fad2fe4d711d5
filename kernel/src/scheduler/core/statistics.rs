//! Statistics - Scheduler activity counters
//!
//! Tracks ticks, context switches, preemptions and donations.

use core::sync::atomic::{AtomicU64, Ordering};

/// Scheduler statistics
pub struct SchedulerStats {
    /// Timer ticks spent in the idle thread
    pub idle_ticks: AtomicU64,

    /// Timer ticks spent in kernel threads
    pub kernel_ticks: AtomicU64,

    /// Total context switches
    pub total_switches: AtomicU64,

    /// Total threads created
    pub total_threads: AtomicU64,

    /// Total threads reclaimed
    pub total_destroyed: AtomicU64,

    /// Preemptions (involuntary switches)
    pub preemptions: AtomicU64,

    /// Voluntary yields
    pub yields: AtomicU64,

    /// Priority raises along donation chains
    pub donations: AtomicU64,
}

/// Plain copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub idle_ticks: u64,
    pub kernel_ticks: u64,
    pub total_switches: u64,
    pub total_threads: u64,
    pub total_destroyed: u64,
    pub preemptions: u64,
    pub yields: u64,
    pub donations: u64,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            idle_ticks: AtomicU64::new(0),
            kernel_ticks: AtomicU64::new(0),
            total_switches: AtomicU64::new(0),
            total_threads: AtomicU64::new(0),
            total_destroyed: AtomicU64::new(0),
            preemptions: AtomicU64::new(0),
            yields: AtomicU64::new(0),
            donations: AtomicU64::new(0),
        }
    }

    /// Record a timer tick
    pub fn record_tick(&self, idle: bool) {
        if idle {
            self.idle_ticks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.kernel_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record context switch
    pub fn record_switch(&self) {
        self.total_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_created(&self) {
        self.total_threads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_destroyed(&self) {
        self.total_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record preemption
    pub fn record_preemption(&self) {
        self.preemptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record voluntary yield
    pub fn record_yield(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_donation(&self) {
        self.donations.fetch_add(1, Ordering::Relaxed);
    }

    /// Percentage of ticks spent outside the idle thread
    pub fn cpu_utilization(&self) -> u8 {
        let idle = self.idle_ticks.load(Ordering::Relaxed);
        let busy = self.kernel_ticks.load(Ordering::Relaxed);
        let total = idle + busy;

        if total > 0 {
            ((busy * 100) / total) as u8
        } else {
            0
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
            kernel_ticks: self.kernel_ticks.load(Ordering::Relaxed),
            total_switches: self.total_switches.load(Ordering::Relaxed),
            total_threads: self.total_threads.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            preemptions: self.preemptions.load(Ordering::Relaxed),
            yields: self.yields.load(Ordering::Relaxed),
            donations: self.donations.load(Ordering::Relaxed),
        }
    }
}

impl Default for SchedulerStats {
    fn default() -> Self {
        Self::new()
    }
}

//! BSD multilevel feedback queue accounting (MLFQS)
//!
//! Priorities are derived from two per-thread values and one global one,
//! all in 17.14 fixed point:
//!
//! ```text
//! priority    = PRI_MAX - recent_cpu / 4 - nice * 2          (every 4 ticks)
//! recent_cpu  = (2 * load_avg) / (2 * load_avg + 1) * recent_cpu + nice
//! load_avg    = (59/60) * load_avg + (1/60) * ready_threads  (every second)
//! ```
//!
//! The running thread gains one unit of `recent_cpu` per tick. The idle
//! thread is left out of every computation. Rounding follows the formulas
//! exactly; intermediate results are truncated by [`FixedPoint`].

use super::error::{SchedulerError, SchedulerResult};
use super::scheduler::Scheduler;
use crate::scheduler::fixed_point::FixedPoint;
use crate::scheduler::switch::ContextSwitch;
use crate::scheduler::thread::{StackAllocator, ThreadId, NICE_MAX, NICE_MIN, PRI_MAX, PRI_MIN};
use alloc::vec::Vec;

/// Priorities are recomputed every this many ticks
pub const PRIORITY_RECOMPUTE_TICKS: u64 = 4;

/// `PRI_MAX - recent_cpu / 4 - nice * 2`, truncated and clamped
pub fn compute_priority(recent_cpu: FixedPoint, nice: i8) -> u8 {
    let priority = FixedPoint::from_int(i32::from(PRI_MAX))
        - recent_cpu.div_int(4)
        - FixedPoint::from_int(i32::from(nice) * 2);
    priority
        .to_int_trunc()
        .clamp(i32::from(PRI_MIN), i32::from(PRI_MAX)) as u8
}

/// `(59/60) * load_avg + (1/60) * ready_threads`
pub fn compute_load_avg(load_avg: FixedPoint, ready_threads: usize) -> FixedPoint {
    let decay = FixedPoint::from_int(59).div_fp(FixedPoint::from_int(60));
    let weight = FixedPoint::from_int(1).div_fp(FixedPoint::from_int(60));
    decay.mul_fp(load_avg) + weight.mul_int(ready_threads as i32)
}

/// `(2 * load_avg) / (2 * load_avg + 1) * recent_cpu + nice`
pub fn decay_recent_cpu(recent_cpu: FixedPoint, load_avg: FixedPoint, nice: i8) -> FixedPoint {
    let twice_load = load_avg.mul_int(2);
    let coefficient = twice_load.div_fp(twice_load.add_int(1));
    coefficient.mul_fp(recent_cpu).add_int(i32::from(nice))
}

impl<C: ContextSwitch, A: StackAllocator> Scheduler<C, A> {
    /// Per-tick accounting, called from `tick` in interrupt context
    pub(crate) fn mlfqs_tick(&mut self) {
        let current = self.current;
        let running = !self.is_idle(current);
        if running {
            let thread = self.thread_mut(current);
            let recent_cpu = thread.recent_cpu().add_int(1);
            thread.set_recent_cpu(recent_cpu);
        }

        let second = self.ticks % u64::from(self.config.timer_freq) == 0;
        if second {
            let ready_threads = self.ready.len() + usize::from(running);
            self.load_avg = compute_load_avg(self.load_avg, ready_threads);

            let load_avg = self.load_avg;
            let idle = self.idle;
            for thread in self.registry.iter_mut() {
                if Some(thread.id()) == idle {
                    continue;
                }
                let recent_cpu = decay_recent_cpu(thread.recent_cpu(), load_avg, thread.nice());
                thread.set_recent_cpu(recent_cpu);
            }
            log::trace!("[SCHED] load_avg={} ({} ready)", self.load_avg, ready_threads);
        }

        if second || self.ticks % PRIORITY_RECOMPUTE_TICKS == 0 {
            let ids: Vec<ThreadId> = self
                .registry
                .ids()
                .filter(|&tid| Some(tid) != self.idle)
                .collect();
            for tid in ids {
                self.recompute_mlfqs_priority(tid);
            }
            self.preempt_if_needed();
        }
    }

    /// Recompute one thread's priority from its `recent_cpu` and `nice`
    fn recompute_mlfqs_priority(&mut self, tid: ThreadId) {
        let thread = self.thread_mut(tid);
        let priority = compute_priority(thread.recent_cpu(), thread.nice());
        thread.set_base_priority(priority);
        self.update_effective_priority(tid, priority);
    }

    /// Set the running thread's nice value
    ///
    /// Under MLFQS its priority is recomputed at once and it yields if it
    /// no longer has the highest priority.
    pub fn set_nice(&mut self, nice: i32) -> SchedulerResult<()> {
        if !(i32::from(NICE_MIN)..=i32::from(NICE_MAX)).contains(&nice) {
            return Err(SchedulerError::InvalidNice {
                value: nice,
                min: i32::from(NICE_MIN),
                max: i32::from(NICE_MAX),
            });
        }

        let me = self.current;
        self.thread_mut(me).set_nice(nice as i8);
        if self.config.policy.is_mlfqs() && !self.is_idle(me) {
            self.recompute_mlfqs_priority(me);
            self.preempt_if_needed();
        }
        Ok(())
    }

    pub fn get_nice(&self) -> i32 {
        i32::from(self.current().nice())
    }

    /// 100 times the running thread's `recent_cpu`, rounded
    pub fn get_recent_cpu(&self) -> i32 {
        self.current().recent_cpu().scale_round(100) as i32
    }

    /// 100 times the system load average, rounded
    pub fn get_load_avg(&self) -> i32 {
        self.load_avg.scale_round(100) as i32
    }

    pub fn load_avg(&self) -> FixedPoint {
        self.load_avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::thread::{NICE_DEFAULT, PRI_DEFAULT};
    use crate::scheduler::SchedConfig;

    fn noop(_: usize) {}

    fn started() -> Scheduler {
        let mut sched = Scheduler::with_config(SchedConfig::mlfqs());
        sched.start().unwrap();
        sched
    }

    #[test]
    fn test_priority_formula() {
        assert_eq!(compute_priority(FixedPoint::ZERO, NICE_DEFAULT), PRI_MAX);
        assert_eq!(compute_priority(FixedPoint::from_int(8), 0), 61);
        assert_eq!(compute_priority(FixedPoint::ZERO, 20), 23);
        // Clamped at both ends
        assert_eq!(compute_priority(FixedPoint::from_int(400), 20), PRI_MIN);
        assert_eq!(compute_priority(FixedPoint::ZERO, -20), PRI_MAX);
    }

    #[test]
    fn test_load_avg_first_second() {
        let load = compute_load_avg(FixedPoint::ZERO, 1);
        assert_eq!(load.raw(), 273);
        assert_eq!(load.scale_round(100), 2);
    }

    #[test]
    fn test_recent_cpu_decay() {
        let load = FixedPoint::from_raw(273);
        let recent = decay_recent_cpu(FixedPoint::from_int(100), load, 0);
        assert_eq!(recent.raw(), 52800);
        assert_eq!(recent.scale_round(100), 322);
    }

    #[test]
    fn test_new_threads_start_at_max() {
        let mut sched = started();
        assert_eq!(sched.get_priority(), PRI_MAX);
        let t = sched.create("worker", PRI_DEFAULT, noop, 0).unwrap();
        assert_eq!(sched.lookup_by_id(t).unwrap().priority(), PRI_MAX);
    }

    #[test]
    fn test_set_priority_ignored() {
        let mut sched = started();
        sched.set_priority(10).unwrap();
        assert_eq!(sched.get_priority(), PRI_MAX);
    }

    #[test]
    fn test_set_nice() {
        let mut sched = started();
        sched.set_nice(5).unwrap();
        assert_eq!(sched.get_nice(), 5);
        assert_eq!(sched.get_priority(), 53);
        assert_eq!(
            sched.set_nice(21),
            Err(SchedulerError::InvalidNice { value: 21, min: -20, max: 20 })
        );
    }

    #[test]
    fn test_set_nice_yields_to_higher() {
        let mut sched = started();
        let main = sched.current_tid();
        let t = sched.create("peer", PRI_DEFAULT, noop, 0).unwrap();
        assert_eq!(sched.current_tid(), main);

        sched.set_nice(1).unwrap();
        assert_eq!(sched.current_tid(), t);
    }

    #[test]
    fn test_one_second_of_load() {
        let mut sched = started();
        for _ in 0..100 {
            sched.tick();
            sched.on_interrupt_return();
        }
        assert_eq!(sched.load_avg().raw(), 273);
        assert_eq!(sched.get_load_avg(), 2);
        assert_eq!(sched.current().recent_cpu().raw(), 52800);
        assert_eq!(sched.get_recent_cpu(), 322);
        assert_eq!(sched.get_priority(), 62);
    }

    #[test]
    fn test_idle_not_charged() {
        let mut sched = started();
        let idle = sched.idle_tid().unwrap();
        sched.block();
        for _ in 0..8 {
            sched.tick();
        }
        let thread = sched.lookup_by_id(idle).unwrap();
        assert_eq!(thread.recent_cpu(), FixedPoint::ZERO);
        assert_eq!(thread.priority(), PRI_MIN);
    }

    #[test]
    fn test_recent_cpu_under_heavy_load() {
        // A nice thread under load 60 settles near 20 / (1 - 120/121) = 2420
        let load = FixedPoint::from_int(60);
        let mut recent = FixedPoint::ZERO;
        for _ in 0..5000 {
            recent = decay_recent_cpu(recent, load, 20);
        }
        assert!((2300..2500).contains(&recent.to_int_trunc()));
        assert_eq!(compute_priority(recent, 20), PRI_MIN);

        let mut sched = started();
        let main = sched.current_tid();
        sched.thread_mut(main).set_recent_cpu(recent);
        let reported = sched.get_recent_cpu();
        assert_eq!(i64::from(reported), recent.scale_round(100));
        assert!(reported > 230_000);
        assert!(!recent.to_string().starts_with('-'));
    }
}

//! BSD scheduler accounting over simulated timer ticks

use exo_sched::scheduler::core::mlfqs::{
    compute_load_avg, compute_priority, decay_recent_cpu, PRIORITY_RECOMPUTE_TICKS,
};
use exo_sched::scheduler::{FixedPoint, SchedConfig, Scheduler, PRI_MAX};
use proptest::prelude::*;

fn noop(_: usize) {}

fn started() -> Scheduler {
    let mut sched = Scheduler::with_config(SchedConfig::mlfqs());
    sched.start().unwrap();
    sched
}

/// One timer interrupt, including the deferred yield
fn tick(sched: &mut Scheduler) {
    sched.tick();
    sched.on_interrupt_return();
}

/// Priorities of a lone running thread, one entry per tick
fn run_alone(nice: i32, ticks: u64) -> Vec<u8> {
    let mut sched = started();
    sched.set_nice(nice).unwrap();
    (0..ticks)
        .map(|_| {
            tick(&mut sched);
            sched.get_priority()
        })
        .collect()
}

#[test]
fn test_one_thread_for_100_ticks() {
    let mut sched = started();
    let mut recent_cpu = FixedPoint::ZERO;
    let mut load_avg = FixedPoint::ZERO;
    let mut expected = PRI_MAX;

    for t in 1..=100u64 {
        tick(&mut sched);

        recent_cpu = recent_cpu.add_int(1);
        if t % 100 == 0 {
            load_avg = compute_load_avg(load_avg, 1);
            recent_cpu = decay_recent_cpu(recent_cpu, load_avg, 0);
        }
        if t % PRIORITY_RECOMPUTE_TICKS == 0 {
            expected = compute_priority(recent_cpu, 0);
        }
        assert_eq!(sched.get_priority(), expected, "tick {}", t);
    }

    assert_eq!(sched.load_avg().raw(), 273);
    assert_eq!(sched.current().recent_cpu().raw(), 52800);
    assert_eq!(sched.get_priority(), 62);
    assert_eq!(sched.get_load_avg(), 2);
    assert_eq!(sched.get_recent_cpu(), 322);
}

#[test]
fn test_priority_drops_between_seconds() {
    let priorities = run_alone(0, 96);
    // recent_cpu / 4 grows by one every 4 ticks
    assert_eq!(priorities[3], 62);
    assert_eq!(priorities[7], 61);
    assert_eq!(priorities[95], 39);
}

#[test]
fn test_cpu_hog_yields_to_fresh_thread() {
    let mut sched = started();
    let main = sched.current_tid();
    for _ in 0..8 {
        tick(&mut sched);
    }
    assert_eq!(sched.get_priority(), 61);

    // A new thread starts at PRI_MAX and outranks main immediately
    let t = sched.create("fresh", 0, noop, 0).unwrap();
    assert_eq!(sched.current_tid(), t);
    assert_eq!(sched.lookup_by_id(main).unwrap().priority(), 61);
}

#[test]
fn test_load_avg_counts_ready_threads() {
    let mut sched = started();
    sched.create("a", 0, noop, 0).unwrap();
    sched.create("b", 0, noop, 0).unwrap();
    for _ in 0..100 {
        tick(&mut sched);
    }
    // Three runnable threads for the whole second
    let expected = compute_load_avg(FixedPoint::ZERO, 3);
    assert_eq!(sched.load_avg(), expected);
    assert_eq!(sched.get_load_avg(), 5);
}

#[test]
fn test_idle_system_has_no_load() {
    let mut sched = started();
    sched.block();
    for _ in 0..200 {
        tick(&mut sched);
    }
    assert_eq!(sched.load_avg(), FixedPoint::ZERO);
    assert_eq!(sched.stats().idle_ticks, 200);
}

#[test]
fn test_nice_threads_share_less() {
    let mut sched = started();
    let nice = sched.create("nice", 0, noop, 0).unwrap();
    // main (nice 0) and the new thread alternate until nice is raised
    sched.yield_current();
    assert_eq!(sched.current_tid(), nice);
    sched.set_nice(20).unwrap();
    assert_eq!(sched.lookup_by_id(nice).unwrap().priority(), 23);
    assert_eq!(sched.lookup_by_id(nice).unwrap().nice(), 20);
    assert_ne!(sched.current_tid(), nice);
}

proptest! {
    #[test]
    fn prop_mlfqs_is_deterministic(nice in -20i32..=20, ticks in 1u64..300) {
        let first = run_alone(nice, ticks);
        let second = run_alone(nice, ticks);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.iter().all(|&p| p <= PRI_MAX));
    }
}

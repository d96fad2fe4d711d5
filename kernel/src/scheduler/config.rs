//! Scheduler boot configuration
//!
//! The policy is chosen once at boot and fixed for the kernel lifetime.
//! Recognised command-line options:
//! - `-o mlfqs`                 BSD multilevel feedback queue scheduler
//! - `sched.timer_freq=N`       timer interrupts per second (19..=1000)
//! - `sched.time_slice=N`       ticks before a running thread is rotated
//! - `sched.max_threads=N`      upper bound on live threads

use core::fmt;

/// Default timer frequency (ticks per second)
pub const DEFAULT_TIMER_FREQ: u32 = 100;

/// Default time slice (ticks)
pub const DEFAULT_TIME_SLICE: u32 = 4;

/// Default live thread limit
pub const DEFAULT_MAX_THREADS: usize = 1024;

/// Room for the initial and idle threads
const MIN_MAX_THREADS: usize = 2;

/// Accepted timer frequency range
const TIMER_FREQ_RANGE: core::ops::RangeInclusive<u32> = 19..=1000;

/// Scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedPolicy {
    /// Round-robin by effective priority, with priority donation
    #[default]
    PriorityDonation,
    /// BSD multilevel feedback queue; priorities owned by the accountant
    Mlfqs,
}

impl SchedPolicy {
    pub fn is_mlfqs(self) -> bool {
        matches!(self, Self::Mlfqs)
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::PriorityDonation => write!(f, "priority+donation"),
            Self::Mlfqs => write!(f, "mlfqs"),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    pub policy: SchedPolicy,
    pub timer_freq: u32,
    pub time_slice: u32,
    pub max_threads: usize,
}

impl SchedConfig {
    /// Default configuration (priority donation, 100 Hz, 4-tick slices)
    pub const fn new() -> Self {
        Self {
            policy: SchedPolicy::PriorityDonation,
            timer_freq: DEFAULT_TIMER_FREQ,
            time_slice: DEFAULT_TIME_SLICE,
            max_threads: DEFAULT_MAX_THREADS,
        }
    }

    /// Default configuration with the BSD scheduler selected
    pub const fn mlfqs() -> Self {
        let mut config = Self::new();
        config.policy = SchedPolicy::Mlfqs;
        config
    }

    /// Parse the kernel command line
    ///
    /// Unknown options are ignored; malformed values keep the default and
    /// are reported.
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::new();
        let mut words = cmdline.split_whitespace();

        while let Some(word) = words.next() {
            if word == "-o" {
                match words.next() {
                    Some("mlfqs") => config.policy = SchedPolicy::Mlfqs,
                    Some(other) => log::warn!("[SCHED] unknown option -o {}", other),
                    None => log::warn!("[SCHED] missing value after -o"),
                }
                continue;
            }

            let Some((key, value)) = word.split_once('=') else {
                continue;
            };
            match key {
                "sched.timer_freq" => match value.parse::<u32>() {
                    Ok(freq) if TIMER_FREQ_RANGE.contains(&freq) => config.timer_freq = freq,
                    _ => log::warn!("[SCHED] invalid timer_freq '{}', keeping {}", value, config.timer_freq),
                },
                "sched.time_slice" => match value.parse::<u32>() {
                    Ok(slice) if slice > 0 => config.time_slice = slice,
                    _ => log::warn!("[SCHED] invalid time_slice '{}', keeping {}", value, config.time_slice),
                },
                "sched.max_threads" => match value.parse::<usize>() {
                    Ok(max) if max >= MIN_MAX_THREADS => config.max_threads = max,
                    _ => log::warn!("[SCHED] invalid max_threads '{}', keeping {}", value, config.max_threads),
                },
                _ => {}
            }
        }

        config
    }

    /// Replace out-of-range values with their defaults
    ///
    /// Fields are public, so a hand-built configuration can hold values the
    /// command-line parser would have refused.
    pub fn validated(mut self) -> Self {
        if !TIMER_FREQ_RANGE.contains(&self.timer_freq) {
            log::warn!("[SCHED] timer_freq {} out of range, using {}", self.timer_freq, DEFAULT_TIMER_FREQ);
            self.timer_freq = DEFAULT_TIMER_FREQ;
        }
        if self.time_slice == 0 {
            log::warn!("[SCHED] time_slice 0, using {}", DEFAULT_TIME_SLICE);
            self.time_slice = DEFAULT_TIME_SLICE;
        }
        if self.max_threads < MIN_MAX_THREADS {
            log::warn!("[SCHED] max_threads {} too small, using {}", self.max_threads, MIN_MAX_THREADS);
            self.max_threads = MIN_MAX_THREADS;
        }
        self
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::new()
    }
}

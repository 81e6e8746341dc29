//! scheduler.rs
//! Fixed-period release timer shared by the periodic tasks (Sampling, Timer).
//!
//! Releases sit on a fixed grid `start + k * period`. SpinSleeper keeps the
//! wake-up close to the release instant (plain thread::sleep oversleeps by the
//! OS tick).
//!
//! Overrun policy: skip-and-resync. When the body overruns one or more
//! releases, the timer jumps to the next grid point still in the future and
//! reports how many releases were skipped. It never fires a burst of
//! back-to-back catch-up cycles and the grid never drifts.

use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

/// Longest single sleep while a stop flag is being watched.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Outcome of waiting for one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    /// Release instants that had already passed when the task asked to wait.
    pub missed: u32,
}

impl Release {
    #[inline]
    pub fn is_late(&self) -> bool {
        self.missed > 0
    }
}

pub struct PeriodicTimer {
    period: Duration,
    next_release: Instant,
    sleeper: SpinSleeper,
}

impl PeriodicTimer {
    /// First release is one period from now.
    pub fn new(period: Duration) -> Self {
        Self::starting_at(Instant::now() + period, period)
    }

    pub fn starting_at(first_release: Instant, period: Duration) -> Self {
        Self {
            period,
            next_release: first_release,
            sleeper: SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_release(&self) -> Instant {
        self.next_release
    }

    /// Sleeps until the next release and advances the grid by one period,
    /// waking at least every 50 ms to look at `running`. Returns `None` as
    /// soon as the flag is cleared.
    pub fn wait_next_while(&mut self, running: &AtomicBool) -> Option<Release> {
        let missed = self.resync(Instant::now());
        loop {
            if !running.load(Ordering::Acquire) {
                return None;
            }
            let now = Instant::now();
            if now >= self.next_release {
                break;
            }
            self.sleeper.sleep((self.next_release - now).min(STOP_POLL));
        }
        self.next_release += self.period;
        Some(Release { missed })
    }

    /// Moves `next_release` forward to the first grid point not in the past.
    /// Returns how many grid points were skipped.
    fn resync(&mut self, now: Instant) -> u32 {
        if now <= self.next_release || self.period.is_zero() {
            return 0;
        }
        let behind = now - self.next_release;
        let skipped = (behind.as_nanos() / self.period.as_nanos()) as u32 + 1;
        self.next_release += self.period * skipped;
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_time_release_reports_no_miss() {
        let mut timer = PeriodicTimer::new(Duration::from_millis(5));
        let running = AtomicBool::new(true);
        let release = timer.wait_next_while(&running).unwrap();
        assert!(!release.is_late());
    }

    #[test]
    fn releases_follow_the_grid() {
        let start = Instant::now() + Duration::from_millis(2);
        let period = Duration::from_millis(3);
        let mut timer = PeriodicTimer::starting_at(start, period);
        let running = AtomicBool::new(true);
        assert!(timer.wait_next_while(&running).is_some());
        assert!(timer.wait_next_while(&running).is_some());
        assert_eq!(timer.next_release(), start + period * 2);
    }

    #[test]
    fn overrun_skips_to_next_boundary() {
        let period = Duration::from_millis(10);
        let start = Instant::now();
        let mut timer = PeriodicTimer::starting_at(start, period);
        // Simulate a body that took 25 ms: releases at +0, +10, +20 are gone.
        let skipped = timer.resync(start + Duration::from_millis(25));
        assert_eq!(skipped, 3);
        assert_eq!(timer.next_release(), start + Duration::from_millis(30));
    }

    #[test]
    fn stop_flag_interrupts_long_wait() {
        let mut timer = PeriodicTimer::new(Duration::from_secs(60));
        let running = AtomicBool::new(false);
        let start = Instant::now();
        assert!(timer.wait_next_while(&running).is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_while_running_releases_normally() {
        let mut timer = PeriodicTimer::new(Duration::from_millis(3));
        let running = AtomicBool::new(true);
        assert_eq!(timer.wait_next_while(&running), Some(Release { missed: 0 }));
    }

    #[test]
    fn resync_is_noop_when_early() {
        let period = Duration::from_millis(10);
        let start = Instant::now() + period;
        let mut timer = PeriodicTimer::starting_at(start, period);
        assert_eq!(timer.resync(Instant::now()), 0);
        assert_eq!(timer.next_release(), start);
    }
}

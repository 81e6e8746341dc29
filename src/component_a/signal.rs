//! signal.rs
//! Single-slot "data ready" signals between tasks.
//!
//! Semantics of a binary semaphore initialised to 0 with limit 1:
//! - `notify()` never blocks; if a notification is already pending the new
//!   one is coalesced into it (latest-wins, counted in `SignalStats`).
//! - `wait()` blocks until a notification is pending and consumes it.
//! - When every `Notifier` is dropped, `wait()` returns `false` once the slot
//!   is empty, which is how sporadic tasks learn to shut down.
//!
//! Built on a crossbeam bounded(1) channel of `()`.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

#[derive(Debug, Default)]
pub struct SignalStats {
    given: AtomicU64,
    coalesced: AtomicU64,
    taken: AtomicU64,
}

impl SignalStats {
    /// Notifications that found the slot empty.
    pub fn given(&self) -> u64 {
        self.given.load(Ordering::Relaxed)
    }

    /// Notifications merged into an already pending one.
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    pub fn taken(&self) -> u64 {
        self.taken.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
    Closed,
}

#[derive(Clone)]
pub struct Notifier {
    name: &'static str,
    tx: Sender<()>,
    stats: Arc<SignalStats>,
}

pub struct Waiter {
    name: &'static str,
    rx: Receiver<()>,
    stats: Arc<SignalStats>,
}

/// Creates an empty signal.
pub fn signal(name: &'static str) -> (Notifier, Waiter) {
    let (tx, rx) = channel::bounded(1);
    let stats = Arc::new(SignalStats::default());
    (
        Notifier { name, tx, stats: stats.clone() },
        Waiter { name, rx, stats },
    )
}

impl Notifier {
    /// Returns `true` if the slot was empty, `false` if coalesced or nobody listens.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => {
                self.stats.given.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(())) => {
                self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(())) => {
                log::debug!("[{}] notify with no waiter", self.name);
                false
            }
        }
    }

    pub fn stats(&self) -> &SignalStats {
        &self.stats
    }
}

impl Waiter {
    /// Blocks until signalled. `false` means every notifier is gone.
    pub fn wait(&self) -> bool {
        match self.rx.recv() {
            Ok(()) => {
                self.stats.taken.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> WaitOutcome {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => {
                self.stats.taken.fetch_add(1, Ordering::Relaxed);
                WaitOutcome::Signaled
            }
            Err(RecvTimeoutError::Timeout) => WaitOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Closed,
        }
    }

    /// Consumes a pending notification without blocking.
    pub fn try_wait(&self) -> bool {
        let got = self.rx.try_recv().is_ok();
        if got {
            self.stats.taken.fetch_add(1, Ordering::Relaxed);
        }
        got
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> &SignalStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn extra_notifications_coalesce() {
        let (tx, rx) = signal("test");
        assert!(tx.notify());
        assert!(!tx.notify());
        assert!(!tx.notify());
        assert!(rx.try_wait());
        assert!(!rx.try_wait());
        assert_eq!(tx.stats().given(), 1);
        assert_eq!(tx.stats().coalesced(), 2);
        assert_eq!(rx.stats().taken(), 1);
    }

    #[test]
    fn wait_returns_false_after_notifiers_drop() {
        let (tx, rx) = signal("test");
        tx.notify();
        drop(tx);
        // Pending notification is still delivered first.
        assert!(rx.wait());
        assert!(!rx.wait());
    }

    #[test]
    fn wait_blocks_until_notified() {
        let (tx, rx) = signal("test");
        let handle = thread::spawn(move || rx.wait_timeout(Duration::from_secs(2)));
        thread::sleep(Duration::from_millis(20));
        tx.notify();
        assert_eq!(handle.join().unwrap(), WaitOutcome::Signaled);
    }

    #[test]
    fn wait_timeout_expires() {
        let (_tx, rx) = signal("test");
        assert_eq!(rx.wait_timeout(Duration::from_millis(5)), WaitOutcome::TimedOut);
    }
}

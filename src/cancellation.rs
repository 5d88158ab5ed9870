/*!
 * Cooperative cancellation signal
 *
 * Modeled as a flag plus a condvar so that anything blocked waiting on
 * engine-owned state (the parallelism semaphore, the sync-loop ticker) can
 * wake promptly instead of polling on a timer.
 */

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        let mut cancelled = lock.lock().unwrap();
        *cancelled = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap()
    }

    /// Block until cancelled or `timeout` elapses, whichever comes first.
    /// Used by the sync-loop ticker in place of a bare `thread::sleep` so
    /// `Stop` wakes it immediately rather than waiting out the interval.
    pub fn wait_timeout(&self, timeout: Duration) {
        let (lock, cvar) = &*self.inner;
        let cancelled = lock.lock().unwrap();
        if *cancelled {
            return;
        }
        let _ = cvar.wait_timeout(cancelled, timeout);
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn starts_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_observed() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn wait_timeout_returns_early_on_cancel() {
        let token = CancellationToken::new();
        let waiter = token.clone();

        let handle = thread::spawn(move || {
            let start = Instant::now();
            waiter.wait_timeout(Duration::from_secs(5));
            start.elapsed()
        });

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let elapsed = handle.join().unwrap();
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn wait_timeout_elapses_without_cancel() {
        let token = CancellationToken::new();
        let start = Instant::now();
        token.wait_timeout(Duration::from_millis(50));
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}

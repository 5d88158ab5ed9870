/*!
 * Global parallelism budget
 *
 * A counting semaphore shared across every Per-Source Task of a run: one
 * engine-wide `ConcurrencyLimiter` is created on `Start`, sized to
 * `maxParallelism`, and every file copy across every (node, share)
 * acquires one permit before streaming. Acquisition is cancellable so a
 * task blocked waiting for a slot unblocks promptly on `Stop`.
 */

use std::sync::{Arc, Condvar, Mutex};

use crate::cancellation::CancellationToken;

#[derive(Clone)]
pub struct ConcurrencyLimiter {
    state: Arc<SemaphoreState>,
}

struct SemaphoreState {
    available: Mutex<usize>,
    condvar: Condvar,
    max: usize,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        let max = max_concurrent.max(1);
        Self {
            state: Arc::new(SemaphoreState {
                available: Mutex::new(max),
                condvar: Condvar::new(),
                max,
            }),
        }
    }

    /// Acquire a permit, blocking until one is available or `cancel` fires.
    /// Returns `None` iff cancellation won the race before a permit was
    /// granted.
    pub fn acquire(&self, cancel: &CancellationToken) -> Option<ConcurrencyPermit> {
        let mut available = self.state.available.lock().unwrap();
        while *available == 0 {
            if cancel.is_cancelled() {
                return None;
            }
            let (guard, _timeout) = self
                .state
                .condvar
                .wait_timeout(available, std::time::Duration::from_millis(100))
                .unwrap();
            available = guard;
            if *available == 0 && cancel.is_cancelled() {
                return None;
            }
        }

        *available -= 1;
        Some(ConcurrencyPermit {
            state: self.state.clone(),
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.state.max
    }

    pub fn available(&self) -> usize {
        *self.state.available.lock().unwrap()
    }
}

/// An outstanding permit on the global parallelism budget. Released
/// automatically when dropped, whether the copy succeeded, failed, or was
/// cancelled mid-stream.
pub struct ConcurrencyPermit {
    state: Arc<SemaphoreState>,
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        let mut available = self.state.available.lock().unwrap();
        *available += 1;
        self.state.condvar.notify_one();
    }
}

/// A drain barrier for Per-Source Task threads: `Stop` needs to block until
/// every dispatched task has returned, not just until the sync-loop ticker
/// has noticed cancellation. Each dispatch calls `add()` before spawning and
/// the spawned thread calls `done()` on the way out (via a drop guard, so a
/// panic still releases the count); `wait()` blocks until the count returns
/// to zero.
#[derive(Clone)]
pub struct WaitGroup {
    state: Arc<(Mutex<usize>, Condvar)>,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self {
            state: Arc::new((Mutex::new(0), Condvar::new())),
        }
    }

    pub fn add(&self) {
        let (lock, _) = &*self.state;
        *lock.lock().unwrap() += 1;
    }

    pub fn done(&self) {
        let (lock, cvar) = &*self.state;
        let mut count = lock.lock().unwrap();
        *count = count.saturating_sub(1);
        if *count == 0 {
            cvar.notify_all();
        }
    }

    /// Block until every outstanding `add()` has been matched by a `done()`.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.state;
        let mut count = lock.lock().unwrap();
        while *count > 0 {
            count = cvar.wait(count).unwrap();
        }
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

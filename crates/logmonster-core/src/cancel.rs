//! Cooperative cancellation shared by the scanner and the termination path.
//!
//! A `CancelToken` is cheap to clone; every clone observes the same flag.
//! Hot loops read the atomic flag directly. Sleeps park on a condvar so a
//! call to [`CancelToken::cancel`] wakes them immediately instead of waiting
//! out the remainder of the interval.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Shared cancellation signal.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every sleeper.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::Relaxed);
        let _guard = self.inner.lock.lock();
        self.inner.wake.notify_all();
    }

    /// Check whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Relaxed)
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the token was
    /// (or already had been) cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.inner.lock.lock();
        loop {
            if self.is_cancelled() {
                return false;
            }
            if self.inner.wake.wait_until(&mut guard, deadline).timed_out() {
                return !self.is_cancelled();
            }
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

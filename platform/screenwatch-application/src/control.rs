use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared stop flag. Sleeping on it wakes early once a stop is requested.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock() = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Returns `true` when the wait ended because of a stop request.
    pub fn wait(&self, duration: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + duration;
        let mut stopped = lock.lock();
        while !*stopped {
            if cvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

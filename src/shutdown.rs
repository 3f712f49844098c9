/// Cooperative cancellation shared by a session's worker threads.
///
/// A [`ShutdownSignal`] is a flag plus a condition variable, so waiting
/// threads (the rescan sleep, a retry backoff) wake as soon as it fires
/// instead of finishing their full interval.
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal and wakes every waiter. Idempotent.
    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut fired = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *fired = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Blocks for up to `timeout`. Returns true if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut fired = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        while !*fired {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            fired = match cvar.wait_timeout(fired, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_times_out_when_not_triggered() {
        let signal = ShutdownSignal::new();
        let started = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_trigger_wakes_waiter_early() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();
        let handle = thread::spawn(move || {
            let started = Instant::now();
            let fired = waiter.wait_timeout(Duration::from_secs(30));
            (fired, started.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        signal.trigger();

        let (fired, elapsed) = handle.join().unwrap();
        assert!(fired);
        assert!(elapsed < Duration::from_secs(5));
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_wait_after_trigger_returns_immediately() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.trigger();
        assert!(signal.wait_timeout(Duration::from_secs(30)));
    }
}

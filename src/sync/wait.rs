//! Deadlines and cancellation for blocking calls.
//!
//! Every blocking primitive in this crate funnels through [`block_until`], which
//! waits on a condition variable until a predicate holds, the deadline passes,
//! or the cancel token fires.

use crate::core::errors::{HandoffError, Result};
use parking_lot::{Condvar, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Options for a single blocking call
#[derive(Debug, Clone)]
pub struct WaitOptions {
    timeout: Option<Duration>,
    // Timeout as the caller asked for it, reported in `Timeout` errors after
    // the options have been narrowed
    requested: Option<Duration>,
    cancel: Option<CancelToken>,
    poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::forever()
    }
}

impl WaitOptions {
    /// Block until signaled
    pub fn forever() -> Self {
        Self {
            timeout: None,
            requested: None,
            cancel: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::forever().with_timeout(Some(timeout))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self.requested = timeout;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Same options with the timeout shortened by the time elapsed since `start`
    pub(crate) fn remaining_since(&self, start: Instant) -> Self {
        let mut narrowed = self.clone();
        if let Some(timeout) = self.timeout {
            narrowed.timeout = Some(timeout.saturating_sub(start.elapsed()));
        }
        narrowed
    }

    fn timeout_ms(&self) -> u64 {
        self.requested
            .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    /// Absolute deadline, or `None` when the timeout is unset or too large to
    /// represent as an `Instant`
    fn deadline_from(&self, now: Instant) -> Option<Instant> {
        self.timeout.and_then(|t| now.checked_add(t))
    }
}

/// Wait on `cv` until `ready` returns true for the guarded state.
///
/// The guard is held whenever `ready` runs. On timeout or cancellation the
/// state is left untouched.
pub(crate) fn block_until<T, F>(
    cv: &Condvar,
    guard: &mut MutexGuard<'_, T>,
    opts: &WaitOptions,
    operation: &str,
    mut ready: F,
) -> Result<()>
where
    F: FnMut(&mut T) -> bool,
{
    if ready(&mut **guard) {
        return Ok(());
    }
    let deadline = opts.deadline_from(Instant::now());

    loop {
        if opts.cancel.as_ref().map_or(false, CancelToken::is_cancelled) {
            return Err(HandoffError::cancelled(operation));
        }

        let now = Instant::now();
        if let Some(deadline) = deadline {
            if now >= deadline {
                return Err(HandoffError::timeout(operation, opts.timeout_ms()));
            }
        }

        // A poll interval too large to add to `now` means cancellation is
        // only seen on the next notification
        let poll_at = opts
            .cancel
            .as_ref()
            .and_then(|_| now.checked_add(opts.poll_interval));
        let wake_at = match (deadline, poll_at) {
            (Some(deadline), Some(poll_at)) => Some(deadline.min(poll_at)),
            (deadline, poll_at) => deadline.or(poll_at),
        };

        match wake_at {
            Some(at) => {
                cv.wait_until(guard, at);
            }
            None => cv.wait(guard),
        }

        if ready(&mut **guard) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;

    #[test]
    fn test_ready_returns_immediately() {
        let lock = Mutex::new(true);
        let cv = Condvar::new();
        let mut guard = lock.lock();
        let opts = WaitOptions::timeout(Duration::ZERO);
        assert!(block_until(&cv, &mut guard, &opts, "test", |ready| *ready).is_ok());
    }

    #[test]
    fn test_timeout_expires() {
        let lock = Mutex::new(false);
        let cv = Condvar::new();
        let mut guard = lock.lock();
        let start = Instant::now();
        let err = block_until(
            &cv,
            &mut guard,
            &WaitOptions::timeout(Duration::from_millis(30)),
            "test",
            |ready| *ready,
        )
        .unwrap_err();

        assert!(matches!(err, HandoffError::Timeout { timeout_ms: 30, .. }));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_cancel_from_other_thread() {
        let lock = Mutex::new(false);
        let cv = Condvar::new();
        let token = CancelToken::new();
        let remote = token.clone();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let mut guard = lock.lock();
        let opts = WaitOptions::forever()
            .with_cancel(token)
            .with_poll_interval(Duration::from_millis(2));
        let err = block_until(&cv, &mut guard, &opts, "test", |ready| *ready).unwrap_err();
        assert!(matches!(err, HandoffError::Cancelled { .. }));

        canceller.join().unwrap();
    }

    #[test]
    fn test_unrepresentable_timeout_waits_without_deadline() {
        let opts = WaitOptions::timeout(Duration::MAX);
        {
            let lock = Mutex::new(true);
            let cv = Condvar::new();
            let mut guard = lock.lock();
            assert!(block_until(&cv, &mut guard, &opts, "test", |ready| *ready).is_ok());
        }

        let shared = Arc::new((Mutex::new(false), Condvar::new()));
        let setter = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            *setter.0.lock() = true;
            setter.1.notify_all();
        });

        let mut guard = shared.0.lock();
        assert!(block_until(&shared.1, &mut guard, &opts, "test", |ready| *ready).is_ok());
        drop(guard);
        handle.join().unwrap();
    }

    #[test]
    fn test_narrowed_timeout_reports_requested_value() {
        let lock = Mutex::new(false);
        let cv = Condvar::new();
        let mut guard = lock.lock();
        let start = Instant::now() - Duration::from_millis(20);
        let opts = WaitOptions::timeout(Duration::from_millis(40)).remaining_since(start);

        let err = block_until(&cv, &mut guard, &opts, "test", |ready| *ready).unwrap_err();
        assert!(matches!(err, HandoffError::Timeout { timeout_ms: 40, .. }));
    }

    #[test]
    fn test_remaining_since_never_grows() {
        let opts = WaitOptions::timeout(Duration::from_millis(100));
        let start = Instant::now() - Duration::from_millis(40);
        let narrowed = opts.remaining_since(start);
        assert!(narrowed.get_timeout().unwrap() <= Duration::from_millis(60));

        let forever = WaitOptions::forever().remaining_since(start);
        assert_eq!(forever.get_timeout(), None);
    }
}

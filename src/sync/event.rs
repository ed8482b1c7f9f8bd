use crate::core::errors::Result;
use crate::sync::wait::{block_until, WaitOptions};
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct EventState {
    signaled: bool,
    // Bumped on every wake so waiters blocked before it are all released,
    // even after the first of them has reset `signaled`.
    generation: u64,
}

/// Binary wait/wake event with auto-reset.
///
/// `wake` releases every thread blocked in `wait` at that moment. The first
/// waiter to return clears the flag, so a later `wait` blocks until the next
/// `wake`.
#[derive(Debug, Default)]
pub struct WaitEvent {
    state: Mutex<EventState>,
    cv: Condvar,
}

impl WaitEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any pending signal. Call before publishing the data a peer will
    /// answer, so the answer's wake cannot be confused with a stale one.
    pub fn reset(&self) {
        self.state.lock().signaled = false;
    }

    /// Block until woken, then clear the flag
    pub fn wait(&self) {
        let mut state = self.state.lock();
        let entry = state.generation;
        while !state.signaled && state.generation == entry {
            self.cv.wait(&mut state);
        }
        state.signaled = false;
    }

    /// Like [`wait`](Self::wait) but bounded by `opts`
    pub fn wait_with(&self, opts: &WaitOptions) -> Result<()> {
        let mut state = self.state.lock();
        let entry = state.generation;
        block_until(&self.cv, &mut state, opts, "wait_event", |s| {
            s.signaled || s.generation != entry
        })?;
        state.signaled = false;
        Ok(())
    }

    pub fn wake(&self) {
        {
            let mut state = self.state.lock();
            state.signaled = true;
            state.generation = state.generation.wrapping_add(1);
        }
        self.cv.notify_all();
    }

    pub fn is_signaled(&self) -> bool {
        self.state.lock().signaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::HandoffError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wake_before_wait_is_kept() {
        let event = WaitEvent::new();
        event.wake();
        assert!(event.is_signaled());
        event.wait();
        assert!(!event.is_signaled());
    }

    #[test]
    fn test_reset_discards_stale_signal() {
        let event = WaitEvent::new();
        event.wake();
        event.reset();
        let err = event
            .wait_with(&WaitOptions::timeout(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, HandoffError::Timeout { .. }));
    }

    #[test]
    fn test_unwoken_event_never_releases() {
        let event = WaitEvent::new();
        assert!(event
            .wait_with(&WaitOptions::timeout(Duration::from_millis(30)))
            .is_err());
        assert!(!event.is_signaled());
    }

    #[test]
    fn test_single_wake_releases_all_waiters() {
        let event = Arc::new(WaitEvent::new());
        let released = Arc::new(AtomicUsize::new(0));
        let waiters = 4;

        let handles: Vec<_> = (0..waiters)
            .map(|_| {
                let event = Arc::clone(&event);
                let released = Arc::clone(&released);
                thread::spawn(move || {
                    event.wait();
                    released.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        // Give every waiter time to block
        thread::sleep(Duration::from_millis(100));
        assert_eq!(released.load(Ordering::SeqCst), 0);

        event.wake();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), waiters);

        // The signal was consumed; the next cycle blocks again
        assert!(event
            .wait_with(&WaitOptions::timeout(Duration::from_millis(30)))
            .is_err());

        let waker = {
            let event = Arc::clone(&event);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                event.wake();
            })
        };
        event.wait();
        waker.join().unwrap();
    }
}

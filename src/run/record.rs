use crate::core::errors::{HandoffError, Result};
use crate::run::{RunId, RunState};
use crate::sync::{ResultCell, WaitEvent, WaitOptions};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub(crate) const FORWARD_OUTPUTS: &str = "forward_outputs";
pub(crate) const BACKWARD_INPUTS: &str = "backward_inputs";
pub(crate) const OUTCOME: &str = "outcome";

/// Per-run handoff state: the worker's wake event, the three published
/// slots, and the protocol state guarding them.
///
/// Lock order is `state` before any cell; cells never take `state`.
#[derive(Debug)]
pub struct RunRecord<B, O> {
    id: RunId,
    event: WaitEvent,
    forward_outputs: ResultCell<B>,
    backward_inputs: ResultCell<B>,
    outcome: ResultCell<O>,
    state: Mutex<RunState>,
    retired: AtomicBool,
    created_at: DateTime<Utc>,
}

/// Point-in-time view of a run, for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInfo {
    pub id: RunId,
    pub state: RunState,
    pub created_at: DateTime<Utc>,
    pub forward_ready: bool,
    pub backward_ready: bool,
    pub outcome_ready: bool,
}

impl<B, O> RunRecord<B, O> {
    pub fn new(id: RunId) -> Self {
        Self {
            id,
            event: WaitEvent::new(),
            forward_outputs: ResultCell::named(FORWARD_OUTPUTS),
            backward_inputs: ResultCell::named(BACKWARD_INPUTS),
            outcome: ResultCell::named(OUTCOME),
            state: Mutex::new(RunState::Registered),
            retired: AtomicBool::new(false),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    pub fn info(&self) -> RunInfo {
        RunInfo {
            id: self.id.clone(),
            state: self.state(),
            created_at: self.created_at,
            forward_ready: self.forward_outputs.is_ready(),
            backward_ready: self.backward_inputs.is_ready(),
            outcome_ready: self.outcome.is_ready(),
        }
    }

    pub fn publish_forward(&self, batch: B) -> Result<()> {
        let mut state = self.state.lock();
        if self.forward_outputs.is_ready() {
            return Err(HandoffError::double_write(FORWARD_OUTPUTS).for_run(&self.id));
        }
        if *state != RunState::Registered {
            return Err(HandoffError::invalid_state(&self.id, *state, "publish_forward_outputs"));
        }
        self.forward_outputs.set(batch).map_err(|e| e.for_run(&self.id))?;
        *state = RunState::ForwardDone;
        debug!(run_id = %self.id, "forward outputs published");
        Ok(())
    }

    /// Clear the worker event. Only legal before backward inputs can arrive,
    /// otherwise their wake could be discarded.
    pub fn prepare_wait(&self) -> Result<()> {
        let state = self.state.lock();
        match *state {
            RunState::Registered | RunState::ForwardDone => {
                self.event.reset();
                Ok(())
            }
            other => Err(HandoffError::invalid_state(&self.id, other, "prepare_worker_wait")),
        }
    }

    pub fn wait(&self, opts: &WaitOptions) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                RunState::ForwardDone => *state = RunState::AwaitingBackward,
                RunState::AwaitingBackward | RunState::BackwardDone => {}
                other => return Err(HandoffError::invalid_state(&self.id, other, "worker_wait")),
            }
        }
        debug!(run_id = %self.id, "worker waiting for backward inputs");
        self.event.wait_with(opts)?;
        if self.is_retired() {
            return Err(HandoffError::unknown_run(&self.id));
        }
        Ok(())
    }

    pub fn wake(&self) {
        self.event.wake();
    }

    /// Mark the record as removed from its registry and release a worker
    /// still blocked in [`wait`](Self::wait), which then sees `UnknownRun`
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
        self.event.wake();
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub fn publish_backward(&self, batch: B) -> Result<()> {
        let mut state = self.state.lock();
        if self.backward_inputs.is_ready() {
            return Err(HandoffError::double_write(BACKWARD_INPUTS).for_run(&self.id));
        }
        if !state.accepts_backward() {
            return Err(HandoffError::invalid_state(&self.id, *state, "publish_backward_inputs"));
        }
        self.backward_inputs.set(batch).map_err(|e| e.for_run(&self.id))?;
        *state = RunState::BackwardDone;
        debug!(run_id = %self.id, "backward inputs published");
        Ok(())
    }

    /// Publish the terminal outcome. Legal from any phase so a worker that
    /// fails early can still release the driver.
    pub fn publish_outcome(&self, outcome: O) -> Result<()> {
        let mut state = self.state.lock();
        self.outcome.set(outcome).map_err(|e| e.for_run(&self.id))?;
        *state = RunState::Completed;
        Ok(())
    }

    pub fn is_outcome_ready(&self) -> bool {
        self.outcome.is_ready()
    }
}

impl<B: Clone, O: Clone> RunRecord<B, O> {
    pub fn forward_outputs(&self, opts: &WaitOptions) -> Result<B> {
        self.forward_outputs.get_with(opts)
    }

    pub fn backward_inputs(&self, opts: &WaitOptions) -> Result<B> {
        self.backward_inputs.get_with(opts)
    }

    pub fn outcome(&self, opts: &WaitOptions) -> Result<O> {
        self.outcome.get_with(opts)
    }

    pub fn try_outcome(&self) -> Option<O> {
        self.outcome.try_get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type Record = RunRecord<Vec<f32>, bool>;

    fn record() -> Record {
        RunRecord::new(RunId::from("r1"))
    }

    #[test]
    fn test_happy_path_transitions() {
        let rec = record();
        assert_eq!(rec.state(), RunState::Registered);

        rec.prepare_wait().unwrap();
        rec.publish_forward(vec![1.0]).unwrap();
        assert_eq!(rec.state(), RunState::ForwardDone);

        rec.publish_backward(vec![0.5]).unwrap();
        rec.wake();
        rec.wait(&WaitOptions::forever()).unwrap();
        assert_eq!(rec.state(), RunState::BackwardDone);

        rec.publish_outcome(true).unwrap();
        let info = rec.info();
        assert_eq!(info.state, RunState::Completed);
        assert!(info.forward_ready && info.backward_ready && info.outcome_ready);
    }

    #[test]
    fn test_backward_before_forward_rejected() {
        let rec = record();
        let err = rec.publish_backward(vec![0.5]).unwrap_err();
        assert!(matches!(
            err,
            HandoffError::InvalidState { state: RunState::Registered, .. }
        ));
        assert!(!rec.info().backward_ready);
    }

    #[test]
    fn test_forward_twice_is_double_write() {
        let rec = record();
        rec.publish_forward(vec![1.0]).unwrap();
        let err = rec.publish_forward(vec![2.0]).unwrap_err();
        assert!(matches!(err, HandoffError::DoubleWrite { slot: FORWARD_OUTPUTS, run_id: Some(_) }));
        assert_eq!(rec.forward_outputs(&WaitOptions::forever()).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_failure_before_forward_completes_run() {
        let rec = record();
        rec.publish_outcome(false).unwrap();
        assert_eq!(rec.state(), RunState::Completed);

        let err = rec.publish_forward(vec![1.0]).unwrap_err();
        assert!(matches!(err, HandoffError::InvalidState { .. }));
        let err = rec.wait(&WaitOptions::forever()).unwrap_err();
        assert!(matches!(err, HandoffError::InvalidState { .. }));
    }

    #[test]
    fn test_wait_timeout_keeps_state() {
        let rec = record();
        rec.publish_forward(vec![1.0]).unwrap();
        let err = rec
            .wait(&WaitOptions::timeout(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, HandoffError::Timeout { .. }));
        assert_eq!(rec.state(), RunState::AwaitingBackward);
    }

    #[test]
    fn test_retire_releases_blocked_worker() {
        let rec = std::sync::Arc::new(record());
        rec.publish_forward(vec![1.0]).unwrap();

        let waiter = std::sync::Arc::clone(&rec);
        let handle = std::thread::spawn(move || waiter.wait(&WaitOptions::forever()));

        std::thread::sleep(Duration::from_millis(30));
        rec.retire();

        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, HandoffError::UnknownRun { .. }));
        assert!(rec.is_retired());
    }

    #[test]
    fn test_prepare_after_backward_rejected() {
        let rec = record();
        rec.publish_forward(vec![1.0]).unwrap();
        rec.publish_backward(vec![0.5]).unwrap();
        assert!(rec.prepare_wait().is_err());
    }
}

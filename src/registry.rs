//! Run registry - the coordination surface between driver and workers
//!
//! The driver owns one wake event and a ready queue; every run owns a record
//! with its own event and result slots. The run map is guarded by a single
//! structural lock, while data-path calls work on the `Arc`'d record after the
//! lookup so no global lock is held while anyone blocks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::core::config::RegistryConfig;
use crate::core::errors::{HandoffError, Result};
use crate::core::metrics::{HandoffMetrics, MetricsSnapshot};
use crate::run::{CompletionOutcome, RunId, RunInfo, RunOutcome, RunRecord, RunState, TensorBatch};
use crate::sync::{ReadyQueue, WaitEvent, WaitOptions};

/// Registry over the default tensor payloads
pub type TensorRegistry = Registry<TensorBatch, CompletionOutcome>;

/// Shared run map plus the driver's event and ready queue
pub struct Registry<B, O> {
    runs: RwLock<HashMap<RunId, Arc<RunRecord<B, O>>>>,
    driver_event: WaitEvent,
    ready: ReadyQueue<RunId>,
    config: RegistryConfig,
    metrics: HandoffMetrics,
}

impl<B, O> Registry<B, O>
where
    B: Clone,
    O: RunOutcome + Clone,
{
    /// Create a registry after validating `config`
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: RegistryConfig) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            driver_event: WaitEvent::new(),
            ready: ReadyQueue::new(config.ready_queue_capacity),
            config,
            metrics: HandoffMetrics::new(),
        }
    }

    /// Configuration the registry was built with
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Point-in-time copy of the registry counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Options used by the plain blocking calls
    pub fn default_wait_options(&self) -> WaitOptions {
        WaitOptions::forever()
            .with_timeout(self.config.default_wait_timeout)
            .with_poll_interval(self.config.cancel_poll_interval)
    }

    fn record(&self, id: &RunId) -> Result<Arc<RunRecord<B, O>>> {
        self.runs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| HandoffError::unknown_run(id))
    }

    /// Count timeouts and cancellations before handing the result back
    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Err(HandoffError::Timeout { operation, timeout_ms }) => {
                HandoffMetrics::incr(&self.metrics.wait_timeouts);
                warn!(operation = %operation, timeout_ms, "wait timed out");
            }
            Err(HandoffError::Cancelled { operation }) => {
                HandoffMetrics::incr(&self.metrics.wait_cancellations);
                debug!(operation = %operation, "wait cancelled");
            }
            _ => {}
        }
        result
    }

    // ----- run lifecycle -----

    /// Register a run under a caller-supplied identity
    pub fn create_run(&self, id: impl Into<RunId>) -> Result<RunId> {
        let id = id.into();
        let mut runs = self.runs.write();
        if runs.contains_key(&id) {
            return Err(HandoffError::duplicate_run(&id));
        }
        if runs.len() >= self.config.max_active_runs {
            return Err(HandoffError::RegistryFull {
                limit: self.config.max_active_runs,
            });
        }
        runs.insert(id.clone(), Arc::new(RunRecord::new(id.clone())));
        drop(runs);

        HandoffMetrics::incr(&self.metrics.runs_created);
        info!(run_id = %id, "run registered");
        Ok(id)
    }

    /// Register a run under a freshly generated identity
    pub fn create_generated_run(&self) -> Result<RunId> {
        self.create_run(RunId::generate())
    }

    /// Remove a completed run and return its outcome.
    /// Any later call with the same id fails with `UnknownRun`, and a worker
    /// still blocked in `worker_wait` on it is released with that error.
    pub fn retire_run(&self, id: &RunId) -> Result<O> {
        let mut runs = self.runs.write();
        let record = runs.get(id).ok_or_else(|| HandoffError::unknown_run(id))?;
        let outcome = match record.try_outcome() {
            Some(outcome) => outcome,
            None => {
                return Err(HandoffError::RunNotComplete {
                    run_id: id.clone(),
                    state: record.state(),
                })
            }
        };
        let record = runs.remove(id);
        drop(runs);
        if let Some(record) = record {
            record.retire();
        }

        HandoffMetrics::incr(&self.metrics.runs_retired);
        info!(run_id = %id, success = outcome.is_success(), "run retired");
        Ok(outcome)
    }

    /// Check if `id` is currently registered
    pub fn contains(&self, id: &RunId) -> bool {
        self.runs.read().contains_key(id)
    }

    /// Number of registered runs
    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    /// Check if no runs are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of all registered runs, sorted
    pub fn active_runs(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self.runs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Current protocol state of a run
    pub fn run_state(&self, id: &RunId) -> Result<RunState> {
        Ok(self.record(id)?.state())
    }

    /// Diagnostic snapshot of a run
    pub fn run_info(&self, id: &RunId) -> Result<RunInfo> {
        Ok(self.record(id)?.info())
    }

    // ----- driver event -----

    /// Clear a stale driver signal before starting a wait cycle
    pub fn prepare_driver_wait(&self) {
        self.driver_event.reset();
    }

    /// Block until some worker wakes the driver
    pub fn driver_wait(&self) -> Result<()> {
        self.driver_wait_with(&self.default_wait_options())
    }

    /// Like [`driver_wait`](Self::driver_wait) but bounded by `opts`
    pub fn driver_wait_with(&self, opts: &WaitOptions) -> Result<()> {
        self.observe(self.driver_event.wait_with(opts))
    }

    /// Bare wake signal. Concurrent wakes coalesce; use
    /// [`notify_forward_ready`](Self::notify_forward_ready) to keep track of
    /// which runs are ready.
    pub fn wake_driver(&self) {
        HandoffMetrics::incr(&self.metrics.driver_wakes);
        self.driver_event.wake();
    }

    /// Queue `id` as ready for the driver, then wake it.
    /// The driver is woken even when the queue is full.
    pub fn notify_forward_ready(&self, id: &RunId) -> Result<()> {
        self.record(id)?;
        let queued = self.ready.push(id.clone());
        self.wake_driver();

        queued.map_err(|id| {
            warn!(run_id = %id, capacity = self.ready.capacity(), "ready queue full");
            HandoffError::QueueFull {
                capacity: self.ready.capacity(),
            }
        })
    }

    /// Block until a run is queued as ready and return its id
    pub fn next_ready(&self, opts: &WaitOptions) -> Result<RunId> {
        let start = Instant::now();
        loop {
            if let Some(id) = self.ready.pop() {
                return Ok(id);
            }
            self.observe(self.driver_event.wait_with(&opts.remaining_since(start)))?;
        }
    }

    /// All ready run ids queued so far, without blocking
    pub fn drain_ready(&self) -> Vec<RunId> {
        self.ready.drain()
    }

    // ----- worker event -----

    /// Clear a stale worker signal; call before publishing forward outputs
    pub fn prepare_worker_wait(&self, id: &RunId) -> Result<()> {
        self.record(id)?.prepare_wait()
    }

    /// Block the worker until the driver wakes its run
    pub fn worker_wait(&self, id: &RunId) -> Result<()> {
        self.worker_wait_with(id, &self.default_wait_options())
    }

    /// Like [`worker_wait`](Self::worker_wait) but bounded by `opts`
    pub fn worker_wait_with(&self, id: &RunId, opts: &WaitOptions) -> Result<()> {
        let record = self.record(id)?;
        self.observe(record.wait(opts))
    }

    /// Release the worker blocked on `id`
    pub fn wake_worker(&self, id: &RunId) -> Result<()> {
        self.record(id)?.wake();
        debug!(run_id = %id, "worker woken");
        Ok(())
    }

    // ----- result slots -----

    /// Store the forward outputs of a run. Does not wake the driver.
    pub fn publish_forward_outputs(&self, id: &RunId, batch: B) -> Result<()> {
        self.record(id)?.publish_forward(batch)?;
        HandoffMetrics::incr(&self.metrics.forward_published);
        Ok(())
    }

    /// Block until the forward outputs of `id` are published
    pub fn fetch_forward_outputs(&self, id: &RunId) -> Result<B> {
        self.fetch_forward_outputs_with(id, &self.default_wait_options())
    }

    /// Like [`fetch_forward_outputs`](Self::fetch_forward_outputs) but bounded by `opts`
    pub fn fetch_forward_outputs_with(&self, id: &RunId, opts: &WaitOptions) -> Result<B> {
        let record = self.record(id)?;
        self.observe(record.forward_outputs(opts))
    }

    /// Store the backward inputs of a run. Does not wake the worker.
    pub fn publish_backward_inputs(&self, id: &RunId, batch: B) -> Result<()> {
        self.record(id)?.publish_backward(batch)?;
        HandoffMetrics::incr(&self.metrics.backward_published);
        Ok(())
    }

    /// Publish backward inputs and release the worker in one call
    pub fn supply_backward(&self, id: &RunId, batch: B) -> Result<()> {
        let record = self.record(id)?;
        record.publish_backward(batch)?;
        HandoffMetrics::incr(&self.metrics.backward_published);
        record.wake();
        Ok(())
    }

    /// Block until the backward inputs of `id` are published
    pub fn fetch_backward_inputs(&self, id: &RunId) -> Result<B> {
        self.fetch_backward_inputs_with(id, &self.default_wait_options())
    }

    /// Like [`fetch_backward_inputs`](Self::fetch_backward_inputs) but bounded by `opts`
    pub fn fetch_backward_inputs_with(&self, id: &RunId, opts: &WaitOptions) -> Result<B> {
        let record = self.record(id)?;
        self.observe(record.backward_inputs(opts))
    }

    /// Store the terminal outcome of a run and mark it completed
    pub fn publish_outcome(&self, id: &RunId, outcome: O) -> Result<()> {
        let success = outcome.is_success();
        self.record(id)?.publish_outcome(outcome)?;
        self.metrics.record_outcome(success);
        info!(run_id = %id, success, "run completed");
        Ok(())
    }

    /// Check without blocking whether the outcome of `id` is published
    pub fn is_outcome_ready(&self, id: &RunId) -> Result<bool> {
        Ok(self.record(id)?.is_outcome_ready())
    }

    /// Block until the outcome of `id` is published
    pub fn fetch_outcome(&self, id: &RunId) -> Result<O> {
        self.fetch_outcome_with(id, &self.default_wait_options())
    }

    /// Like [`fetch_outcome`](Self::fetch_outcome) but bounded by `opts`
    pub fn fetch_outcome_with(&self, id: &RunId, opts: &WaitOptions) -> Result<O> {
        let record = self.record(id)?;
        self.observe(record.outcome(opts))
    }
}

impl<B, O> Default for Registry<B, O>
where
    B: Clone,
    O: RunOutcome + Clone,
{
    fn default() -> Self {
        Self::from_valid_config(RegistryConfig::default())
    }
}

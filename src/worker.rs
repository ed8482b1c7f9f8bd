//! Worker-side handle for one run
//!
//! Wraps the registry calls a worker makes in the order that keeps the
//! protocol safe, and guarantees the driver is never left waiting on an
//! outcome: dropping an uncompleted handle (including during a panic)
//! publishes a failure outcome.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

use crate::core::errors::Result;
use crate::registry::Registry;
use crate::run::{RunId, RunOutcome};
use crate::sync::WaitOptions;

pub struct WorkerHandle<B, O>
where
    B: Clone,
    O: RunOutcome + Clone,
{
    registry: Arc<Registry<B, O>>,
    id: RunId,
    completed: bool,
}

impl<B, O> WorkerHandle<B, O>
where
    B: Clone,
    O: RunOutcome + Clone,
{
    /// Create the run and take ownership of its worker side
    pub fn register(registry: Arc<Registry<B, O>>, id: impl Into<RunId>) -> Result<Self> {
        let id = registry.create_run(id)?;
        Ok(Self {
            registry,
            id,
            completed: false,
        })
    }

    /// Register under a generated identity
    pub fn register_generated(registry: Arc<Registry<B, O>>) -> Result<Self> {
        Self::register(registry, RunId::generate())
    }

    /// Identity of the run this handle owns
    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn registry(&self) -> &Arc<Registry<B, O>> {
        &self.registry
    }

    /// Hand forward outputs to the driver.
    ///
    /// The run event is cleared before publishing, so a driver that answers
    /// immediately cannot have its wake discarded.
    pub fn publish_forward(&self, batch: B) -> Result<()> {
        self.registry.prepare_worker_wait(&self.id)?;
        self.registry.publish_forward_outputs(&self.id, batch)?;
        self.registry.notify_forward_ready(&self.id)
    }

    /// Block until the driver supplies backward inputs
    pub fn await_backward(&self) -> Result<B> {
        self.await_backward_with(&self.registry.default_wait_options())
    }

    /// Like [`await_backward`](Self::await_backward); the timeout in `opts`
    /// bounds the whole call, including a wake that arrived without inputs
    pub fn await_backward_with(&self, opts: &WaitOptions) -> Result<B> {
        let start = Instant::now();
        self.registry.worker_wait_with(&self.id, opts)?;
        self.registry
            .fetch_backward_inputs_with(&self.id, &opts.remaining_since(start))
    }

    /// Report the final outcome and release the handle
    pub fn complete(mut self, outcome: O) -> Result<()> {
        self.completed = true;
        self.registry.publish_outcome(&self.id, outcome)
    }

    /// Complete the run with a failure outcome carrying `message`
    pub fn fail(self, message: impl Into<String>) -> Result<()> {
        self.complete(O::failure(message.into()))
    }
}

impl<B, O> Drop for WorkerHandle<B, O>
where
    B: Clone,
    O: RunOutcome + Clone,
{
    fn drop(&mut self) {
        if self.completed || !self.registry.config().publish_failure_on_drop {
            return;
        }

        let message = if thread::panicking() {
            "worker panicked before completing run"
        } else {
            "worker dropped before completing run"
        };

        match self.registry.publish_outcome(&self.id, O::failure(message.to_string())) {
            Ok(()) => warn!(run_id = %self.id, "{}", message),
            Err(e) => debug!(run_id = %self.id, error = %e, "outcome already settled on drop"),
        }
    }
}

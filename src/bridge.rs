//! Async bridge for drivers running on a tokio runtime.
//!
//! Blocking waits are moved to the blocking pool with `spawn_blocking`; the
//! non-blocking calls are forwarded directly.

use std::sync::Arc;

use tokio::task;

use crate::core::errors::{HandoffError, Result};
use crate::registry::Registry;
use crate::run::{RunId, RunOutcome};
use crate::sync::WaitOptions;

pub struct AsyncRegistry<B, O>
where
    B: Clone,
    O: RunOutcome + Clone,
{
    inner: Arc<Registry<B, O>>,
}

impl<B, O> Clone for AsyncRegistry<B, O>
where
    B: Clone,
    O: RunOutcome + Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B, O> AsyncRegistry<B, O>
where
    B: Clone + Send + Sync + 'static,
    O: RunOutcome + Clone + Send + Sync + 'static,
{
    pub fn new(inner: Arc<Registry<B, O>>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<Registry<B, O>> {
        &self.inner
    }

    async fn blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Registry<B, O>) -> Result<T> + Send + 'static,
    {
        let registry = Arc::clone(&self.inner);
        task::spawn_blocking(move || f(&registry))
            .await
            .map_err(|e| HandoffError::internal(format!("{} join failed: {}", operation, e)))?
    }

    pub async fn next_ready(&self, opts: WaitOptions) -> Result<RunId> {
        self.blocking("next_ready", move |reg| reg.next_ready(&opts))
            .await
    }

    pub async fn fetch_forward_outputs(&self, id: RunId, opts: WaitOptions) -> Result<B> {
        self.blocking("fetch_forward_outputs", move |reg| {
            reg.fetch_forward_outputs_with(&id, &opts)
        })
        .await
    }

    pub async fn fetch_outcome(&self, id: RunId, opts: WaitOptions) -> Result<O> {
        self.blocking("fetch_outcome", move |reg| reg.fetch_outcome_with(&id, &opts))
            .await
    }

    pub fn supply_backward(&self, id: &RunId, batch: B) -> Result<()> {
        self.inner.supply_backward(id, batch)
    }

    pub fn is_outcome_ready(&self, id: &RunId) -> Result<bool> {
        self.inner.is_outcome_ready(id)
    }

    pub fn retire_run(&self, id: &RunId) -> Result<O> {
        self.inner.retire_run(id)
    }
}

//! # twophase
//!
//! Cross-thread handoff between one driver thread and any number of worker
//! threads, each running a two-phase (forward, then backward) computation.
//!
//! A worker registers a run, publishes its forward outputs and blocks; the
//! driver picks up the forward outputs whenever it is ready, supplies the
//! backward inputs, wakes the worker and finally collects the outcome.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use twophase::{CompletionOutcome, TensorBatch, TensorRegistry, WaitOptions, WorkerHandle};
//!
//! # fn main() -> twophase::Result<()> {
//! let registry = Arc::new(TensorRegistry::default());
//!
//! let worker_registry = Arc::clone(&registry);
//! std::thread::spawn(move || -> twophase::Result<()> {
//!     let run = WorkerHandle::register(worker_registry, "r1")?;
//!     run.publish_forward(TensorBatch::from(vec![1.0, 2.0]))?;
//!     let _grads = run.await_backward()?;
//!     run.complete(CompletionOutcome::Success)
//! });
//!
//! let id = registry.next_ready(&WaitOptions::forever())?;
//! let _outputs = registry.fetch_forward_outputs(&id)?;
//! registry.supply_backward(&id, TensorBatch::from(vec![0.5]))?;
//! let _outcome = registry.fetch_outcome(&id)?;
//! registry.retire_run(&id)?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod core;
pub mod registry;
pub mod run;
pub mod sync;
pub mod worker;

// Re-exports for convenience
pub use crate::core::errors::{HandoffError, Result};
pub use crate::core::{MetricsSnapshot, RegistryConfig, RegistryConfigBuilder};
pub use bridge::AsyncRegistry;
pub use registry::{Registry, TensorRegistry};
pub use run::{CompletionOutcome, Phase, RunId, RunInfo, RunOutcome, RunState, Tensor, TensorBatch};
pub use sync::{CancelToken, ResultCell, WaitEvent, WaitOptions};
pub use worker::WorkerHandle;

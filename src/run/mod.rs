//! Per-run types: identity, protocol state, payloads and the run record

pub mod id;
pub mod payload;
pub mod record;
pub mod state;

pub use id::RunId;
pub use payload::{CompletionOutcome, Phase, RunOutcome, Tensor, TensorBatch};
pub use record::{RunInfo, RunRecord};
pub use state::RunState;

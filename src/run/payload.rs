//! Default payload types carried between driver and worker.
//!
//! The registry is generic over both; these are what [`TensorRegistry`]
//! uses.
//!
//! [`TensorRegistry`]: crate::registry::TensorRegistry

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome types the registry can count and the worker handle can synthesize
pub trait RunOutcome {
    fn is_success(&self) -> bool;

    /// Build a failure outcome carrying `message`
    fn failure(message: String) -> Self;
}

/// A dense f32 tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    pub fn vector(data: Vec<f32>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Ordered list of tensors passed across a phase boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TensorBatch {
    pub tensors: Vec<Tensor>,
}

impl TensorBatch {
    pub fn new(tensors: Vec<Tensor>) -> Self {
        Self { tensors }
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// All values of all tensors, in order
    pub fn values(&self) -> Vec<f32> {
        self.tensors
            .iter()
            .flat_map(|t| t.data.iter().copied())
            .collect()
    }
}

impl From<Vec<f32>> for TensorBatch {
    fn from(data: Vec<f32>) -> Self {
        Self::new(vec![Tensor::vector(data)])
    }
}

impl From<Vec<Tensor>> for TensorBatch {
    fn from(tensors: Vec<Tensor>) -> Self {
        Self::new(tensors)
    }
}

/// Phase of a run, used to locate failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Forward,
    Backward,
}

/// Final result of a run as reported by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionOutcome {
    Success,
    Failure {
        message: String,
        phase: Option<Phase>,
    },
}

impl CompletionOutcome {
    pub fn failed_in(phase: Phase, message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            phase: Some(phase),
        }
    }

    /// Failure message, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure { message, .. } => Some(message),
        }
    }
}

impl RunOutcome for CompletionOutcome {
    fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    fn failure(message: String) -> Self {
        Self::Failure {
            message,
            phase: None,
        }
    }
}

impl From<anyhow::Result<()>> for CompletionOutcome {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(err) => Self::failure(format!("{:#}", err)),
        }
    }
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure {
                message,
                phase: Some(phase),
            } => write!(f, "failed in {:?} phase: {}", phase, message),
            Self::Failure { message, .. } => write!(f, "failed: {}", message),
        }
    }
}

// Shared infrastructure: errors, configuration, metrics

pub mod config;
pub mod errors;
pub mod metrics;

pub use config::{RegistryConfig, RegistryConfigBuilder};
pub use errors::{HandoffError, Result};
pub use metrics::{HandoffMetrics, MetricsSnapshot};

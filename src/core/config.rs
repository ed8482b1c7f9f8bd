use crate::core::errors::{HandoffError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Registry configuration with all tuning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of runs registered at once
    pub max_active_runs: usize,
    /// Capacity of the driver's ready queue
    pub ready_queue_capacity: usize,
    /// Timeout applied by the plain (non `_with`) blocking calls.
    /// `None` blocks until signaled.
    pub default_wait_timeout: Option<Duration>,
    /// How often a blocked call re-checks its cancel token
    pub cancel_poll_interval: Duration,
    /// Publish a failure outcome when a worker handle is dropped uncompleted
    pub publish_failure_on_drop: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_active_runs: 1_024,
            ready_queue_capacity: 1_024,
            default_wait_timeout: None,
            cancel_poll_interval: Duration::from_millis(10),
            publish_failure_on_drop: true,
        }
    }
}

impl RegistryConfig {
    /// Create a new builder for RegistryConfig
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_active_runs == 0 {
            return Err(HandoffError::configuration(
                "max_active_runs must be greater than 0",
            ));
        }
        if self.ready_queue_capacity == 0 {
            return Err(HandoffError::configuration(
                "ready_queue_capacity must be greater than 0",
            ));
        }
        if self.cancel_poll_interval.is_zero() {
            return Err(HandoffError::configuration(
                "cancel_poll_interval must be greater than 0",
            ));
        }
        if let Some(timeout) = self.default_wait_timeout {
            if timeout.is_zero() {
                return Err(HandoffError::configuration(
                    "default_wait_timeout must be greater than 0 when set",
                ));
            }
        }
        Ok(())
    }

    /// Configuration for development/testing: waits give up after 30s
    pub fn development() -> Self {
        Self {
            max_active_runs: 64,
            ready_queue_capacity: 64,
            default_wait_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        }
    }

    /// Configuration for production: many concurrent runs, unbounded waits
    pub fn production() -> Self {
        Self {
            max_active_runs: 16_384,
            ready_queue_capacity: 16_384,
            cancel_poll_interval: Duration::from_millis(50),
            ..Default::default()
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| HandoffError::io(format!("read {}", path.display()), e))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw),
            Some("json") => Self::from_json_str(&raw),
            other => Err(HandoffError::configuration(format!(
                "unsupported config extension: {:?}",
                other
            ))),
        }
    }
}

/// Builder for RegistryConfig
pub struct RegistryConfigBuilder {
    config: RegistryConfig,
}

impl RegistryConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
        }
    }

    pub fn max_active_runs(mut self, max_active_runs: usize) -> Self {
        self.config.max_active_runs = max_active_runs;
        self
    }

    pub fn ready_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.ready_queue_capacity = capacity;
        self
    }

    /// Set the timeout used by the plain blocking calls
    pub fn default_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.default_wait_timeout = timeout;
        self
    }

    pub fn cancel_poll_interval(mut self, interval: Duration) -> Self {
        self.config.cancel_poll_interval = interval;
        self
    }

    pub fn publish_failure_on_drop(mut self, enabled: bool) -> Self {
        self.config.publish_failure_on_drop = enabled;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<RegistryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RegistryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_wait_timeout, None);
    }

    #[test]
    fn test_presets() {
        let dev = RegistryConfig::development();
        assert!(dev.validate().is_ok());
        assert_eq!(dev.default_wait_timeout, Some(Duration::from_secs(30)));

        let prod = RegistryConfig::production();
        assert!(prod.validate().is_ok());
        assert_eq!(prod.max_active_runs, 16_384);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = RegistryConfig::default();

        config.max_active_runs = 0;
        assert!(config.validate().is_err());
        config.max_active_runs = 10;

        config.ready_queue_capacity = 0;
        assert!(config.validate().is_err());
        config.ready_queue_capacity = 10;

        config.default_wait_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());
        config.default_wait_timeout = None;

        config.cancel_poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = RegistryConfig::builder()
            .max_active_runs(8)
            .ready_queue_capacity(4)
            .default_wait_timeout(Some(Duration::from_millis(250)))
            .publish_failure_on_drop(false)
            .build()
            .unwrap();

        assert_eq!(config.max_active_runs, 8);
        assert_eq!(config.ready_queue_capacity, 4);
        assert_eq!(config.default_wait_timeout, Some(Duration::from_millis(250)));
        assert!(!config.publish_failure_on_drop);

        assert!(RegistryConfig::builder().max_active_runs(0).build().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = RegistryConfig::from_json_str(
            r#"{ "max_active_runs": 3, "default_wait_timeout": { "secs": 2, "nanos": 0 } }"#,
        )
        .unwrap();

        assert_eq!(config.max_active_runs, 3);
        assert_eq!(config.default_wait_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.ready_queue_capacity, RegistryConfig::default().ready_queue_capacity);
    }

    #[test]
    fn test_huge_default_timeout_is_usable() {
        use crate::registry::TensorRegistry;
        use crate::run::{CompletionOutcome, TensorBatch};

        let config = RegistryConfig::from_json_str(
            r#"{ "default_wait_timeout": { "secs": 18446744073709551615, "nanos": 0 } }"#,
        )
        .unwrap();
        assert_eq!(config.default_wait_timeout, Some(Duration::new(u64::MAX, 0)));

        let reg = TensorRegistry::new(config).unwrap();
        let id = reg.create_run("r1").unwrap();
        reg.publish_forward_outputs(&id, TensorBatch::from(vec![1.0])).unwrap();
        reg.publish_outcome(&id, CompletionOutcome::Success).unwrap();

        assert_eq!(reg.fetch_forward_outputs(&id).unwrap().values(), vec![1.0]);
        assert_eq!(reg.fetch_outcome(&id).unwrap(), CompletionOutcome::Success);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = "max_active_runs: 5\nready_queue_capacity: 7\npublish_failure_on_drop: false\n";
        let config = RegistryConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_active_runs, 5);
        assert_eq!(config.ready_queue_capacity, 7);
        assert!(!config.publish_failure_on_drop);
    }

    #[test]
    fn test_invalid_documents_rejected() {
        let err = RegistryConfig::from_json_str(r#"{ "max_active_runs": 0 }"#).unwrap_err();
        assert_eq!(err.category(), "configuration");

        let err = RegistryConfig::from_json_str("{ not json").unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("twophase-config-{}.yml", std::process::id()));
        std::fs::write(&path, "max_active_runs: 9\n").unwrap();
        let config = RegistryConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.max_active_runs, 9);

        let missing = RegistryConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert_eq!(missing.category(), "io");
    }
}

//! Batch configuration and host kwargs.
//!
//! `BatchConfig` controls how the batch driver treats failing rows, when it
//! fans out across threads and which backend it uses. Hosts that pass
//! per-expression kwargs as JSON can deserialize them with [`Kwargs`].

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::kernels::Backend;

/// Default row count at which the batch driver switches to rayon.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1024;

/// What the batch driver does when a row fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Attempt every row; failed rows get the fill value and a status.
    #[default]
    Continue,
    /// Fail the whole call with the lowest-index failing row.
    Abort,
}

/// JSON `null` means NaN.
fn nullable_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn default_null_value() -> f64 {
    f64::NAN
}

fn default_parallel_threshold() -> usize {
    DEFAULT_PARALLEL_THRESHOLD
}

/// Configuration for one batch driver.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Failure policy (default: continue)
    #[serde(default)]
    pub policy: FailurePolicy,
    /// Value written for failed and null rows (default: NaN)
    #[serde(default = "default_null_value", deserialize_with = "nullable_f64")]
    pub null_value: f64,
    /// Minimum row count for parallel evaluation (default: 1024)
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
    /// Force a backend instead of automatic selection
    #[serde(default)]
    pub backend: Option<Backend>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::Continue,
            null_value: f64::NAN,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            backend: None,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON, e.g. `{"policy": "abort"}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the fill value for failed and null rows.
    pub fn with_null_value(mut self, null_value: f64) -> Self {
        self.null_value = null_value;
        self
    }

    /// Set the row count at which evaluation goes parallel.
    pub fn with_parallel_threshold(mut self, rows: usize) -> Self {
        self.parallel_threshold = rows;
        self
    }

    /// Pin the backend. Unavailable backends still fall back to scalar.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallel_threshold == 0 {
            return Err(ConfigError::Invalid(
                "parallel_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_kwargs_null_value() -> f64 {
    0.0
}

/// Per-expression kwargs as a dataframe host passes them:
/// `{"cmp": [1.0, 1.0, 2.0], "null_value": 0.0}`.
///
/// `null_value` defaults to `0.0` here, unlike [`BatchConfig`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Kwargs<T> {
    /// Comparison target
    pub cmp: Vec<T>,
    #[serde(default = "default_kwargs_null_value", deserialize_with = "nullable_f64")]
    pub null_value: f64,
}

impl<'de, T: Deserialize<'de>> Kwargs<T> {
    pub fn from_json(json: &'de str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<T> Kwargs<T> {
    /// Split into the comparison target and a continue-policy configuration.
    pub fn into_config(self) -> (Vec<T>, BatchConfig) {
        let config = BatchConfig::default().with_null_value(self.null_value);
        (self.cmp, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.policy, FailurePolicy::Continue);
        assert!(config.null_value.is_nan());
        assert_eq!(config.parallel_threshold, 1024);
        assert_eq!(config.backend, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new()
            .with_policy(FailurePolicy::Abort)
            .with_null_value(-1.0)
            .with_parallel_threshold(16)
            .with_backend(Backend::Scalar);

        assert_eq!(config.policy, FailurePolicy::Abort);
        assert_eq!(config.null_value, -1.0);
        assert_eq!(config.parallel_threshold, 16);
        assert_eq!(config.backend, Some(Backend::Scalar));
    }

    #[test]
    fn test_batch_config_validation() {
        let config = BatchConfig::new().with_parallel_threshold(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_batch_config_from_json() {
        let config =
            BatchConfig::from_json(r#"{"policy": "abort", "null_value": 0.5, "backend": "scalar"}"#)
                .unwrap();
        assert_eq!(config.policy, FailurePolicy::Abort);
        assert_eq!(config.null_value, 0.5);
        assert_eq!(config.backend, Some(Backend::Scalar));
        assert_eq!(config.parallel_threshold, 1024);

        let config = BatchConfig::from_json(r#"{"null_value": null}"#).unwrap();
        assert!(config.null_value.is_nan());

        let config = BatchConfig::from_json("{}").unwrap();
        assert_eq!(config.policy, FailurePolicy::Continue);

        assert!(BatchConfig::from_json(r#"{"parallel_threshold": 0}"#).is_err());
        assert!(matches!(
            BatchConfig::from_json(r#"{"policy": "retry"}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_kwargs() {
        let kwargs: Kwargs<f32> = Kwargs::from_json(r#"{"cmp": [1.0, 1.0, 2.0]}"#).unwrap();
        assert_eq!(kwargs.cmp, vec![1.0, 1.0, 2.0]);
        assert_eq!(kwargs.null_value, 0.0);

        let kwargs: Kwargs<u8> =
            Kwargs::from_json(r#"{"cmp": [255, 0], "null_value": null}"#).unwrap();
        let (cmp, config) = kwargs.into_config();
        assert_eq!(cmp, vec![255, 0]);
        assert!(config.null_value.is_nan());
        assert_eq!(config.policy, FailurePolicy::Continue);

        assert!(Kwargs::<f64>::from_json(r#"{"null_value": 1.0}"#).is_err());
    }
}

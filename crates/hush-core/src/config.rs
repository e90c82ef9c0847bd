//! In-memory configuration for one scan.

use hush_explore::RetryPolicy;
use hush_ir::types::{Budget, BudgetError};
use serde::{Deserialize, Serialize};

/// Verdict thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TruthConfig {
    /// Minimum share of PROVEN expectations that must be attempted for SUCCESS.
    pub coverage_threshold: f64,
}

impl Default for TruthConfig {
    fn default() -> Self {
        Self {
            coverage_threshold: 0.90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub log_level: String,
    pub json_format: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_format: false,
        }
    }
}

impl TelemetryConfig {
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_json_format(mut self) -> Self {
        self.json_format = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    pub budget: Budget,
    pub truth: TruthConfig,
    pub retry: RetryPolicy,
    pub telemetry: TelemetryConfig,
}

impl ScanConfig {
    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.budget.validate()?;
        let threshold = self.truth.coverage_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::CoverageThreshold(threshold));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid budget: {0}")]
    Budget(#[from] BudgetError),

    #[error("coverage threshold must be within [0, 1], got {0}")]
    CoverageThreshold(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.truth.coverage_threshold, 0.90);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{ "truth": { "coverageThreshold": 0.75 }, "retry": { "maxRetries": 1 } }"#)
                .unwrap();
        assert_eq!(config.truth.coverage_threshold, 0.75);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.budget, Budget::default());
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        let mut config = ScanConfig::default();
        config.truth.coverage_threshold = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::CoverageThreshold(1.5)));
    }

    #[test]
    fn test_zero_budget_cap_is_rejected() {
        let config = ScanConfig::default().with_budget(Budget {
            max_total_interactions: 0,
            ..Default::default()
        });
        assert!(matches!(config.validate(), Err(ConfigError::Budget(_))));
    }
}

//! Pipeline configuration
//!
//! Every component takes its settings explicitly; nothing is read from
//! process-wide state. Partial TOML files fill the rest from defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confidence::ConfidenceConfig;
use crate::error::{ProbeError, Result};
use crate::executor::ExecutorConfig;
use crate::missing::MissingConfig;
use crate::root_cause::RootCauseConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub executor: ExecutorConfig,
    pub root_cause: RootCauseConfig,
    pub missing: MissingConfig,
    pub confidence: ConfidenceConfig,
}

impl ProbeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ProbeConfig = toml::from_str(text)
            .map_err(|e| ProbeError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {:?}", path);
        let text = std::fs::read_to_string(path)
            .map_err(|e| ProbeError::Config(format!("Failed to read {:?}: {}", path, e)))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ProbeError::Config(format!("Failed to render configuration: {}", e)))
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.executor.timeout_ms == 0 {
            problems.push("executor.timeout_ms must be positive".to_string());
        }
        if self.executor.interpreter.trim().is_empty() {
            problems.push("executor.interpreter must not be empty".to_string());
        }

        let unit = |name: &str, value: f64, problems: &mut Vec<String>| {
            if !(0.0..=1.0).contains(&value) {
                problems.push(format!("{} must be within [0, 1], got {}", name, value));
            }
        };
        unit("confidence.threshold", self.confidence.threshold, &mut problems);
        unit("confidence.review_floor", self.confidence.review_floor, &mut problems);
        unit("root_cause.min_confidence", self.root_cause.min_confidence, &mut problems);

        if self.confidence.review_floor > self.confidence.threshold {
            problems.push(format!(
                "confidence.review_floor ({}) must not exceed confidence.threshold ({})",
                self.confidence.review_floor, self.confidence.threshold
            ));
        }
        if self.confidence.window == 0 {
            problems.push("confidence.window must be positive".to_string());
        }
        if self.root_cause.max_candidates_per_violation == 0 {
            problems.push("root_cause.max_candidates_per_violation must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ProbeError::Config(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProbeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.executor.timeout_ms, 1000);
        assert_eq!(config.confidence.threshold, 0.70);
        assert_eq!(config.missing.max_depth, 2);
    }

    #[test]
    fn test_partial_toml() {
        let config = ProbeConfig::from_toml_str(
            "[executor]\ntimeout_ms = 250\n\n[confidence]\nthreshold = 0.9\n",
        )
        .unwrap();
        assert_eq!(config.executor.timeout_ms, 250);
        assert_eq!(config.executor.interpreter, "python3");
        assert_eq!(config.confidence.threshold, 0.9);
        assert_eq!(config.confidence.review_floor, 0.50);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ProbeConfig::from_toml_str(
            "[executor]\ntimeout_ms = 0\n\n[confidence]\nthreshold = 0.4\nreview_floor = 0.6\n",
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("timeout_ms"));
        assert!(message.contains("review_floor"));
        assert_eq!(err.kind(), crate::error::ErrorKind::ConfigError);
    }

    #[test]
    fn test_load_and_render() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[missing]\nmax_depth = 3").unwrap();
        let config = ProbeConfig::load(file.path()).unwrap();
        assert_eq!(config.missing.max_depth, 3);

        let rendered = config.to_toml_string().unwrap();
        assert_eq!(ProbeConfig::from_toml_str(&rendered).unwrap(), config);
    }
}

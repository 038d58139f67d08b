//! Run configuration.
//!
//! Every field has a default, so an empty (or absent) TOML file yields the
//! standard analysis.
//!
//! ```toml
//! horizon = 15
//! headline_cycle = 13.0
//! attempt_pool = "exclude_zero_intercourse"
//! percentiles = [0.5, 0.8, 0.95]
//! output_dir = "plots"
//!
//! [[covariates]]
//! name = "BMI"
//! label = "BMI"
//! field = "bmi"
//! kind = { continuous = { bins = 25, lo = 15.0, hi = 40.0 } }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::correlation::{default_covariates, Covariate, CovariateKind};
use crate::cumulative::{AttemptPool, DEFAULT_HORIZON};
use crate::distribution::DEFAULT_PERCENTILES;

/// Cycle at which the fitted cumulative curve is quoted.
pub const DEFAULT_HEADLINE_CYCLE: f64 = 13.0;

/// Configuration load and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Parameters of one analysis run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Number of cycles tracked (N).
    pub horizon: usize,
    pub headline_cycle: f64,
    pub attempt_pool: AttemptPool,
    /// Ascending fractions in (0, 1).
    pub percentiles: Vec<f64>,
    pub output_dir: PathBuf,
    pub covariates: Vec<Covariate>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            headline_cycle: DEFAULT_HEADLINE_CYCLE,
            attempt_pool: AttemptPool::default(),
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            output_dir: PathBuf::from("plots"),
            covariates: default_covariates(),
        }
    }
}

impl AnalysisConfig {
    /// Reads and validates a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    /// Loads `path` if given, the defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::Invalid("horizon must be at least 1".into()));
        }
        if !self.headline_cycle.is_finite() || self.headline_cycle < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "headline_cycle must be a non-negative number, got {}",
                self.headline_cycle
            )));
        }
        if let Some(p) = self.percentiles.iter().find(|p| !(**p > 0.0 && **p < 1.0)) {
            return Err(ConfigError::Invalid(format!(
                "percentile {p} is outside (0, 1)"
            )));
        }
        if self.percentiles.windows(2).any(|w| w[0] > w[1]) {
            return Err(ConfigError::Invalid(
                "percentiles must be in ascending order".into(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for cov in &self.covariates {
            if !names.insert(cov.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate covariate name '{}'",
                    cov.name
                )));
            }
            if let CovariateKind::Continuous(axis) = cov.kind {
                if !axis.is_valid() {
                    return Err(ConfigError::Invalid(format!(
                        "covariate '{}': need bins >= 1 and lo < hi, got {} bins over [{}, {})",
                        cov.name, axis.bins, axis.lo, axis.hi
                    )));
                }
                if !cov.field.is_numeric() {
                    return Err(ConfigError::Invalid(format!(
                        "covariate '{}': field {:?} is not numeric",
                        cov.name, cov.field
                    )));
                }
            }
        }
        Ok(())
    }
}

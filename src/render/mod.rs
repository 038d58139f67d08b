//! Output of analysis results.
//!
//! The pipeline calls one [`Renderer`] hook per plot. Two outputs ship
//! with the crate:
//! - [`JsonRenderer`]: one JSON artifact per plot under an output directory
//! - [`write_console_summary`]: plain-text headline numbers and ranking

mod console;
mod json;

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::{CovariateReport, CumulativeReport, DistributionReport, UndefinedCorrelation};
use crate::ranking::CorrelationResult;

pub use console::write_console_summary;
pub use json::JsonRenderer;

/// Failure to emit an artifact.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {artifact}")]
    Serialize {
        artifact: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Consumer of analysis results, one hook per plot.
pub trait Renderer {
    /// Cumulative probability curve with its fit.
    fn cumulative(&mut self, report: &CumulativeReport) -> Result<(), RenderError>;

    /// Cycles-to-pregnancy histogram with its fit and percentile cuts.
    fn distribution(&mut self, report: &DistributionReport) -> Result<(), RenderError>;

    /// Binned correlation of one covariate.
    fn correlation(&mut self, report: &CovariateReport) -> Result<(), RenderError>;

    /// Ranked coefficients plus the covariates left out of the ranking.
    fn summary(
        &mut self,
        ranking: &[CorrelationResult],
        undefined: &[UndefinedCorrelation],
    ) -> Result<(), RenderError>;
}

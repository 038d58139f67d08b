//! JSON artifacts, pretty-printed, one file per plot.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::{RenderError, Renderer};
use crate::pipeline::{CovariateReport, CumulativeReport, DistributionReport, UndefinedCorrelation};
use crate::ranking::CorrelationResult;

pub const CUMULATIVE_FILE: &str = "cumulative_probability.json";
pub const DISTRIBUTION_FILE: &str = "cycles_to_pregnancy.json";
pub const SUMMARY_FILE: &str = "correlation_summary.json";

/// Writes artifacts under a directory, created on first write.
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Summary<'a> {
    ranking: &'a [CorrelationResult],
    undefined: &'a [UndefinedCorrelation],
}

impl JsonRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            written: Vec::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Paths written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// File name of the correlation artifact for a covariate.
    pub fn correlation_file(name: &str) -> String {
        let safe: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        format!("correlation_{safe}.json")
    }

    fn write<T: Serialize + ?Sized>(
        &mut self,
        file_name: &str,
        value: &T,
    ) -> Result<(), RenderError> {
        let json = serde_json::to_string_pretty(value).map_err(|source| RenderError::Serialize {
            artifact: file_name.to_string(),
            source,
        })?;

        fs::create_dir_all(&self.output_dir).map_err(|source| RenderError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        let path = self.output_dir.join(file_name);
        fs::write(&path, json).map_err(|source| RenderError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "wrote artifact");
        self.written.push(path);
        Ok(())
    }
}

impl Renderer for JsonRenderer {
    fn cumulative(&mut self, report: &CumulativeReport) -> Result<(), RenderError> {
        self.write(CUMULATIVE_FILE, report)
    }

    fn distribution(&mut self, report: &DistributionReport) -> Result<(), RenderError> {
        self.write(DISTRIBUTION_FILE, report)
    }

    fn correlation(&mut self, report: &CovariateReport) -> Result<(), RenderError> {
        self.write(&Self::correlation_file(&report.name), report)
    }

    fn summary(
        &mut self,
        ranking: &[CorrelationResult],
        undefined: &[UndefinedCorrelation],
    ) -> Result<(), RenderError> {
        self.write(SUMMARY_FILE, &Summary { ranking, undefined })?;
        info!(
            dir = %self.output_dir.display(),
            artifacts = self.written.len(),
            "artifacts written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::correlate_categorical;
    use crate::cumulative::{cumulative_curve, AttemptPool};

    #[test]
    fn file_names() {
        assert_eq!(JsonRenderer::correlation_file("BMI"), "correlation_BMI.json");
        assert_eq!(
            JsonRenderer::correlation_file("cycle length/std"),
            "correlation_cycle_length_std.json"
        );
    }

    #[test]
    fn writes_cumulative_artifact() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut renderer = JsonRenderer::new(dir.path().join("plots"));
        let report = CumulativeReport {
            pool: AttemptPool::AllParticipants,
            points: cumulative_curve(&[4, 2], &[1, 1]),
            fit: None,
            headline: None,
        };
        renderer.cumulative(&report).expect("written");

        let path = dir.path().join("plots").join(CUMULATIVE_FILE);
        let text = fs::read_to_string(&path).expect("artifact exists");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["pool"], "all_participants");
        assert_eq!(value["points"][0]["attempts"], 4);
        let second = value["points"][1]["cumulative_probability"]
            .as_f64()
            .expect("number");
        assert!((second - 62.5).abs() < 1e-9);
        assert!(value["fit"].is_null());
        assert_eq!(renderer.written(), &[path]);
    }

    #[test]
    fn writes_correlation_and_summary() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut renderer = JsonRenderer::new(dir.path());
        let correlation =
            correlate_categorical(&[("A", 1.0), ("A", 3.0), ("B", 2.0)]).expect("defined");
        let report = CovariateReport {
            name: "education".into(),
            label: "Education".into(),
            correlation,
        };
        renderer.correlation(&report).expect("written");
        renderer
            .summary(
                &[CorrelationResult::new("Education", 0.0)],
                &[UndefinedCorrelation {
                    name: "BMI".into(),
                    label: "BMI".into(),
                    reason: "no pairs".into(),
                }],
            )
            .expect("written");

        let text =
            fs::read_to_string(dir.path().join("correlation_education.json")).expect("exists");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["correlation"]["bins"][0]["value"], "A");
        assert_eq!(value["correlation"]["trend"]["model"], "constant");

        let text = fs::read_to_string(dir.path().join(SUMMARY_FILE)).expect("exists");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["ranking"][0]["label"], "Education");
        assert_eq!(value["undefined"][0]["name"], "BMI");
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        // a regular file cannot host a directory
        let mut renderer = JsonRenderer::new(file.path().join("plots"));
        let err = renderer.summary(&[], &[]).unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }
}

//! One batch analysis run.
//!
//! ```text
//! RecordStore ─┬─ CumulativeProbabilityEstimator ──┐
//!              ├─ CycleHistogram + decay fit ──────┤
//!              └─ covariate correlations (rayon) ──┴─ rank ─ Renderer
//! ```
//!
//! Each stage reads the immutable store and returns plain data. Render
//! failures are logged and do not abort the run.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::correlation::{BinnedCorrelation, Covariate};
use crate::cumulative::{
    fit_saturating, AttemptPool, CumulativeProbabilityEstimator, CyclePoint, SaturatingFit,
};
use crate::distribution::{
    fit_exponential_decay, percentiles_of, summarize, CycleHistogram, CycleSummary, ExponentialFit,
};
use crate::ranking::{rank, CorrelationResult};
use crate::record::RecordStore;
use crate::render::Renderer;

/// The fitted cumulative probability quoted at a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Headline {
    pub cycle: f64,
    /// Percent.
    pub probability: f64,
}

/// Cumulative probability curve and its saturating fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativeReport {
    pub pool: AttemptPool,
    pub points: Vec<CyclePoint>,
    pub fit: Option<SaturatingFit>,
    pub headline: Option<Headline>,
}

/// A requested fraction and the cycle at which it is reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentileCut {
    pub fraction: f64,
    pub cycle: f64,
}

/// Cycles-to-pregnancy histogram, decay fit, and percentile cuts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    pub histogram: CycleHistogram,
    pub fit: Option<ExponentialFit>,
    pub percentiles: Vec<PercentileCut>,
    pub summary: Option<CycleSummary>,
}

/// A covariate with a defined correlation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CovariateReport {
    pub name: String,
    pub label: String,
    pub correlation: BinnedCorrelation,
}

/// A covariate whose coefficient could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndefinedCorrelation {
    pub name: String,
    pub label: String,
    pub reason: String,
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub records: usize,
    pub cumulative: CumulativeReport,
    pub distribution: Option<DistributionReport>,
    /// Defined correlations, in covariate-table order.
    pub covariates: Vec<CovariateReport>,
    pub undefined: Vec<UndefinedCorrelation>,
    /// Defined correlations by descending |r|.
    pub ranking: Vec<CorrelationResult>,
}

/// Runs every stage over `store` and hands the results to `renderer`.
pub fn run<R: Renderer + ?Sized>(
    store: &RecordStore,
    config: &AnalysisConfig,
    renderer: &mut R,
) -> AnalysisReport {
    info!(records = store.count(), horizon = config.horizon, "starting analysis");

    let cumulative = cumulative_stage(store, config);
    if let Err(err) = renderer.cumulative(&cumulative) {
        warn!(error = %err, "failed to render cumulative probability");
    }

    let distribution = distribution_stage(store, config);
    if let Some(distribution) = &distribution {
        if let Err(err) = renderer.distribution(distribution) {
            warn!(error = %err, "failed to render cycles-to-pregnancy distribution");
        }
    }

    let (covariates, undefined) = correlation_stage(store, &config.covariates);
    for report in &covariates {
        if let Err(err) = renderer.correlation(report) {
            warn!(covariate = %report.name, error = %err, "failed to render correlation");
        }
    }

    let results: Vec<CorrelationResult> = covariates
        .iter()
        .map(|c| CorrelationResult::new(c.name.clone(), c.correlation.coefficient))
        .collect();
    let ranking = rank(&results);
    if let Err(err) = renderer.summary(&ranking, &undefined) {
        warn!(error = %err, "failed to render correlation summary");
    }

    info!(
        defined = covariates.len(),
        undefined = undefined.len(),
        "analysis complete"
    );

    AnalysisReport {
        records: store.count(),
        cumulative,
        distribution,
        covariates,
        undefined,
        ranking,
    }
}

fn cumulative_stage(store: &RecordStore, config: &AnalysisConfig) -> CumulativeReport {
    let points = match CumulativeProbabilityEstimator::new(config.horizon, config.attempt_pool) {
        Some(estimator) => estimator.estimate(store),
        None => Vec::new(),
    };

    let fit = fit_saturating(&points);
    if fit.is_none() && !points.is_empty() {
        warn!("saturating fit to the cumulative curve did not converge");
    }
    let headline = fit.map(|f| Headline {
        cycle: config.headline_cycle,
        probability: f.eval(config.headline_cycle),
    });
    if let Some(h) = headline {
        info!(
            cycle = h.cycle,
            probability = h.probability,
            "fitted probability of pregnancy by cycle {}: {:.1}%",
            h.cycle,
            h.probability
        );
    }

    CumulativeReport {
        pool: config.attempt_pool,
        points,
        fit,
        headline,
    }
}

fn distribution_stage(store: &RecordStore, config: &AnalysisConfig) -> Option<DistributionReport> {
    let histogram = CycleHistogram::build(store, config.horizon)?;

    let fit = fit_exponential_decay(&histogram);
    let percentiles = match &fit {
        Some(fit) => match percentiles_of(fit, config.horizon, &config.percentiles) {
            Ok(cycles) => config
                .percentiles
                .iter()
                .zip(cycles)
                .map(|(&fraction, cycle)| PercentileCut { fraction, cycle })
                .collect(),
            Err(err) => {
                warn!(error = %err, "percentiles unavailable");
                Vec::new()
            }
        },
        None => {
            warn!(pregnancies = histogram.total(), "exponential decay fit failed");
            Vec::new()
        }
    };
    for cut in &percentiles {
        info!(
            fraction = cut.fraction,
            cycle = cut.cycle,
            "{:.0}% of pregnancies by cycle {:.2}",
            cut.fraction * 100.0,
            cut.cycle
        );
    }

    Some(DistributionReport {
        summary: summarize(store),
        histogram,
        fit,
        percentiles,
    })
}

fn correlation_stage(
    store: &RecordStore,
    covariates: &[Covariate],
) -> (Vec<CovariateReport>, Vec<UndefinedCorrelation>) {
    let outcomes: Vec<(&Covariate, _)> = covariates
        .par_iter()
        .map(|cov| (cov, cov.evaluate(store)))
        .collect();

    let mut defined = Vec::new();
    let mut undefined = Vec::new();
    for (cov, outcome) in outcomes {
        match outcome {
            Ok(correlation) => {
                info!(
                    covariate = %cov.name,
                    coefficient = correlation.coefficient,
                    entries = correlation.entries,
                    "correlation computed"
                );
                defined.push(CovariateReport {
                    name: cov.name.clone(),
                    label: cov.label.clone(),
                    correlation,
                });
            }
            Err(err) => {
                warn!(
                    covariate = %cov.name,
                    error = %err,
                    "correlation undefined, excluded from ranking"
                );
                undefined.push(UndefinedCorrelation {
                    name: cov.name.clone(),
                    label: cov.label.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    (defined, undefined)
}

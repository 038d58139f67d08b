//! Distribution of cycles-to-pregnancy.
//!
//! Histogram of the cycle in which each observed pregnancy occurred, an
//! exponential-decay fit to that histogram, and percentile cut points read
//! off the fitted curve.
//!
//! # Examples
//!
//! ```
//! use u_fertility::distribution::{fit_exponential_decay, percentiles_of, CycleHistogram};
//! use u_fertility::record::RecordStore;
//!
//! let rows: Vec<String> = [(1, 40), (2, 24), (3, 15), (4, 9), (5, 5), (6, 3)]
//!     .iter()
//!     .flat_map(|&(cycle, n)| (0..n).map(move |i| {
//!         format!("{i} -1 -1 -1 -1 -1 -1 {cycle} pregnant -1 -1 -1 -1 -1")
//!     }))
//!     .collect();
//! let store = RecordStore::load(&rows).store;
//!
//! let hist = CycleHistogram::build(store.records(), 6).unwrap();
//! assert_eq!(hist.counts[0], 40);
//!
//! let fit = fit_exponential_decay(&hist).unwrap();
//! assert!(fit.b > 0.0);
//!
//! let cuts = percentiles_of(&fit, 6, &[0.5, 0.8, 0.95]).unwrap();
//! assert_eq!(cuts.len(), 3);
//! assert!(cuts.windows(2).all(|w| w[0] <= w[1]));
//! ```

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use u_numflow::stats;

use crate::record::Record;
use crate::regression::{fit_curve, fit_linear_weighted, CurveModel, TrendModel};

/// Percentiles reported by default.
pub const DEFAULT_PERCENTILES: [f64; 3] = [0.5, 0.8, 0.95];

/// Scan resolution of [`percentiles_of`], in cycles.
pub const PERCENTILE_STEP: f64 = 0.05;

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Unit-width histogram of pregnancy cycles, bins centred on `1..=N`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleHistogram {
    /// Bin centres `1.0, 2.0, …, N`.
    pub centers: Vec<f64>,
    /// Pregnancies per bin.
    pub counts: Vec<u32>,
    /// Pregnancies beyond cycle N.
    pub overflow: u32,
}

impl CycleHistogram {
    /// Fills the histogram from the pregnant records in `records`.
    ///
    /// Returns `None` if `horizon` is zero.
    pub fn build<'a, I>(records: I, horizon: usize) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        if horizon == 0 {
            return None;
        }

        let mut counts = vec![0_u32; horizon];
        let mut overflow = 0;
        for record in records.into_iter().filter(|r| r.outcome.is_pregnant()) {
            let Some(index) = (record.cycles_trying as usize).checked_sub(1) else {
                continue;
            };
            match counts.get_mut(index) {
                Some(slot) => *slot += 1,
                None => overflow += 1,
            }
        }

        Some(Self {
            centers: (1..=horizon).map(|c| c as f64).collect(),
            counts,
            overflow,
        })
    }

    pub fn horizon(&self) -> usize {
        self.counts.len()
    }

    /// Total in-range entries.
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Exponential decay fit
// ---------------------------------------------------------------------------

/// f(x) = a·e^{−b·x}.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExponentialFit {
    pub a: f64,
    pub b: f64,
}

/// A curve with a closed-form definite integral.
pub trait Integrable {
    /// ∫ₗₒʰⁱ f(x) dx
    fn integral(&self, lo: f64, hi: f64) -> f64;
}

impl ExponentialFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.a * (-self.b * x).exp()
    }
}

impl Integrable for ExponentialFit {
    fn integral(&self, lo: f64, hi: f64) -> f64 {
        if self.b.abs() < 1e-12 {
            return self.a * (hi - lo);
        }
        self.a / self.b * ((-self.b * lo).exp() - (-self.b * hi).exp())
    }
}

struct Decay;

impl CurveModel for Decay {
    fn eval(&self, p: [f64; 2], x: f64) -> f64 {
        p[0] * (-p[1] * x).exp()
    }

    fn gradient(&self, p: [f64; 2], x: f64) -> [f64; 2] {
        let e = (-p[1] * x).exp();
        [e, -p[0] * x * e]
    }
}

/// Fits `a·e^{−b·x}` to the histogram over `[0.5, N]`.
///
/// # Algorithm
///
/// 1. Seed from a straight line through (x, ln nₓ) weighted by nₓ.
/// 2. Refine with Levenberg-Marquardt on Σ (nₓ − f(x))² / nₓ, i.e. a
///    Poisson χ² with empty bins left out.
///
/// # Returns
///
/// `None` if fewer than two bins are populated or the fit diverges.
pub fn fit_exponential_decay(hist: &CycleHistogram) -> Option<ExponentialFit> {
    let upper = hist.horizon() as f64;
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut w = Vec::new();
    for (&center, &count) in hist.centers.iter().zip(&hist.counts) {
        if count == 0 || center < 0.5 || center > upper {
            continue;
        }
        x.push(center);
        y.push(f64::from(count));
        w.push(1.0 / f64::from(count));
    }
    if x.len() < 2 {
        return None;
    }

    let ln_y: Vec<f64> = y.iter().map(|v| v.ln()).collect();
    let seed = match fit_linear_weighted(&x, &ln_y, &y)? {
        TrendModel::Linear { c0, c1 } => [c0.exp(), -c1],
        TrendModel::Constant { c0 } => [c0.exp(), 0.0],
    };

    let fit = fit_curve(&Decay, &x, &y, &w, seed)?;
    let [a, b] = fit.params;
    debug!(
        a,
        b,
        chi_squared = fit.chi_squared,
        iterations = fit.iterations,
        "exponential decay fit"
    );
    Some(ExponentialFit { a, b })
}

// ---------------------------------------------------------------------------
// Percentiles
// ---------------------------------------------------------------------------

/// Invalid percentile requests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PercentileError {
    #[error("percentile targets must be in ascending order")]
    NotAscending,
    #[error("fitted curve has no positive area over [1, {horizon}]")]
    DegenerateCurve { horizon: usize },
}

/// Cycle counts at which the fitted curve accumulates the given fractions
/// of its area over `[1, N]`.
///
/// Scans `x = 0, 0.05, 0.10, … < N` and resolves the next pending target
/// `p` at the first `x` where `∫₁ˣ f / ∫₁ᴺ f > p`. Targets are consumed in
/// order and at most one per step, so two targets crossed at the same
/// step resolve one step apart and the output is strictly ascending.
/// Targets that the scan never reaches are simply absent from the result.
///
/// # Errors
///
/// [`PercentileError::NotAscending`] if `targets` is not sorted
/// ascending; [`PercentileError::DegenerateCurve`] if `∫₁ᴺ f` is not a
/// positive finite number.
pub fn percentiles_of<F: Integrable>(
    curve: &F,
    horizon: usize,
    targets: &[f64],
) -> Result<Vec<f64>, PercentileError> {
    if targets.windows(2).any(|w| !(w[0] <= w[1])) || targets.iter().any(|t| t.is_nan()) {
        return Err(PercentileError::NotAscending);
    }

    let upper = horizon as f64;
    let total = curve.integral(1.0, upper);
    if !total.is_finite() || total <= 0.0 {
        return Err(PercentileError::DegenerateCurve { horizon });
    }

    let mut resolved = Vec::with_capacity(targets.len());
    let mut pending = targets.iter().peekable();
    let mut step = 0_u32;
    loop {
        let x = f64::from(step) * PERCENTILE_STEP;
        if x >= upper || pending.peek().is_none() {
            break;
        }
        let fraction = curve.integral(1.0, x) / total;
        // at most one target per step
        if let Some(&&p) = pending.peek() {
            if fraction > p {
                resolved.push(x);
                pending.next();
            }
        }
        step += 1;
    }

    if pending.peek().is_some() {
        debug!(unresolved = pending.len(), "percentile scan exhausted the domain");
    }
    Ok(resolved)
}

// ---------------------------------------------------------------------------
// Descriptive summary
// ---------------------------------------------------------------------------

/// Descriptive statistics of cycles-to-pregnancy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleSummary {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` for a single pregnancy.
    pub std_dev: Option<f64>,
}

/// Summarises `cycles_trying` over the pregnant records.
///
/// Returns `None` if there are no pregnancies.
pub fn summarize<'a, I>(records: I) -> Option<CycleSummary>
where
    I: IntoIterator<Item = &'a Record>,
{
    let cycles: Vec<f64> = records
        .into_iter()
        .filter(|r| r.outcome.is_pregnant())
        .map(|r| f64::from(r.cycles_trying))
        .collect();
    if cycles.is_empty() {
        return None;
    }

    Some(CycleSummary {
        n: cycles.len(),
        mean: stats::mean(&cycles)?,
        median: stats::median(&cycles)?,
        std_dev: stats::std_dev(&cycles),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Outcome;

    fn record(cycles: u32, outcome: Outcome) -> Record {
        Record {
            id: 0,
            bmi: None,
            age: None,
            country: None,
            pregnancies_before: None,
            education: None,
            sleep_pattern: None,
            cycles_trying: cycles,
            outcome,
            dedication: None,
            average_cycle_length: None,
            cycle_length_std: None,
            cycle_regularity: None,
            intercourse_frequency: None,
        }
    }

    fn geometric_histogram(horizon: usize, a: f64, b: f64) -> CycleHistogram {
        let centers: Vec<f64> = (1..=horizon).map(|c| c as f64).collect();
        let counts = centers
            .iter()
            .map(|&x| (a * (-b * x).exp()).round() as u32)
            .collect();
        CycleHistogram {
            centers,
            counts,
            overflow: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Histogram
    // -----------------------------------------------------------------------

    #[test]
    fn histogram_counts_only_pregnancies() {
        let records = vec![
            record(1, Outcome::Pregnant),
            record(1, Outcome::Pregnant),
            record(3, Outcome::Pregnant),
            record(2, Outcome::NotPregnant),
            record(9, Outcome::Pregnant),
        ];
        let hist = CycleHistogram::build(&records, 4).expect("histogram");
        assert_eq!(hist.centers, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(hist.counts, vec![2, 0, 1, 0]);
        assert_eq!(hist.overflow, 1);
        assert_eq!(hist.total(), 3);
    }

    #[test]
    fn histogram_ignores_zero_cycle_records() {
        let records = vec![record(0, Outcome::Pregnant), record(2, Outcome::Pregnant)];
        let hist = CycleHistogram::build(&records, 3).expect("histogram");
        assert_eq!(hist.counts, vec![0, 1, 0]);
        assert_eq!(hist.overflow, 0);
    }

    #[test]
    fn histogram_zero_horizon() {
        assert!(CycleHistogram::build(&Vec::<Record>::new(), 0).is_none());
    }

    // -----------------------------------------------------------------------
    // Fit
    // -----------------------------------------------------------------------

    #[test]
    fn decay_fit_recovers_parameters() {
        let hist = geometric_histogram(15, 5000.0, 0.25);
        let fit = fit_exponential_decay(&hist).expect("fit");
        assert!((fit.b - 0.25).abs() < 0.01, "b = {}", fit.b);
        assert!((fit.a - 5000.0).abs() / 5000.0 < 0.02, "a = {}", fit.a);
    }

    #[test]
    fn decay_fit_needs_two_bins() {
        let hist = CycleHistogram {
            centers: vec![1.0, 2.0, 3.0],
            counts: vec![10, 0, 0],
            overflow: 0,
        };
        assert!(fit_exponential_decay(&hist).is_none());
    }

    #[test]
    fn integral_closed_form() {
        let f = ExponentialFit { a: 2.0, b: 0.5 };
        // ∫₀² 2e^{−x/2} dx = 4(1 − e^{−1})
        let expected = 4.0 * (1.0 - (-1.0_f64).exp());
        assert!((f.integral(0.0, 2.0) - expected).abs() < 1e-12);

        let flat = ExponentialFit { a: 3.0, b: 0.0 };
        assert!((flat.integral(1.0, 4.0) - 9.0).abs() < 1e-12);
    }

    // -----------------------------------------------------------------------
    // Percentiles
    // -----------------------------------------------------------------------

    #[test]
    fn percentiles_of_flat_curve() {
        // uniform over [1, 11]: fraction(x) = (x − 1)/10
        let flat = ExponentialFit { a: 1.0, b: 0.0 };
        let cuts = percentiles_of(&flat, 11, &[0.512, 0.813]).expect("percentiles");
        assert_eq!(cuts.len(), 2);
        assert!((cuts[0] - 6.15).abs() < 1e-9, "first cut = {}", cuts[0]);
        assert!((cuts[1] - 9.15).abs() < 1e-9, "second cut = {}", cuts[1]);
    }

    #[test]
    fn close_targets_resolve_on_successive_steps() {
        let flat = ExponentialFit { a: 1.0, b: 0.0 };
        let cuts = percentiles_of(&flat, 11, &[0.5, 0.501]).expect("percentiles");
        assert_eq!(cuts.len(), 2);
        assert!((cuts[0] - 6.05).abs() < 1e-9, "first cut = {}", cuts[0]);
        assert!((cuts[1] - 6.10).abs() < 1e-9, "second cut = {}", cuts[1]);
    }

    #[test]
    fn percentiles_ascending_and_bounded() {
        let fit = ExponentialFit { a: 100.0, b: 0.3 };
        let cuts = percentiles_of(&fit, 15, &DEFAULT_PERCENTILES).expect("percentiles");
        assert_eq!(cuts.len(), 3);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));
        assert!(cuts.iter().all(|&x| x <= 15.0));
    }

    #[test]
    fn unreachable_targets_are_absent() {
        let fit = ExponentialFit { a: 100.0, b: 0.3 };
        let cuts = percentiles_of(&fit, 15, &[0.5, 1.0]).expect("percentiles");
        assert_eq!(cuts.len(), 1);
    }

    #[test]
    fn targets_must_be_ascending() {
        let fit = ExponentialFit { a: 100.0, b: 0.3 };
        assert_eq!(
            percentiles_of(&fit, 15, &[0.8, 0.5]),
            Err(PercentileError::NotAscending)
        );
    }

    #[test]
    fn degenerate_curve() {
        let zero = ExponentialFit { a: 0.0, b: 0.3 };
        assert_eq!(
            percentiles_of(&zero, 15, &[0.5]),
            Err(PercentileError::DegenerateCurve { horizon: 15 })
        );
    }

    // -----------------------------------------------------------------------
    // Summary
    // -----------------------------------------------------------------------

    #[test]
    fn summary_over_pregnancies() {
        let records = vec![
            record(1, Outcome::Pregnant),
            record(2, Outcome::Pregnant),
            record(6, Outcome::Pregnant),
            record(12, Outcome::NotPregnant),
        ];
        let s = summarize(&records).expect("summary");
        assert_eq!(s.n, 3);
        assert!((s.mean - 3.0).abs() < 1e-12);
        assert!((s.median - 2.0).abs() < 1e-12);
        assert!(s.std_dev.expect("std dev") > 0.0);
    }

    #[test]
    fn summary_without_pregnancies() {
        assert!(summarize(&[record(3, Outcome::NotPregnant)]).is_none());
    }
}

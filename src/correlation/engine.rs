//! Binned correlation between a covariate and cycles-to-pregnancy.
//!
//! # Algorithm
//!
//! 1. Fill a 2D histogram: covariate on x (B uniform bins, or one bin per
//!    category), cycles-to-pregnancy on y (13 unit bins centred on 1..13).
//! 2. For every x-bin with n > 0 entries:
//!    `mean = Σ c_y·y / n`, `std_error = mean / √n`.
//! 3. Pearson r from the bin contents (bin centres weighted by counts).
//! 4. Trend through the per-bin means weighted by `1/std_error²`: a line if
//!    `|r| > 0.10`, a constant otherwise.
//!
//! The standard error in step 2 scales the mean itself rather than the
//! sample spread; it is the reporting convention these plots have always
//! used and is kept as is.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::histogram::{Axis, Histogram2d};
use crate::regression::{fit_constant_weighted, fit_linear_weighted, TrendModel};

/// Number of outcome bins (cycles 1..=13).
pub const OUTCOME_BINS: usize = 13;
/// Lower edge of the outcome axis.
pub const OUTCOME_LO: f64 = 0.5;
/// Upper edge of the outcome axis.
pub const OUTCOME_HI: f64 = 13.5;

/// |r| above which the trend is a straight line instead of a constant.
pub const TREND_THRESHOLD: f64 = 0.10;

/// Binning of a continuous covariate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuousAxis {
    pub bins: usize,
    pub lo: f64,
    pub hi: f64,
}

impl ContinuousAxis {
    pub const fn new(bins: usize, lo: f64, hi: f64) -> Self {
        Self { bins, lo, hi }
    }

    pub fn is_valid(&self) -> bool {
        self.axis().is_some()
    }

    fn axis(&self) -> Option<Axis> {
        Axis::new(self.bins, self.lo, self.hi)
    }
}

/// Why no correlation coefficient could be computed.
///
/// Every variant means "no signal": the covariate is reported but left out
/// of the ranking. The coefficient is never replaced by zero.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorrelationError {
    #[error("no (covariate, outcome) pairs to correlate")]
    EmptyInput,
    #[error("all {dropped} pairs fall outside the histogram range")]
    NoEntriesInRange { dropped: u32 },
    #[error("covariate or outcome has zero variance across {entries} binned entries")]
    ZeroVariance { entries: u32 },
    #[error("invalid covariate axis: {bins} bins over [{lo}, {hi})")]
    InvalidAxis { bins: usize, lo: f64, hi: f64 },
}

/// Position of a bin on the covariate axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BinValue {
    /// Bin midpoint.
    Numeric(f64),
    Category(String),
}

/// Outcome statistics for one covariate bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub value: BinValue,
    /// Position used for fitting (the midpoint, or `index + 0.5` for categories).
    pub position: f64,
    pub count: u32,
    /// Mean cycles-to-pregnancy; `None` for an empty bin.
    pub mean_outcome: Option<f64>,
    /// `mean_outcome / √count`; `None` for an empty bin.
    pub std_error: Option<f64>,
}

/// Output of the correlation engine for one covariate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinnedCorrelation {
    /// Pearson r in [-1, 1] from the binned data.
    pub coefficient: f64,
    pub bins: Vec<Bin>,
    /// Trend through the bin means; `None` if the fit was impossible.
    pub trend: Option<TrendModel>,
    /// Entries inside the histogram.
    pub entries: u32,
    /// Pairs that fell outside either axis.
    pub out_of_range: u32,
}

const OUTCOME_AXIS: Axis = Axis::fixed(OUTCOME_BINS, OUTCOME_LO, OUTCOME_HI);

/// Correlates a continuous covariate with the outcome metric.
///
/// # Errors
///
/// See [`CorrelationError`].
///
/// # Examples
///
/// ```
/// use u_fertility::correlation::{correlate_continuous, ContinuousAxis};
///
/// let pairs: Vec<(f64, f64)> = (0..40)
///     .map(|i| (20.0 + (i % 10) as f64, 1.0 + (i % 10) as f64))
///     .collect();
/// let result = correlate_continuous(&pairs, ContinuousAxis::new(10, 20.0, 30.0)).unwrap();
/// assert!(result.coefficient > 0.99);
/// ```
pub fn correlate_continuous(
    pairs: &[(f64, f64)],
    axis: ContinuousAxis,
) -> Result<BinnedCorrelation, CorrelationError> {
    if pairs.is_empty() {
        return Err(CorrelationError::EmptyInput);
    }
    let x_axis = axis.axis().ok_or(CorrelationError::InvalidAxis {
        bins: axis.bins,
        lo: axis.lo,
        hi: axis.hi,
    })?;

    let mut hist = Histogram2d::new(x_axis, OUTCOME_AXIS);
    for &(x, y) in pairs {
        hist.fill(x, y);
    }

    let values = (0..x_axis.bins())
        .map(|i| BinValue::Numeric(x_axis.center(i)))
        .collect();
    analyse(&hist, values)
}

/// Correlates a categorical covariate with the outcome metric.
///
/// One x-bin per distinct label, in first-seen order, centred at
/// `0.5, 1.5, …`.
///
/// # Examples
///
/// ```
/// use u_fertility::correlation::{correlate_categorical, BinValue};
/// use u_fertility::regression::TrendModel;
///
/// let result = correlate_categorical(&[("A", 1.0), ("A", 3.0), ("B", 2.0)]).unwrap();
/// assert_eq!(result.bins[0].value, BinValue::Category("A".into()));
/// assert_eq!(result.bins[0].mean_outcome, Some(2.0));
/// assert_eq!(result.bins[1].mean_outcome, Some(2.0));
/// assert!(result.coefficient.abs() < 1e-12);
/// assert!(matches!(result.trend, Some(TrendModel::Constant { .. })));
/// ```
pub fn correlate_categorical<S: AsRef<str>>(
    pairs: &[(S, f64)],
) -> Result<BinnedCorrelation, CorrelationError> {
    if pairs.is_empty() {
        return Err(CorrelationError::EmptyInput);
    }

    let mut labels: Vec<&str> = Vec::new();
    let mut indices = Vec::with_capacity(pairs.len());
    for (label, _) in pairs {
        let label = label.as_ref();
        let index = match labels.iter().position(|l| *l == label) {
            Some(i) => i,
            None => {
                labels.push(label);
                labels.len() - 1
            }
        };
        indices.push(index);
    }

    let x_axis = Axis::new(labels.len(), 0.0, labels.len() as f64).ok_or(
        CorrelationError::InvalidAxis {
            bins: labels.len(),
            lo: 0.0,
            hi: labels.len() as f64,
        },
    )?;
    let mut hist = Histogram2d::new(x_axis, OUTCOME_AXIS);
    for (&index, (_, y)) in indices.iter().zip(pairs) {
        hist.fill_bin(index, *y);
    }

    let values = labels
        .into_iter()
        .map(|l| BinValue::Category(l.to_string()))
        .collect();
    analyse(&hist, values)
}

fn analyse(
    hist: &Histogram2d,
    values: Vec<BinValue>,
) -> Result<BinnedCorrelation, CorrelationError> {
    let out_of_range = hist.out_of_range();
    let moments = hist.moments().ok_or(CorrelationError::NoEntriesInRange {
        dropped: out_of_range,
    })?;
    if moments.var_x < 1e-300 || moments.var_y < 1e-300 {
        return Err(CorrelationError::ZeroVariance {
            entries: moments.entries,
        });
    }
    let coefficient =
        (moments.cov_xy / (moments.var_x.sqrt() * moments.var_y.sqrt())).clamp(-1.0, 1.0);

    let x_axis = hist.x_axis();
    let y_axis = hist.y_axis();
    let bins: Vec<Bin> = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let column = hist.column(i);
            let count: u32 = column.iter().sum();
            let (mean_outcome, std_error) = if count > 0 {
                let n = f64::from(count);
                let total: f64 = column
                    .iter()
                    .enumerate()
                    .map(|(j, &c)| f64::from(c) * y_axis.center(j))
                    .sum();
                let mean = total / n;
                (Some(mean), Some(mean / n.sqrt()))
            } else {
                (None, None)
            };
            Bin {
                value,
                position: x_axis.center(i),
                count,
                mean_outcome,
                std_error,
            }
        })
        .collect();

    let trend = fit_trend(coefficient, &bins);
    debug!(coefficient, entries = moments.entries, out_of_range, ?trend, "binned correlation");

    Ok(BinnedCorrelation {
        coefficient,
        bins,
        trend,
        entries: moments.entries,
        out_of_range,
    })
}

/// Line for |r| > [`TREND_THRESHOLD`], constant otherwise; empty bins skipped.
fn fit_trend(coefficient: f64, bins: &[Bin]) -> Option<TrendModel> {
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut w = Vec::new();
    for bin in bins {
        if let (Some(mean), Some(se)) = (bin.mean_outcome, bin.std_error) {
            if se > 0.0 {
                x.push(bin.position);
                y.push(mean);
                w.push(1.0 / (se * se));
            }
        }
    }

    if coefficient.abs() > TREND_THRESHOLD {
        fit_linear_weighted(&x, &y, &w)
    } else {
        fit_constant_weighted(&y, &w)
    }
}

//! Binned correlation of covariates against cycles-to-pregnancy.
//!
//! - [`histogram`]: fixed-width 2D histogram with out-of-range accounting
//! - [`engine`]: per-bin means, Pearson coefficient, trend fit
//! - [`covariate`]: covariate table and record field extraction

pub mod covariate;
pub mod engine;
pub mod histogram;

pub use covariate::{default_covariates, Covariate, CovariateKind, Field};
pub use engine::{
    correlate_categorical, correlate_continuous, Bin, BinValue, BinnedCorrelation,
    ContinuousAxis, CorrelationError, OUTCOME_BINS, OUTCOME_HI, OUTCOME_LO, TREND_THRESHOLD,
};
pub use histogram::{Axis, BinnedMoments, Histogram2d};

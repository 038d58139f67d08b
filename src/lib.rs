//! # u-fertility
//!
//! Time-to-pregnancy statistics from a table of app participants: how
//! likely pregnancy is by a given cycle, how cycles-to-pregnancy are
//! distributed, and which participant covariates move that number.
//!
//! ## Modules
//!
//! - [`record`]: participant records, row parsing, the in-memory
//!   [`RecordStore`](record::RecordStore)
//! - [`source`]: reading the whitespace-delimited table from disk
//! - [`cumulative`]: cumulative pregnancy probability per cycle with propagated uncertainty
//! - [`distribution`]: cycles-to-pregnancy histogram, exponential decay fit, percentiles
//! - [`correlation`]: binned Pearson correlation of covariates with cycles-to-pregnancy
//! - [`ranking`]: covariates ordered by |r|
//! - [`regression`]: weighted constant/linear fits and a two-parameter curve fitter
//! - [`config`]: run configuration, TOML-loadable
//! - [`render`]: JSON artifacts and console summary
//! - [`pipeline`]: one batch run wiring the stages together
//!
//! ## Conventions
//!
//! - Absent values are `None`, never a sentinel number
//! - Probabilities on the cumulative curve are in percent
//! - Functions that cannot produce a meaningful answer return `None` or an
//!   error; undefined coefficients are never reported as zero
//!
//! ## Example
//!
//! ```
//! use u_fertility::config::AnalysisConfig;
//! use u_fertility::pipeline;
//! use u_fertility::render::JsonRenderer;
//! use u_fertility::source::parse_table;
//!
//! let table = "header\n\
//!     0 22.0 30 SE No,never Uni Regular 1 pregnant 0.5 28 1.0 regular 0.2\n\
//!     1 25.0 33 NO Yes,once Uni Late 3 pregnant 0.4 30 3.0 regular 0.1\n\
//!     2 27.0 35 NO Yes,once Uni Late 6 not_pregnant 0.4 30 3.0 irregular 0.1\n";
//! let loaded = parse_table(table);
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = AnalysisConfig { horizon: 6, ..AnalysisConfig::default() };
//! let mut renderer = JsonRenderer::new(dir.path());
//! let report = pipeline::run(&loaded.store, &config, &mut renderer);
//! assert_eq!(report.records, 3);
//! assert_eq!(report.cumulative.points.len(), 6);
//! assert!(dir.path().join("cumulative_probability.json").exists());
//! ```

pub mod config;
pub mod correlation;
pub mod cumulative;
pub mod distribution;
pub mod pipeline;
pub mod ranking;
pub mod record;
pub mod regression;
pub mod render;
pub mod source;

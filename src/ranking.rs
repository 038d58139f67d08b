//! Ordering of covariates by correlation strength.
//!
//! # Examples
//!
//! ```
//! use u_fertility::ranking::{rank, CorrelationResult};
//!
//! let results = vec![
//!     CorrelationResult::new("BMI", 0.12),
//!     CorrelationResult::new("Age", -0.40),
//!     CorrelationResult::new("Country", 0.05),
//! ];
//! let ranked = rank(&results);
//! let labels: Vec<_> = ranked.iter().map(|r| r.label.as_str()).collect();
//! assert_eq!(labels, ["Age", "BMI", "Country"]);
//! ```

use std::cmp::Ordering;

use serde::Serialize;

/// A covariate's short name and its correlation coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub label: String,
    pub coefficient: f64,
}

impl CorrelationResult {
    pub fn new(label: impl Into<String>, coefficient: f64) -> Self {
        Self {
            label: label.into(),
            coefficient,
        }
    }
}

/// Sorts by descending `|coefficient|`. Ties keep their input order and NaN
/// coefficients go last. The input is left untouched.
pub fn rank(results: &[CorrelationResult]) -> Vec<CorrelationResult> {
    let mut ranked = results.to_vec();
    ranked.sort_by(|a, b| by_strength(a.coefficient, b.coefficient));
    ranked
}

fn by_strength(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.abs().total_cmp(&a.abs()),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn permutation_sorted_by_magnitude(
            coeffs in proptest::collection::vec(-1.0_f64..=1.0, 0..50),
        ) {
            let input: Vec<_> = coeffs
                .iter()
                .enumerate()
                .map(|(i, &c)| CorrelationResult::new(i.to_string(), c))
                .collect();
            let ranked = rank(&input);
            prop_assert_eq!(ranked.len(), input.len());
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].coefficient.abs() >= pair[1].coefficient.abs());
            }
            let mut seen: Vec<_> = ranked.iter().map(|r| r.label.clone()).collect();
            let mut expected: Vec<_> = input.iter().map(|r| r.label.clone()).collect();
            seen.sort();
            expected.sort();
            prop_assert_eq!(seen, expected);
        }
    }
}

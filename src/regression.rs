//! Least-squares fitting.
//!
//! Weighted constant and straight-line fits for trend lines over binned
//! means, and a damped Gauss-Newton (Levenberg-Marquardt) solver for the
//! two-parameter exponential curves used by the cumulative-probability and
//! cycles-to-pregnancy analyses.
//!
//! # Examples
//!
//! ```
//! use u_fertility::regression::{fit_linear_weighted, TrendModel};
//!
//! let x = [1.0, 2.0, 3.0, 4.0];
//! let y = [3.0, 5.0, 7.0, 9.0];
//! let w = [1.0; 4];
//! let fit = fit_linear_weighted(&x, &y, &w).unwrap();
//! assert!((fit.eval(5.0) - 11.0).abs() < 1e-10);
//! assert!(matches!(fit, TrendModel::Linear { .. }));
//! ```

use serde::Serialize;

/// A fitted trend line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum TrendModel {
    /// m(x) = c0
    Constant { c0: f64 },
    /// m(x) = c0 + c1·x
    Linear { c0: f64, c1: f64 },
}

impl TrendModel {
    pub fn eval(&self, x: f64) -> f64 {
        match *self {
            TrendModel::Constant { c0 } => c0,
            TrendModel::Linear { c0, c1 } => c0 + c1 * x,
        }
    }
}

fn valid_inputs(x: &[f64], y: &[f64], w: &[f64]) -> bool {
    x.len() == y.len()
        && y.len() == w.len()
        && x.iter().chain(y).all(|v| v.is_finite())
        && w.iter().all(|v| v.is_finite() && *v >= 0.0)
}

// ---------------------------------------------------------------------------
// Constant and linear fits
// ---------------------------------------------------------------------------

/// Weighted mean: c0 = Σwᵢyᵢ / Σwᵢ.
///
/// # Returns
///
/// `None` if the slices differ in length, contain non-finite values or
/// negative weights, or the weights sum to zero.
pub fn fit_constant_weighted(y: &[f64], w: &[f64]) -> Option<TrendModel> {
    if y.len() != w.len() || !y.iter().all(|v| v.is_finite()) {
        return None;
    }
    if !w.iter().all(|v| v.is_finite() && *v >= 0.0) {
        return None;
    }

    let sw: f64 = w.iter().sum();
    if sw < 1e-300 {
        return None;
    }
    let swy: f64 = y.iter().zip(w).map(|(&yi, &wi)| wi * yi).sum();
    Some(TrendModel::Constant { c0: swy / sw })
}

/// Weighted least-squares straight line.
///
/// # Algorithm
///
/// With S = Σw, Sx = Σwx, Sy = Σwy, Sxx = Σwx², Sxy = Σwxy:
///
/// ```text
/// Δ  = S·Sxx − Sx²
/// c1 = (S·Sxy − Sx·Sy) / Δ
/// c0 = (Sxx·Sy − Sx·Sxy) / Δ
/// ```
///
/// # Returns
///
/// `None` on invalid input or when fewer than two distinct weighted x
/// values make Δ vanish.
///
/// # References
///
/// Bevington & Robinson (2003). "Data Reduction and Error Analysis for the
/// Physical Sciences", 3rd edition, ch. 6.
pub fn fit_linear_weighted(x: &[f64], y: &[f64], w: &[f64]) -> Option<TrendModel> {
    if !valid_inputs(x, y, w) {
        return None;
    }

    let mut s = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for ((&xi, &yi), &wi) in x.iter().zip(y).zip(w) {
        s += wi;
        sx += wi * xi;
        sy += wi * yi;
        sxx += wi * xi * xi;
        sxy += wi * xi * yi;
    }

    let delta = s * sxx - sx * sx;
    if delta.abs() < 1e-12 * s.max(1.0) * sxx.abs().max(1.0) {
        return None;
    }

    let c1 = (s * sxy - sx * sy) / delta;
    let c0 = (sxx * sy - sx * sxy) / delta;
    if !c0.is_finite() || !c1.is_finite() {
        return None;
    }
    Some(TrendModel::Linear { c0, c1 })
}

// ---------------------------------------------------------------------------
// Nonlinear two-parameter fits
// ---------------------------------------------------------------------------

/// A model f(x; p₀, p₁) with an analytic gradient.
pub trait CurveModel {
    fn eval(&self, params: [f64; 2], x: f64) -> f64;

    /// ∂f/∂p₀ and ∂f/∂p₁ at `x`.
    fn gradient(&self, params: [f64; 2], x: f64) -> [f64; 2];
}

/// Result of [`fit_curve`].
#[derive(Debug, Clone, Copy)]
pub struct CurveFit {
    pub params: [f64; 2],
    /// Weighted residual sum of squares at `params`.
    pub chi_squared: f64,
    pub iterations: usize,
}

/// Maximum Levenberg-Marquardt iterations.
const MAX_ITER: usize = 200;

/// Relative χ² improvement below which the fit is considered converged.
const TOL: f64 = 1e-12;

fn chi_squared<M: CurveModel>(model: &M, p: [f64; 2], x: &[f64], y: &[f64], w: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .zip(w)
        .map(|((&xi, &yi), &wi)| {
            let r = yi - model.eval(p, xi);
            wi * r * r
        })
        .sum()
}

/// Weighted nonlinear least squares via Levenberg-Marquardt.
///
/// Minimises Σ wᵢ (yᵢ − f(xᵢ; p))² starting from `seed`.
///
/// # Returns
///
/// `None` if fewer than two points, invalid input, or the parameters
/// become non-finite.
///
/// # References
///
/// Marquardt (1963). "An Algorithm for Least-Squares Estimation of
/// Nonlinear Parameters". SIAM Journal on Applied Mathematics, 11(2).
pub fn fit_curve<M: CurveModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    w: &[f64],
    seed: [f64; 2],
) -> Option<CurveFit> {
    if x.len() < 2 || !valid_inputs(x, y, w) {
        return None;
    }
    if !seed.iter().all(|v| v.is_finite()) {
        return None;
    }

    let mut p = seed;
    let mut chi2 = chi_squared(model, p, x, y, w);
    if !chi2.is_finite() {
        return None;
    }
    let mut lambda = 1e-3;
    let mut iterations = 0;

    while iterations < MAX_ITER {
        iterations += 1;

        // Normal equations JᵀWJ·δ = JᵀWr
        let mut a = [[0.0_f64; 2]; 2];
        let mut b = [0.0_f64; 2];
        for ((&xi, &yi), &wi) in x.iter().zip(y).zip(w) {
            let g = model.gradient(p, xi);
            let r = yi - model.eval(p, xi);
            for i in 0..2 {
                b[i] += wi * g[i] * r;
                for j in 0..2 {
                    a[i][j] += wi * g[i] * g[j];
                }
            }
        }

        let mut improved = false;
        while lambda < 1e12 {
            let a00 = a[0][0] * (1.0 + lambda);
            let a11 = a[1][1] * (1.0 + lambda);
            let det = a00 * a11 - a[0][1] * a[1][0];
            if det.abs() < 1e-300 || !det.is_finite() {
                lambda *= 10.0;
                continue;
            }
            let d0 = (b[0] * a11 - a[0][1] * b[1]) / det;
            let d1 = (a00 * b[1] - a[1][0] * b[0]) / det;
            let candidate = [p[0] + d0, p[1] + d1];
            let candidate_chi2 = chi_squared(model, candidate, x, y, w);

            if candidate_chi2.is_finite() && candidate_chi2 <= chi2 {
                let gain = chi2 - candidate_chi2;
                p = candidate;
                chi2 = candidate_chi2;
                lambda = (lambda / 10.0).max(1e-12);
                improved = gain > TOL * chi2.max(1e-300);
                break;
            }
            lambda *= 10.0;
        }

        if !improved {
            break;
        }
    }

    if !p.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(CurveFit {
        params: p,
        chi_squared: chi2,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn constant_is_weighted_mean() {
        let fit = fit_constant_weighted(&[1.0, 3.0], &[3.0, 1.0]).expect("fit");
        assert!((fit.eval(0.0) - 1.5).abs() < 1e-12);
        assert!((fit.eval(100.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn constant_rejects_zero_weight_sum() {
        assert!(fit_constant_weighted(&[1.0, 2.0], &[0.0, 0.0]).is_none());
        assert!(fit_constant_weighted(&[1.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn linear_perfect_fit() {
        let x = [0.5, 1.5, 2.5, 3.5];
        let y: Vec<f64> = x.iter().map(|v| 2.0 - 0.5 * v).collect();
        let w = [1.0, 2.0, 3.0, 4.0];
        match fit_linear_weighted(&x, &y, &w).expect("fit") {
            TrendModel::Linear { c0, c1 } => {
                assert!((c0 - 2.0).abs() < 1e-10, "c0 = {c0}");
                assert!((c1 + 0.5).abs() < 1e-10, "c1 = {c1}");
            }
            other => panic!("unexpected model {other:?}"),
        }
    }

    #[test]
    fn linear_weights_pull_towards_heavy_points() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 5.0];
        let light = fit_linear_weighted(&x, &y, &[1.0, 1.0, 0.01]).expect("fit");
        let heavy = fit_linear_weighted(&x, &y, &[1.0, 1.0, 100.0]).expect("fit");
        assert!(heavy.eval(2.0) > light.eval(2.0));
    }

    #[test]
    fn linear_degenerate_x() {
        assert!(fit_linear_weighted(&[1.0, 1.0], &[1.0, 2.0], &[1.0, 1.0]).is_none());
        assert!(fit_linear_weighted(&[1.0, f64::NAN], &[1.0, 2.0], &[1.0, 1.0]).is_none());
    }

    #[test]
    fn curve_recovers_exact_decay() {
        let x: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 200.0 * (-0.3 * v).exp()).collect();
        let w = vec![1.0; x.len()];
        let fit = fit_curve(&Decay, &x, &y, &w, [100.0, 0.1]).expect("fit");
        assert!((fit.params[0] - 200.0).abs() < 1e-4, "a = {}", fit.params[0]);
        assert!((fit.params[1] - 0.3).abs() < 1e-6, "b = {}", fit.params[1]);
        assert!(fit.chi_squared < 1e-6);
    }

    #[test]
    fn curve_needs_two_points() {
        assert!(fit_curve(&Decay, &[1.0], &[1.0], &[1.0], [1.0, 1.0]).is_none());
    }
}

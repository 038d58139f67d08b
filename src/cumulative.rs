//! Cumulative probability of pregnancy by attempt cycle.
//!
//! Participants form a risk set that shrinks cycle by cycle. The
//! conditional success fraction of each cycle is chained into a cumulative
//! probability, with the variance of each fraction propagated under an
//! independence assumption.
//!
//! # Algorithm
//!
//! ```text
//! attempts[j]    = #{ cycles_trying > j }
//! pregnancies[j] = #{ pregnant ∧ cycles_trying = j + 1 }
//! f_j            = pregnancies[j] / attempts[j]
//! P_j            = P_{j-1} + (1 − P_{j-1})·f_j                       P_{-1} = 0
//! var_j          = f_j(1 − f_j) / attempts[j]
//! σ_j²           = (1 − P_j)(1 − f_j)·var_j + (1 − f_j)²·σ_{j-1}²     σ_{-1} = 0
//! ```
//!
//! A cycle with no attempts carries P and σ forward unchanged.
//!
//! # Examples
//!
//! ```
//! use u_fertility::cumulative::{AttemptPool, CumulativeProbabilityEstimator};
//! use u_fertility::record::RecordStore;
//!
//! let rows = [
//!     "0 -1 -1 -1 -1 -1 -1 1 pregnant -1 -1 -1 -1 -1",
//!     "1 -1 -1 -1 -1 -1 -1 2 pregnant -1 -1 -1 -1 -1",
//!     "2 -1 -1 -1 -1 -1 -1 2 not_pregnant -1 -1 -1 -1 -1",
//!     "3 -1 -1 -1 -1 -1 -1 3 pregnant -1 -1 -1 -1 -1",
//! ];
//! let store = RecordStore::load(rows).store;
//! let curve = CumulativeProbabilityEstimator::new(3, AttemptPool::AllParticipants)
//!     .unwrap()
//!     .estimate(store.records());
//! assert!((curve[0].cumulative_probability - 25.0).abs() < 1e-9);
//! assert!((curve[1].cumulative_probability - 50.0).abs() < 1e-9);
//! assert!((curve[2].cumulative_probability - 100.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::Record;
use crate::regression::{fit_curve, CurveModel};

/// Default number of cycles tracked.
pub const DEFAULT_HORIZON: usize = 15;

/// Which participants enter the risk set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPool {
    /// Everyone counts, whether or not intercourse was logged.
    #[default]
    AllParticipants,
    /// Drop participants whose logged intercourse frequency is exactly 0.
    ///
    /// Many participants never log intercourse, so this can remove active
    /// triers as well.
    ExcludeZeroIntercourse,
}

impl AttemptPool {
    fn admits(self, record: &Record) -> bool {
        match self {
            AttemptPool::AllParticipants => true,
            AttemptPool::ExcludeZeroIntercourse => record.intercourse_frequency != Some(0.0),
        }
    }
}

/// Aggregate for one cycle index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CyclePoint {
    /// 1-based cycle number.
    pub cycle: u32,
    /// Participants still trying at this cycle.
    pub attempts: u32,
    /// Pregnancies observed in this cycle.
    pub pregnancies: u32,
    /// Cumulative probability of pregnancy by this cycle, in percent.
    pub cumulative_probability: f64,
    /// Propagated one-sigma uncertainty of `cumulative_probability`, in percent.
    pub uncertainty: f64,
}

/// Computes the cumulative pregnancy probability curve.
#[derive(Debug, Clone, Copy)]
pub struct CumulativeProbabilityEstimator {
    horizon: usize,
    pool: AttemptPool,
}

impl CumulativeProbabilityEstimator {
    /// Creates an estimator over `horizon` cycles.
    ///
    /// Returns `None` if `horizon` is zero.
    pub fn new(horizon: usize, pool: AttemptPool) -> Option<Self> {
        if horizon == 0 {
            return None;
        }
        Some(Self { horizon, pool })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn pool(&self) -> AttemptPool {
        self.pool
    }

    /// Per-cycle attempt and pregnancy counts.
    ///
    /// Pregnancies after the horizon are not counted; attempts are capped
    /// at the horizon.
    pub fn counts<'a, I>(&self, records: I) -> (Vec<u32>, Vec<u32>)
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut attempts = vec![0_u32; self.horizon];
        let mut pregnancies = vec![0_u32; self.horizon];

        for record in records.into_iter().filter(|r| self.pool.admits(r)) {
            let tried = (record.cycles_trying as usize).min(self.horizon);
            for slot in &mut attempts[..tried] {
                *slot += 1;
            }
            if !record.outcome.is_pregnant() {
                continue;
            }
            if let Some(slot) = (record.cycles_trying as usize)
                .checked_sub(1)
                .and_then(|last| pregnancies.get_mut(last))
            {
                *slot += 1;
            }
        }

        (attempts, pregnancies)
    }

    /// Builds the cumulative probability curve, one point per cycle.
    pub fn estimate<'a, I>(&self, records: I) -> Vec<CyclePoint>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let (attempts, pregnancies) = self.counts(records);
        cumulative_curve(&attempts, &pregnancies)
    }
}

/// Chains per-cycle counts into cumulative probabilities.
///
/// `attempts` and `pregnancies` must have the same length; extra entries
/// in the longer slice are ignored.
pub fn cumulative_curve(attempts: &[u32], pregnancies: &[u32]) -> Vec<CyclePoint> {
    let mut points = Vec::with_capacity(attempts.len().min(pregnancies.len()));
    let mut prob = 0.0_f64;
    let mut sigma = 0.0_f64;

    for (j, (&n, &k)) in attempts.iter().zip(pregnancies).enumerate() {
        if n == 0 {
            debug!(cycle = j + 1, "no attempts left, carrying probability forward");
        } else {
            let frac = f64::from(k) / f64::from(n);
            prob += (1.0 - prob) * frac;

            let frac_var = frac * (1.0 - frac) / f64::from(n);
            let var = (1.0 - prob) * (1.0 - frac) * frac_var
                + (1.0 - frac) * (1.0 - frac) * sigma * sigma;
            sigma = var.max(0.0).sqrt();
        }

        points.push(CyclePoint {
            cycle: (j + 1) as u32,
            attempts: n,
            pregnancies: k,
            cumulative_probability: (prob * 100.0).clamp(0.0, 100.0),
            uncertainty: sigma * 100.0,
        });
    }

    points
}

// ---------------------------------------------------------------------------
// Saturating fit
// ---------------------------------------------------------------------------

/// P(x) = a·(1 − e^{−b·x}), in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SaturatingFit {
    /// Asymptotic cumulative probability (percent).
    pub a: f64,
    /// Per-cycle rate.
    pub b: f64,
}

impl SaturatingFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.a * (1.0 - (-self.b * x).exp())
    }
}

struct Saturating;

impl CurveModel for Saturating {
    fn eval(&self, p: [f64; 2], x: f64) -> f64 {
        p[0] * (1.0 - (-p[1] * x).exp())
    }

    fn gradient(&self, p: [f64; 2], x: f64) -> [f64; 2] {
        let e = (-p[1] * x).exp();
        [1.0 - e, p[0] * x * e]
    }
}

/// Starting point for the saturating fit (percent, per cycle).
const SATURATING_SEED: [f64; 2] = [74.0, 0.2];

/// Fits `a·(1 − e^{−b·x})` to the curve over cycles `1..=N`.
///
/// Points are weighted equally. Returns `None` for fewer than two points
/// or a fit that fails to converge to finite parameters.
pub fn fit_saturating(points: &[CyclePoint]) -> Option<SaturatingFit> {
    let x: Vec<f64> = points.iter().map(|p| f64::from(p.cycle)).collect();
    let y: Vec<f64> = points.iter().map(|p| p.cumulative_probability).collect();
    let w = vec![1.0; points.len()];

    let fit = fit_curve(&Saturating, &x, &y, &w, SATURATING_SEED)?;
    let [a, b] = fit.params;
    debug!(a, b, chi_squared = fit.chi_squared, iterations = fit.iterations, "saturating fit");
    Some(SaturatingFit { a, b })
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

    fn four_participants() -> Vec<Record> {
        vec![
            record(1, Outcome::Pregnant),
            record(2, Outcome::Pregnant),
            record(2, Outcome::NotPregnant),
            record(3, Outcome::Pregnant),
        ]
    }

    #[test]
    fn counts_follow_risk_set() {
        let est = CumulativeProbabilityEstimator::new(4, AttemptPool::AllParticipants).unwrap();
        let (attempts, pregnancies) = est.counts(&four_participants());
        assert_eq!(attempts, vec![4, 3, 1, 0]);
        assert_eq!(pregnancies, vec![1, 1, 1, 0]);
    }

    #[test]
    fn concrete_curve() {
        let est = CumulativeProbabilityEstimator::new(3, AttemptPool::AllParticipants).unwrap();
        let curve = est.estimate(&four_participants());
        assert_eq!(curve.len(), 3);
        assert!((curve[0].cumulative_probability - 25.0).abs() < 1e-9);
        assert!((curve[1].cumulative_probability - 50.0).abs() < 1e-9);
        assert!((curve[2].cumulative_probability - 100.0).abs() < 1e-9);
        assert_eq!(curve[0].cycle, 1);
        assert_eq!(curve[2].attempts, 1);
    }

    #[test]
    fn first_cycle_uncertainty() {
        let est = CumulativeProbabilityEstimator::new(1, AttemptPool::AllParticipants).unwrap();
        let curve = est.estimate(&four_participants());
        // f = 0.25, var = 0.25·0.75/4, σ² = 0.75·0.75·var
        let var: f64 = 0.25 * 0.75 / 4.0;
        let expected = (0.75 * 0.75 * var).sqrt() * 100.0;
        assert!((curve[0].uncertainty - expected).abs() < 1e-9);
    }

    #[test]
    fn uncertainty_recurrence() {
        let est = CumulativeProbabilityEstimator::new(3, AttemptPool::AllParticipants).unwrap();
        let curve = est.estimate(&four_participants());

        // cycle 1: n = 4, f = 1/4, P = 1/4
        let f0: f64 = 0.25;
        let p0 = f0;
        let sigma0_sq = (1.0 - p0) * (1.0 - f0) * (f0 * (1.0 - f0) / 4.0);

        // cycle 2: n = 3, f = 1/3, P = 1/4 + 3/4·1/3 = 1/2; the first term
        // uses the updated P
        let f1: f64 = 1.0 / 3.0;
        let p1 = p0 + (1.0 - p0) * f1;
        let sigma1_sq = (1.0 - p1) * (1.0 - f1) * (f1 * (1.0 - f1) / 3.0)
            + (1.0 - f1) * (1.0 - f1) * sigma0_sq;

        assert!((p1 - 0.5).abs() < 1e-15);
        assert!((curve[0].uncertainty - sigma0_sq.sqrt() * 100.0).abs() < 1e-9);
        assert!((curve[1].uncertainty - sigma1_sq.sqrt() * 100.0).abs() < 1e-9);
        // 2/81 + (4/9)·(9/16)·(3/64)
        let by_hand: f64 = 2.0 / 81.0 + 4.0 / 9.0 * (9.0 / 16.0) * (3.0 / 64.0);
        assert!((curve[1].uncertainty - by_hand.sqrt() * 100.0).abs() < 1e-9);

        // cycle 3: the single remaining participant conceives, f = 1, σ = 0
        assert!((curve[2].cumulative_probability - 100.0).abs() < 1e-9);
        assert!(curve[2].uncertainty.abs() < 1e-9);
    }

    #[test]
    fn zero_cycle_records_are_ignored() {
        let mut records = four_participants();
        records.push(record(0, Outcome::Pregnant));
        let est = CumulativeProbabilityEstimator::new(3, AttemptPool::AllParticipants).unwrap();
        let (attempts, pregnancies) = est.counts(&records);
        assert_eq!(attempts, vec![4, 3, 1]);
        assert_eq!(pregnancies, vec![1, 1, 1]);
    }

    #[test]
    fn zero_attempts_carry_forward_exactly() {
        let est = CumulativeProbabilityEstimator::new(6, AttemptPool::AllParticipants).unwrap();
        let curve = est.estimate(&four_participants());
        assert_eq!(curve[3].attempts, 0);
        for j in 3..6 {
            assert_eq!(curve[j].cumulative_probability, curve[j - 1].cumulative_probability);
            assert_eq!(curve[j].uncertainty, curve[j - 1].uncertainty);
        }
    }

    #[test]
    fn horizon_caps_counts() {
        let records = vec![record(20, Outcome::Pregnant), record(2, Outcome::Pregnant)];
        let est = CumulativeProbabilityEstimator::new(5, AttemptPool::AllParticipants).unwrap();
        let (attempts, pregnancies) = est.counts(&records);
        assert_eq!(attempts, vec![2, 2, 1, 1, 1]);
        assert_eq!(pregnancies, vec![0, 1, 0, 0, 0]);
    }

    #[test]
    fn empty_input_is_flat_zero() {
        let est = CumulativeProbabilityEstimator::new(DEFAULT_HORIZON, AttemptPool::default())
            .unwrap();
        let curve = est.estimate(&Vec::<Record>::new());
        assert_eq!(curve.len(), DEFAULT_HORIZON);
        assert!(curve
            .iter()
            .all(|p| p.cumulative_probability == 0.0 && p.uncertainty == 0.0));
    }

    #[test]
    fn zero_horizon_rejected() {
        assert!(CumulativeProbabilityEstimator::new(0, AttemptPool::AllParticipants).is_none());
    }

    #[test]
    fn exclude_zero_intercourse_pool() {
        let mut records = four_participants();
        records[0].intercourse_frequency = Some(0.0);
        records[1].intercourse_frequency = Some(0.3);

        let all = CumulativeProbabilityEstimator::new(3, AttemptPool::AllParticipants).unwrap();
        let active =
            CumulativeProbabilityEstimator::new(3, AttemptPool::ExcludeZeroIntercourse).unwrap();

        assert_eq!(all.counts(&records).0[0], 4);
        let (attempts, pregnancies) = active.counts(&records);
        assert_eq!(attempts, vec![3, 3, 1]);
        assert_eq!(pregnancies, vec![0, 1, 1]);
    }

    #[test]
    fn saturating_fit_tracks_geometric_curve() {
        // constant 20% per-cycle success over plenty of participants
        let mut attempts = Vec::new();
        let mut pregnancies = Vec::new();
        let mut remaining = 100_000_u32;
        for _ in 0..DEFAULT_HORIZON {
            let k = remaining / 5;
            attempts.push(remaining);
            pregnancies.push(k);
            remaining -= k;
        }
        let curve = cumulative_curve(&attempts, &pregnancies);
        let fit = fit_saturating(&curve).expect("fit");
        assert!((fit.a - 100.0).abs() < 1.0, "a = {}", fit.a);
        // 1 − 0.8^x = 1 − e^{x·ln 0.8}
        assert!((fit.b + 0.8_f64.ln()).abs() < 0.01, "b = {}", fit.b);
        assert!((fit.eval(13.0) - curve[12].cumulative_probability).abs() < 1.0);
    }
}

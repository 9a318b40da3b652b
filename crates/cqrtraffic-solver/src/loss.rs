//! Asymmetric residual loss.
//!
//! The check function `ρ_τ(r) = τ·max(0, r) + (1 − τ)·max(0, −r)` is not
//! linear, so the residual `r_i = y_i − ŷ_i` is split into non-negative
//! parts `u_i − v_i` and the objective becomes `Σ w_i (τ u_i + (1 − τ) v_i)`.
//! The expectile variant squares both parts and yields a diagonal
//! quadratic objective over the same variables.

use cqrtraffic_core::{Dataset, LossKind, QuantileLevel, Result};

use crate::constraints::LinearConstraint;
use crate::layout::VariableLayout;

/// Objective `½ xᵀ P x + qᵀ x` with diagonal `P`.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// `q`, one entry per decision variable.
    pub linear: Vec<f64>,
    /// Non-zero diagonal entries `(index, P_ii)`.
    pub quadratic: Vec<(usize, f64)>,
}

/// Loss model for one quantile level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileLoss {
    tau: QuantileLevel,
    kind: LossKind,
}

impl QuantileLoss {
    /// Creates the loss for `tau`.
    ///
    /// # Errors
    ///
    /// Returns [`cqrtraffic_core::CqrError::InvalidQuantile`] unless `0 < tau < 1`.
    pub fn new(tau: f64, kind: LossKind) -> Result<Self> {
        Ok(Self {
            tau: QuantileLevel::new(tau)?,
            kind,
        })
    }

    /// Pinball loss for `tau`.
    pub fn pinball(tau: f64) -> Result<Self> {
        Self::new(tau, LossKind::Quantile)
    }

    pub fn tau(&self) -> QuantileLevel {
        self.tau
    }

    pub fn kind(&self) -> LossKind {
        self.kind
    }

    /// Loss of a single residual `r = y − ŷ`.
    pub fn check(&self, residual: f64) -> f64 {
        let (upper, lower) = (self.tau.upper_weight(), self.tau.lower_weight());
        match self.kind {
            LossKind::Quantile if residual >= 0.0 => upper * residual,
            LossKind::Quantile => -lower * residual,
            LossKind::Expectile if residual >= 0.0 => upper * residual * residual,
            LossKind::Expectile => lower * residual * residual,
        }
    }

    /// Weighted total loss of fitted values against a dataset.
    pub fn total(&self, dataset: &Dataset, fitted: &[f64]) -> f64 {
        dataset
            .iter()
            .zip(fitted)
            .map(|(obs, yhat)| obs.weight() * self.check(obs.y() - yhat))
            .sum()
    }

    /// Objective over the full decision vector.
    pub fn objective(&self, dataset: &Dataset, layout: VariableLayout) -> Objective {
        let (upper, lower) = (self.tau.upper_weight(), self.tau.lower_weight());
        let mut linear = vec![0.0; layout.len()];
        let mut quadratic = Vec::new();

        for (i, obs) in dataset.iter().enumerate() {
            let w = obs.weight();
            match self.kind {
                LossKind::Quantile => {
                    linear[layout.under(i)] = w * upper;
                    linear[layout.over(i)] = w * lower;
                }
                LossKind::Expectile => {
                    quadratic.push((layout.under(i), 2.0 * w * upper));
                    quadratic.push((layout.over(i), 2.0 * w * lower));
                }
            }
        }

        Objective { linear, quadratic }
    }

    /// Rows `ŷ_i + u_i − v_i = y_i`.
    pub fn residual_links<'a>(
        &self,
        dataset: &'a Dataset,
        layout: VariableLayout,
    ) -> impl Iterator<Item = LinearConstraint> + 'a {
        dataset.iter().enumerate().map(move |(i, obs)| {
            LinearConstraint::equal(
                [
                    (layout.fitted(i), 1.0),
                    (layout.under(i), 1.0),
                    (layout.over(i), -1.0),
                ],
                obs.y(),
            )
        })
    }

    /// Rows `−u_i ≤ 0` and `−v_i ≤ 0`.
    pub fn slack_bounds(layout: VariableLayout) -> impl Iterator<Item = LinearConstraint> {
        (0..layout.observations()).flat_map(move |i| {
            [
                LinearConstraint::less_eq([(layout.under(i), -1.0)], 0.0),
                LinearConstraint::less_eq([(layout.over(i), -1.0)], 0.0),
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqrtraffic_core::{CqrError, Observation};

    #[test]
    fn test_invalid_tau() {
        for tau in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            let err = QuantileLoss::pinball(tau).unwrap_err();
            assert!(matches!(err, CqrError::InvalidQuantile { .. }));
        }
    }

    #[test]
    fn test_pinball_asymmetry() {
        let loss = QuantileLoss::pinball(0.9).unwrap();
        assert!((loss.check(10.0) - 9.0).abs() < 1e-12);
        assert!((loss.check(-10.0) - 1.0).abs() < 1e-12);
        assert_eq!(loss.check(0.0), 0.0);
    }

    #[test]
    fn test_expectile_is_squared() {
        let loss = QuantileLoss::new(0.25, LossKind::Expectile).unwrap();
        assert!((loss.check(2.0) - 1.0).abs() < 1e-12);
        assert!((loss.check(-2.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_total() {
        let ds = Dataset::new(vec![
            Observation::new(1.0, 10.0).with_weight(2.0),
            Observation::new(2.0, 20.0),
        ])
        .unwrap();
        let loss = QuantileLoss::pinball(0.5).unwrap();
        // residuals 4 and -6
        assert!((loss.total(&ds, &[6.0, 26.0]) - (2.0 * 2.0 + 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_objective_coefficients() {
        let ds = Dataset::new(vec![
            Observation::new(1.0, 10.0).with_weight(2.0),
            Observation::new(2.0, 20.0),
        ])
        .unwrap();
        let layout = VariableLayout::new(2, 1);
        let objective = QuantileLoss::pinball(0.8).unwrap().objective(&ds, layout);

        assert!(objective.quadratic.is_empty());
        assert!((objective.linear[layout.under(0)] - 1.6).abs() < 1e-12);
        assert!((objective.linear[layout.over(0)] - 0.4).abs() < 1e-12);
        assert!((objective.linear[layout.under(1)] - 0.8).abs() < 1e-12);
        assert_eq!(objective.linear[layout.fitted(0)], 0.0);
        assert_eq!(objective.linear[layout.slope(1, 0)], 0.0);
    }

    #[test]
    fn test_expectile_objective_is_diagonal() {
        let ds = Dataset::from_pairs(&[(1.0, 10.0), (2.0, 20.0)]).unwrap();
        let layout = VariableLayout::new(2, 1);
        let objective = QuantileLoss::new(0.5, LossKind::Expectile)
            .unwrap()
            .objective(&ds, layout);
        assert!(objective.linear.iter().all(|&q| q == 0.0));
        assert_eq!(objective.quadratic.len(), 4);
        assert!(objective.quadratic.contains(&(layout.under(1), 1.0)));
    }

    #[test]
    fn test_residual_links() {
        let ds = Dataset::from_pairs(&[(1.0, 10.0), (2.0, 20.0)]).unwrap();
        let layout = VariableLayout::new(2, 1);
        let loss = QuantileLoss::pinball(0.5).unwrap();
        let rows: Vec<_> = loss.residual_links(&ds, layout).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].rhs, 20.0);

        let mut x = vec![0.0; layout.len()];
        x[layout.fitted(1)] = 15.0;
        x[layout.under(1)] = 5.0;
        assert!(rows[1].residual(&x).abs() < 1e-12);
        assert_eq!(QuantileLoss::slack_bounds(layout).count(), 4);
    }
}

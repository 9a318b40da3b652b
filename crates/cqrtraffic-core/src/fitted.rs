//! Fitted points and the piecewise-linear frontier they define.

use serde::{Deserialize, Serialize};

use crate::observation::{Dataset, Regressors, DENSITY};

/// Per-observation output of an estimation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPoint {
    /// Fitted value `ŷ_i`.
    pub value: f64,
    /// Subgradient `β_i` of the estimated function at `x_i`.
    pub slope: Regressors,
}

impl FittedPoint {
    pub fn new(value: f64, slope: Regressors) -> Self {
        Self { value, slope }
    }

    /// Slope along the density coordinate.
    pub fn density_slope(&self) -> f64 {
        self.slope[DENSITY]
    }

    /// Value of this point's supporting plane at `x`, given the point's own
    /// regressors `at`.
    pub fn plane_at(&self, at: &[f64], x: &[f64]) -> f64 {
        self.value
            + self
                .slope
                .iter()
                .zip(x.iter().zip(at))
                .map(|(b, (xq, xi))| b * (xq - xi))
                .sum::<f64>()
    }
}

/// Largest violation of each shape property over a set of fitted points.
///
/// Every field is zero when the property holds exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShapeViolation {
    /// `max_{i≠j} (ŷ_j − ŷ_i − β_i·(x_j − x_i))⁺`
    pub concavity: f64,
    /// `max_i (−β_i[density])⁺`
    pub monotonicity: f64,
    /// `max_i (−ŷ_i)⁺`
    pub nonnegativity: f64,
}

/// The estimated function: fitted points anchored at their regressors.
///
/// For a concave fit the function is the lower envelope of the supporting
/// planes, `f(x) = min_i (ŷ_i + β_i·(x − x_i))`. The same rule is used
/// inside and outside the observed range. Outside the range the result is
/// an extrapolation with no accuracy guarantee: the subgradients at the
/// boundary observations are only pinned down to an admissible interval by
/// the fit.
///
/// Without concavity the supporting planes carry no information, and the
/// fitted value of the nearest observation is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frontier {
    regressors: Vec<Regressors>,
    points: Vec<FittedPoint>,
    concave: bool,
}

impl Frontier {
    /// Anchors fitted points to the dataset they were estimated from.
    ///
    /// `points` must be aligned index-for-index with `dataset`.
    pub fn new(dataset: &Dataset, points: Vec<FittedPoint>, concave: bool) -> Self {
        debug_assert_eq!(dataset.len(), points.len());
        Self {
            regressors: dataset.iter().map(|o| o.x().into()).collect(),
            points,
            concave,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[FittedPoint] {
        &self.points
    }

    pub fn regressors(&self) -> &[Regressors] {
        &self.regressors
    }

    pub fn is_concave(&self) -> bool {
        self.concave
    }

    /// Observed density range.
    pub fn density_range(&self) -> Option<(f64, f64)> {
        self.regressors.iter().map(|x| x[DENSITY]).fold(None, |acc, d| match acc {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        })
    }

    /// Returns true if `density` lies outside the observed range.
    pub fn is_extrapolation(&self, density: f64) -> bool {
        match self.density_range() {
            Some((lo, hi)) => density < lo || density > hi,
            None => true,
        }
    }

    /// Evaluates the estimated function at a full regressor vector.
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        if self.concave {
            self.points
                .iter()
                .zip(&self.regressors)
                .map(|(p, xi)| p.plane_at(xi, x))
                .fold(f64::INFINITY, f64::min)
        } else {
            self.nearest(x).map_or(f64::NAN, |i| self.points[i].value)
        }
    }

    fn nearest(&self, x: &[f64]) -> Option<usize> {
        self.regressors
            .iter()
            .map(|xi| xi.iter().zip(x).map(|(a, b)| (a - b) * (a - b)).sum::<f64>())
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Slope along density at the minimum observed density.
    ///
    /// For one-dimensional fits the subgradient at the leftmost observation
    /// is only determined up to `[s, ∞)`, where `s` is the largest secant
    /// slope to any observation further right. The tight value `s` (the
    /// slope of the first fitted segment) is returned. With covariates the
    /// fitted density slope of the leftmost observation is returned.
    ///
    /// Without concavity the subgradients are unconstrained. The secant of
    /// the nearest-value curve between the two smallest observed densities
    /// is returned for one-dimensional fits, and NaN with covariates.
    pub fn free_flow_slope(&self) -> f64 {
        let Some((lo, _)) = self.density_range() else {
            return f64::NAN;
        };
        let leftmost = self
            .regressors
            .iter()
            .position(|x| x[DENSITY] == lo)
            .unwrap_or(0);
        let one_dimensional = self.regressors[leftmost].len() == 1;

        if !self.concave {
            return if one_dimensional {
                self.first_secant(lo)
            } else {
                f64::NAN
            };
        }
        if !one_dimensional {
            return self.points[leftmost].density_slope();
        }

        let anchor = self.evaluate(&[lo]);
        let tight = self
            .points
            .iter()
            .zip(&self.regressors)
            .filter(|(_, x)| x[DENSITY] > lo)
            .map(|(p, x)| (p.value - anchor) / (x[DENSITY] - lo))
            .fold(f64::NEG_INFINITY, f64::max);

        if tight.is_finite() {
            tight
        } else {
            self.points[leftmost].density_slope()
        }
    }

    fn first_secant(&self, lo: f64) -> f64 {
        let next = self
            .regressors
            .iter()
            .map(|x| x[DENSITY])
            .filter(|&d| d > lo)
            .fold(f64::INFINITY, f64::min);
        if !next.is_finite() {
            return f64::NAN;
        }
        (self.evaluate(&[next]) - self.evaluate(&[lo])) / (next - lo)
    }

    /// Measures how far the fitted points are from satisfying each shape
    /// property.
    pub fn shape_violation(&self) -> ShapeViolation {
        let mut violation = ShapeViolation::default();
        for (i, (pi, xi)) in self.points.iter().zip(&self.regressors).enumerate() {
            violation.monotonicity = violation.monotonicity.max(-pi.density_slope());
            violation.nonnegativity = violation.nonnegativity.max(-pi.value);
            for (j, (pj, xj)) in self.points.iter().zip(&self.regressors).enumerate() {
                if i != j {
                    let gap = pj.value - pi.plane_at(xi, xj);
                    violation.concavity = violation.concavity.max(gap);
                }
            }
        }
        violation
    }
}

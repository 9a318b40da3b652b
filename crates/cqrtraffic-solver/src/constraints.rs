//! Shape constraint generation.
//!
//! Translates a [`ShapeConfig`] into linear inequalities over the fitted
//! values `ŷ` and subgradients `β`:
//!
//! - concavity (Afriat): `ŷ_j ≤ ŷ_i + β_i·(x_j − x_i)` for every ordered
//!   pair `i ≠ j`, i.e. `n(n − 1)` rows
//! - monotonicity: `β_i[density] ≥ 0`
//! - non-negativity: `ŷ_i ≥ 0`
//! - slope box: `|β_i[k]| ≤ L`, see [`SlopeBound`]
//!
//! Rows are produced lazily by iterators so that the quadratic number of
//! concavity rows is never held by the builder itself.

use cqrtraffic_config::SlopeBound;
use cqrtraffic_core::{CqrError, Dataset, Result, ShapeConfig, DENSITY};
use smallvec::SmallVec;

use crate::layout::VariableLayout;

/// Sense of a linear constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `a·x ≤ b`
    LessEq,
    /// `a·x = b`
    Equal,
}

/// One sparse row `Σ a_k x_k (≤ | =) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    /// `(variable index, coefficient)` pairs; indices are unique.
    pub terms: SmallVec<[(usize, f64); 4]>,
    pub relation: Relation,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn less_eq(terms: impl IntoIterator<Item = (usize, f64)>, rhs: f64) -> Self {
        Self {
            terms: terms.into_iter().collect(),
            relation: Relation::LessEq,
            rhs,
        }
    }

    pub fn equal(terms: impl IntoIterator<Item = (usize, f64)>, rhs: f64) -> Self {
        Self {
            terms: terms.into_iter().collect(),
            relation: Relation::Equal,
            rhs,
        }
    }

    /// Evaluates `a·x − rhs`. Non-positive means satisfied for `≤` rows.
    pub fn residual(&self, x: &[f64]) -> f64 {
        self.terms.iter().map(|&(k, a)| a * x[k]).sum::<f64>() - self.rhs
    }
}

/// Number of rows per constraint family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstraintCounts {
    pub concavity: usize,
    pub monotonicity: usize,
    pub nonnegativity: usize,
    pub slope_bounds: usize,
}

impl ConstraintCounts {
    pub fn total(&self) -> usize {
        self.concavity + self.monotonicity + self.nonnegativity + self.slope_bounds
    }
}

/// Generates shape constraints for a dataset.
///
/// # Example
///
/// ```
/// use cqrtraffic_core::{Dataset, ShapeConfig};
/// use cqrtraffic_solver::ShapeConstraintBuilder;
///
/// let ds = Dataset::from_pairs(&[(0.0, 0.0), (10.0, 90.0), (20.0, 120.0)]).unwrap();
/// let constraints = ShapeConstraintBuilder::new(ShapeConfig::monotone_concave())
///     .build(&ds)
///     .unwrap();
///
/// assert_eq!(constraints.counts().concavity, 3 * 2);
/// assert_eq!(constraints.counts().monotonicity, 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeConstraintBuilder {
    shape: ShapeConfig,
    slope_bound: SlopeBound,
}

impl ShapeConstraintBuilder {
    /// Creates a builder with the default data-scaled slope box.
    pub fn new(shape: ShapeConfig) -> Self {
        Self {
            shape,
            slope_bound: SlopeBound::default(),
        }
    }

    pub fn with_slope_bound(mut self, slope_bound: SlopeBound) -> Self {
        self.slope_bound = slope_bound;
        self
    }

    pub fn shape(&self) -> ShapeConfig {
        self.shape
    }

    /// Validates the dataset and prepares the constraint set.
    ///
    /// # Errors
    ///
    /// Returns [`CqrError::DegenerateInput`] for fewer than two observations
    /// or when every observation has the same regressor vector.
    pub fn build<'a>(&self, dataset: &'a Dataset) -> Result<ShapeConstraints<'a>> {
        if dataset.len() < 2 {
            return Err(CqrError::DegenerateInput(format!(
                "at least 2 observations are required for pairwise shape constraints, got {}",
                dataset.len()
            )));
        }
        if dataset.has_identical_regressors() {
            return Err(CqrError::DegenerateInput(
                "all observations share the same regressor vector".to_string(),
            ));
        }

        Ok(ShapeConstraints {
            dataset,
            layout: VariableLayout::new(dataset.len(), dataset.dimension()),
            shape: self.shape,
            slope_limit: slope_limit(self.slope_bound, dataset),
        })
    }
}

/// Resolves a [`SlopeBound`] against a dataset.
pub fn slope_limit(bound: SlopeBound, dataset: &Dataset) -> Option<f64> {
    match bound {
        SlopeBound::Unbounded => None,
        SlopeBound::Fixed { limit } => Some(limit),
        SlopeBound::DataScaled { factor } => {
            let spread = dataset
                .response_range()
                .map_or(1.0, |(lo, hi)| (hi - lo).max(1.0));
            let gap = min_regressor_gap(dataset).unwrap_or(1.0);
            Some(factor * spread / gap)
        }
    }
}

/// Smallest positive gap between distinct values of any regressor.
fn min_regressor_gap(dataset: &Dataset) -> Option<f64> {
    (0..dataset.dimension())
        .filter_map(|k| {
            let mut values: Vec<f64> = dataset.iter().map(|o| o.x()[k]).collect();
            values.sort_by(f64::total_cmp);
            values.dedup();
            values
                .windows(2)
                .map(|w| w[1] - w[0])
                .min_by(f64::total_cmp)
        })
        .min_by(f64::total_cmp)
}

/// The constraint set for one dataset.
#[derive(Debug, Clone, Copy)]
pub struct ShapeConstraints<'a> {
    dataset: &'a Dataset,
    layout: VariableLayout,
    shape: ShapeConfig,
    slope_limit: Option<f64>,
}

impl<'a> ShapeConstraints<'a> {
    pub fn layout(&self) -> VariableLayout {
        self.layout
    }

    pub fn shape(&self) -> ShapeConfig {
        self.shape
    }

    /// Resolved subgradient box, if any.
    pub fn slope_limit(&self) -> Option<f64> {
        self.slope_limit
    }

    /// Exact row counts per family.
    pub fn counts(&self) -> ConstraintCounts {
        let n = self.layout.observations();
        let d = self.layout.dimension();
        ConstraintCounts {
            concavity: if self.shape.concave { n * (n - 1) } else { 0 },
            monotonicity: if self.shape.monotone { n } else { 0 },
            nonnegativity: if self.shape.nonnegative { n } else { 0 },
            slope_bounds: if self.slope_limit.is_some() { 2 * n * d } else { 0 },
        }
    }

    /// Total row count.
    pub fn len(&self) -> usize {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rows, family by family.
    pub fn iter(&self) -> impl Iterator<Item = LinearConstraint> + 'a {
        let this = *self;
        this.concavity()
            .chain(this.monotonicity())
            .chain(this.nonnegativity())
            .chain(this.slope_bounds())
    }

    /// Afriat rows `ŷ_j − ŷ_i − β_i·(x_j − x_i) ≤ 0`, ordered by `i` then `j`.
    pub fn concavity(&self) -> impl Iterator<Item = LinearConstraint> + 'a {
        let this = *self;
        let n = if this.shape.concave {
            this.layout.observations()
        } else {
            0
        };
        (0..n).flat_map(move |i| {
            (0..n)
                .filter(move |&j| j != i)
                .map(move |j| this.afriat_row(i, j))
        })
    }

    fn afriat_row(&self, i: usize, j: usize) -> LinearConstraint {
        let xi = self.dataset.observations()[i].x();
        let xj = self.dataset.observations()[j].x();
        let mut terms: SmallVec<[(usize, f64); 4]> = SmallVec::new();
        terms.push((self.layout.fitted(j), 1.0));
        terms.push((self.layout.fitted(i), -1.0));
        for (k, (a, b)) in xj.iter().zip(xi).enumerate() {
            let dx = a - b;
            if dx != 0.0 {
                terms.push((self.layout.slope(i, k), -dx));
            }
        }
        LinearConstraint {
            terms,
            relation: Relation::LessEq,
            rhs: 0.0,
        }
    }

    /// Rows `−β_i[density] ≤ 0`.
    pub fn monotonicity(&self) -> impl Iterator<Item = LinearConstraint> + 'a {
        let layout = self.layout;
        let n = if self.shape.monotone {
            layout.observations()
        } else {
            0
        };
        (0..n).map(move |i| LinearConstraint::less_eq([(layout.slope(i, DENSITY), -1.0)], 0.0))
    }

    /// Rows `−ŷ_i ≤ 0`.
    pub fn nonnegativity(&self) -> impl Iterator<Item = LinearConstraint> + 'a {
        let layout = self.layout;
        let n = if self.shape.nonnegative {
            layout.observations()
        } else {
            0
        };
        (0..n).map(move |i| LinearConstraint::less_eq([(layout.fitted(i), -1.0)], 0.0))
    }

    /// Rows `β_i[k] ≤ L` and `−β_i[k] ≤ L`.
    pub fn slope_bounds(&self) -> impl Iterator<Item = LinearConstraint> + 'a {
        let layout = self.layout;
        let limit = self.slope_limit.unwrap_or(0.0);
        let n = if self.slope_limit.is_some() {
            layout.observations()
        } else {
            0
        };
        let d = layout.dimension();
        (0..n).flat_map(move |i| {
            (0..d).flat_map(move |k| {
                let index = layout.slope(i, k);
                [
                    LinearConstraint::less_eq([(index, 1.0)], limit),
                    LinearConstraint::less_eq([(index, -1.0)], limit),
                ]
            })
        })
    }
}

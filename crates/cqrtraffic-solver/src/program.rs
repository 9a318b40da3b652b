//! Convex program instances.
//!
//! A [`ConvexProgram`] is the solver-facing contract: a decision vector of
//! fixed length, an objective `½ xᵀ P x + qᵀ x` with diagonal `P`, and
//! sparse equality and inequality rows. One instance is built per
//! `(dataset, tau)` run and dropped after decoding.

use crate::constraints::{LinearConstraint, Relation};
use crate::loss::Objective;
use crate::sparse::CscParts;

/// Sparse rows stored as triplets plus right-hand sides.
#[derive(Debug, Clone, Default, PartialEq)]
struct RowBlock {
    triplets: Vec<(usize, usize, f64)>,
    rhs: Vec<f64>,
}

impl RowBlock {
    fn push(&mut self, row: &LinearConstraint) {
        let r = self.rhs.len();
        self.triplets
            .extend(row.terms.iter().map(|&(col, value)| (r, col, value)));
        self.rhs.push(row.rhs);
    }

    fn len(&self) -> usize {
        self.rhs.len()
    }
}

/// Incrementally assembles a [`ConvexProgram`].
#[derive(Debug, Clone)]
pub struct ProgramBuilder {
    variable_count: usize,
    objective: Objective,
    equalities: RowBlock,
    inequalities: RowBlock,
}

impl ProgramBuilder {
    /// Starts a program with a zero objective.
    pub fn new(variable_count: usize) -> Self {
        Self {
            variable_count,
            objective: Objective {
                linear: vec![0.0; variable_count],
                quadratic: Vec::new(),
            },
            equalities: RowBlock::default(),
            inequalities: RowBlock::default(),
        }
    }

    pub fn objective(mut self, objective: Objective) -> Self {
        debug_assert_eq!(objective.linear.len(), self.variable_count);
        self.objective = objective;
        self
    }

    /// Routes a row to the equality or inequality block.
    pub fn add(&mut self, row: LinearConstraint) {
        debug_assert!(row.terms.iter().all(|&(k, _)| k < self.variable_count));
        match row.relation {
            Relation::Equal => self.equalities.push(&row),
            Relation::LessEq => self.inequalities.push(&row),
        }
    }

    pub fn constraints(mut self, rows: impl IntoIterator<Item = LinearConstraint>) -> Self {
        for row in rows {
            self.add(row);
        }
        self
    }

    pub fn build(self) -> ConvexProgram {
        ConvexProgram {
            variable_count: self.variable_count,
            objective: self.objective,
            equalities: self.equalities,
            inequalities: self.inequalities,
        }
    }
}

/// A convex program with linear constraints and a diagonal quadratic
/// objective.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexProgram {
    variable_count: usize,
    objective: Objective,
    equalities: RowBlock,
    inequalities: RowBlock,
}

impl ConvexProgram {
    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    pub fn equality_count(&self) -> usize {
        self.equalities.len()
    }

    pub fn inequality_count(&self) -> usize {
        self.inequalities.len()
    }

    /// Total constraint rows.
    pub fn constraint_count(&self) -> usize {
        self.equality_count() + self.inequality_count()
    }

    /// `q`
    pub fn linear_objective(&self) -> &[f64] {
        &self.objective.linear
    }

    /// Returns true if the objective has a quadratic part.
    pub fn is_quadratic(&self) -> bool {
        !self.objective.quadratic.is_empty()
    }

    /// `P` as an upper-triangular (here diagonal) CSC matrix.
    pub fn quadratic_matrix(&self) -> CscParts {
        if !self.is_quadratic() {
            return CscParts::zeros(self.variable_count, self.variable_count);
        }
        CscParts::from_triplets(
            self.variable_count,
            self.variable_count,
            self.objective
                .quadratic
                .iter()
                .map(|&(k, value)| (k, k, value))
                .collect(),
        )
    }

    /// Stacked constraint matrix: equality rows first, then inequality rows.
    pub fn constraint_matrix(&self) -> CscParts {
        let offset = self.equality_count();
        let triplets = self
            .equalities
            .triplets
            .iter()
            .copied()
            .chain(
                self.inequalities
                    .triplets
                    .iter()
                    .map(|&(r, c, v)| (r + offset, c, v)),
            )
            .collect();
        CscParts::from_triplets(self.constraint_count(), self.variable_count, triplets)
    }

    /// Stacked right-hand side matching [`Self::constraint_matrix`].
    pub fn rhs(&self) -> Vec<f64> {
        let mut b = Vec::with_capacity(self.constraint_count());
        b.extend_from_slice(&self.equalities.rhs);
        b.extend_from_slice(&self.inequalities.rhs);
        b
    }

    /// Objective value at `x`.
    pub fn objective_value(&self, x: &[f64]) -> f64 {
        let linear: f64 = self.objective.linear.iter().zip(x).map(|(q, v)| q * v).sum();
        let quadratic: f64 = self
            .objective
            .quadratic
            .iter()
            .map(|&(k, p)| 0.5 * p * x[k] * x[k])
            .sum();
        linear + quadratic
    }

    /// Largest constraint violation at `x`: `|Ax − b|` on equality rows,
    /// `(Ax − b)⁺` on inequality rows.
    pub fn max_violation(&self, x: &[f64]) -> f64 {
        let ax = self.constraint_matrix().mul_vec(x);
        let offset = self.equality_count();
        ax.iter()
            .zip(self.rhs())
            .enumerate()
            .map(|(row, (lhs, b))| {
                if row < offset {
                    (lhs - b).abs()
                } else {
                    (lhs - b).max(0.0)
                }
            })
            .fold(0.0, f64::max)
    }
}

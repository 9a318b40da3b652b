//! Solver diagnostics attached to every estimation run.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Terminal status reported by a convex backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Converged to the requested tolerances.
    Optimal,
    /// Converged to reduced tolerances.
    AlmostOptimal,
    /// The constraint set was declared empty.
    Infeasible,
    /// The objective was declared unbounded below.
    Unbounded,
    /// Iteration limit reached.
    MaxIterations,
    /// Time limit reached.
    MaxTime,
    /// Numerical breakdown or stalled progress.
    NumericalError,
}

impl SolveStatus {
    /// Returns true if the solution values can be decoded.
    pub fn is_solved(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::AlmostOptimal)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::AlmostOptimal => "almost_optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::MaxIterations => "max_iterations",
            SolveStatus::MaxTime => "max_time",
            SolveStatus::NumericalError => "numerical_error",
        };
        f.write_str(name)
    }
}

/// Diagnostics for a single `(dataset, tau)` solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveDiagnostics {
    /// Terminal status.
    pub status: SolveStatus,
    /// Objective value at termination.
    pub objective: f64,
    /// Interior-point iterations performed.
    pub iterations: u32,
    /// Wall time spent inside the backend.
    pub solve_time: Duration,
    /// Number of decision variables.
    pub variable_count: usize,
    /// Number of constraint rows (equalities and inequalities).
    pub constraint_count: usize,
}

impl SolveDiagnostics {
    /// Returns the solve time in whole milliseconds, for logging.
    pub fn solve_time_ms(&self) -> u64 {
        self.solve_time.as_millis() as u64
    }
}

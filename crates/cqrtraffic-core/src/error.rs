//! Error types for cqrtraffic

use thiserror::Error;

use crate::diagnostics::SolveDiagnostics;

/// Main error type for estimation runs.
///
/// Input-validation variants abort a run before the solver is invoked.
/// Solver variants abort only the affected quantile level.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CqrError {
    /// Too few observations, or all regressor vectors identical.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// Quantile level outside the open interval (0, 1).
    #[error("Invalid quantile level {tau}: must lie strictly in (0, 1)")]
    InvalidQuantile { tau: f64 },

    /// An observation violates the input contract.
    #[error("Invalid observation at index {index}: {reason}")]
    InvalidObservation { index: usize, reason: String },

    /// The evaluation grid is not a strictly increasing sequence of
    /// non-negative densities.
    #[error("Invalid evaluation grid: {0}")]
    InvalidGrid(String),

    /// The solver declared the program infeasible.
    ///
    /// The flat fit is always feasible, so this indicates a bug in program
    /// assembly or corrupted input.
    #[error("Solver reported infeasibility ({}) for a program that always admits a flat fit", .diagnostics.status)]
    SolverInfeasible { diagnostics: SolveDiagnostics },

    /// The solver stopped without converging.
    #[error("Solver failed with status {} after {} iterations", .diagnostics.status, .diagnostics.iterations)]
    SolverNumerical { diagnostics: SolveDiagnostics },

    /// The run was cancelled before it started.
    #[error("Estimation for tau = {tau} was cancelled")]
    Cancelled { tau: f64 },

    /// The worker pool could not be created.
    #[error("Execution error: {0}")]
    Execution(String),
}

impl CqrError {
    /// Returns true for errors raised before any solver call.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CqrError::DegenerateInput(_)
                | CqrError::InvalidQuantile { .. }
                | CqrError::InvalidObservation { .. }
                | CqrError::InvalidGrid(_)
        )
    }

    /// Returns the solver diagnostics attached to solver failures.
    pub fn diagnostics(&self) -> Option<&SolveDiagnostics> {
        match self {
            CqrError::SolverInfeasible { diagnostics }
            | CqrError::SolverNumerical { diagnostics } => Some(diagnostics),
            _ => None,
        }
    }
}

/// Result type alias for cqrtraffic operations
pub type Result<T> = std::result::Result<T, CqrError>;

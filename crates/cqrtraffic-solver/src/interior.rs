//! Interior-point backend built on Clarabel.
//!
//! Constraints are passed in Clarabel's conic form `A x + s = b`,
//! `s ∈ K`: equality rows map to the zero cone and `≤` rows to the
//! non-negative cone, in that order.

use std::time::Duration;

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use cqrtraffic_config::SolverSettings;
use cqrtraffic_core::SolveStatus;
use tracing::trace;

use crate::backend::{BackendSolution, ConvexBackend};
use crate::program::ConvexProgram;
use crate::sparse::CscParts;

/// Backend wrapping [`clarabel`]'s default solver.
#[derive(Debug, Clone)]
pub struct ClarabelBackend {
    max_iter: u32,
    time_limit: Option<Duration>,
    tolerance: f64,
    verbose: bool,
}

impl Default for ClarabelBackend {
    fn default() -> Self {
        Self::new(&SolverSettings::default())
    }
}

impl ClarabelBackend {
    pub fn new(settings: &SolverSettings) -> Self {
        Self {
            max_iter: settings.max_iter,
            time_limit: settings.time_limit(),
            tolerance: settings.tolerance,
            verbose: settings.verbose,
        }
    }

    fn settings(&self) -> DefaultSettings<f64> {
        DefaultSettings {
            max_iter: self.max_iter,
            time_limit: self.time_limit.map_or(f64::INFINITY, |t| t.as_secs_f64()),
            verbose: self.verbose,
            tol_gap_abs: self.tolerance,
            tol_gap_rel: self.tolerance,
            tol_feas: self.tolerance,
            ..DefaultSettings::default()
        }
    }
}

fn csc(parts: CscParts) -> CscMatrix<f64> {
    CscMatrix::new(
        parts.nrows,
        parts.ncols,
        parts.colptr,
        parts.rowval,
        parts.nzval,
    )
}

fn map_status(status: SolverStatus) -> SolveStatus {
    match status {
        SolverStatus::Solved => SolveStatus::Optimal,
        SolverStatus::AlmostSolved => SolveStatus::AlmostOptimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            SolveStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            SolveStatus::Unbounded
        }
        SolverStatus::MaxIterations => SolveStatus::MaxIterations,
        SolverStatus::MaxTime => SolveStatus::MaxTime,
        _ => SolveStatus::NumericalError,
    }
}

fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

impl ConvexBackend for ClarabelBackend {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn solve(&self, program: &ConvexProgram) -> BackendSolution {
        let p = csc(program.quadratic_matrix());
        let a = csc(program.constraint_matrix());
        let b = program.rhs();
        let q = program.linear_objective().to_vec();

        let mut cones = Vec::with_capacity(2);
        if program.equality_count() > 0 {
            cones.push(SupportedConeT::ZeroConeT(program.equality_count()));
        }
        if program.inequality_count() > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(program.inequality_count()));
        }

        trace!(
            event = "backend_solve",
            backend = self.name(),
            nnz = a.nzval.len(),
            cones = cones.len(),
        );

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, self.settings());
        solver.solve();

        let solution = &solver.solution;
        BackendSolution {
            status: map_status(solution.status),
            values: solution.x.clone(),
            objective: solution.obj_val,
            iterations: solution.iterations,
            solve_time: seconds(solution.solve_time),
        }
    }
}

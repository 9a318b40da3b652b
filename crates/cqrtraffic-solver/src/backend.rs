//! Convex backend abstraction.

use std::fmt::Debug;
use std::time::Duration;

use cqrtraffic_core::SolveStatus;

use crate::program::ConvexProgram;

/// Raw outcome of one backend solve.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSolution {
    pub status: SolveStatus,
    /// Decision vector, `program.variable_count()` long when solved.
    pub values: Vec<f64>,
    pub objective: f64,
    pub iterations: u32,
    pub solve_time: Duration,
}

/// Solves a [`ConvexProgram`].
///
/// Backends never fail with an error: any breakdown is reported through
/// [`BackendSolution::status`] so that the caller can attach diagnostics.
/// Implementations must be shareable across the per-quantile worker threads.
pub trait ConvexBackend: Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn solve(&self, program: &ConvexProgram) -> BackendSolution;
}

impl<B: ConvexBackend + ?Sized> ConvexBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn solve(&self, program: &ConvexProgram) -> BackendSolution {
        (**self).solve(program)
    }
}

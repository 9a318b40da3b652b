//! Single-quantile CQR estimation.

use std::time::Instant;

use cqrtraffic_config::{SlopeBound, SolverSettings};
use cqrtraffic_core::{
    CqrError, Dataset, FittedPoint, Frontier, LossKind, QuantileLevel, Regressors, Result,
    ShapeConfig, SolveDiagnostics, SolveStatus,
};
use tracing::{debug, info, warn};

use crate::backend::{BackendSolution, ConvexBackend};
use crate::constraints::{ConstraintCounts, ShapeConstraintBuilder};
use crate::interior::ClarabelBackend;
use crate::layout::VariableLayout;
use crate::loss::QuantileLoss;
use crate::program::{ConvexProgram, ProgramBuilder};

/// Result of one `(dataset, tau)` run.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileFit {
    pub tau: QuantileLevel,
    pub loss: LossKind,
    /// The estimated function, owning its fitted points.
    pub frontier: Frontier,
    pub diagnostics: SolveDiagnostics,
}

impl QuantileFit {
    /// Fitted points aligned with the input dataset.
    pub fn points(&self) -> &[FittedPoint] {
        self.frontier.points()
    }

    /// Fitted values `ŷ_i`.
    pub fn values(&self) -> Vec<f64> {
        self.points().iter().map(|p| p.value).collect()
    }
}

/// A program ready for submission, with the metadata needed to decode it.
#[derive(Debug, Clone)]
pub struct AssembledProgram {
    pub program: ConvexProgram,
    pub layout: VariableLayout,
    pub counts: ConstraintCounts,
    pub slope_limit: Option<f64>,
}

/// Convex quantile regression estimator.
///
/// Each call to [`estimate`](Self::estimate) builds a fresh program, hands
/// it to the backend and decodes the solution. The estimator itself holds
/// no per-run state, so one instance can serve concurrent runs.
///
/// # Example
///
/// ```no_run
/// use cqrtraffic_core::{Dataset, ShapeConfig};
/// use cqrtraffic_solver::CqrEstimator;
///
/// let ds = Dataset::from_pairs(&[(0.0, 0.0), (10.0, 100.0), (20.0, 150.0)]).unwrap();
/// let fit = CqrEstimator::new(ShapeConfig::default()).estimate(&ds, 0.5).unwrap();
/// assert_eq!(fit.points().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct CqrEstimator<B = ClarabelBackend> {
    shape: ShapeConfig,
    loss: LossKind,
    slope_bound: SlopeBound,
    backend: B,
}

impl CqrEstimator<ClarabelBackend> {
    /// Pinball-loss estimator with default solver settings.
    pub fn new(shape: ShapeConfig) -> Self {
        Self::from_settings(shape, LossKind::Quantile, &SolverSettings::default())
    }

    pub fn from_settings(shape: ShapeConfig, loss: LossKind, settings: &SolverSettings) -> Self {
        Self {
            shape,
            loss,
            slope_bound: settings.slope_bound,
            backend: ClarabelBackend::new(settings),
        }
    }
}

impl<B: ConvexBackend> CqrEstimator<B> {
    /// Replaces the convex backend.
    pub fn with_backend<B2: ConvexBackend>(self, backend: B2) -> CqrEstimator<B2> {
        CqrEstimator {
            shape: self.shape,
            loss: self.loss,
            slope_bound: self.slope_bound,
            backend,
        }
    }

    pub fn with_loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_slope_bound(mut self, slope_bound: SlopeBound) -> Self {
        self.slope_bound = slope_bound;
        self
    }

    pub fn shape(&self) -> ShapeConfig {
        self.shape
    }

    pub fn loss(&self) -> LossKind {
        self.loss
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Builds the program for one run without solving it.
    ///
    /// # Errors
    ///
    /// Returns [`CqrError::DegenerateInput`] as described on
    /// [`ShapeConstraintBuilder::build`].
    pub fn build_program(&self, dataset: &Dataset, loss: &QuantileLoss) -> Result<AssembledProgram> {
        let constraints = ShapeConstraintBuilder::new(self.shape)
            .with_slope_bound(self.slope_bound)
            .build(dataset)?;
        let layout = constraints.layout();

        let program = ProgramBuilder::new(layout.len())
            .objective(loss.objective(dataset, layout))
            .constraints(loss.residual_links(dataset, layout))
            .constraints(QuantileLoss::slack_bounds(layout))
            .constraints(constraints.iter())
            .build();

        Ok(AssembledProgram {
            program,
            layout,
            counts: constraints.counts(),
            slope_limit: constraints.slope_limit(),
        })
    }

    /// Fits the `tau` quantile frontier of `dataset`.
    ///
    /// # Errors
    ///
    /// - [`CqrError::InvalidQuantile`] unless `0 < tau < 1`, checked first
    /// - [`CqrError::DegenerateInput`] for fewer than two observations or
    ///   identical regressors
    /// - [`CqrError::SolverInfeasible`] if the backend declares the program
    ///   infeasible
    /// - [`CqrError::SolverNumerical`] for any other unsolved status
    pub fn estimate(&self, dataset: &Dataset, tau: f64) -> Result<QuantileFit> {
        let loss = QuantileLoss::new(tau, self.loss)?;
        let assembled = self.build_program(dataset, &loss)?;
        let program = &assembled.program;

        info!(
            event = "quantile_start",
            tau,
            loss = ?self.loss,
            observations = dataset.len(),
            dimension = dataset.dimension(),
        );
        debug!(
            event = "program_built",
            tau,
            variables = program.variable_count(),
            constraints = program.constraint_count(),
            concavity_rows = assembled.counts.concavity,
            slope_limit = ?assembled.slope_limit,
        );

        let started = Instant::now();
        let solution = self.backend.solve(program);
        let diagnostics = SolveDiagnostics {
            status: solution.status,
            objective: solution.objective,
            iterations: solution.iterations,
            solve_time: solution.solve_time,
            variable_count: program.variable_count(),
            constraint_count: program.constraint_count(),
        };

        info!(
            event = "quantile_end",
            tau,
            backend = self.backend.name(),
            status = %diagnostics.status,
            objective = diagnostics.objective,
            iterations = diagnostics.iterations,
            duration_ms = started.elapsed().as_millis() as u64,
        );

        let points = self.decode(dataset, assembled.layout, solution, &diagnostics)?;
        Ok(QuantileFit {
            tau: loss.tau(),
            loss: self.loss,
            frontier: Frontier::new(dataset, points, self.shape.concave),
            diagnostics,
        })
    }

    fn decode(
        &self,
        dataset: &Dataset,
        layout: VariableLayout,
        solution: BackendSolution,
        diagnostics: &SolveDiagnostics,
    ) -> Result<Vec<FittedPoint>> {
        match diagnostics.status {
            SolveStatus::Optimal => {}
            SolveStatus::AlmostOptimal => {
                warn!(
                    event = "reduced_accuracy",
                    status = %diagnostics.status,
                    iterations = diagnostics.iterations,
                );
            }
            SolveStatus::Infeasible => {
                return Err(CqrError::SolverInfeasible {
                    diagnostics: diagnostics.clone(),
                })
            }
            _ => {
                return Err(CqrError::SolverNumerical {
                    diagnostics: diagnostics.clone(),
                })
            }
        }

        let x = solution.values;
        if x.len() != layout.len() || x.iter().any(|v| !v.is_finite()) {
            return Err(CqrError::SolverNumerical {
                diagnostics: SolveDiagnostics {
                    status: SolveStatus::NumericalError,
                    ..diagnostics.clone()
                },
            });
        }

        Ok((0..dataset.len())
            .map(|i| {
                let slope: Regressors = (0..layout.dimension())
                    .map(|k| x[layout.slope(i, k)])
                    .collect();
                FittedPoint::new(x[layout.fitted(i)], slope)
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "estimator_tests.rs"]
mod tests;

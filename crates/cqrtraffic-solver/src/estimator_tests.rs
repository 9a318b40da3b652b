//! Tests for the CQR estimator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use cqrtraffic_core::Observation;
use cqrtraffic_test::scenarios::{
    constant_density, scenario_a, single_observation, weighted_conflict,
};
use cqrtraffic_test::synthetic::TriangularDiagram;

/// Backend that returns a fixed status and counts its calls.
#[derive(Debug)]
struct FixedStatus {
    status: SolveStatus,
    truncate: bool,
    calls: AtomicUsize,
}

impl FixedStatus {
    fn new(status: SolveStatus) -> Self {
        Self {
            status,
            truncate: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConvexBackend for FixedStatus {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn solve(&self, program: &ConvexProgram) -> BackendSolution {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let len = if self.truncate {
            program.variable_count() - 1
        } else {
            program.variable_count()
        };
        BackendSolution {
            status: self.status,
            values: vec![0.0; len],
            objective: 0.0,
            iterations: 7,
            solve_time: Duration::from_millis(3),
        }
    }
}

fn median_fit(dataset: &Dataset) -> QuantileFit {
    CqrEstimator::new(ShapeConfig::default())
        .estimate(dataset, 0.5)
        .unwrap()
}

#[test]
fn test_concave_data_is_reproduced() {
    let ds = scenario_a();
    let fit = median_fit(&ds);

    assert_eq!(fit.tau.value(), 0.5);
    assert_eq!(fit.diagnostics.status, SolveStatus::Optimal);
    for (fitted, obs) in fit.values().iter().zip(ds.iter()) {
        assert!((fitted - obs.y()).abs() < 1e-3, "{} vs {}", fitted, obs.y());
    }

    let peak = fit.frontier.evaluate(&[20.0]);
    assert!((140.0..=155.0).contains(&peak));
    assert!((fit.frontier.free_flow_slope() - 10.0).abs() < 1e-3);
    assert!(fit.diagnostics.objective.abs() < 1e-3);
}

#[test]
fn test_diagnostics_count_program_size() {
    let ds = scenario_a();
    let fit = median_fit(&ds);
    let n = ds.len();

    // ŷ, β, u, v
    assert_eq!(fit.diagnostics.variable_count, 4 * n);
    // links, slacks, Afriat, non-negativity, slope box
    assert_eq!(
        fit.diagnostics.constraint_count,
        n + 2 * n + n * (n - 1) + n + 2 * n
    );
    assert!(fit.diagnostics.iterations > 0);
}

#[test]
fn test_single_observation_is_degenerate() {
    let backend = FixedStatus::new(SolveStatus::Optimal);
    let estimator = CqrEstimator::new(ShapeConfig::default()).with_backend(backend);
    let err = estimator.estimate(&single_observation(), 0.5).unwrap_err();

    assert!(matches!(err, CqrError::DegenerateInput(_)));
    assert_eq!(estimator.backend().calls(), 0);
}

#[test]
fn test_boundary_tau_rejected_before_solving() {
    let backend = FixedStatus::new(SolveStatus::Optimal);
    let estimator = CqrEstimator::new(ShapeConfig::default()).with_backend(backend);

    for tau in [0.0, 1.0] {
        let err = estimator.estimate(&scenario_a(), tau).unwrap_err();
        assert_eq!(err, CqrError::InvalidQuantile { tau });
    }
    assert_eq!(estimator.backend().calls(), 0);
}

#[test]
fn test_tau_checked_before_dataset() {
    let err = CqrEstimator::new(ShapeConfig::default())
        .estimate(&single_observation(), 1.5)
        .unwrap_err();
    assert!(matches!(err, CqrError::InvalidQuantile { .. }));
}

#[test]
fn test_constant_density_is_degenerate() {
    let err = CqrEstimator::new(ShapeConfig::default())
        .estimate(&constant_density(), 0.5)
        .unwrap_err();
    assert!(matches!(err, CqrError::DegenerateInput(_)));
    assert!(err.is_input_error());
}

#[test]
fn test_infeasible_status_maps_to_error() {
    let estimator = CqrEstimator::new(ShapeConfig::default())
        .with_backend(FixedStatus::new(SolveStatus::Infeasible));
    let err = estimator.estimate(&scenario_a(), 0.5).unwrap_err();

    match err {
        CqrError::SolverInfeasible { diagnostics } => {
            assert_eq!(diagnostics.status, SolveStatus::Infeasible);
            assert_eq!(diagnostics.iterations, 7);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unsolved_statuses_map_to_numerical_error() {
    for status in [
        SolveStatus::Unbounded,
        SolveStatus::MaxIterations,
        SolveStatus::MaxTime,
        SolveStatus::NumericalError,
    ] {
        let estimator =
            CqrEstimator::new(ShapeConfig::default()).with_backend(FixedStatus::new(status));
        let err = estimator.estimate(&scenario_a(), 0.5).unwrap_err();
        assert_eq!(err.diagnostics().map(|d| d.status), Some(status));
        assert!(matches!(err, CqrError::SolverNumerical { .. }));
    }
}

#[test]
fn test_almost_optimal_is_decoded() {
    let estimator = CqrEstimator::new(ShapeConfig::default())
        .with_backend(FixedStatus::new(SolveStatus::AlmostOptimal));
    let fit = estimator.estimate(&scenario_a(), 0.5).unwrap();
    assert_eq!(fit.diagnostics.status, SolveStatus::AlmostOptimal);
    assert_eq!(fit.points().len(), 5);
}

#[test]
fn test_short_solution_vector_is_numerical_error() {
    let mut backend = FixedStatus::new(SolveStatus::Optimal);
    backend.truncate = true;
    let estimator = CqrEstimator::new(ShapeConfig::default()).with_backend(backend);
    let err = estimator.estimate(&scenario_a(), 0.5).unwrap_err();
    assert_eq!(
        err.diagnostics().map(|d| d.status),
        Some(SolveStatus::NumericalError)
    );
}

#[test]
fn test_noisy_fits_satisfy_shape() {
    let ds = TriangularDiagram::default().sample(60, 120.0, 150.0, 42);
    let estimator = CqrEstimator::new(ShapeConfig::default());

    for tau in [0.1, 0.5, 0.9] {
        let fit = estimator.estimate(&ds, tau).unwrap();
        let violation = fit.frontier.shape_violation();
        assert!(violation.concavity <= 1e-2, "tau {}: {:?}", tau, violation);
        assert!(violation.nonnegativity <= 1e-2, "tau {}: {:?}", tau, violation);
        assert_eq!(fit.points().len(), ds.len());
    }
}

#[test]
fn test_monotone_fit_never_decreases() {
    let ds = TriangularDiagram::default().sample(40, 120.0, 100.0, 3);
    let fit = CqrEstimator::new(ShapeConfig::monotone_concave())
        .estimate(&ds, 0.5)
        .unwrap();
    assert!(fit.frontier.shape_violation().monotonicity <= 1e-3);
}

#[test]
fn test_quantile_fraction() {
    let ds = TriangularDiagram::default().sample(60, 120.0, 150.0, 11);
    let estimator = CqrEstimator::new(ShapeConfig::default().with_nonnegative(false));
    let n = ds.len() as f64;

    for tau in [0.2, 0.5, 0.8] {
        let fit = estimator.estimate(&ds, tau).unwrap();
        let (mut above, mut below) = (0.0, 0.0);
        for (yhat, obs) in fit.values().iter().zip(ds.iter()) {
            if obs.y() > yhat + 0.05 {
                above += 1.0;
            } else if obs.y() < yhat - 0.05 {
                below += 1.0;
            }
        }
        assert!(above <= (1.0 - tau) * n + 1e-9, "tau {}: {} above", tau, above);
        assert!(below <= tau * n + 1e-9, "tau {}: {} below", tau, below);
    }
}

#[test]
fn test_refitting_fitted_values_is_idempotent() {
    let ds = TriangularDiagram::default().sample(40, 120.0, 150.0, 5);
    let estimator = CqrEstimator::new(ShapeConfig::default());
    let first = estimator.estimate(&ds, 0.5).unwrap();

    let refit_data = Dataset::new(
        ds.iter()
            .zip(first.values())
            .map(|(obs, yhat)| Observation::new(obs.density(), yhat.max(0.0)))
            .collect(),
    )
    .unwrap();
    let second = estimator.estimate(&refit_data, 0.5).unwrap();

    for (a, b) in first.values().iter().zip(second.values()) {
        assert!((a - b).abs() < 1e-2, "{} vs {}", a, b);
    }
}

#[test]
fn test_repeated_runs_give_identical_points() {
    let ds = TriangularDiagram::default().sample(30, 120.0, 150.0, 11);
    let estimator = CqrEstimator::new(ShapeConfig::default());

    let first = estimator.estimate(&ds, 0.3).unwrap();
    let second = estimator.estimate(&ds, 0.3).unwrap();

    assert_eq!(first.points(), second.points());
    assert_eq!(first.frontier, second.frontier);
}

#[test]
fn test_weights_pick_the_heavier_reading() {
    let estimator = CqrEstimator::new(ShapeConfig::default());

    let low = estimator.estimate(&weighted_conflict(3.0, 1.0), 0.5).unwrap();
    assert!((low.values()[1] - 100.0).abs() < 1e-3);
    assert!((low.values()[2] - 100.0).abs() < 1e-3);

    let high = estimator.estimate(&weighted_conflict(1.0, 3.0), 0.5).unwrap();
    assert!((high.values()[1] - 200.0).abs() < 1e-3);
}

#[test]
fn test_expectile_fit() {
    let estimator = CqrEstimator::new(ShapeConfig::default()).with_loss(LossKind::Expectile);

    let mean = estimator.estimate(&weighted_conflict(1.0, 1.0), 0.5).unwrap();
    assert_eq!(mean.loss, LossKind::Expectile);
    assert!((mean.values()[1] - 150.0).abs() < 1e-3);

    // argmin 0.8 (200 − c)² + 0.2 (c − 100)²
    let upper = estimator.estimate(&weighted_conflict(1.0, 1.0), 0.8).unwrap();
    assert!((upper.values()[1] - 180.0).abs() < 1e-3);
}

#[test]
fn test_program_assembly_without_solving() {
    let ds = scenario_a();
    let estimator = CqrEstimator::new(ShapeConfig::default())
        .with_slope_bound(SlopeBound::Unbounded);
    let loss = QuantileLoss::pinball(0.5).unwrap();
    let assembled = estimator.build_program(&ds, &loss).unwrap();

    assert_eq!(assembled.slope_limit, None);
    assert_eq!(assembled.counts.slope_bounds, 0);
    assert_eq!(assembled.program.equality_count(), ds.len());

    // The exact data with matching subgradients satisfies every row.
    let layout = assembled.layout;
    let mut x = vec![0.0; layout.len()];
    for (i, (obs, slope)) in ds.iter().zip([10.0, 7.5, 1.5, -5.0, -7.0]).enumerate() {
        x[layout.fitted(i)] = obs.y();
        x[layout.slope(i, 0)] = slope;
    }
    assert!(assembled.program.max_violation(&x) < 1e-9);
    assert_eq!(assembled.program.objective_value(&x), 0.0);
}

//! Tests for the fundamental diagram assembler.

use std::time::Duration;

use super::*;
use cqrtraffic_core::SolveStatus;
use cqrtraffic_solver::{BackendSolution, ConvexProgram, VariableLayout};
use cqrtraffic_test::scenarios::{scenario_a, single_observation};
use cqrtraffic_test::synthetic::{replicated_triangle, TriangularDiagram};

/// Backend that ignores the constraints and returns the flat fit
/// `ŷ = 100 (1 − τ)`, recovering τ from the pinball coefficients.
/// Higher levels therefore sit lower and every adjacent pair crosses.
#[derive(Debug)]
struct DescendingLevels;

impl ConvexBackend for DescendingLevels {
    fn name(&self) -> &'static str {
        "descending"
    }

    fn solve(&self, program: &ConvexProgram) -> BackendSolution {
        let n = program.variable_count() / 4;
        let layout = VariableLayout::new(n, 1);
        let tau = program.linear_objective()[layout.under(0)];
        let mut values = vec![0.0; program.variable_count()];
        for i in 0..n {
            values[layout.fitted(i)] = 100.0 * (1.0 - tau);
        }
        BackendSolution {
            status: SolveStatus::Optimal,
            values,
            objective: 0.0,
            iterations: 1,
            solve_time: Duration::from_millis(1),
        }
    }
}

fn assembler(quantiles: &[f64]) -> FundamentalDiagramAssembler {
    FundamentalDiagramAssembler::new(ShapeConfig::default()).with_quantiles(quantiles.to_vec())
}

#[test]
fn test_separated_quantiles_do_not_cross() {
    let ds = replicated_triangle(100.0);
    let diagram = assembler(&[0.9, 0.1, 0.5]).assemble(&ds).unwrap();

    let taus: Vec<f64> = diagram.outcomes.iter().map(|o| o.tau).collect();
    assert_eq!(taus, vec![0.1, 0.5, 0.9]);
    assert!(diagram.is_complete());
    assert!(diagram.warnings.is_empty(), "{:?}", diagram.warnings);

    let mid = diagram.curve(0.5).unwrap();
    let high = diagram.curve(0.9).unwrap();
    for (m, h) in mid.points.iter().zip(&high.points) {
        assert!(h.flow >= m.flow - 1e-6, "crossing at density {}", m.density);
    }

    let capacity = TriangularDiagram::default().capacity();
    assert!((mid.capacity - capacity).abs() < 1e-2);
    assert!((mid.critical_density - 25.0).abs() < 1e-9);
    assert!((high.capacity - (capacity + 100.0)).abs() < 1e-2);
    assert!((mid.free_flow_slope - 80.0).abs() < 1e-3);
    assert_eq!(diagram.statistics.solved_count, 3);
}

#[test]
fn test_flat_top_takes_smallest_critical_density() {
    let ds = Dataset::from_pairs(&[
        (0.0, 0.0),
        (10.0, 100.0),
        (20.0, 100.0),
        (30.0, 100.0),
        (40.0, 0.0),
    ])
    .unwrap();
    let diagram = assembler(&[0.5]).assemble(&ds).unwrap();
    let curve = diagram.curve(0.5).unwrap();

    assert!((curve.capacity - 100.0).abs() < 1e-4);
    assert_eq!(curve.critical_density, 10.0);

    let free = curve.free_flow.as_ref().unwrap();
    assert_eq!((free.start_density, free.end_density, free.points), (0.0, 0.0, 1));
    let congested = curve.congested.as_ref().unwrap();
    assert_eq!((congested.start_density, congested.points), (10.0, 4));
}

#[test]
fn test_invalid_levels_fail_in_isolation() {
    let diagram = assembler(&[0.5, 1.0, 0.0]).assemble(&scenario_a()).unwrap();

    assert!(!diagram.is_complete());
    assert!(diagram.curve(0.5).is_some());
    let failures: Vec<(f64, &CqrError)> = diagram.failures().collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].1, &CqrError::InvalidQuantile { tau: 0.0 });
    assert_eq!(failures[1].1, &CqrError::InvalidQuantile { tau: 1.0 });
    assert_eq!(diagram.statistics.failed_count, 2);
    assert_eq!(diagram.statistics.solved_count, 1);
}

#[test]
fn test_duplicate_levels_are_merged() {
    let levels = assembler(&[0.5, 0.25, 0.5]).quantile_levels();
    assert_eq!(levels, vec![0.25, 0.5]);
}

#[test]
fn test_single_observation_fails_every_level() {
    let diagram = assembler(&[0.25, 0.75])
        .assemble(&single_observation())
        .unwrap();
    assert_eq!(diagram.curves().count(), 0);
    assert!(diagram
        .failures()
        .all(|(_, e)| matches!(e, CqrError::DegenerateInput(_))));
}

#[test]
fn test_empty_dataset_is_rejected() {
    let empty = Dataset::new(Vec::new()).unwrap();
    let err = assembler(&[0.5]).assemble(&empty).unwrap_err();
    assert!(matches!(err, CqrError::DegenerateInput(_)));
}

#[test]
fn test_cancelled_before_start() {
    let flag = AtomicBool::new(true);
    let diagram = assembler(&[0.1, 0.5, 0.9])
        .assemble_with_cancel(&scenario_a(), &flag)
        .unwrap();

    assert_eq!(diagram.statistics.cancelled_count, 3);
    assert_eq!(diagram.statistics.failed_count, 0);
    assert!(diagram
        .failures()
        .all(|(tau, e)| *e == CqrError::Cancelled { tau }));
}

#[test]
fn test_parallel_matches_sequential() {
    let ds = scenario_a();
    let levels = [0.25, 0.5, 0.75];
    let sequential = assembler(&levels)
        .with_threads(QuantileThreadCount::None)
        .assemble(&ds)
        .unwrap();
    let parallel = assembler(&levels)
        .with_threads(QuantileThreadCount::Count(3))
        .assemble(&ds)
        .unwrap();

    for (s, p) in sequential.curves().zip(parallel.curves()) {
        assert_eq!(s.tau, p.tau);
        assert_eq!(s.points, p.points);
    }
}

#[test]
fn test_invalid_grid_aborts_assembly() {
    let err = assembler(&[0.5])
        .with_grid(GridConfig::Explicit {
            densities: vec![10.0, 5.0],
        })
        .assemble(&scenario_a())
        .unwrap_err();
    assert!(matches!(err, CqrError::InvalidGrid(_)));
}

#[test]
fn test_uniform_grid_flags_extrapolation() {
    let diagram = assembler(&[0.5])
        .with_grid(GridConfig::Uniform {
            from: 0.0,
            to: 60.0,
            points: 7,
        })
        .assemble(&scenario_a())
        .unwrap();

    let curve = diagram.curve(0.5).unwrap();
    assert_eq!(diagram.grid.len(), 7);
    // 50 and 60 lie beyond the last observation at 40.
    assert_eq!(curve.extrapolated_count(), 2);
    assert!((curve.capacity - 150.0).abs() < 1e-3);
}

#[test]
fn test_covariate_count_must_match() {
    let err = assembler(&[0.5])
        .with_covariates([1.0])
        .assemble(&scenario_a())
        .unwrap_err();
    assert!(matches!(err, CqrError::InvalidGrid(_)));
}

#[test]
fn test_bagging_reduces_observations() {
    let ds = TriangularDiagram::default().sample(400, 120.0, 150.0, 9);
    let diagram = assembler(&[0.5])
        .with_bagging(BaggingGrid {
            grid_x: 8,
            grid_y: 10,
        })
        .assemble(&ds)
        .unwrap();

    assert!(diagram.statistics.observation_count <= 80);
    assert!(diagram.is_complete());
}

#[test]
fn test_crossings_are_reported() {
    let estimator = CqrEstimator::new(ShapeConfig::default()).with_backend(DescendingLevels);
    let config = CqrConfig::default().with_quantiles([0.2, 0.8]);
    let diagram = FundamentalDiagramAssembler::from_estimator(estimator, &config)
        .assemble(&scenario_a())
        .unwrap();

    assert_eq!(diagram.warnings.len(), 1);
    let warning = &diagram.warnings[0];
    assert_eq!((warning.lower_tau, warning.upper_tau), (0.2, 0.8));
    assert_eq!(warning.fraction, 1.0);
    assert!((warning.max_gap - 60.0).abs() < 1e-9);
}

#[test]
fn test_diagram_serializes_errors_as_text() {
    let diagram = assembler(&[0.5, 1.0]).assemble(&scenario_a()).unwrap();
    let json = serde_json::to_value(&diagram).unwrap();

    let outcomes = json["outcomes"].as_array().unwrap();
    assert!(outcomes[0]["curve"].is_object());
    assert!(outcomes[0]["error"].is_null());
    assert!(outcomes[1]["curve"].is_null());
    assert!(outcomes[1]["error"]
        .as_str()
        .unwrap()
        .contains("Invalid quantile level"));
    assert_eq!(json["statistics"]["solved_count"], 1);
}

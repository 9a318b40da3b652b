//! End-to-end estimation on the reference datasets.

use cqrtraffic::prelude::*;
use cqrtraffic::{BaggingGrid, Error, QuantileThreadCount};
use cqrtraffic_test::scenarios::{constant_density, scenario_a, single_observation};
use cqrtraffic_test::synthetic::{replicated_triangle, TriangularDiagram};

#[test]
fn test_concave_median_peaks_near_twenty() {
    let data = scenario_a();
    let fit = estimate_quantile(&data, 0.5, &CqrConfig::default()).unwrap();

    let (obs, peak) = data
        .iter()
        .zip(fit.points())
        .max_by(|a, b| a.1.value.total_cmp(&b.1.value))
        .unwrap();
    assert!((140.0..=155.0).contains(&peak.value), "capacity {}", peak.value);
    assert!((20.0..=25.0).contains(&obs.density()));
    assert!(fit.diagnostics.status.is_solved());
}

#[test]
fn test_single_observation_is_degenerate() {
    let err = estimate_quantile(&single_observation(), 0.5, &CqrConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Estimation(CqrError::DegenerateInput(_))
    ));
}

#[test]
fn test_boundary_levels_are_rejected() {
    for tau in [0.0, 1.0] {
        let err = estimate_quantile(&scenario_a(), tau, &CqrConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Estimation(CqrError::InvalidQuantile { .. })
        ));
    }
}

#[test]
fn test_level_is_checked_before_bagging() {
    // Bagging rejects covariate data, but the bad level is reported first.
    let data = Dataset::new(vec![
        Observation::with_regressors([10.0, 1.0], 100.0),
        Observation::with_regressors([20.0, 2.0], 150.0),
        Observation::with_regressors([30.0, 1.0], 120.0),
    ])
    .unwrap();
    let config = CqrConfig::default().with_bagging(BaggingGrid {
        grid_x: 4,
        grid_y: 4,
    });

    let err = estimate_quantile(&data, 1.5, &config).unwrap_err();
    assert!(matches!(
        err,
        Error::Estimation(CqrError::InvalidQuantile { tau }) if tau == 1.5
    ));
}

#[test]
fn test_constant_density_is_degenerate() {
    let err = estimate_quantile(&constant_density(), 0.5, &CqrConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Estimation(CqrError::DegenerateInput(_))
    ));
}

#[test]
fn test_separated_levels_stay_ordered() {
    let config = CqrConfig::default()
        .with_quantiles([0.1, 0.5, 0.9])
        .with_threads(QuantileThreadCount::Count(2));
    let diagram = estimate_diagram(&replicated_triangle(100.0), &config).unwrap();

    assert!(diagram.is_complete());
    assert!(diagram.warnings.is_empty(), "{:?}", diagram.warnings);

    let curves: Vec<&FundamentalDiagramCurve> = diagram.curves().collect();
    assert_eq!(curves.len(), 3);
    for pair in curves.windows(2) {
        for (lo, hi) in pair[0].points.iter().zip(&pair[1].points) {
            assert!(hi.flow >= lo.flow - 1e-6, "crossing at {}", lo.density);
        }
    }

    let truth = TriangularDiagram::default();
    let median = diagram.curve(0.5).unwrap();
    assert!((median.capacity - truth.capacity()).abs() < 1e-2);
    assert!((median.critical_density - truth.critical_density()).abs() < 1e-9);
}

#[test]
fn test_one_bad_level_does_not_sink_the_batch() {
    let config = CqrConfig::default().with_quantiles([0.25, 1.5, 0.75]);
    let diagram = estimate_diagram(&scenario_a(), &config).unwrap();

    assert_eq!(diagram.curves().count(), 2);
    let failures: Vec<_> = diagram.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, 1.5);
}

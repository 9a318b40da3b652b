//! Quantile crossing detection.
//!
//! Quantile curves are fitted independently, so nothing forces a higher
//! level to lie above a lower one. Crossings are reported, never resolved.

use serde::{Deserialize, Serialize};

use crate::curve::FundamentalDiagramCurve;

/// The curve for `upper_tau` drops below the curve for `lower_tau`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveCrossingWarning {
    pub lower_tau: f64,
    pub upper_tau: f64,
    /// Grid densities where the upper curve is below the lower one by more
    /// than the tolerance.
    pub densities: Vec<f64>,
    /// Largest `lower − upper` gap of the fitted response over those
    /// densities.
    pub max_gap: f64,
    /// Share of grid points that cross.
    pub fraction: f64,
}

/// Compares two curves evaluated on the same grid.
///
/// Returns `None` when the upper curve stays above the lower one within
/// `tolerance` at every grid point.
pub fn compare(
    lower: &FundamentalDiagramCurve,
    upper: &FundamentalDiagramCurve,
    tolerance: f64,
) -> Option<CurveCrossingWarning> {
    debug_assert_eq!(lower.points.len(), upper.points.len());
    let mut densities = Vec::new();
    let mut max_gap = 0.0_f64;
    for (lo, hi) in lower.points.iter().zip(&upper.points) {
        let gap = lo.response_value(lower.response) - hi.response_value(upper.response);
        if gap > tolerance {
            densities.push(lo.density);
            max_gap = max_gap.max(gap);
        }
    }
    if densities.is_empty() {
        return None;
    }
    Some(CurveCrossingWarning {
        lower_tau: lower.tau,
        upper_tau: upper.tau,
        fraction: densities.len() as f64 / lower.points.len().max(1) as f64,
        densities,
        max_gap,
    })
}

/// Checks each pair of adjacent curves, ordered by ascending τ.
pub fn detect_crossings(
    curves: &[&FundamentalDiagramCurve],
    tolerance: f64,
) -> Vec<CurveCrossingWarning> {
    curves
        .windows(2)
        .filter_map(|pair| compare(pair[0], pair[1], tolerance))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurvePoint;
    use cqrtraffic_core::{ResponseKind, SolveDiagnostics, SolveStatus};
    use std::time::Duration;

    fn curve(tau: f64, flows: &[f64]) -> FundamentalDiagramCurve {
        FundamentalDiagramCurve {
            tau,
            response: ResponseKind::Flow,
            points: flows
                .iter()
                .enumerate()
                .map(|(i, &flow)| CurvePoint {
                    density: 10.0 * i as f64,
                    flow,
                    speed: 0.0,
                    slope: 0.0,
                    extrapolated: false,
                })
                .collect(),
            capacity: flows.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            critical_density: 0.0,
            free_flow_slope: 0.0,
            free_flow: None,
            congested: None,
            diagnostics: SolveDiagnostics {
                status: SolveStatus::Optimal,
                objective: 0.0,
                iterations: 0,
                solve_time: Duration::ZERO,
                variable_count: 0,
                constraint_count: 0,
            },
        }
    }

    #[test]
    fn test_ordered_curves_do_not_cross() {
        let low = curve(0.1, &[0.0, 80.0, 100.0]);
        let mid = curve(0.5, &[0.0, 100.0, 120.0]);
        let high = curve(0.9, &[0.0, 120.0, 150.0]);
        assert!(detect_crossings(&[&low, &mid, &high], 1e-6).is_empty());
    }

    #[test]
    fn test_crossing_reported_with_gap_and_fraction() {
        let low = curve(0.1, &[0.0, 80.0, 130.0, 90.0]);
        let high = curve(0.9, &[0.0, 120.0, 100.0, 70.0]);
        let warnings = detect_crossings(&[&low, &high], 1e-6);

        assert_eq!(warnings.len(), 1);
        let w = &warnings[0];
        assert_eq!((w.lower_tau, w.upper_tau), (0.1, 0.9));
        assert_eq!(w.densities, vec![20.0, 30.0]);
        assert_eq!(w.max_gap, 30.0);
        assert_eq!(w.fraction, 0.5);
    }

    #[test]
    fn test_gaps_within_tolerance_are_ignored() {
        let low = curve(0.1, &[0.0, 100.0 + 1e-9]);
        let high = curve(0.9, &[0.0, 100.0]);
        assert!(compare(&low, &high, 1e-6).is_none());
        assert!(compare(&low, &high, 0.0).is_some());
    }
}

//! Statistics for a multi-quantile run.

use std::time::Duration;

use cqrtraffic_core::{CqrError, Result};
use serde::{Deserialize, Serialize};

use crate::curve::FundamentalDiagramCurve;

/// Counts and timings gathered after every quantile run has finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Distinct quantile levels requested.
    pub quantile_count: usize,
    /// Runs that produced a curve.
    pub solved_count: usize,
    /// Runs that failed, cancellations excluded.
    pub failed_count: usize,
    /// Runs skipped because cancellation was requested.
    pub cancelled_count: usize,
    /// Observations the estimator saw, after bagging.
    pub observation_count: usize,
    /// Wall time of the whole assembly.
    pub wall_time: Duration,
    /// Backend time summed over the solved runs.
    pub solver_time: Duration,
    /// Interior-point iterations summed over the solved runs.
    pub total_iterations: u64,
}

impl RunStatistics {
    /// Creates empty statistics for `quantile_count` runs.
    pub fn new(quantile_count: usize, observation_count: usize) -> Self {
        Self {
            quantile_count,
            observation_count,
            ..Self::default()
        }
    }

    /// Records the outcome of one run.
    pub fn record(&mut self, outcome: &Result<FundamentalDiagramCurve>) {
        match outcome {
            Ok(curve) => {
                self.solved_count += 1;
                self.solver_time += curve.diagnostics.solve_time;
                self.total_iterations += u64::from(curve.diagnostics.iterations);
            }
            Err(CqrError::Cancelled { .. }) => self.cancelled_count += 1,
            Err(_) => self.failed_count += 1,
        }
    }

    /// Returns the share of runs that produced a curve.
    pub fn success_rate(&self) -> f64 {
        if self.quantile_count == 0 {
            0.0
        } else {
            self.solved_count as f64 / self.quantile_count as f64
        }
    }

    /// Returns the average backend time per solved run.
    pub fn avg_solver_time(&self) -> Duration {
        if self.solved_count == 0 {
            Duration::ZERO
        } else {
            self.solver_time / self.solved_count as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_statistics() {
        let stats = RunStatistics::new(0, 0);
        assert_eq!(stats.success_rate(), 0.0);
        assert_eq!(stats.avg_solver_time(), Duration::ZERO);
    }

    #[test]
    fn test_errors_are_split_by_kind() {
        let mut stats = RunStatistics::new(3, 10);
        stats.record(&Err(CqrError::Cancelled { tau: 0.5 }));
        stats.record(&Err(CqrError::InvalidQuantile { tau: 1.0 }));
        stats.record(&Err(CqrError::DegenerateInput("x".to_string())));
        assert_eq!(stats.cancelled_count, 1);
        assert_eq!(stats.failed_count, 2);
        assert_eq!(stats.solved_count, 0);
    }
}

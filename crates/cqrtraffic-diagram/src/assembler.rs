//! Multi-quantile fundamental diagram assembly.
//!
//! The assembler runs the estimator once per requested quantile level over
//! the same dataset. Runs are independent: each builds its own program, a
//! failure affects only its own level, and results are merged only after
//! every run has finished.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use cqrtraffic_config::{CqrConfig, GridConfig, QuantileThreadCount, SolverSettings};
use cqrtraffic_core::{bag, BaggingGrid, CqrError, Dataset, ResponseKind, Result, ShapeConfig};
use cqrtraffic_solver::{ClarabelBackend, ConvexBackend, CqrEstimator};
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::crossing::{detect_crossings, CurveCrossingWarning};
use crate::curve::{FundamentalDiagramCurve, DEFAULT_LEVEL_TOLERANCE};
use crate::grid::DensityGrid;
use crate::statistics::RunStatistics;

/// Outcome of the run for one quantile level.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileOutcome {
    pub tau: f64,
    pub result: Result<FundamentalDiagramCurve>,
}

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    tau: f64,
    curve: Option<&'a FundamentalDiagramCurve>,
    error: Option<String>,
}

impl Serialize for QuantileOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        OutcomeRecord {
            tau: self.tau,
            curve: self.result.as_ref().ok(),
            error: self.result.as_ref().err().map(ToString::to_string),
        }
        .serialize(serializer)
    }
}

/// Curves for every requested quantile level, sorted by ascending τ.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundamentalDiagram {
    pub grid: DensityGrid,
    pub outcomes: Vec<QuantileOutcome>,
    /// Crossings between adjacent successful curves.
    pub warnings: Vec<CurveCrossingWarning>,
    pub statistics: RunStatistics,
}

impl FundamentalDiagram {
    /// Successful curves in ascending τ.
    pub fn curves(&self) -> impl Iterator<Item = &FundamentalDiagramCurve> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// The curve for `tau`, if that run succeeded.
    pub fn curve(&self, tau: f64) -> Option<&FundamentalDiagramCurve> {
        self.outcomes
            .iter()
            .find(|o| o.tau == tau)
            .and_then(|o| o.result.as_ref().ok())
    }

    /// Failed runs with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (f64, &CqrError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.tau, e)))
    }

    /// Returns true if every run produced a curve.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Runs one estimation per quantile level and assembles the curves.
///
/// # Example
///
/// ```no_run
/// use cqrtraffic_core::{Dataset, ShapeConfig};
/// use cqrtraffic_diagram::FundamentalDiagramAssembler;
///
/// let ds = Dataset::from_pairs(&[(0.0, 0.0), (10.0, 100.0), (20.0, 150.0), (30.0, 120.0)]).unwrap();
/// let diagram = FundamentalDiagramAssembler::new(ShapeConfig::default())
///     .with_quantiles([0.1, 0.5, 0.9])
///     .assemble(&ds)
///     .unwrap();
///
/// for curve in diagram.curves() {
///     println!("tau {}: capacity {}", curve.tau, curve.capacity);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FundamentalDiagramAssembler<B = ClarabelBackend> {
    estimator: CqrEstimator<B>,
    quantiles: Vec<f64>,
    grid: Option<GridConfig>,
    response: ResponseKind,
    threads: QuantileThreadCount,
    crossing_tolerance: f64,
    level_tolerance: f64,
    bagging: Option<BaggingGrid>,
    covariates: Option<Vec<f64>>,
}

/// Flows closer than this are treated as level. Interior-point values carry
/// errors a couple of orders above the solver tolerance.
fn level_tolerance(settings: &SolverSettings) -> f64 {
    (settings.tolerance * 100.0).max(DEFAULT_LEVEL_TOLERANCE)
}

impl FundamentalDiagramAssembler<ClarabelBackend> {
    /// Median-only assembler with default settings.
    pub fn new(shape: ShapeConfig) -> Self {
        Self::from_config(&CqrConfig::default().with_shape(shape))
    }

    pub fn from_config(config: &CqrConfig) -> Self {
        Self::from_estimator(
            CqrEstimator::from_settings(config.shape, config.loss, &config.solver),
            config,
        )
    }
}

impl<B: ConvexBackend> FundamentalDiagramAssembler<B> {
    /// Uses a prepared estimator with the remaining settings from `config`.
    pub fn from_estimator(estimator: CqrEstimator<B>, config: &CqrConfig) -> Self {
        Self {
            estimator,
            quantiles: config.quantiles.clone(),
            grid: config.grid.clone(),
            response: config.response,
            threads: config.threads,
            crossing_tolerance: config.crossing_tolerance,
            level_tolerance: level_tolerance(&config.solver),
            bagging: config.bagging,
            covariates: config.covariates.clone(),
        }
    }

    pub fn with_quantiles(mut self, quantiles: impl Into<Vec<f64>>) -> Self {
        self.quantiles = quantiles.into();
        self
    }

    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn with_response(mut self, response: ResponseKind) -> Self {
        self.response = response;
        self
    }

    pub fn with_threads(mut self, threads: QuantileThreadCount) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_crossing_tolerance(mut self, tolerance: f64) -> Self {
        self.crossing_tolerance = tolerance;
        self
    }

    /// Relative tolerance for capacity ties and flat segments.
    pub fn with_level_tolerance(mut self, tolerance: f64) -> Self {
        self.level_tolerance = tolerance;
        self
    }

    pub fn with_bagging(mut self, grid: BaggingGrid) -> Self {
        self.bagging = Some(grid);
        self
    }

    pub fn with_covariates(mut self, covariates: impl Into<Vec<f64>>) -> Self {
        self.covariates = Some(covariates.into());
        self
    }

    pub fn estimator(&self) -> &CqrEstimator<B> {
        &self.estimator
    }

    /// Requested levels sorted ascending with duplicates removed.
    pub fn quantile_levels(&self) -> Vec<f64> {
        let mut taus = self.quantiles.clone();
        taus.sort_by(f64::total_cmp);
        taus.dedup();
        taus
    }

    /// Fits every quantile level and assembles the diagram.
    ///
    /// # Errors
    ///
    /// Only errors that affect every level abort the assembly: an empty
    /// dataset, an invalid grid or covariate vector, a bagging failure, or a
    /// worker pool that cannot be created. Per-level errors are returned in
    /// [`FundamentalDiagram::outcomes`].
    pub fn assemble(&self, dataset: &Dataset) -> Result<FundamentalDiagram> {
        self.run(dataset, None)
    }

    /// Like [`assemble`](Self::assemble), but levels whose run has not
    /// started when `cancel` is set fail with [`CqrError::Cancelled`].
    pub fn assemble_with_cancel(
        &self,
        dataset: &Dataset,
        cancel: &AtomicBool,
    ) -> Result<FundamentalDiagram> {
        self.run(dataset, Some(cancel))
    }

    fn run(&self, dataset: &Dataset, cancel: Option<&AtomicBool>) -> Result<FundamentalDiagram> {
        let started = Instant::now();
        if dataset.is_empty() {
            return Err(CqrError::DegenerateInput("dataset is empty".to_string()));
        }

        let data: Cow<'_, Dataset> = match self.bagging {
            Some(grid) => {
                let bagged = bag(dataset, grid)?;
                debug!(
                    event = "bagged",
                    observations = dataset.len(),
                    cells = bagged.len(),
                );
                Cow::Owned(bagged)
            }
            None => Cow::Borrowed(dataset),
        };
        let data = data.as_ref();

        let grid = DensityGrid::from_config(self.grid.as_ref(), data)?;
        let covariates = self.resolve_covariates(data)?;
        let taus = self.quantile_levels();
        let thread_count = self.threads.resolve(taus.len());

        info!(
            event = "diagram_start",
            quantiles = taus.len(),
            observations = data.len(),
            grid_points = grid.len(),
            threads = thread_count,
        );

        let run_one = |tau: f64| -> Result<FundamentalDiagramCurve> {
            if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                return Err(CqrError::Cancelled { tau });
            }
            let fit = self.estimator.estimate(data, tau)?;
            Ok(FundamentalDiagramCurve::with_level_tolerance(
                &fit,
                &grid,
                &covariates,
                self.response,
                self.level_tolerance,
            ))
        };

        let results: Vec<Result<FundamentalDiagramCurve>> = if thread_count <= 1 || taus.len() <= 1
        {
            taus.iter().map(|&tau| run_one(tau)).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(thread_count)
                .build()
                .map_err(|e| CqrError::Execution(e.to_string()))?;
            pool.install(|| taus.par_iter().map(|&tau| run_one(tau)).collect())
        };

        let mut statistics = RunStatistics::new(taus.len(), data.len());
        let outcomes: Vec<QuantileOutcome> = taus
            .into_iter()
            .zip(results)
            .map(|(tau, result)| {
                statistics.record(&result);
                if let Err(error) = &result {
                    warn!(event = "quantile_failed", tau, error = %error);
                }
                QuantileOutcome { tau, result }
            })
            .collect();

        let curves: Vec<&FundamentalDiagramCurve> = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .collect();
        let warnings = detect_crossings(&curves, self.crossing_tolerance);
        for w in &warnings {
            warn!(
                event = "curve_crossing",
                lower_tau = w.lower_tau,
                upper_tau = w.upper_tau,
                crossing_points = w.densities.len(),
                max_gap = w.max_gap,
                fraction = w.fraction,
            );
        }

        statistics.wall_time = started.elapsed();
        info!(
            event = "diagram_end",
            solved = statistics.solved_count,
            failed = statistics.failed_count,
            cancelled = statistics.cancelled_count,
            crossings = warnings.len(),
            duration_ms = statistics.wall_time.as_millis() as u64,
        );

        Ok(FundamentalDiagram {
            grid,
            outcomes,
            warnings,
            statistics,
        })
    }

    /// Values for the non-density regressors: configured, or the weighted
    /// means of the data.
    fn resolve_covariates(&self, dataset: &Dataset) -> Result<Vec<f64>> {
        let expected = dataset.dimension().saturating_sub(1);
        match &self.covariates {
            Some(values) if values.len() != expected => Err(CqrError::InvalidGrid(format!(
                "expected {} evaluation covariates, got {}",
                expected,
                values.len()
            ))),
            Some(values) => Ok(values.clone()),
            None => Ok(dataset.weighted_mean_regressors()[1..].to_vec()),
        }
    }
}

#[cfg(test)]
#[path = "assembler_tests.rs"]
mod tests;

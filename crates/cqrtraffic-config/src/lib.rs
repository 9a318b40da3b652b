//! Configuration system for cqrtraffic.
//!
//! Load estimation settings from TOML or YAML files to control the shape
//! constraints, quantile levels, evaluation grid and solver limits without
//! code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use cqrtraffic_config::{CqrConfig, GridConfig};
//! use std::time::Duration;
//!
//! let config = CqrConfig::from_toml_str(r#"
//!     quantiles = [0.1, 0.5, 0.9]
//!
//!     [shape]
//!     concave = true
//!     monotone = false
//!
//!     [grid]
//!     type = "uniform"
//!     from = 0.0
//!     to = 120.0
//!     points = 61
//!
//!     [solver]
//!     time_limit_secs = 30.0
//! "#).unwrap();
//!
//! assert_eq!(config.quantiles.len(), 3);
//! assert_eq!(config.solver.time_limit(), Some(Duration::from_secs(30)));
//! assert!(matches!(config.grid, Some(GridConfig::Uniform { points: 61, .. })));
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use cqrtraffic_config::CqrConfig;
//!
//! let config = CqrConfig::load("cqrtraffic.toml").unwrap_or_default();
//! // Proceeds with defaults if file doesn't exist
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cqrtraffic_core::{BaggingGrid, LossKind, ResponseKind, ShapeConfig};

/// Default relative tolerance of the interior-point solver.
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Default iteration limit of the interior-point solver.
pub const DEFAULT_MAX_ITER: u32 = 200;

/// Default absolute tolerance when comparing adjacent quantile curves.
pub const DEFAULT_CROSSING_TOLERANCE: f64 = 1e-6;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main estimation configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CqrConfig {
    /// Shape properties enforced on every fit.
    #[serde(default)]
    pub shape: ShapeConfig,

    /// Quantile levels to estimate, each strictly inside (0, 1).
    #[serde(default = "default_quantiles")]
    pub quantiles: Vec<f64>,

    /// Densities at which curves are evaluated. Observed densities if unset.
    #[serde(default)]
    pub grid: Option<GridConfig>,

    /// Residual loss.
    #[serde(default)]
    pub loss: LossKind,

    /// Whether the response is flow or speed.
    #[serde(default)]
    pub response: ResponseKind,

    /// Interior-point solver settings.
    #[serde(default)]
    pub solver: SolverSettings,

    /// Worker threads for per-quantile runs.
    #[serde(default)]
    pub threads: QuantileThreadCount,

    /// Absolute tolerance before a curve crossing is reported.
    #[serde(default = "default_crossing_tolerance")]
    pub crossing_tolerance: f64,

    /// Bag observations on a grid before fitting.
    #[serde(default)]
    pub bagging: Option<BaggingGrid>,

    /// Values of the non-density regressors at which curves are evaluated.
    /// Weighted means of the data if unset.
    #[serde(default)]
    pub covariates: Option<Vec<f64>>,
}

fn default_quantiles() -> Vec<f64> {
    vec![0.5]
}

fn default_crossing_tolerance() -> f64 {
    DEFAULT_CROSSING_TOLERANCE
}

impl Default for CqrConfig {
    fn default() -> Self {
        Self {
            shape: ShapeConfig::default(),
            quantiles: default_quantiles(),
            grid: None,
            loss: LossKind::default(),
            response: ResponseKind::default(),
            solver: SolverSettings::default(),
            threads: QuantileThreadCount::default(),
            crossing_tolerance: DEFAULT_CROSSING_TOLERANCE,
            bagging: None,
            covariates: None,
        }
    }
}

impl CqrConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or contains invalid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Sets the quantile levels.
    pub fn with_quantiles(mut self, quantiles: impl Into<Vec<f64>>) -> Self {
        self.quantiles = quantiles.into();
        self
    }

    /// Sets the shape constraints.
    pub fn with_shape(mut self, shape: ShapeConfig) -> Self {
        self.shape = shape;
        self
    }

    /// Sets the evaluation grid.
    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Sets the residual loss.
    pub fn with_loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    /// Sets the response kind.
    pub fn with_response(mut self, response: ResponseKind) -> Self {
        self.response = response;
        self
    }

    /// Sets the worker thread count.
    pub fn with_threads(mut self, threads: QuantileThreadCount) -> Self {
        self.threads = threads;
        self
    }

    /// Enables bagging with the given grid.
    pub fn with_bagging(mut self, grid: BaggingGrid) -> Self {
        self.bagging = Some(grid);
        self
    }

    /// Sets the solver time limit.
    pub fn with_time_limit_secs(mut self, seconds: f64) -> Self {
        self.solver.time_limit_secs = Some(seconds);
        self
    }

    /// Checks structural settings.
    ///
    /// Quantile levels are not checked here: an invalid level fails only its
    /// own run, so the remaining levels of a batch still produce curves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(grid) = &self.grid {
            grid.validate()?;
        }
        if let Some(bagging) = &self.bagging {
            if bagging.grid_x == 0 || bagging.grid_y == 0 {
                return Err(ConfigError::Invalid(
                    "bagging grid sizes must be positive".to_string(),
                ));
            }
        }
        if !(self.crossing_tolerance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "crossing_tolerance must be non-negative, got {}",
                self.crossing_tolerance
            )));
        }
        if let QuantileThreadCount::Count(0) = self.threads {
            return Err(ConfigError::Invalid(
                "thread count must be at least 1".to_string(),
            ));
        }
        self.solver.validate()
    }
}

/// Evaluation grid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GridConfig {
    /// Explicit densities, strictly increasing.
    Explicit { densities: Vec<f64> },

    /// `points` evenly spaced densities from `from` to `to` inclusive.
    Uniform { from: f64, to: f64, points: usize },
}

impl GridConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            GridConfig::Explicit { densities } if densities.is_empty() => Err(
                ConfigError::Invalid("explicit grid has no densities".to_string()),
            ),
            GridConfig::Uniform { from, to, points } if *points < 2 || !(to > from) => {
                Err(ConfigError::Invalid(format!(
                    "uniform grid needs at least 2 points and to > from, got {} points on [{}, {}]",
                    points, from, to
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Interior-point solver settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SolverSettings {
    /// Maximum interior-point iterations.
    pub max_iter: u32,

    /// Wall-clock limit per quantile run.
    pub time_limit_secs: Option<f64>,

    /// Relative gap and feasibility tolerance.
    pub tolerance: f64,

    /// Print solver progress to stdout.
    pub verbose: bool,

    /// Box on subgradient coordinates.
    pub slope_bound: SlopeBound,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iter: DEFAULT_MAX_ITER,
            time_limit_secs: None,
            tolerance: DEFAULT_TOLERANCE,
            verbose: false,
            slope_bound: SlopeBound::default(),
        }
    }
}

impl SolverSettings {
    /// Returns the time limit as a Duration, if any.
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iter == 0 {
            return Err(ConfigError::Invalid("max_iter must be positive".to_string()));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "tolerance must lie in (0, 1), got {}",
                self.tolerance
            )));
        }
        match self.slope_bound {
            SlopeBound::DataScaled { factor } if !(factor > 0.0) => Err(ConfigError::Invalid(
                format!("slope bound factor must be positive, got {}", factor),
            )),
            SlopeBound::Fixed { limit } if !(limit > 0.0) => Err(ConfigError::Invalid(format!(
                "slope bound limit must be positive, got {}",
                limit
            ))),
            _ => Ok(()),
        }
    }
}

/// Box constraint `|β_i[k]| ≤ L` on every subgradient coordinate.
///
/// The subgradients at the boundary observations are otherwise free in one
/// direction at zero cost. Bounding them keeps the optimal set compact,
/// which interior-point methods need to converge reliably. The bound never
/// excludes the flat fit.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlopeBound {
    /// `L = factor · max(range(y), 1) / (smallest positive density gap)`.
    DataScaled { factor: f64 },

    /// A fixed `L`.
    Fixed { limit: f64 },

    /// No box.
    Unbounded,
}

impl Default for SlopeBound {
    fn default() -> Self {
        SlopeBound::DataScaled { factor: 10.0 }
    }
}

/// Worker thread count for per-quantile runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileThreadCount {
    /// One thread per quantile, capped at the available cores.
    #[default]
    Auto,

    /// Run quantiles sequentially on the calling thread.
    None,

    /// At most this many threads.
    Count(usize),
}

impl QuantileThreadCount {
    /// Resolves the thread count for `jobs` quantile runs.
    pub fn resolve(&self, jobs: usize) -> usize {
        let jobs = jobs.max(1);
        match self {
            QuantileThreadCount::Auto => {
                let cpus = std::thread::available_parallelism()
                    .map(|p| p.get())
                    .unwrap_or(1);
                std::cmp::min(cpus, jobs)
            }
            QuantileThreadCount::None => 1,
            QuantileThreadCount::Count(n) => std::cmp::min((*n).max(1), jobs),
        }
    }
}

impl std::fmt::Display for QuantileThreadCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuantileThreadCount::Auto => write!(f, "Auto"),
            QuantileThreadCount::None => write!(f, "None"),
            QuantileThreadCount::Count(n) => write!(f, "{}", n),
        }
    }
}

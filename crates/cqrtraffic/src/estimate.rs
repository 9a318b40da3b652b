//! One-call entry points that hide the estimator and assembler wiring.

use cqrtraffic_config::{ConfigError, CqrConfig};
use cqrtraffic_core::{bag, CqrError, Dataset, QuantileLevel};
use cqrtraffic_diagram::{FundamentalDiagram, FundamentalDiagramAssembler};
use cqrtraffic_solver::{CqrEstimator, QuantileFit};
use thiserror::Error;
use tracing::debug;

/// Errors from the one-call entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Estimation(#[from] CqrError),
}

/// Validates `config` and estimates every configured quantile level.
///
/// # Errors
///
/// Returns [`Error::Config`] for a structurally invalid configuration and
/// [`Error::Estimation`] for failures that affect every level. Per-level
/// failures are reported inside the returned diagram.
pub fn estimate_diagram(dataset: &Dataset, config: &CqrConfig) -> Result<FundamentalDiagram, Error> {
    config.validate()?;
    debug!(
        event = "config_resolved",
        quantiles = config.quantiles.len(),
        threads = %config.threads,
        bagging = config.bagging.is_some(),
    );
    Ok(FundamentalDiagramAssembler::from_config(config).assemble(dataset)?)
}

/// Fits a single quantile level with the shape, loss, solver and bagging
/// settings of `config`.
///
/// `tau` is checked before the data is bagged or validated.
pub fn estimate_quantile(
    dataset: &Dataset,
    tau: f64,
    config: &CqrConfig,
) -> Result<QuantileFit, Error> {
    config.validate()?;
    QuantileLevel::new(tau)?;
    let estimator = CqrEstimator::from_settings(config.shape, config.loss, &config.solver);
    let fit = match config.bagging {
        Some(grid) => estimator.estimate(&bag(dataset, grid)?, tau)?,
        None => estimator.estimate(dataset, tau)?,
    };
    Ok(fit)
}

//! Shape and model options.

use serde::{Deserialize, Serialize};

/// Which shape properties the estimated function must satisfy.
///
/// The defaults describe a flow-density diagram: concave and non-negative,
/// but not monotone, so that the congested branch may slope downwards.
///
/// # Example
///
/// ```
/// use cqrtraffic_core::ShapeConfig;
///
/// let shape = ShapeConfig::default();
/// assert!(shape.concave && shape.nonnegative && !shape.monotone);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ShapeConfig {
    /// Afriat concavity constraints over every ordered pair of observations.
    pub concave: bool,
    /// Non-decreasing in the density coordinate.
    pub monotone: bool,
    /// Fitted values bounded below by zero.
    pub nonnegative: bool,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            concave: true,
            monotone: false,
            nonnegative: true,
        }
    }
}

impl ShapeConfig {
    /// Concave, non-negative, not monotone.
    pub fn fundamental_diagram() -> Self {
        Self::default()
    }

    /// Concave, non-decreasing and non-negative, e.g. a free-flow frontier.
    pub fn monotone_concave() -> Self {
        Self {
            concave: true,
            monotone: true,
            nonnegative: true,
        }
    }

    pub fn with_concave(mut self, concave: bool) -> Self {
        self.concave = concave;
        self
    }

    pub fn with_monotone(mut self, monotone: bool) -> Self {
        self.monotone = monotone;
        self
    }

    pub fn with_nonnegative(mut self, nonnegative: bool) -> Self {
        self.nonnegative = nonnegative;
        self
    }
}

/// Residual loss minimised by the estimator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    /// Pinball loss; estimates conditional quantiles (CQR).
    #[default]
    Quantile,
    /// Asymmetric squared loss; estimates conditional expectiles (CER).
    Expectile,
}

/// What the response variable measures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Flow (vehicles per time unit); speed is derived as flow / density.
    #[default]
    Flow,
    /// Speed (distance per time unit); flow is derived as speed * density.
    Speed,
}

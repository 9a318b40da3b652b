//! cqrtraffic Core - Core types for fundamental diagram estimation
//!
//! This crate provides the data model shared by the estimator and the
//! diagram assembler:
//! - Observations and validated datasets
//! - Quantile levels and shape/loss/response options
//! - Fitted points and the piecewise-linear frontier they define
//! - Solver diagnostics and the error taxonomy
//! - Grid bagging of large datasets

pub mod bagging;
pub mod diagnostics;
pub mod error;
pub mod fitted;
pub mod observation;
pub mod quantile;
pub mod shape;

pub use bagging::{bag, BaggingGrid};
pub use diagnostics::{SolveDiagnostics, SolveStatus};
pub use error::{CqrError, Result};
pub use fitted::{FittedPoint, Frontier, ShapeViolation};
pub use observation::{Dataset, Observation, Regressors, DENSITY};
pub use quantile::QuantileLevel;
pub use shape::{LossKind, ResponseKind, ShapeConfig};

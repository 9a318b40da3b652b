//! cqrtraffic Diagram - Fundamental diagrams from quantile fits
//!
//! This crate evaluates CQR fits on density grids and assembles several
//! quantile levels into one diagram:
//! - [`DensityGrid`]: validated evaluation densities
//! - [`FundamentalDiagramCurve`]: flow, speed and derived scalars per level
//! - [`detect_crossings`]: quantile ordering checks between adjacent levels
//! - [`FundamentalDiagramAssembler`]: parallel per-level runs with failure
//!   isolation and cancellation

pub mod assembler;
pub mod crossing;
pub mod curve;
pub mod grid;
pub mod statistics;

pub use assembler::{FundamentalDiagram, FundamentalDiagramAssembler, QuantileOutcome};
pub use crossing::{compare, detect_crossings, CurveCrossingWarning};
pub use curve::{Branch, BranchKind, CurvePoint, FundamentalDiagramCurve, DEFAULT_LEVEL_TOLERANCE};
pub use grid::DensityGrid;
pub use statistics::RunStatistics;

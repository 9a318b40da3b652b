//! cqrtraffic - Traffic fundamental diagrams by convex quantile regression
//!
//! Fit concave, optionally monotone quantile frontiers to flow-density
//! (or speed-density) observations and read off capacity, critical density
//! and free-flow speed per quantile level.
//!
//! # Example
//!
//! ```no_run
//! use cqrtraffic::prelude::*;
//!
//! let data = Dataset::from_pairs(&[
//!     (0.0, 0.0),
//!     (10.0, 100.0),
//!     (20.0, 150.0),
//!     (30.0, 120.0),
//!     (40.0, 50.0),
//! ])
//! .unwrap();
//!
//! let config = CqrConfig::default().with_quantiles([0.1, 0.5, 0.9]);
//! let diagram = cqrtraffic::estimate_diagram(&data, &config).unwrap();
//!
//! for curve in diagram.curves() {
//!     println!(
//!         "tau {:.2}: capacity {:.1} at density {:.1}",
//!         curve.tau, curve.capacity, curve.critical_density
//!     );
//! }
//! ```

// Data model
pub use cqrtraffic_core::{
    bag, BaggingGrid, CqrError, Dataset, FittedPoint, Frontier, LossKind, Observation,
    QuantileLevel, Regressors, ResponseKind, ShapeConfig, ShapeViolation, SolveDiagnostics,
    SolveStatus, DENSITY,
};

// Configuration
pub use cqrtraffic_config::{
    ConfigError, CqrConfig, GridConfig, QuantileThreadCount, SlopeBound, SolverSettings,
};

// Estimation
pub use cqrtraffic_solver::{ClarabelBackend, ConvexBackend, CqrEstimator, QuantileFit};

// Diagrams
pub use cqrtraffic_diagram::{
    CurveCrossingWarning, CurvePoint, DensityGrid, FundamentalDiagram,
    FundamentalDiagramAssembler, FundamentalDiagramCurve, QuantileOutcome, RunStatistics,
};

/// Lower-level building blocks.
pub mod solver {
    pub use cqrtraffic_solver::*;
}

#[cfg(feature = "console")]
pub mod console;

mod estimate;
pub use estimate::{estimate_diagram, estimate_quantile, Error};

pub mod prelude {
    pub use super::{
        CqrConfig, CqrError, Dataset, FundamentalDiagram, FundamentalDiagramCurve, GridConfig,
        LossKind, Observation, ResponseKind, ShapeConfig,
    };
    pub use super::{estimate_diagram, estimate_quantile};
}

//! cqrtraffic Solver - Convex quantile regression engine
//!
//! This crate turns a dataset and a quantile level into a convex program,
//! solves it and decodes the result:
//!
//! - [`constraints`] - concavity, monotonicity, non-negativity and slope rows
//! - [`loss`] - pinball and expectile objectives with residual slacks
//! - [`program`] - sparse program assembly
//! - [`backend`] / [`interior`] - the backend contract and its Clarabel
//!   implementation
//! - [`estimator`] - one `(dataset, tau)` run end to end

pub mod backend;
pub mod constraints;
pub mod estimator;
pub mod interior;
pub mod layout;
pub mod loss;
pub mod program;
pub mod sparse;

pub use backend::{BackendSolution, ConvexBackend};
pub use constraints::{
    slope_limit, ConstraintCounts, LinearConstraint, Relation, ShapeConstraintBuilder,
    ShapeConstraints,
};
pub use estimator::{AssembledProgram, CqrEstimator, QuantileFit};
pub use interior::ClarabelBackend;
pub use layout::VariableLayout;
pub use loss::{Objective, QuantileLoss};
pub use program::{ConvexProgram, ProgramBuilder};
pub use sparse::CscParts;

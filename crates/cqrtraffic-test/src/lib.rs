//! Shared test fixtures for cqrtraffic crates.
//!
//! - [`scenarios`] - small hand-written datasets with known fits
//! - [`synthetic`] - triangular fundamental diagrams and seeded samples
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! cqrtraffic-test = { workspace = true }
//! ```
//!
//! Then import the fixtures you need:
//!
//! ```ignore
//! use cqrtraffic_test::scenarios::scenario_a;
//! use cqrtraffic_test::synthetic::TriangularDiagram;
//! ```

pub mod scenarios;
pub mod synthetic;

pub use scenarios::{constant_density, scenario_a, single_observation, weighted_conflict};
pub use synthetic::{replicated_triangle, TriangularDiagram};

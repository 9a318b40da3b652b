//! Density grids on which quantile curves are evaluated.

use cqrtraffic_config::GridConfig;
use cqrtraffic_core::{CqrError, Dataset, Result};
use serde::{Deserialize, Serialize};

/// A non-empty, strictly increasing sequence of finite, non-negative
/// densities.
///
/// # Example
///
/// ```
/// use cqrtraffic_diagram::DensityGrid;
///
/// let grid = DensityGrid::uniform(0.0, 100.0, 5).unwrap();
/// assert_eq!(grid.densities(), &[0.0, 25.0, 50.0, 75.0, 100.0]);
/// assert!(DensityGrid::new(vec![10.0, 5.0]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct DensityGrid(Vec<f64>);

impl DensityGrid {
    /// Validates caller-supplied densities.
    ///
    /// # Errors
    ///
    /// Returns [`CqrError::InvalidGrid`] if the grid is empty or contains a
    /// negative, non-finite or non-increasing entry.
    pub fn new(densities: Vec<f64>) -> Result<Self> {
        if densities.is_empty() {
            return Err(CqrError::InvalidGrid("grid is empty".to_string()));
        }
        if let Some((index, d)) = densities
            .iter()
            .enumerate()
            .find(|(_, d)| !d.is_finite() || **d < 0.0)
        {
            return Err(CqrError::InvalidGrid(format!(
                "density {} at index {} must be finite and non-negative",
                d, index
            )));
        }
        if let Some(index) = densities.windows(2).position(|w| w[1] <= w[0]) {
            return Err(CqrError::InvalidGrid(format!(
                "densities must be strictly increasing, {} follows {} at index {}",
                densities[index + 1],
                densities[index],
                index + 1
            )));
        }
        Ok(Self(densities))
    }

    /// `points` evenly spaced densities from `from` to `to` inclusive.
    pub fn uniform(from: f64, to: f64, points: usize) -> Result<Self> {
        if points < 2 || !(to > from) {
            return Err(CqrError::InvalidGrid(format!(
                "uniform grid needs at least 2 points and to > from, got {} points on [{}, {}]",
                points, from, to
            )));
        }
        let step = (to - from) / (points - 1) as f64;
        let mut densities: Vec<f64> = (0..points).map(|k| from + step * k as f64).collect();
        // Pin the endpoint exactly.
        densities[points - 1] = to;
        Self::new(densities)
    }

    /// The distinct observed densities in ascending order.
    pub fn observed(dataset: &Dataset) -> Result<Self> {
        Self::new(dataset.sorted_distinct_densities())
    }

    /// Resolves an optional grid configuration against a dataset.
    pub fn from_config(config: Option<&GridConfig>, dataset: &Dataset) -> Result<Self> {
        match config {
            None => Self::observed(dataset),
            Some(GridConfig::Uniform { from, to, points }) => Self::uniform(*from, *to, *points),
            Some(GridConfig::Explicit { densities }) => Self::new(densities.clone()),
        }
    }

    pub fn densities(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }
}

impl TryFrom<Vec<f64>> for DensityGrid {
    type Error = CqrError;

    fn try_from(densities: Vec<f64>) -> Result<Self> {
        Self::new(densities)
    }
}

impl From<DensityGrid> for Vec<f64> {
    fn from(grid: DensityGrid) -> Self {
        grid.0
    }
}

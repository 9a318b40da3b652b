//! Grid bagging of density-response observations.
//!
//! Large sensor datasets make the `n(n-1)` concavity constraints expensive.
//! Bagging bins the observations on a regular grid over the observed
//! density and response ranges and replaces each non-empty cell by a single
//! observation at the cell's weighted centroid. Its weight is the cell's
//! share of the total weight. Fitting weighted CQR to the bagged data
//! approximates the fit to the full data at a fraction of the cost.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CqrError, Result};
use crate::observation::{Dataset, Observation};

/// Default number of density bins.
pub const DEFAULT_GRID_X: usize = 70;
/// Default number of response bins.
pub const DEFAULT_GRID_Y: usize = 400;

/// Grid resolution for bagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BaggingGrid {
    /// Number of bins along density.
    pub grid_x: usize,
    /// Number of bins along the response.
    pub grid_y: usize,
}

impl Default for BaggingGrid {
    fn default() -> Self {
        Self {
            grid_x: DEFAULT_GRID_X,
            grid_y: DEFAULT_GRID_Y,
        }
    }
}

#[derive(Default)]
struct Cell {
    weight: f64,
    density: f64,
    response: f64,
}

/// Bags a one-dimensional dataset onto a `grid_x × grid_y` grid.
///
/// Cells are emitted in ascending (density bin, response bin) order.
/// Weights of the result sum to one.
///
/// # Errors
///
/// Returns [`CqrError::DegenerateInput`] for zero grid sizes or datasets
/// with covariates beyond density.
///
/// # Example
///
/// ```
/// use cqrtraffic_core::{bag, BaggingGrid, Dataset};
///
/// let ds = Dataset::from_pairs(&[(1.0, 10.0), (1.1, 10.5), (9.0, 80.0)]).unwrap();
/// let bagged = bag(&ds, BaggingGrid { grid_x: 2, grid_y: 2 }).unwrap();
/// assert_eq!(bagged.len(), 2);
/// ```
pub fn bag(dataset: &Dataset, grid: BaggingGrid) -> Result<Dataset> {
    if grid.grid_x == 0 || grid.grid_y == 0 {
        return Err(CqrError::DegenerateInput(format!(
            "bagging grid must be non-empty, got {} x {}",
            grid.grid_x, grid.grid_y
        )));
    }
    if dataset.dimension() != 1 {
        return Err(CqrError::DegenerateInput(format!(
            "bagging requires density as the only regressor, found {} regressors",
            dataset.dimension()
        )));
    }
    let (Some(density_range), Some(response_range)) =
        (dataset.density_range(), dataset.response_range())
    else {
        return Ok(dataset.clone());
    };

    let total = dataset.total_weight();
    let mut cells: BTreeMap<(usize, usize), Cell> = BTreeMap::new();
    for obs in dataset {
        let key = (
            bin(obs.density(), density_range, grid.grid_x),
            bin(obs.y(), response_range, grid.grid_y),
        );
        let cell = cells.entry(key).or_default();
        cell.weight += obs.weight();
        cell.density += obs.weight() * obs.density();
        cell.response += obs.weight() * obs.y();
    }

    Dataset::new(
        cells
            .into_values()
            .map(|c| {
                Observation::new(c.density / c.weight, c.response / c.weight)
                    .with_weight(c.weight / total)
            })
            .collect(),
    )
}

fn bin(value: f64, (lo, hi): (f64, f64), bins: usize) -> usize {
    let width = (hi - lo) / bins as f64;
    if width <= 0.0 {
        return 0;
    }
    (((value - lo) / width).floor() as usize).min(bins - 1)
}

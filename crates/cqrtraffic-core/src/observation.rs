//! Observations and validated datasets.
//!
//! An [`Observation`] is one sensor reading: a regressor vector whose first
//! coordinate is the traffic density, and a scalar response (flow or speed).
//! A [`Dataset`] is an ordered, validated sequence of observations sharing
//! the same regressor dimension.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{CqrError, Result};

/// Regressor vector. Density is always coordinate 0.
///
/// Most diagrams use density alone; a second slot is kept inline for one
/// extra covariate without allocating.
pub type Regressors = SmallVec<[f64; 2]>;

/// Index of the density coordinate in every regressor vector.
pub const DENSITY: usize = 0;

/// A single sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    x: Regressors,
    y: f64,
    #[serde(default = "unit_weight")]
    weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

impl Observation {
    /// Creates an observation with density as the only regressor.
    pub fn new(density: f64, response: f64) -> Self {
        Self {
            x: smallvec::smallvec![density],
            y: response,
            weight: 1.0,
        }
    }

    /// Creates an observation with a full regressor vector.
    ///
    /// The first coordinate is interpreted as density.
    pub fn with_regressors(x: impl IntoIterator<Item = f64>, response: f64) -> Self {
        Self {
            x: x.into_iter().collect(),
            y: response,
            weight: 1.0,
        }
    }

    /// Sets the observation weight used by weighted CQR.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Returns the regressor vector.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Returns the density coordinate.
    pub fn density(&self) -> f64 {
        self.x.first().copied().unwrap_or(f64::NAN)
    }

    /// Returns the response (flow or speed).
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Returns the weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    fn validate(&self, index: usize, dimension: usize) -> Result<()> {
        let invalid = |reason: String| CqrError::InvalidObservation { index, reason };

        if self.x.len() != dimension {
            return Err(invalid(format!(
                "expected {} regressors, found {}",
                dimension,
                self.x.len()
            )));
        }
        if let Some(k) = self.x.iter().position(|v| !v.is_finite()) {
            return Err(invalid(format!("regressor {} is not finite", k)));
        }
        if self.density() < 0.0 {
            return Err(invalid(format!("density {} is negative", self.density())));
        }
        if !self.y.is_finite() || self.y < 0.0 {
            return Err(invalid(format!(
                "response {} must be finite and non-negative",
                self.y
            )));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(invalid(format!(
                "weight {} must be finite and positive",
                self.weight
            )));
        }
        Ok(())
    }
}

/// An ordered, validated sequence of observations.
///
/// Order carries no meaning for the estimation; it is kept so that fitted
/// points can be traced back to their inputs by index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    observations: Vec<Observation>,
    dimension: usize,
}

impl Dataset {
    /// Validates and wraps a sequence of observations.
    ///
    /// # Errors
    ///
    /// Returns [`CqrError::InvalidObservation`] if any observation has a
    /// non-finite value, a negative density or response, a non-positive
    /// weight, or a regressor dimension different from the first one.
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        let dimension = observations.first().map(|o| o.x.len()).unwrap_or(1);
        if dimension == 0 {
            return Err(CqrError::InvalidObservation {
                index: 0,
                reason: "regressor vector is empty".to_string(),
            });
        }
        for (index, obs) in observations.iter().enumerate() {
            obs.validate(index, dimension)?;
        }
        Ok(Self {
            observations,
            dimension,
        })
    }

    /// Builds a one-dimensional dataset from `(density, response)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        Self::new(
            pairs
                .iter()
                .map(|&(density, response)| Observation::new(density, response))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Regressor dimension shared by all observations.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    /// Returns `(min, max)` of the density coordinate, or `None` if empty.
    pub fn density_range(&self) -> Option<(f64, f64)> {
        min_max(self.observations.iter().map(Observation::density))
    }

    /// Returns `(min, max)` of the response, or `None` if empty.
    pub fn response_range(&self) -> Option<(f64, f64)> {
        min_max(self.observations.iter().map(Observation::y))
    }

    /// Smallest strictly positive gap between distinct densities.
    pub fn min_density_gap(&self) -> Option<f64> {
        let densities = self.sorted_distinct_densities();
        densities
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(None, |acc: Option<f64>, gap| {
                Some(acc.map_or(gap, |a| a.min(gap)))
            })
    }

    /// Distinct densities in ascending order.
    pub fn sorted_distinct_densities(&self) -> Vec<f64> {
        let mut densities: Vec<f64> = self.observations.iter().map(Observation::density).collect();
        densities.sort_by(f64::total_cmp);
        densities.dedup();
        densities
    }

    /// Returns true if every observation has the same regressor vector.
    pub fn has_identical_regressors(&self) -> bool {
        match self.observations.split_first() {
            Some((first, rest)) => rest.iter().all(|o| o.x == first.x),
            None => true,
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.observations.iter().map(Observation::weight).sum()
    }

    /// Weighted mean of each regressor coordinate.
    pub fn weighted_mean_regressors(&self) -> Regressors {
        let total = self.total_weight();
        let mut mean: Regressors = smallvec::smallvec![0.0; self.dimension];
        if total <= 0.0 {
            return mean;
        }
        for obs in &self.observations {
            for (m, v) in mean.iter_mut().zip(obs.x.iter()) {
                *m += obs.weight * v / total;
            }
        }
        mean
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

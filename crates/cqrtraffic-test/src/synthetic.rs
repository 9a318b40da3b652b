//! Synthetic fundamental diagrams.

use cqrtraffic_core::{Dataset, Observation};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Triangular flow-density relation
/// `q(k) = min(v_f k, w (k_j − k))`, clamped at zero beyond jam density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangularDiagram {
    /// Free-flow speed `v_f`.
    pub free_flow_speed: f64,
    /// Backward wave speed `w`.
    pub wave_speed: f64,
    /// Jam density `k_j`.
    pub jam_density: f64,
}

impl Default for TriangularDiagram {
    /// 80 km/h free flow, 20 km/h wave speed, 125 veh/km jam density:
    /// capacity 2000 veh/h at 25 veh/km.
    fn default() -> Self {
        Self {
            free_flow_speed: 80.0,
            wave_speed: 20.0,
            jam_density: 125.0,
        }
    }
}

impl TriangularDiagram {
    pub fn flow(&self, density: f64) -> f64 {
        (self.free_flow_speed * density)
            .min(self.wave_speed * (self.jam_density - density))
            .max(0.0)
    }

    pub fn critical_density(&self) -> f64 {
        self.wave_speed * self.jam_density / (self.free_flow_speed + self.wave_speed)
    }

    pub fn capacity(&self) -> f64 {
        self.free_flow_speed * self.critical_density()
    }

    /// Draws `n` readings with densities uniform on `[0, max_density)` and
    /// flows perturbed by uniform noise of half-width `noise`.
    pub fn sample(&self, n: usize, max_density: f64, noise: f64, seed: u64) -> Dataset {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let observations = (0..n)
            .map(|_| {
                let density = rng.random_range(0.0..max_density);
                let jitter = if noise > 0.0 {
                    rng.random_range(-noise..noise)
                } else {
                    0.0
                };
                Observation::new(density, (self.flow(density) + jitter).max(0.0))
            })
            .collect();
        Dataset::new(observations).expect("synthetic sample is valid")
    }
}

/// The default triangle at densities 5, 10, ..., 120, each replicated as
/// `q − spread`, `q`, `q + spread`.
///
/// Every τ-quantile fit of this dataset is unique: below 1/3 it is the
/// lower copy, between 1/3 and 2/3 the exact triangle, above 2/3 the upper
/// copy. Quantile curves on the observed densities are therefore parallel
/// and never cross.
pub fn replicated_triangle(spread: f64) -> Dataset {
    let diagram = TriangularDiagram::default();
    let observations = (1..=24)
        .flat_map(|step| {
            let density = 5.0 * step as f64;
            let flow = diagram.flow(density);
            [
                Observation::new(density, (flow - spread).max(0.0)),
                Observation::new(density, flow),
                Observation::new(density, flow + spread),
            ]
        })
        .collect();
    Dataset::new(observations).expect("replicated triangle is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_peak() {
        let diagram = TriangularDiagram::default();
        assert!((diagram.critical_density() - 25.0).abs() < 1e-12);
        assert!((diagram.capacity() - 2000.0).abs() < 1e-9);
        assert_eq!(diagram.flow(130.0), 0.0);
    }

    #[test]
    fn test_sample_is_seeded() {
        let diagram = TriangularDiagram::default();
        let a = diagram.sample(20, 120.0, 50.0, 7);
        let b = diagram.sample(20, 120.0, 50.0, 7);
        assert_eq!(a, b);
        assert!(a.iter().all(|o| o.density() < 120.0 && o.y() >= 0.0));
    }

    #[test]
    fn test_replicated_triangle_is_nonnegative() {
        let ds = replicated_triangle(100.0);
        assert_eq!(ds.len(), 72);
        assert!(ds.iter().all(|o| o.y() >= 0.0));
        assert_eq!(ds.sorted_distinct_densities().len(), 24);
    }
}

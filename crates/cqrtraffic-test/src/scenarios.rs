//! Hand-written datasets.

use cqrtraffic_core::{Dataset, Observation};

/// Five concave flow-density readings peaking at density 20.
///
/// The data is already concave, so the median fit reproduces it exactly:
/// capacity 150 at critical density 20, free-flow slope 10.
pub fn scenario_a() -> Dataset {
    Dataset::from_pairs(&[
        (0.0, 0.0),
        (10.0, 100.0),
        (20.0, 150.0),
        (30.0, 120.0),
        (40.0, 50.0),
    ])
    .expect("scenario A is valid")
}

/// A dataset with a single reading.
pub fn single_observation() -> Dataset {
    Dataset::from_pairs(&[(15.0, 900.0)]).expect("single observation is valid")
}

/// Several readings that all share density 30.
pub fn constant_density() -> Dataset {
    Dataset::from_pairs(&[(30.0, 1200.0), (30.0, 1350.0), (30.0, 1100.0), (30.0, 1290.0)])
        .expect("constant density dataset is valid")
}

/// Readings at densities 0, 10 and 20 with two conflicting readings at 10.
///
/// `low_weight` and `high_weight` weigh the readings 100 and 200 at
/// density 10.
pub fn weighted_conflict(low_weight: f64, high_weight: f64) -> Dataset {
    Dataset::new(vec![
        Observation::new(0.0, 0.0),
        Observation::new(10.0, 100.0).with_weight(low_weight),
        Observation::new(10.0, 200.0).with_weight(high_weight),
        Observation::new(20.0, 150.0),
    ])
    .expect("weighted conflict dataset is valid")
}

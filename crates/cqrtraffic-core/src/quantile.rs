//! Quantile levels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CqrError, Result};

/// A quantile level `tau` strictly inside `(0, 1)`.
///
/// # Example
///
/// ```
/// use cqrtraffic_core::QuantileLevel;
///
/// let median = QuantileLevel::new(0.5).unwrap();
/// assert_eq!(median.value(), 0.5);
/// assert!(QuantileLevel::new(1.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct QuantileLevel(f64);

impl QuantileLevel {
    /// The median.
    pub const MEDIAN: QuantileLevel = QuantileLevel(0.5);

    /// Creates a quantile level.
    ///
    /// # Errors
    ///
    /// Returns [`CqrError::InvalidQuantile`] unless `0 < tau < 1`.
    pub fn new(tau: f64) -> Result<Self> {
        if tau > 0.0 && tau < 1.0 {
            Ok(Self(tau))
        } else {
            Err(CqrError::InvalidQuantile { tau })
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Weight on under-prediction (`y > ŷ`).
    pub fn upper_weight(self) -> f64 {
        self.0
    }

    /// Weight on over-prediction (`y < ŷ`).
    pub fn lower_weight(self) -> f64 {
        1.0 - self.0
    }
}

impl TryFrom<f64> for QuantileLevel {
    type Error = CqrError;

    fn try_from(tau: f64) -> Result<Self> {
        Self::new(tau)
    }
}

impl From<QuantileLevel> for f64 {
    fn from(level: QuantileLevel) -> f64 {
        level.0
    }
}

impl fmt::Display for QuantileLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_exclusive() {
        assert!(matches!(
            QuantileLevel::new(0.0),
            Err(CqrError::InvalidQuantile { tau }) if tau == 0.0
        ));
        assert!(QuantileLevel::new(1.0).is_err());
        assert!(QuantileLevel::new(-0.2).is_err());
        assert!(QuantileLevel::new(f64::NAN).is_err());
        assert!(QuantileLevel::new(1e-9).is_ok());
    }

    #[test]
    fn test_weights() {
        let tau = QuantileLevel::new(0.9).unwrap();
        assert!((tau.upper_weight() - 0.9).abs() < 1e-12);
        assert!((tau.lower_weight() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_serde_validates() {
        let ok: QuantileLevel = serde_json::from_str("0.25").unwrap();
        assert_eq!(ok.value(), 0.25);
        assert!(serde_json::from_str::<QuantileLevel>("1.5").is_err());
    }
}

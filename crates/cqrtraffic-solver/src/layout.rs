//! Decision variable layout.
//!
//! For `n` observations with `d` regressors the program has
//! `n · (3 + d)` variables laid out contiguously:
//!
//! ```text
//! [ ŷ_0 .. ŷ_{n-1} | β_0[0..d] .. β_{n-1}[0..d] | u_0 .. u_{n-1} | v_0 .. v_{n-1} ]
//! ```
//!
//! `u` and `v` are the non-negative parts of the residual `y − ŷ`.

/// Index arithmetic for the CQR decision vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLayout {
    observations: usize,
    dimension: usize,
}

impl VariableLayout {
    pub fn new(observations: usize, dimension: usize) -> Self {
        Self {
            observations,
            dimension,
        }
    }

    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total number of decision variables.
    pub fn len(&self) -> usize {
        self.observations * (3 + self.dimension)
    }

    pub fn is_empty(&self) -> bool {
        self.observations == 0
    }

    /// Index of `ŷ_i`.
    #[inline]
    pub fn fitted(&self, i: usize) -> usize {
        i
    }

    /// Index of `β_i[k]`.
    #[inline]
    pub fn slope(&self, i: usize, k: usize) -> usize {
        self.observations + i * self.dimension + k
    }

    /// Index of `u_i`, the positive part of `y_i − ŷ_i`.
    #[inline]
    pub fn under(&self, i: usize) -> usize {
        self.observations * (1 + self.dimension) + i
    }

    /// Index of `v_i`, the negative part of `y_i − ŷ_i`.
    #[inline]
    pub fn over(&self, i: usize) -> usize {
        self.observations * (2 + self.dimension) + i
    }
}

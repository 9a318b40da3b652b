//! Compressed sparse column assembly.

/// A matrix in compressed sparse column form.
///
/// Row indices are strictly increasing within each column and duplicate
/// entries are summed, which is the canonical form interior-point backends
/// expect.
#[derive(Debug, Clone, PartialEq)]
pub struct CscParts {
    pub nrows: usize,
    pub ncols: usize,
    pub colptr: Vec<usize>,
    pub rowval: Vec<usize>,
    pub nzval: Vec<f64>,
}

impl CscParts {
    /// An all-zero `nrows × ncols` matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            colptr: vec![0; ncols + 1],
            rowval: Vec::new(),
            nzval: Vec::new(),
        }
    }

    /// Builds a CSC matrix from `(row, col, value)` triplets in any order.
    pub fn from_triplets(nrows: usize, ncols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_unstable_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));

        let mut colptr = vec![0; ncols + 1];
        let mut rowval: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut nzval: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, value) in triplets {
            debug_assert!(row < nrows && col < ncols);
            if last == Some((row, col)) {
                if let Some(v) = nzval.last_mut() {
                    *v += value;
                }
                continue;
            }
            rowval.push(row);
            nzval.push(value);
            colptr[col + 1] += 1;
            last = Some((row, col));
        }
        for c in 0..ncols {
            colptr[c + 1] += colptr[c];
        }

        Self {
            nrows,
            ncols,
            colptr,
            rowval,
            nzval,
        }
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.nzval.len()
    }

    /// Computes `A x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; self.nrows];
        for col in 0..self.ncols {
            for k in self.colptr[col]..self.colptr[col + 1] {
                y[self.rowval[k]] += self.nzval[k] * x[col];
            }
        }
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_triplets_sorts_and_sums() {
        // [ 1 0 2 ]
        // [ 0 3 0 ]
        let csc = CscParts::from_triplets(
            2,
            3,
            vec![(0, 2, 2.0), (1, 1, 1.0), (0, 0, 1.0), (1, 1, 2.0)],
        );
        assert_eq!(csc.colptr, vec![0, 1, 2, 3]);
        assert_eq!(csc.rowval, vec![0, 1, 0]);
        assert_eq!(csc.nzval, vec![1.0, 3.0, 2.0]);
        assert_eq!(csc.mul_vec(&[1.0, 1.0, 1.0]), vec![3.0, 3.0]);
    }

    #[test]
    fn test_rows_sorted_within_column() {
        let csc = CscParts::from_triplets(3, 1, vec![(2, 0, 1.0), (0, 0, 1.0), (1, 0, 1.0)]);
        assert_eq!(csc.rowval, vec![0, 1, 2]);
    }

    #[test]
    fn test_zeros() {
        let csc = CscParts::zeros(4, 4);
        assert_eq!(csc.nnz(), 0);
        assert_eq!(csc.colptr.len(), 5);
        assert_eq!(csc.mul_vec(&[1.0; 4]), vec![0.0; 4]);
    }
}

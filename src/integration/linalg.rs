use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2, ArrayView1};

use super::EvaluationError;

/// LU factors of a square matrix, computed with partial pivoting.
#[derive(Debug, Clone)]
pub struct LuFactors {
    size: usize,
    lu: LU<f64, Dyn, Dyn>,
}

impl LuFactors {
    pub fn factorize(a: &Array2<f64>) -> Result<Self, EvaluationError> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(EvaluationError::Failed(format!(
                "cannot factorize a {}x{} matrix",
                n,
                a.ncols()
            )));
        }
        let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(1.0);
        let lu = DMatrix::from_fn(n, n, |i, j| a[[i, j]]).lu();
        // pivots negligible with respect to the entries are treated as zero
        if lu
            .u()
            .diagonal()
            .iter()
            .any(|d| !d.is_finite() || d.abs() <= f64::EPSILON * scale)
        {
            return Err(EvaluationError::SingularMatrix);
        }
        Ok(Self { size: n, lu })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn solve(&self, b: ArrayView1<f64>) -> Array1<f64> {
        let mut x = DVector::from_iterator(b.len(), b.iter().copied());
        let solved = self.lu.solve_mut(&mut x);
        // singular factors are rejected by `factorize`
        debug_assert!(solved);
        Array1::from_iter(x.iter().copied())
    }

    /// solves for every column of `b`
    pub fn solve_matrix(&self, b: &Array2<f64>) -> Array2<f64> {
        let mut x = Array2::zeros(b.raw_dim());
        for (j, column) in b.columns().into_iter().enumerate() {
            x.column_mut(j).assign(&self.solve(column));
        }
        x
    }
}

/// infinity norm
pub fn norm_inf(v: ArrayView1<f64>) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn solve_with_pivoting() {
        let a = array![[0.0, 2.0, 1.0], [1.0, 1.0, 0.0], [3.0, 0.0, 1.0]];
        let lu = LuFactors::factorize(&a).unwrap();
        let x = lu.solve(array![3.0, 2.0, 4.0].view());
        assert_relative_eq!(a.dot(&x), array![3.0, 2.0, 4.0], epsilon = 1e-12);
    }

    #[test]
    fn singular() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matches!(
            LuFactors::factorize(&a),
            Err(EvaluationError::SingularMatrix)
        ));
    }

    #[test]
    fn inverse_columns() {
        let a = array![[4.0, 1.0], [2.0, 3.0]];
        let lu = LuFactors::factorize(&a).unwrap();
        let inv = lu.solve_matrix(&Array2::eye(2));
        assert_relative_eq!(a.dot(&inv), Array2::eye(2), epsilon = 1e-12);
        assert_eq!(norm_inf(array![1.0, -3.0, 2.0].view()), 3.0);
    }
}

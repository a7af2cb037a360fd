use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use nshare::{IntoNalgebra, IntoNdarray2};

use crate::error::{CsvdError, Result};
use crate::svd::SvdBackend;
use crate::utils::ensure_finite;

const MAX_SVD_ITERATIONS: usize = 10_000;

/// Full SVD through nalgebra's bidiagonalisation + implicit QR.
#[derive(Debug, Clone, Copy, Default)]
pub struct NalgebraSvd;

impl SvdBackend for NalgebraSvd {
    fn compute(&self, matrix: ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
        ensure_finite(&matrix)?;
        let m: DMatrix<f64> = matrix.to_owned().into_nalgebra();

        let svd = nalgebra::linalg::SVD::try_new(
            m,
            false,
            true,
            f64::EPSILON * 5.0,
            MAX_SVD_ITERATIONS,
        )
            .ok_or_else(|| CsvdError::Numerical("SVD did not converge".to_string()))?;
        let v_t = svd
            .v_t
            .ok_or_else(|| CsvdError::Numerical("SVD produced no right singular vectors".to_string()))?;

        let singular_values = svd.singular_values;
        let mut order: Vec<usize> = (0..singular_values.len()).collect();
        order.sort_by(|&a, &b| singular_values[b].total_cmp(&singular_values[a]));

        let s = Array1::from_iter(order.iter().map(|&i| singular_values[i]));
        let vt = v_t.into_ndarray2().select(Axis(0), &order);

        Ok((s, vt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_simple_svd() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let (s, vt) = NalgebraSvd.compute(a.view()).unwrap();

        assert_eq!(s.len(), 2);
        assert_eq!(vt.shape(), &[2, 2]);

        // Check singular values (pre-computed)
        assert_abs_diff_eq!(s[0], 5.4649857, epsilon = 1e-6);
        assert_abs_diff_eq!(s[1], 0.3659662, epsilon = 1e-6);
    }

    #[test]
    fn test_wide_matrix() {
        let a = array![[1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 3.0, 0.0]];
        let (s, vt) = NalgebraSvd.compute(a.view()).unwrap();

        assert_eq!(vt.shape(), &[2, 4]);
        assert_abs_diff_eq!(s[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vt[[0, 2]].abs(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vt[[1, 0]].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_input() {
        let nan = array![[1.0, f64::NAN], [0.0, 2.0]];
        let inf = array![[1.0, 0.0], [f64::INFINITY, 2.0]];

        assert!(matches!(
            NalgebraSvd.compute(nan.view()),
            Err(CsvdError::Numerical(_))
        ));
        assert!(matches!(
            NalgebraSvd.compute(inf.view()),
            Err(CsvdError::Numerical(_))
        ));
    }
}

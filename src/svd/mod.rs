//! # Truncated Singular Value Decomposition
//!
//! Dense truncated SVD used to fit rank-`r` subspaces. Two strategies are available:
//!
//! - [`SvdMethod::Randomized`]: seeded Gaussian range finder with QR-normalised power
//!   iterations. Only a small `(r + oversamples) x N` matrix is decomposed exactly.
//! - [`SvdMethod::Exact`]: full decomposition of the input matrix.
//!
//! Both return the top `r` right singular vectors with signs fixed by [`svd_flip`], so
//! identical input, rank and seed always produce identical components.

use ndarray::{s, Array1, Array2, ArrayView2, Axis};

use crate::error::{CsvdError, Result};
use crate::utils::ensure_finite;

pub mod exact;
#[cfg(feature = "faer")]
pub mod faer;
pub mod randomized;

pub use exact::NalgebraSvd;
#[cfg(feature = "faer")]
pub use self::faer::FaerSvd;
pub use randomized::RandomizedSvd;

/// Dense SVD backend returning singular values in descending order together with the
/// matching right singular vectors as rows (`min(m, n) x n`).
pub trait SvdBackend: Send + Sync {
    fn compute(&self, matrix: ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvdMethod {
    Exact,
    Randomized {
        n_oversamples: usize,
        n_power_iterations: usize,
    },
}

impl Default for SvdMethod {
    fn default() -> Self {
        Self::Randomized {
            n_oversamples: 10,
            n_power_iterations: 5,
        }
    }
}

/// Result of a truncated SVD: `r` singular values and the `r x N` component matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct TruncatedSvd {
    singular_values: Array1<f64>,
    components: Array2<f64>,
}

impl TruncatedSvd {
    pub fn singular_values(&self) -> &Array1<f64> {
        &self.singular_values
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn into_components(self) -> Array2<f64> {
        self.components
    }
}

/// Computes the top `n_components` right singular vectors of `x` with the default
/// nalgebra backend.
pub fn truncated_svd(
    x: ArrayView2<f64>,
    n_components: usize,
    method: SvdMethod,
    seed: u64,
) -> Result<TruncatedSvd> {
    truncated_svd_with(&NalgebraSvd, x, n_components, method, seed)
}

pub fn truncated_svd_with<B: SvdBackend>(
    backend: &B,
    x: ArrayView2<f64>,
    n_components: usize,
    method: SvdMethod,
    seed: u64,
) -> Result<TruncatedSvd> {
    let (n_rows, n_cols) = x.dim();
    if n_components == 0 || n_components > n_rows.min(n_cols) {
        return Err(CsvdError::Dimension {
            requested: n_components,
            rows: n_rows,
            cols: n_cols,
        });
    }
    ensure_finite(&x)?;

    let (s, vt) = match method {
        SvdMethod::Exact => backend.compute(x)?,
        SvdMethod::Randomized {
            n_oversamples,
            n_power_iterations,
        } => RandomizedSvd::new(n_components, n_oversamples, n_power_iterations, seed)
            .compute_with(backend, x)?,
    };

    if vt.nrows() < n_components || s.len() < n_components {
        return Err(CsvdError::Numerical(format!(
            "SVD returned {} components, {} requested",
            vt.nrows(),
            n_components
        )));
    }

    let mut components = vt.slice(s![..n_components, ..]).to_owned();
    svd_flip(&mut components);

    log::debug!(
        "Truncated SVD ({:?}): {} x {} -> {} components",
        method,
        n_rows,
        n_cols,
        n_components
    );

    Ok(TruncatedSvd {
        singular_values: s.slice(s![..n_components]).to_owned(),
        components,
    })
}

/// Makes the largest-magnitude entry of every component row positive.
///
/// Ties resolve to the first such entry.
pub fn svd_flip(vt: &mut Array2<f64>) {
    for mut row in vt.axis_iter_mut(Axis(0)) {
        let mut pivot = 0.0f64;
        for &v in row.iter() {
            if v.abs() > pivot.abs() {
                pivot = v;
            }
        }
        if pivot < 0.0 {
            row.mapv_inplace(|v| -v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_svd_flip() {
        let mut vt = array![[0.1, -0.9, 0.3], [0.5, 0.2, -0.1]];
        svd_flip(&mut vt);

        assert_eq!(vt, array![[-0.1, 0.9, -0.3], [0.5, 0.2, -0.1]]);
    }

    #[test]
    fn test_truncated_svd_rejects_rank() {
        let x = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];

        let err = truncated_svd(x.view(), 3, SvdMethod::Exact, 42).unwrap_err();
        assert_eq!(
            err,
            CsvdError::Dimension {
                requested: 3,
                rows: 2,
                cols: 3
            }
        );

        assert!(truncated_svd(x.view(), 0, SvdMethod::default(), 42).is_err());
    }

    #[test]
    fn test_truncated_svd_rejects_non_finite() {
        let x = array![
            [1.0, f64::INFINITY, 0.0],
            [0.0, 2.0, 1.0],
            [3.0, 1.0, 0.0],
            [1.0, 1.0, 2.0]
        ];

        for method in [SvdMethod::Exact, SvdMethod::default()] {
            assert!(matches!(
                truncated_svd(x.view(), 2, method, 42),
                Err(CsvdError::Numerical(_))
            ));
        }
    }

    #[test]
    fn test_exact_and_randomized_agree() {
        let x = array![
            [2.0, 0.0, 1.0, 0.5],
            [1.0, 3.0, 0.0, 1.5],
            [0.0, 1.0, 4.0, 0.0],
            [1.0, 1.0, 1.0, 1.0],
            [3.0, 0.5, 2.0, 2.0]
        ];

        let exact = truncated_svd(x.view(), 2, SvdMethod::Exact, 42).unwrap();
        let randomized = truncated_svd(x.view(), 2, SvdMethod::default(), 42).unwrap();

        assert_eq!(exact.components().shape(), &[2, 4]);
        for (a, b) in exact
            .singular_values()
            .iter()
            .zip(randomized.singular_values().iter())
        {
            assert_abs_diff_eq!(a, b, epsilon = 1e-8);
        }
        for (a, b) in exact
            .components()
            .iter()
            .zip(randomized.components().iter())
        {
            assert_abs_diff_eq!(a, b, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_components_are_orthonormal() {
        let x = array![
            [1.0, 2.0, 0.0],
            [0.0, 1.0, 3.0],
            [4.0, 0.0, 1.0],
            [2.0, 2.0, 2.0]
        ];
        let svd = truncated_svd(x.view(), 2, SvdMethod::default(), 7).unwrap();
        let gram = svd.components().dot(&svd.components().t());

        assert_abs_diff_eq!(gram[[0, 0]], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(gram[[1, 1]], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(gram[[0, 1]], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_randomized_is_deterministic() {
        let x = array![[1.0, 2.0, 3.0], [3.0, 1.0, 0.5], [0.0, 2.5, 1.0], [1.0, 0.0, 1.0]];
        let a = truncated_svd(x.view(), 2, SvdMethod::default(), 42).unwrap();
        let b = truncated_svd(x.view(), 2, SvdMethod::default(), 42).unwrap();

        assert_eq!(a, b);
    }
}

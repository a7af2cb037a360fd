//! Randomized range finder (Halko, Martinsson & Tropp, 2011).
//!
//! A seeded Gaussian test matrix is pushed through the data, optionally refined with power
//! iterations, and orthonormalised. The data is then projected onto that basis and the
//! small projected matrix is decomposed exactly.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2};
use nshare::{IntoNalgebra, IntoNdarray2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::error::Result;
use crate::svd::{NalgebraSvd, SvdBackend};

#[derive(Debug, Clone, Copy)]
pub struct RandomizedSvd {
    n_components: usize,
    n_oversamples: usize,
    n_power_iterations: usize,
    seed: u64,
}

impl RandomizedSvd {
    pub fn new(
        n_components: usize,
        n_oversamples: usize,
        n_power_iterations: usize,
        seed: u64,
    ) -> Self {
        Self {
            n_components,
            n_oversamples,
            n_power_iterations,
            seed,
        }
    }

    pub fn compute(&self, x: ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
        self.compute_with(&NalgebraSvd, x)
    }

    /// Returns the singular values and right singular vectors of the projected matrix,
    /// `min(n_components + n_oversamples, m, n)` of each.
    pub fn compute_with<B: SvdBackend>(
        &self,
        backend: &B,
        x: ArrayView2<f64>,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        let (m, n) = x.dim();
        let n_random = (self.n_components + self.n_oversamples).min(m.min(n));

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let omega: Array2<f64> =
            Array2::from_shape_fn((n, n_random), |_| rng.sample(StandardNormal));

        let mut q = orthonormalize(x.dot(&omega));
        for _ in 0..self.n_power_iterations {
            let z = orthonormalize(x.t().dot(&q));
            q = orthonormalize(x.dot(&z));
        }

        let b = q.t().dot(&x);
        log::debug!(
            "Randomized range finder: {} x {} projected to {} x {}",
            m,
            n,
            b.nrows(),
            b.ncols()
        );

        backend.compute(b.view())
    }
}

/// Orthonormal basis for the column space of `y` via Householder QR.
fn orthonormalize(y: Array2<f64>) -> Array2<f64> {
    let y: DMatrix<f64> = y.into_nalgebra();
    y.qr().q().into_ndarray2()
}

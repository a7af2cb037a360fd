use faer_ext::*;
use ndarray::{s, Array1, Array2, ArrayView2};

use crate::error::Result;
use crate::svd::SvdBackend;

/// Full SVD through faer.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaerSvd;

impl SvdBackend for FaerSvd {
    fn compute(&self, matrix: ArrayView2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
        let (m, n) = matrix.dim();
        let faer_mat = matrix.into_faer();
        let svd = faer_mat.svd();
        let s: Array1<f64> = Array1::from_iter(svd.s_diagonal().iter().cloned());
        let v = svd.v().into_ndarray().to_owned();
        let vt = v.t().slice(s![..m.min(n), ..]).to_owned();

        Ok((s, vt))
    }
}

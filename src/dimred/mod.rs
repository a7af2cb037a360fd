//! # Subspace Fitting and Projection
//!
//! Rank-`r` linear subspaces fitted with a truncated SVD of the raw (uncentered) rows,
//! and the projection of rows into such a subspace.
//!
//! - [`fit_subspace`] is used for the global basis `V` and for every local basis `W_c`.
//! - [`fit_subspace_padded`] accepts matrices with fewer than `r` rows and pads the basis
//!   with zero directions.
//! - [`project`] computes the reduced coordinates `rho_i = V x_i`.

use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};

use crate::error::{CsvdError, Result};
use crate::svd::{truncated_svd, SvdMethod};
use crate::utils::{ensure_finite, ensure_non_empty};

/// A fitted rank-`r` subspace.
#[derive(Debug, Clone, PartialEq)]
pub struct Subspace {
    components: Array2<f64>,
    singular_values: Array1<f64>,
    explained_variance_ratio: Array1<f64>,
    effective_rank: usize,
}

impl Subspace {
    /// Basis directions as rows, `r x N`.
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn singular_values(&self) -> &Array1<f64> {
        &self.singular_values
    }

    /// Variance of the projected data along each direction divided by the total
    /// per-feature variance of the fitted rows.
    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }

    /// Number of non-padded directions.
    pub fn effective_rank(&self) -> usize {
        self.effective_rank
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn into_components(self) -> Array2<f64> {
        self.components
    }
}

/// Fits a rank-`n_components` subspace on the rows of `x`.
///
/// Fails with [`CsvdError::Dimension`] if `n_components` is zero or exceeds
/// `min(rows, cols)`.
pub fn fit_subspace(
    x: ArrayView2<f64>,
    n_components: usize,
    method: SvdMethod,
    seed: u64,
) -> Result<Subspace> {
    ensure_non_empty(&x)?;
    ensure_finite(&x)?;
    let svd = truncated_svd(x, n_components, method, seed)?;
    let singular_values = svd.singular_values().clone();
    let components = svd.into_components();
    let explained_variance_ratio = explained_variance_ratio(x, &components);

    Ok(Subspace {
        components,
        singular_values,
        explained_variance_ratio,
        effective_rank: n_components,
    })
}

/// Like [`fit_subspace`], but a matrix with fewer than `n_components` rows yields a basis
/// whose trailing `n_components - rows` directions are zero.
///
/// `n_components` larger than the number of columns is still a [`CsvdError::Dimension`].
pub fn fit_subspace_padded(
    x: ArrayView2<f64>,
    n_components: usize,
    method: SvdMethod,
    seed: u64,
) -> Result<Subspace> {
    ensure_non_empty(&x)?;
    let (n_rows, n_cols) = x.dim();
    if n_components == 0 || n_components > n_cols {
        return Err(CsvdError::Dimension {
            requested: n_components,
            rows: n_rows,
            cols: n_cols,
        });
    }

    let rank = n_components.min(n_rows);
    if rank == n_components {
        return fit_subspace(x, n_components, method, seed);
    }

    let fitted = fit_subspace(x, rank, method, seed)?;
    let mut components = Array2::zeros((n_components, n_cols));
    components
        .slice_mut(s![..rank, ..])
        .assign(fitted.components());
    let mut singular_values = Array1::zeros(n_components);
    singular_values
        .slice_mut(s![..rank])
        .assign(fitted.singular_values());
    let mut ratio = Array1::zeros(n_components);
    ratio
        .slice_mut(s![..rank])
        .assign(fitted.explained_variance_ratio());

    Ok(Subspace {
        components,
        singular_values,
        explained_variance_ratio: ratio,
        effective_rank: rank,
    })
}

/// Projects every row of `x` into the subspace spanned by the rows of `v`.
///
/// Returns `B x r x 1` column vectors, `rho_i = V x_i`, in the row order of `x`.
pub fn project(v: ArrayView2<f64>, x: ArrayView2<f64>) -> Result<Array3<f64>> {
    if v.ncols() != x.ncols() {
        return Err(CsvdError::ShapeMismatch {
            expected: format!("rows with {} features", v.ncols()),
            found: format!("rows with {} features", x.ncols()),
        });
    }

    let coords = x.dot(&v.t());
    Ok(coords.insert_axis(Axis(2)))
}

fn explained_variance_ratio(x: ArrayView2<f64>, components: &Array2<f64>) -> Array1<f64> {
    let transformed = x.dot(&components.t());
    let explained = transformed.var_axis(Axis(0), 0.0);
    let total = x.var_axis(Axis(0), 0.0).sum();

    if total > 0.0 {
        explained / total
    } else {
        Array1::zeros(components.nrows())
    }
}

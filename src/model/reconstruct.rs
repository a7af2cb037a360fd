use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::clustering::cluster_members;
use crate::error::{CsvdError, Result};

/// Cross-projection map `M = W^T (W V^T)`, an `N x r` operator taking global coordinates
/// through the local basis `w` back to feature space.
pub fn cross_projection(w: ArrayView2<f64>, v: ArrayView2<f64>) -> Result<Array2<f64>> {
    if w.dim() != v.dim() {
        return Err(CsvdError::ShapeMismatch {
            expected: format!("local basis of shape {:?}", v.dim()),
            found: format!("{:?}", w.dim()),
        });
    }
    Ok(w.t().dot(&w.dot(&v.t())))
}

/// Reconstructs the rows whose global coordinates are `rho` (`m x r x 1`) as
/// `M rho_i`, returning an `m x N` block in the order of `rho`.
pub fn reconstruct_cluster(
    w: ArrayView2<f64>,
    v: ArrayView2<f64>,
    rho: ArrayView3<f64>,
) -> Result<Array2<f64>> {
    let map = cross_projection(w, v)?;
    if rho.shape()[1..] != [map.ncols(), 1] {
        return Err(CsvdError::ShapeMismatch {
            expected: format!("coordinates of shape (m, {}, 1)", map.ncols()),
            found: format!("{:?}", rho.shape()),
        });
    }

    let coords = rho.index_axis(Axis(2), 0);
    Ok(coords.dot(&map.t()))
}

/// Reconstructs every row with the local basis of its cluster and returns the result in
/// the original row order.
///
/// Clusters are processed in order `0..k` and rows within a cluster in ascending index
/// order; the stacked blocks are then put back with [`reorder_rows`].
pub fn reconstruct(
    v: ArrayView2<f64>,
    rho: ArrayView3<f64>,
    labels: &[usize],
    wlist: ArrayView3<f64>,
) -> Result<Array2<f64>> {
    if labels.len() != rho.shape()[0] {
        return Err(CsvdError::ShapeMismatch {
            expected: format!("{} labels", rho.shape()[0]),
            found: format!("{} labels", labels.len()),
        });
    }

    let n_clusters = wlist.shape()[0];
    let members = cluster_members(labels, n_clusters);

    let blocks = members
        .par_iter()
        .enumerate()
        .map(|(cluster, rows)| {
            let clustered_rho = rho.select(Axis(0), rows);
            reconstruct_cluster(
                wlist.index_axis(Axis(0), cluster),
                v,
                clustered_rho.view(),
            )
        })
        .collect::<Result<Vec<Array2<f64>>>>()?;

    let views: Vec<ArrayView2<f64>> = blocks.iter().map(|b| b.view()).collect();
    let stacked = ndarray::concatenate(Axis(0), &views).map_err(|e| CsvdError::ShapeMismatch {
        expected: "reconstruction blocks with matching feature count".to_string(),
        found: e.to_string(),
    })?;
    let index: Vec<usize> = members.into_iter().flatten().collect();

    reorder_rows(stacked.view(), &index)
}

/// Puts the rows of `a` back into original order, where `index[p]` is the original row
/// index of row `p` of `a`.
///
/// `index` must be a permutation of `0..a.nrows()`.
pub fn reorder_rows<T: Clone>(a: ArrayView2<T>, index: &[usize]) -> Result<Array2<T>> {
    let n_rows = a.nrows();
    if index.len() != n_rows {
        return Err(CsvdError::ShapeMismatch {
            expected: format!("{} row indices", n_rows),
            found: format!("{} row indices", index.len()),
        });
    }

    let mut seen = vec![false; n_rows];
    for &i in index {
        if i >= n_rows || std::mem::replace(&mut seen[i], true) {
            return Err(CsvdError::ShapeMismatch {
                expected: format!("a permutation of 0..{}", n_rows),
                found: format!("row index {}", i),
            });
        }
    }

    let mut order: Vec<usize> = (0..n_rows).collect();
    order.sort_by_key(|&p| index[p]);

    Ok(a.select(Axis(0), &order))
}

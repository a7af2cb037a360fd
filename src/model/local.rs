use ndarray::{Array3, ArrayView2, Axis};
use rayon::prelude::*;

use crate::clustering::cluster_members;
use crate::dimred::{fit_subspace, fit_subspace_padded, Subspace};
use crate::error::{CsvdError, Result};
use crate::svd::SvdMethod;

/// How to fit a local basis for a cluster with fewer members than the requested rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankDeficiency {
    /// Fit as many directions as the cluster supports and zero the rest.
    #[default]
    Pad,
    /// Raise [`CsvdError::Dimension`].
    Strict,
}

/// Fits one rank-`n_components` subspace per cluster on the raw rows of `x` carrying
/// that cluster's label. Subspaces are returned in cluster order `0..n_clusters`.
///
/// Fails with [`CsvdError::EmptyCluster`] if any cluster has no members.
pub fn fit_local_subspaces(
    x: ArrayView2<f64>,
    labels: &[usize],
    n_clusters: usize,
    n_components: usize,
    method: SvdMethod,
    seed: u64,
    rank_deficiency: RankDeficiency,
) -> Result<Vec<Subspace>> {
    if labels.len() != x.nrows() {
        return Err(CsvdError::ShapeMismatch {
            expected: format!("{} labels", x.nrows()),
            found: format!("{} labels", labels.len()),
        });
    }
    if let Some(&label) = labels.iter().find(|&&l| l >= n_clusters) {
        return Err(CsvdError::ShapeMismatch {
            expected: format!("labels in [0, {})", n_clusters),
            found: format!("label {}", label),
        });
    }

    let members = cluster_members(labels, n_clusters);
    if let Some(cluster) = members.iter().position(Vec::is_empty) {
        return Err(CsvdError::EmptyCluster { cluster });
    }

    members
        .par_iter()
        .enumerate()
        .map(|(cluster, rows)| -> Result<Subspace> {
            let clustered = x.select(Axis(0), rows);
            log::debug!("Cluster {}: fitting local basis on {} rows", cluster, rows.len());

            let subspace = match rank_deficiency {
                RankDeficiency::Strict => {
                    fit_subspace(clustered.view(), n_components, method, seed)?
                }
                RankDeficiency::Pad => {
                    fit_subspace_padded(clustered.view(), n_components, method, seed)?
                }
            };

            if subspace.effective_rank() < n_components {
                log::warn!(
                    "Cluster {} has {} members, local basis has rank {} instead of {}",
                    cluster,
                    rows.len(),
                    subspace.effective_rank(),
                    n_components
                );
            }
            Ok(subspace)
        })
        .collect()
}

/// Stacks the component matrices of `subspaces` into a `k x r x N` tensor.
pub fn stack_bases(subspaces: &[Subspace]) -> Result<Array3<f64>> {
    let views: Vec<ArrayView2<f64>> = subspaces.iter().map(|s| s.components().view()).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| CsvdError::ShapeMismatch {
        expected: "local bases of identical shape".to_string(),
        found: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, s};

    fn data() -> ndarray::Array2<f64> {
        array![
            [1.0, 0.0, 0.0],
            [2.0, 0.1, 0.0],
            [0.0, 0.0, 3.0],
            [0.0, 0.2, 4.0],
            [1.5, 0.0, 0.1],
            [0.1, 0.0, 5.0]
        ]
    }

    #[test]
    fn test_fit_local_subspaces() {
        let x = data();
        let labels = [0, 0, 1, 1, 0, 1];
        let subspaces = fit_local_subspaces(
            x.view(),
            &labels,
            2,
            1,
            SvdMethod::Exact,
            42,
            RankDeficiency::Strict,
        )
        .unwrap();

        assert_eq!(subspaces.len(), 2);
        // cluster 0 lies along the first axis, cluster 1 along the third
        assert!(subspaces[0].components()[[0, 0]] > 0.99);
        assert!(subspaces[1].components()[[0, 2]] > 0.99);

        let wlist = stack_bases(&subspaces).unwrap();
        assert_eq!(wlist.shape(), &[2, 1, 3]);
        for (a, b) in wlist
            .slice(s![1, 0, ..])
            .iter()
            .zip(subspaces[1].components().row(0).iter())
        {
            assert_abs_diff_eq!(a, b);
        }
    }

    #[test]
    fn test_empty_cluster() {
        let x = data();
        let labels = [0, 0, 2, 2, 0, 2];
        let err = fit_local_subspaces(
            x.view(),
            &labels,
            3,
            1,
            SvdMethod::default(),
            42,
            RankDeficiency::Pad,
        )
        .unwrap_err();

        assert_eq!(err, CsvdError::EmptyCluster { cluster: 1 });
    }

    #[test]
    fn test_small_cluster_strict_and_padded() {
        let x = data();
        let labels = [0, 0, 0, 0, 0, 1];

        let err = fit_local_subspaces(
            x.view(),
            &labels,
            2,
            2,
            SvdMethod::default(),
            42,
            RankDeficiency::Strict,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CsvdError::Dimension {
                requested: 2,
                rows: 1,
                cols: 3
            }
        );

        let subspaces = fit_local_subspaces(
            x.view(),
            &labels,
            2,
            2,
            SvdMethod::default(),
            42,
            RankDeficiency::Pad,
        )
        .unwrap();
        assert_eq!(subspaces[0].effective_rank(), 2);
        assert_eq!(subspaces[1].effective_rank(), 1);
        assert_eq!(stack_bases(&subspaces).unwrap().shape(), &[2, 2, 3]);
    }

    #[test]
    fn test_label_length_mismatch() {
        let x = data();

        assert!(matches!(
            fit_local_subspaces(
                x.view(),
                &[0, 1],
                2,
                1,
                SvdMethod::default(),
                42,
                RankDeficiency::Pad
            ),
            Err(CsvdError::ShapeMismatch { .. })
        ));
    }
}

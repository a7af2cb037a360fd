//! # Clustered SVD
//!
//! Two-level low-rank model:
//!
//! 1. Fit a global rank-`r` basis `V` on every row.
//! 2. Project each row into it, `rho_i = V x_i`.
//! 3. Cluster the reduced coordinates with k-means.
//! 4. Fit a local rank-`r` basis `W_c` on the raw rows of each cluster.
//! 5. Reconstruct each row as `W_c^T (W_c V^T) rho_i` with the basis of its own cluster,
//!    then restore the original row order.
//!
//! Every stage is a pure function in [`crate::dimred`], [`crate::clustering`] or this module;
//! [`ClusteredSvd`] only holds their results.

use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayViewD, Axis};

use crate::clustering::{cluster_members, KMeans};
use crate::dimred::{fit_subspace, project};
use crate::error::{CsvdError, Result};
use crate::svd::SvdMethod;
use crate::utils::{as_matrix, ensure_finite, ensure_non_empty, rows_to_array};

mod local;
mod reconstruct;

pub use local::{fit_local_subspaces, stack_bases, RankDeficiency};
pub use reconstruct::{cross_projection, reconstruct, reconstruct_cluster, reorder_rows};

/// Fits a clustered SVD model with explicit rank and cluster count and default settings
/// for everything else.
pub fn build(
    data: ArrayView2<f64>,
    n_svd_components: usize,
    num_clusters: usize,
) -> Result<ClusteredSvd> {
    ClusteredSvdBuilder::new()
        .n_svd_components(n_svd_components)
        .num_clusters(num_clusters)
        .fit(data)
}

/// Same as [`build`] for row vectors; ragged rows raise [`CsvdError::ShapeMismatch`].
pub fn build_from_rows(
    rows: &[Vec<f64>],
    n_svd_components: usize,
    num_clusters: usize,
) -> Result<ClusteredSvd> {
    let data = rows_to_array(rows)?;
    build(data.view(), n_svd_components, num_clusters)
}

/// Same as [`build`] for an array of unknown dimensionality, which must be 2-D.
pub fn build_dyn(
    data: ArrayViewD<f64>,
    n_svd_components: usize,
    num_clusters: usize,
) -> Result<ClusteredSvd> {
    let data = as_matrix(data)?;
    build(data, n_svd_components, num_clusters)
}

/// Builder for configuring and fitting a [`ClusteredSvd`].
///
/// Default values:
/// - `n_svd_components`: 2
/// - `num_clusters`: 3
/// - `svd_seed`: 42 (global and local fits)
/// - `kmeans_seed`: 0
/// - `svd_method`: randomized, 10 oversamples, 5 power iterations
/// - `max_iter`: 300, `tol`: 1e-4, `n_init`: 1
/// - `rank_deficiency`: [`RankDeficiency::Pad`]
///
/// # Example Usage
/// ```ignore
/// let model = ClusteredSvdBuilder::new()
///     .n_svd_components(5)
///     .num_clusters(4)
///     .kmeans_seed(7)
///     .fit(data.view())?;
/// ```
#[derive(Debug, Clone)]
pub struct ClusteredSvdBuilder {
    n_svd_components: usize,
    num_clusters: usize,
    svd_seed: u64,
    kmeans_seed: u64,
    svd_method: SvdMethod,
    max_iter: usize,
    tol: f64,
    n_init: usize,
    rank_deficiency: RankDeficiency,
}

impl Default for ClusteredSvdBuilder {
    fn default() -> Self {
        Self {
            n_svd_components: 2,
            num_clusters: 3,
            svd_seed: 42,
            kmeans_seed: 0,
            svd_method: SvdMethod::default(),
            max_iter: 300,
            tol: 1e-4,
            n_init: 1,
            rank_deficiency: RankDeficiency::default(),
        }
    }
}

impl ClusteredSvdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rank `r` of the global and local bases.
    pub fn n_svd_components(mut self, n_svd_components: usize) -> Self {
        self.n_svd_components = n_svd_components;
        self
    }

    pub fn num_clusters(mut self, num_clusters: usize) -> Self {
        self.num_clusters = num_clusters;
        self
    }

    /// Seed for the randomized SVD of the global and every local fit.
    pub fn svd_seed(mut self, seed: u64) -> Self {
        self.svd_seed = seed;
        self
    }

    pub fn kmeans_seed(mut self, seed: u64) -> Self {
        self.kmeans_seed = seed;
        self
    }

    pub fn svd_method(mut self, svd_method: SvdMethod) -> Self {
        self.svd_method = svd_method;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn rank_deficiency(mut self, rank_deficiency: RankDeficiency) -> Self {
        self.rank_deficiency = rank_deficiency;
        self
    }

    fn validate(&self, data: &ArrayView2<f64>) -> Result<()> {
        ensure_non_empty(data)?;
        ensure_finite(data)?;
        let (n_rows, n_cols) = data.dim();

        if self.n_svd_components == 0 || self.n_svd_components > n_rows.min(n_cols) {
            return Err(CsvdError::Dimension {
                requested: self.n_svd_components,
                rows: n_rows,
                cols: n_cols,
            });
        }
        if self.num_clusters == 0 || self.num_clusters > n_rows {
            return Err(CsvdError::Clustering {
                requested: self.num_clusters,
                n_points: n_rows,
            });
        }
        Ok(())
    }

    /// Runs the full pipeline on `data` (`B x N`, rows are instances).
    pub fn fit(self, data: ArrayView2<f64>) -> Result<ClusteredSvd> {
        self.validate(&data)?;
        let (n_rows, n_cols) = data.dim();
        log::info!(
            "Clustered SVD: {} rows x {} features, rank {}, {} clusters",
            n_rows,
            n_cols,
            self.n_svd_components,
            self.num_clusters
        );

        let global = fit_subspace(
            data,
            self.n_svd_components,
            self.svd_method,
            self.svd_seed,
        )?;
        log::info!(
            "Global basis fitted, explained variance ratio {:?}",
            global.explained_variance_ratio().to_vec()
        );

        let rho = project(global.components().view(), data)?;

        let clustering = KMeans::new(self.num_clusters)
            .max_iter(self.max_iter)
            .tol(self.tol)
            .n_init(self.n_init)
            .seed(self.kmeans_seed)
            .fit(rho.index_axis(Axis(2), 0))?;
        log::info!(
            "K-means finished after {} iterations, inertia {:.6}",
            clustering.n_iter(),
            clustering.inertia()
        );
        let (labels, centroids, inertia) = clustering.into_parts();

        let locals = fit_local_subspaces(
            data,
            &labels,
            self.num_clusters,
            self.n_svd_components,
            self.svd_method,
            self.svd_seed,
            self.rank_deficiency,
        )?;
        let local_ranks = locals.iter().map(|s| s.effective_rank()).collect();
        let wlist = stack_bases(&locals)?;
        log::info!("Fitted {} local bases", locals.len());

        let global_explained_variance_ratio = global.explained_variance_ratio().clone();
        let v = global.into_components();
        let rec = reconstruct(v.view(), rho.view(), &labels, wlist.view())?;

        Ok(ClusteredSvd {
            v,
            rho,
            labels: Array1::from(labels),
            wlist,
            rec,
            centroids,
            inertia,
            global_explained_variance_ratio,
            local_ranks,
        })
    }
}

/// A fitted clustered SVD model. All state is computed once in
/// [`ClusteredSvdBuilder::fit`] and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteredSvd {
    v: Array2<f64>,
    rho: Array3<f64>,
    labels: Array1<usize>,
    wlist: Array3<f64>,
    rec: Array2<f64>,
    centroids: Array2<f64>,
    inertia: f64,
    global_explained_variance_ratio: Array1<f64>,
    local_ranks: Vec<usize>,
}

impl ClusteredSvd {
    /// Fits with all defaults (`r = 2`, `k = 3`).
    pub fn fit(data: ArrayView2<f64>) -> Result<Self> {
        ClusteredSvdBuilder::new().fit(data)
    }

    pub fn builder() -> ClusteredSvdBuilder {
        ClusteredSvdBuilder::new()
    }

    /// Global basis, `r x N`.
    pub fn v(&self) -> &Array2<f64> {
        &self.v
    }

    /// Reduced coordinates, `B x r x 1`, in dataset order.
    pub fn rho(&self) -> &Array3<f64> {
        &self.rho
    }

    /// Cluster id in `[0, k)` for every row.
    pub fn labels(&self) -> &Array1<usize> {
        &self.labels
    }

    /// Local bases, `k x r x N`.
    pub fn wlist(&self) -> &Array3<f64> {
        &self.wlist
    }

    /// Reconstruction, `B x N`, in dataset order.
    pub fn rec(&self) -> &Array2<f64> {
        &self.rec
    }

    /// K-means centroids in reduced space, `k x r`.
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn global_explained_variance_ratio(&self) -> &Array1<f64> {
        &self.global_explained_variance_ratio
    }

    /// Rank actually fitted for each local basis; lower than `r` only for clusters with
    /// fewer than `r` members.
    pub fn local_ranks(&self) -> &[usize] {
        &self.local_ranks
    }

    pub fn n_components(&self) -> usize {
        self.v.nrows()
    }

    pub fn n_clusters(&self) -> usize {
        self.wlist.shape()[0]
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        self.cluster_indices_all().iter().map(Vec::len).collect()
    }

    /// Original row indices assigned to `cluster`, ascending.
    pub fn cluster_indices(&self, cluster: usize) -> Vec<usize> {
        self.cluster_indices_all()
            .into_iter()
            .nth(cluster)
            .unwrap_or_default()
    }

    fn cluster_indices_all(&self) -> Vec<Vec<usize>> {
        let labels = self.labels.to_vec();
        cluster_members(&labels, self.n_clusters())
    }

    /// Baseline reconstruction through the global basis only, `V^T V x_i` for every row.
    pub fn global_reconstruction(&self) -> Array2<f64> {
        self.rho.index_axis(Axis(2), 0).dot(&self.v)
    }

    /// Frobenius norm of `data - rec`.
    pub fn reconstruction_error(&self, data: ArrayView2<f64>) -> Result<f64> {
        frobenius_distance(data, self.rec.view())
    }

    /// Frobenius norm of `data - V^T V data`.
    pub fn global_reconstruction_error(&self, data: ArrayView2<f64>) -> Result<f64> {
        frobenius_distance(data, self.global_reconstruction().view())
    }
}

fn frobenius_distance(a: ArrayView2<f64>, b: ArrayView2<f64>) -> Result<f64> {
    if a.dim() != b.dim() {
        return Err(CsvdError::ShapeMismatch {
            expected: format!("{:?} matrix", b.dim()),
            found: format!("{:?} matrix", a.dim()),
        });
    }
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt())
}

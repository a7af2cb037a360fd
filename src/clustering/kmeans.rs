//! K-means clustering.
//!
//! Partitions points into `k` groups by minimising the within-cluster sum of squared
//! distances to each group's centroid.
//!
//! 1. Seed centroids with greedy k-means++: every new centroid is the best of
//!    `2 + ln(k)` candidates sampled proportionally to `D(x)^2`.
//! 2. Lloyd iterations: assign each point to its nearest centroid, move each centroid to
//!    the mean of its points.
//! 3. Stop when the labels no longer change, or when the total squared centroid shift
//!    drops below `tol` scaled by the mean per-feature variance.
//!
//! A centroid that loses all of its points stays where it is, so a cluster may end up
//! empty. With `n_init > 1` the run with the lowest inertia is kept.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::error::{CsvdError, Result};

const PARALLEL_THRESHOLD: usize = 1000;

#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    max_iter: usize,
    tol: f64,
    n_init: usize,
    seed: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            n_init: 1,
            seed: 0,
        }
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Number of independently seeded runs; the lowest-inertia run wins.
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&self, x: ArrayView2<f64>) -> Result<KMeansResult> {
        let n_points = x.nrows();
        if self.n_clusters == 0 || self.n_clusters > n_points {
            return Err(CsvdError::Clustering {
                requested: self.n_clusters,
                n_points,
            });
        }

        let tol = scaled_tolerance(x, self.tol);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<KMeansResult> = None;

        for run in 0..self.n_init {
            let centroids = kmeans_plus_plus(x, self.n_clusters, &mut rng);
            let result = self.lloyd(x, centroids, tol);
            log::debug!(
                "K-means run {}: inertia {:.6} after {} iterations",
                run,
                result.inertia,
                result.n_iter
            );

            if best.as_ref().map_or(true, |b| result.inertia < b.inertia) {
                best = Some(result);
            }
        }

        best.ok_or_else(|| CsvdError::Numerical("k-means produced no run".to_string()))
    }

    fn lloyd(&self, x: ArrayView2<f64>, mut centroids: Array2<f64>, tol: f64) -> KMeansResult {
        let mut labels = assign(x, &centroids);
        let mut n_iter = 0;

        for _ in 0..self.max_iter {
            n_iter += 1;
            let updated = update_centroids(x, &labels, &centroids);
            let shift: f64 = updated
                .axis_iter(Axis(0))
                .zip(centroids.axis_iter(Axis(0)))
                .map(|(a, b)| squared_distance(a, b))
                .sum();
            centroids = updated;

            let new_labels = assign(x, &centroids);
            let stable = new_labels == labels;
            labels = new_labels;

            if stable || shift <= tol {
                break;
            }
        }

        let inertia = inertia(x, &labels, &centroids);
        KMeansResult {
            labels,
            centroids,
            inertia,
            n_iter,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    labels: Vec<usize>,
    centroids: Array2<f64>,
    inertia: f64,
    n_iter: usize,
}

impl KMeansResult {
    /// Cluster id in `[0, k)` for every input point, in input order.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Sum of squared distances of every point to its centroid.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn into_parts(self) -> (Vec<usize>, Array2<f64>, f64) {
        (self.labels, self.centroids, self.inertia)
    }
}

fn scaled_tolerance(x: ArrayView2<f64>, tol: f64) -> f64 {
    if tol == 0.0 || x.ncols() == 0 {
        return 0.0;
    }
    let variances = x.var_axis(Axis(0), 0.0);
    tol * variances.sum() / variances.len() as f64
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best_dist {
            best = c;
            best_dist = dist;
        }
    }
    best
}

fn assign(x: ArrayView2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
    if x.nrows() > PARALLEL_THRESHOLD {
        x.axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| nearest(row, centroids))
            .collect()
    } else {
        x.axis_iter(Axis(0))
            .map(|row| nearest(row, centroids))
            .collect()
    }
}

fn update_centroids(x: ArrayView2<f64>, labels: &[usize], previous: &Array2<f64>) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(previous.raw_dim());
    let mut counts = vec![0usize; previous.nrows()];

    for (row, &label) in x.axis_iter(Axis(0)).zip(labels) {
        let mut acc = sums.row_mut(label);
        acc += &row;
        counts[label] += 1;
    }

    for (c, &count) in counts.iter().enumerate() {
        if count == 0 {
            sums.row_mut(c).assign(&previous.row(c));
        } else {
            sums.row_mut(c).mapv_inplace(|v| v / count as f64);
        }
    }
    sums
}

fn inertia(x: ArrayView2<f64>, labels: &[usize], centroids: &Array2<f64>) -> f64 {
    x.axis_iter(Axis(0))
        .zip(labels)
        .map(|(row, &label)| squared_distance(row, centroids.row(label)))
        .sum()
}

fn kmeans_plus_plus<R: Rng>(x: ArrayView2<f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let n = x.nrows();
    let mut centroids = Array2::zeros((k, x.ncols()));
    let n_local_trials = 2 + (k as f64).ln().floor() as usize;

    let first = rng.random_range(0..n);
    centroids.row_mut(0).assign(&x.row(first));

    let mut closest: Vec<f64> = x
        .axis_iter(Axis(0))
        .map(|row| squared_distance(row, x.row(first)))
        .collect();
    let mut potential: f64 = closest.iter().sum();

    for c in 1..k {
        let mut cumulative = Vec::with_capacity(n);
        let mut running = 0.0;
        for &d in &closest {
            running += d;
            cumulative.push(running);
        }

        let mut best_candidate = 0;
        let mut best_potential = f64::INFINITY;
        let mut best_distances = Vec::new();

        for _ in 0..n_local_trials {
            let target = rng.random::<f64>() * potential;
            let candidate = cumulative
                .partition_point(|&v| v < target)
                .min(n - 1);

            let distances: Vec<f64> = x
                .axis_iter(Axis(0))
                .zip(&closest)
                .map(|(row, &d)| d.min(squared_distance(row, x.row(candidate))))
                .collect();
            let candidate_potential: f64 = distances.iter().sum();

            if candidate_potential < best_potential {
                best_candidate = candidate;
                best_potential = candidate_potential;
                best_distances = distances;
            }
        }

        centroids.row_mut(c).assign(&x.row(best_candidate));
        closest = best_distances;
        potential = best_potential;
    }

    centroids
}

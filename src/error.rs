use thiserror::Error;

/// Errors raised while fitting a clustered SVD model.
///
/// Every variant is fatal for the pipeline: no stage produces a partial result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CsvdError {
    /// Requested rank exceeds what the fitted matrix can support.
    #[error("cannot fit {requested} components on a {rows} x {cols} matrix")]
    Dimension {
        requested: usize,
        rows: usize,
        cols: usize,
    },

    /// Requested cluster count is zero or larger than the number of points.
    #[error("cannot create {requested} clusters from {n_points} points")]
    Clustering { requested: usize, n_points: usize },

    /// A cluster received no members, so no local subspace can be fitted for it.
    #[error("cluster {cluster} has no members")]
    EmptyCluster { cluster: usize },

    /// Input is ragged, not two dimensional, or otherwise has the wrong shape.
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    /// The linear algebra backend failed (e.g. SVD did not converge).
    #[error("numerical failure: {0}")]
    Numerical(String),
}

pub type Result<T> = std::result::Result<T, CsvdError>;

//! Clustering traits.

use crate::error::Result;
use ndarray::Array2;

/// Label given to points excluded from every cluster.
pub const OUTLIER: i32 = -1;

/// Trait for hard clustering algorithms.
pub trait Clustering {
    /// Fit the model to data and return cluster assignments.
    ///
    /// Returns one label per row: a cluster index in `[0, n_clusters)`, or
    /// [`OUTLIER`] for points the algorithm excludes.
    fn fit_predict(&self, data: &Array2<f64>) -> Result<Vec<i32>>;

    /// Get the number of clusters.
    fn n_clusters(&self) -> usize;
}

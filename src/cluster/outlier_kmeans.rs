//! Outlier-aware k-means.
//!
//! Anomalous points drag k-means centroids away from the bulk of the data.
//! This clusterer removes them first and never lets them back in:
//!
//! 1. **Score**: an [`IsolationForest`] scores every row.
//! 2. **Threshold**: the `round(contamination × n)` highest-scoring rows
//!    (ties → lower row index first) become outliers.
//! 3. **Partition**: [`Kmeans`] runs on the inlier rows only.
//! 4. **Label**: inliers get their cluster index, outliers get [`OUTLIER`]
//!    whatever centroid they happen to be closest to.
//!
//! If fewer than two rows, or fewer than `n_clusters` rows, survive step 2
//! the fit fails with [`Error::InsufficientData`] instead of producing a
//! degenerate partition.
//!
//! ```rust
//! use geotemporal::cluster::{OutlierAwareKmeans, OUTLIER};
//! use ndarray::Array2;
//!
//! let mut data = Array2::from_shape_fn((20, 2), |(i, j)| {
//!     let c = if i < 10 { 0.0 } else { 5.0 };
//!     c + ((i + j) % 3) as f64 * 0.1
//! });
//! data[[19, 0]] = 100.0;
//!
//! let fit = OutlierAwareKmeans::new(2)
//!     .with_contamination(0.05)
//!     .with_seed(42)
//!     .fit(&data)
//!     .unwrap();
//!
//! assert_eq!(fit.labels()[19], OUTLIER);
//! assert_eq!(fit.n_outliers(), 1);
//! ```

use super::isolation::IsolationForest;
use super::kmeans::Kmeans;
use super::traits::{Clustering, OUTLIER};
use crate::error::{Error, Result};
use ndarray::{Array2, Axis};
use tracing::{debug, instrument};

/// Default expected anomaly fraction.
pub const DEFAULT_CONTAMINATION: f64 = 0.1;

/// Default seed for every randomized stage.
pub const DEFAULT_SEED: u64 = 42;

/// K-means over the rows an isolation forest does not flag as anomalous.
#[derive(Debug, Clone)]
pub struct OutlierAwareKmeans {
    n_clusters: usize,
    contamination: f64,
    seed: u64,
    n_init: usize,
    max_iter: usize,
    n_estimators: usize,
    max_samples: usize,
}

/// Result of [`OutlierAwareKmeans::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierAwareFit {
    labels: Vec<i32>,
    anomaly_scores: Vec<f64>,
    centroids: Array2<f64>,
    inertia: f64,
    n_outliers: usize,
}

impl OutlierAwareFit {
    /// One label per row: cluster index or [`OUTLIER`].
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Consume the fit, keeping the labels.
    pub fn into_labels(self) -> Vec<i32> {
        self.labels
    }

    /// `true` for rows that took part in clustering.
    pub fn inlier_mask(&self) -> Vec<bool> {
        self.labels.iter().map(|&l| l != OUTLIER).collect()
    }

    /// Isolation score per row; higher is more anomalous.
    pub fn anomaly_scores(&self) -> &[f64] {
        &self.anomaly_scores
    }

    /// Centroids computed from inliers only, one per row.
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Within-cluster sum of squares over inliers.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Number of rows labeled [`OUTLIER`].
    pub fn n_outliers(&self) -> usize {
        self.n_outliers
    }
}

impl OutlierAwareKmeans {
    /// Create a clusterer for `n_clusters` clusters with default settings.
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            contamination: DEFAULT_CONTAMINATION,
            seed: DEFAULT_SEED,
            n_init: 10,
            max_iter: 300,
            n_estimators: 100,
            max_samples: 256,
        }
    }

    /// Set the expected anomaly fraction, in `(0, 1)`.
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    /// Set the seed shared by the forest and k-means.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of k-means restarts.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set the k-means iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the number of isolation trees.
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Set the isolation tree subsample size.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(Error::config("n_clusters", "must be at least 1"));
        }
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            return Err(Error::config(
                "contamination",
                format!("must be in (0, 1), got {}", self.contamination),
            ));
        }
        Ok(())
    }

    /// Score, threshold, partition and label `data`.
    #[instrument(level = "debug", skip_all, fields(rows = data.nrows(), k = self.n_clusters))]
    pub fn fit(&self, data: &Array2<f64>) -> Result<OutlierAwareFit> {
        self.validate()?;
        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }

        let anomaly_scores = IsolationForest::new()
            .with_n_estimators(self.n_estimators)
            .with_max_samples(self.max_samples)
            .with_seed(self.seed)
            .score(data.view())?;

        let is_outlier = threshold(&anomaly_scores, self.contamination);
        let inliers: Vec<usize> = (0..n).filter(|&i| !is_outlier[i]).collect();
        let n_outliers = n - inliers.len();
        debug!(outliers = n_outliers, inliers = inliers.len(), "scored");

        if inliers.len() < 2 || inliers.len() < self.n_clusters {
            return Err(Error::InsufficientData {
                inliers: inliers.len(),
                n_clusters: self.n_clusters,
            });
        }

        let inlier_data = data.select(Axis(0), &inliers);
        let partition = Kmeans::new(self.n_clusters)
            .with_n_init(self.n_init)
            .with_max_iter(self.max_iter)
            .with_seed(self.seed)
            .fit(inlier_data.view())?;
        debug!(
            inertia = partition.inertia,
            n_iter = partition.n_iter,
            "partitioned"
        );

        let mut labels = vec![OUTLIER; n];
        for (&row, &cluster) in inliers.iter().zip(&partition.labels) {
            labels[row] = cluster as i32;
        }

        Ok(OutlierAwareFit {
            labels,
            anomaly_scores,
            centroids: partition.centroids,
            inertia: partition.inertia,
            n_outliers,
        })
    }
}

impl Clustering for OutlierAwareKmeans {
    fn fit_predict(&self, data: &Array2<f64>) -> Result<Vec<i32>> {
        Ok(self.fit(data)?.into_labels())
    }

    fn n_clusters(&self) -> usize {
        self.n_clusters
    }
}

/// Flag the `round(contamination × n)` highest scores.
fn threshold(scores: &[f64], contamination: f64) -> Vec<bool> {
    let n = scores.len();
    let n_outliers = ((contamination * n as f64).round() as usize).min(n);

    let mut order: Vec<usize> = (0..n).collect();
    // Stable: equal scores keep ascending row order.
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut is_outlier = vec![false; n];
    for &i in order.iter().take(n_outliers) {
        is_outlier[i] = true;
    }
    is_outlier
}

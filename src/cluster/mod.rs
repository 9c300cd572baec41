//! Clustering algorithms for spatio-temporal event features.
//!
//! ## Outlier-aware K-means
//!
//! Plain k-means lets every point pull on a centroid, so a handful of
//! far-away events (a mis-geocoded record, a burst at 3 a.m. on the other
//! side of the country) shifts clusters away from where the bulk of the data
//! lives. [`OutlierAwareKmeans`] separates the two concerns:
//!
//! 1. An [`IsolationForest`] scores how easily each point is isolated by
//!    random axis-aligned cuts.
//! 2. The top `contamination` fraction is labeled [`OUTLIER`] (`-1`).
//! 3. [`Kmeans`] partitions the remaining points.
//!
//! Outliers never take part in any centroid computation.
//!
//! ## K-means
//!
//! The classic algorithm: assign each point to the nearest centroid, then
//! update centroids to the mean of their points. Repeat.
//!
//! **Objective**: Minimize within-cluster sum of squares:
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} ||x - μ_k||²
//! ```
//!
//! ## Choosing k
//!
//! When no cluster count is given, [`OptimalKFinder`] sweeps a range of k,
//! records the inertia curve, and picks its elbow, falling back to
//! [`FALLBACK_K`] when the curve has none.
//!
//! ## Reproducibility
//!
//! Every randomized step takes an explicit seed. Restarts and trees get their
//! own RNGs from a seed stream drawn up front, so results are identical with
//! or without the `parallel` feature and for any thread count.
//!
//! ## Usage
//!
//! ```rust
//! use geotemporal::cluster::{Clustering, Kmeans, OutlierAwareKmeans, OUTLIER};
//! use ndarray::array;
//!
//! let data = array![
//!     [0.0, 0.0],
//!     [0.1, 0.1],
//!     [0.0, 0.1],
//!     [10.0, 10.0],
//!     [10.1, 10.1],
//!     [10.0, 10.1],
//!     [90.0, -40.0],
//! ];
//!
//! let labels = OutlierAwareKmeans::new(2)
//!     .with_contamination(0.15)
//!     .with_seed(42)
//!     .fit_predict(&data)
//!     .unwrap();
//! assert_eq!(labels[6], OUTLIER);
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[3]);
//!
//! // Plain k-means assigns every point.
//! let labels = Kmeans::new(2).with_seed(42).fit_predict(&data).unwrap();
//! assert!(labels.iter().all(|&l| l >= 0));
//! ```

mod elbow;
mod isolation;
mod kmeans;
mod outlier_kmeans;
mod traits;

pub use elbow::{find_optimal_k, select_k, KSweep, OptimalKFinder, DEFAULT_K_RANGE, FALLBACK_K};
pub use isolation::IsolationForest;
pub use kmeans::{inertia, Kmeans, KmeansFit};
pub use outlier_kmeans::{
    OutlierAwareFit, OutlierAwareKmeans, DEFAULT_CONTAMINATION, DEFAULT_SEED,
};
pub use traits::{Clustering, OUTLIER};

use rand::prelude::*;

/// `n` sub-seeds drawn from `seed`, one per independent randomized unit.
pub(crate) fn seed_stream(seed: u64, n: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random()).collect()
}

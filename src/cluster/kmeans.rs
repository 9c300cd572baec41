//! K-means clustering.
//!
//! Partitions data into k clusters by minimizing **within-cluster sum of squares**
//! (WCSS), also called inertia.
//!
//! # The Objective
//!
//! ```text
//! WCSS = Σₖ Σᵢ∈Cₖ ||xᵢ - μₖ||²
//! ```
//!
//! # Lloyd's Algorithm
//!
//! 1. Initialize k centroids via k-means++
//! 2. **Assign**: Each point → nearest centroid (ties → lowest centroid index)
//! 3. **Update**: Each centroid → mean of assigned points
//! 4. Repeat until assignments stop changing or `max_iter` is reached
//!
//! Lloyd finds a local minimum only, so the whole procedure is repeated
//! `n_init` times from different seeded initializations and the run with the
//! lowest inertia wins (ties → lowest restart index).
//!
//! ## K-means++ Initialization
//!
//! 1. Choose first centroid uniformly at random
//! 2. Choose next centroid with probability proportional to D(x)²
//!    (squared distance to nearest existing centroid)
//!
//! # Determinism
//!
//! Every restart draws from its own RNG seeded from a stream derived from the
//! configured seed before any work starts. With the `parallel` feature the
//! restarts run concurrently, but the selection is made in restart order, so
//! the result does not depend on the number of worker threads.

use super::seed_stream;
use super::traits::Clustering;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::prelude::*;
use tracing::{trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// K-means clustering algorithm.
#[derive(Debug, Clone)]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum iterations per restart.
    max_iter: usize,
    /// Number of seeded restarts.
    n_init: usize,
    /// Random seed.
    seed: Option<u64>,
}

/// A fitted k-means partition.
#[derive(Debug, Clone, PartialEq)]
pub struct KmeansFit {
    /// Cluster centroids, one per row.
    pub centroids: Array2<f64>,
    /// Cluster index per input row.
    pub labels: Vec<usize>,
    /// Sum of squared distances to assigned centroids.
    pub inertia: f64,
    /// Iterations run by the winning restart.
    pub n_iter: usize,
}

impl Kmeans {
    /// Create a new K-means clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 300,
            n_init: 10,
            seed: None,
        }
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set number of restarts.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fit on `data` and return the lowest-inertia restart.
    pub fn fit(&self, data: ArrayView2<'_, f64>) -> Result<KmeansFit> {
        let n = data.nrows();
        if n == 0 || data.ncols() == 0 {
            return Err(Error::EmptyInput);
        }
        if self.k == 0 || self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }
        if self.n_init == 0 {
            return Err(Error::config("n_init", "must be at least 1"));
        }
        if self.max_iter == 0 {
            return Err(Error::config("max_iter", "must be at least 1"));
        }

        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        let seeds = seed_stream(seed, self.n_init);

        #[cfg(feature = "parallel")]
        let runs: Vec<KmeansFit> = seeds.par_iter().map(|&s| self.lloyd(data, s)).collect();

        #[cfg(not(feature = "parallel"))]
        let runs: Vec<KmeansFit> = seeds.iter().map(|&s| self.lloyd(data, s)).collect();

        let mut best: Option<KmeansFit> = None;
        for run in runs {
            trace!(inertia = run.inertia, n_iter = run.n_iter, "k-means restart");
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        let mut best = best.ok_or(Error::EmptyInput)?;
        compact_empty_clusters(&mut best);
        Ok(best)
    }

    /// One Lloyd run from a k-means++ initialization.
    fn lloyd(&self, data: ArrayView2<'_, f64>, seed: u64) -> KmeansFit {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = self.init_centroids(data, &mut rng);
        let mut labels = assign_labels(data, &centroids);
        let mut n_iter = 0;
        let mut converged = false;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            centroids = self.update_centroids(data, &labels, &mut rng);
            let next = assign_labels(data, &centroids);
            if next == labels {
                converged = true;
                break;
            }
            labels = next;
        }
        if !converged {
            // Centroids still describe the previous assignment.
            centroids = self.update_centroids(data, &labels, &mut rng);
        }

        let inertia = inertia(data, &centroids, &labels);
        KmeansFit {
            centroids,
            labels,
            inertia,
            n_iter,
        }
    }

    /// Initialize centroids using k-means++ algorithm.
    fn init_centroids(&self, data: ArrayView2<'_, f64>, rng: &mut StdRng) -> Array2<f64> {
        let n = data.nrows();
        let d = data.ncols();
        let mut centroids = Array2::zeros((self.k, d));

        // First centroid: random point
        let first = rng.random_range(0..n);
        centroids.row_mut(0).assign(&data.row(first));

        // Squared distance of each point to its nearest chosen centroid.
        let mut distances: Vec<f64> = (0..n)
            .map(|j| squared_distance(&data.row(j), &centroids.row(0)))
            .collect();

        for i in 1..self.k {
            // Sample proportional to squared distance
            let total: f64 = distances.iter().sum();
            let selected = if total <= 0.0 {
                rng.random_range(0..n)
            } else {
                let threshold = rng.random::<f64>() * total;
                let mut cumsum = 0.0;
                let mut selected = n - 1;
                for (j, &dist) in distances.iter().enumerate() {
                    cumsum += dist;
                    if cumsum >= threshold && dist > 0.0 {
                        selected = j;
                        break;
                    }
                }
                selected
            };

            centroids.row_mut(i).assign(&data.row(selected));
            for (j, dist) in distances.iter_mut().enumerate() {
                let d_new = squared_distance(&data.row(j), &centroids.row(i));
                if d_new < *dist {
                    *dist = d_new;
                }
            }
        }

        centroids
    }

    /// Recompute centroids as cluster means.
    fn update_centroids(
        &self,
        data: ArrayView2<'_, f64>,
        labels: &[usize],
        rng: &mut StdRng,
    ) -> Array2<f64> {
        let (n, d) = data.dim();
        let mut centroids = Array2::zeros((self.k, d));
        let mut counts = vec![0usize; self.k];

        for (i, &k) in labels.iter().enumerate() {
            for j in 0..d {
                centroids[[k, j]] += data[[i, j]];
            }
            counts[k] += 1;
        }

        for k in 0..self.k {
            if counts[k] > 0 {
                for j in 0..d {
                    centroids[[k, j]] /= counts[k] as f64;
                }
            } else {
                // Empty cluster: reinitialize randomly
                let idx = rng.random_range(0..n);
                centroids.row_mut(k).assign(&data.row(idx));
            }
        }

        centroids
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &Array2<f64>) -> Result<Vec<i32>> {
        let fit = self.fit(data.view())?;
        Ok(fit.labels.iter().map(|&l| l as i32).collect())
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

/// Compute squared Euclidean distance.
#[inline]
pub(crate) fn squared_distance(a: &ArrayView1<'_, f64>, b: &ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the nearest centroid; ties go to the lowest index.
#[inline]
fn nearest(point: &ArrayView1<'_, f64>, centroids: &Array2<f64>) -> usize {
    let mut best_cluster = 0;
    let mut best_dist = f64::INFINITY;
    for (k, centroid) in centroids.rows().into_iter().enumerate() {
        let dist = squared_distance(point, &centroid);
        if dist < best_dist {
            best_dist = dist;
            best_cluster = k;
        }
    }
    best_cluster
}

/// Assign each row to its nearest centroid.
fn assign_labels(data: ArrayView2<'_, f64>, centroids: &Array2<f64>) -> Vec<usize> {
    let n = data.nrows();
    let mut labels = vec![0usize; n];

    #[cfg(feature = "parallel")]
    labels
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, label)| *label = nearest(&data.row(i), centroids));

    #[cfg(not(feature = "parallel"))]
    for (i, label) in labels.iter_mut().enumerate() {
        *label = nearest(&data.row(i), centroids);
    }

    labels
}

/// Sum of squared distances from each row to its assigned centroid.
pub fn inertia(data: ArrayView2<'_, f64>, centroids: &Array2<f64>, labels: &[usize]) -> f64 {
    labels
        .iter()
        .enumerate()
        .map(|(i, &k)| squared_distance(&data.row(i), &centroids.row(k)))
        .sum()
}

/// Drop centroids that ended with no members and renumber the rest so the
/// labels stay contiguous.
fn compact_empty_clusters(fit: &mut KmeansFit) {
    let k = fit.centroids.nrows();
    let mut counts = vec![0usize; k];
    for &l in &fit.labels {
        counts[l] += 1;
    }
    if counts.iter().all(|&c| c > 0) {
        return;
    }

    let kept: Vec<usize> = (0..k).filter(|&c| counts[c] > 0).collect();
    warn!(
        requested = k,
        non_empty = kept.len(),
        "k-means left empty clusters; relabeling"
    );
    let mut remap = vec![usize::MAX; k];
    for (new, &old) in kept.iter().enumerate() {
        remap[old] = new;
    }
    for l in &mut fit.labels {
        *l = remap[*l];
    }
    fit.centroids = fit.centroids.select(ndarray::Axis(0), &kept);
}

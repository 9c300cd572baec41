//! Isolation forest anomaly scoring.
//!
//! Anomalies are few and different, so random axis-aligned splits separate
//! them from the rest of the data after only a handful of cuts. Each tree is
//! grown on a random subsample by picking a random feature and a random
//! threshold between that feature's current min and max, until every point
//! is alone or the depth limit `ceil(log2(subsample))` is hit.
//!
//! The path length of a point is the depth of the leaf it lands in plus the
//! expected depth of an unbuilt subtree holding the leaf's remaining points:
//!
//! ```text
//! c(m) = 2 H(m-1) - 2 (m-1) / m,   H(i) ≈ ln(i) + γ
//! ```
//!
//! Averaged over the forest and normalized by `c(subsample)`, the score is
//!
//! ```text
//! s(x) = 2^(-E[h(x)] / c(ψ))
//! ```
//!
//! which approaches 1 for clear anomalies and sits well below 0.5 for
//! points deep inside dense regions.
//!
//! # References
//!
//! Liu, Ting, Zhou (2008). "Isolation Forest." ICDM.

use super::seed_stream;
use crate::error::{Error, Result};
use ndarray::{ArrayView1, ArrayView2};
use rand::prelude::*;
use rand::seq::index;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation forest scorer.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    /// Number of trees.
    n_estimators: usize,
    /// Subsample size per tree (clamped to the row count).
    max_samples: usize,
    /// Random seed.
    seed: Option<u64>,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One isolation tree stored as an arena; node 0 is the root.
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl IsolationForest {
    /// Create a forest with 100 trees of up to 256 samples each.
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            seed: None,
        }
    }

    /// Set the number of trees.
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Set the per-tree subsample size.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Grow the forest on `data` and score every row of it.
    ///
    /// Scores lie in `(0, 1]`; higher means more anomalous.
    pub fn score(&self, data: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        let n = data.nrows();
        if n == 0 || data.ncols() == 0 {
            return Err(Error::EmptyInput);
        }
        if self.n_estimators == 0 {
            return Err(Error::config("n_estimators", "must be at least 1"));
        }
        if self.max_samples == 0 {
            return Err(Error::config("max_samples", "must be at least 1"));
        }

        let psi = self.max_samples.min(n);
        let max_depth = (psi as f64).log2().ceil() as usize;
        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        let seeds = seed_stream(seed, self.n_estimators);

        let grow_and_measure = |tree_seed: u64| -> Vec<f64> {
            let mut rng = StdRng::seed_from_u64(tree_seed);
            let tree = IsolationTree::grow(data, psi, max_depth, &mut rng);
            (0..n).map(|i| tree.path_length(&data.row(i))).collect()
        };

        #[cfg(feature = "parallel")]
        let per_tree: Vec<Vec<f64>> = seeds.par_iter().map(|&s| grow_and_measure(s)).collect();

        #[cfg(not(feature = "parallel"))]
        let per_tree: Vec<Vec<f64>> = seeds.iter().map(|&s| grow_and_measure(s)).collect();

        // Summed in tree order so the result is independent of thread count.
        let mut mean_path = vec![0.0; n];
        for paths in &per_tree {
            for (acc, p) in mean_path.iter_mut().zip(paths) {
                *acc += p;
            }
        }
        let n_trees = per_tree.len() as f64;
        let norm = average_path_length(psi).max(1.0);

        Ok(mean_path
            .into_iter()
            .map(|total| 2f64.powf(-(total / n_trees) / norm))
            .collect())
    }
}

impl IsolationTree {
    fn grow(data: ArrayView2<'_, f64>, psi: usize, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut rows = index::sample(rng, data.nrows(), psi).into_vec();
        // Sampling order is irrelevant to the tree; sorting keeps growth stable.
        rows.sort_unstable();
        let mut nodes = Vec::new();
        Self::build(data, &mut rows, 0, max_depth, rng, &mut nodes);
        Self { nodes }
    }

    /// Append the subtree for `rows` to `nodes`, returning its index.
    fn build(
        data: ArrayView2<'_, f64>,
        rows: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
        nodes: &mut Vec<Node>,
    ) -> usize {
        let id = nodes.len();
        nodes.push(Node::Leaf { size: rows.len() });

        if rows.len() <= 1 || depth >= max_depth {
            return id;
        }

        // Only features that still vary within this node can split it.
        let ranges: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|f| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let v = data[[r, f]];
                    (lo.min(v), hi.max(v))
                });
                (lo < hi).then_some((f, lo, hi))
            })
            .collect();
        if ranges.is_empty() {
            return id;
        }

        let (feature, lo, hi) = ranges[rng.random_range(0..ranges.len())];
        let threshold = rng.random_range(lo..hi);

        let mid = partition(rows, |r| data[[r, feature]] <= threshold);
        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = Self::build(data, left_rows, depth + 1, max_depth, rng, nodes);
        let right = Self::build(data, right_rows, depth + 1, max_depth, rng, nodes);

        nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, point: &ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        let mut depth = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if point[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1;
                }
            }
        }
    }
}

/// In-place partition: rows satisfying `pred` first. Returns their count.
fn partition(rows: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut store = 0;
    for i in 0..rows.len() {
        if pred(rows[i]) {
            rows.swap(i, store);
            store += 1;
        }
    }
    store
}

/// Expected path length of an unsuccessful BST search among `m` points.
pub(crate) fn average_path_length(m: usize) -> f64 {
    match m {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let m = m as f64;
            2.0 * ((m - 1.0).ln() + EULER_GAMMA) - 2.0 * (m - 1.0) / m
        }
    }
}

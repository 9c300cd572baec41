//! Automatic cluster-count selection with the elbow method.
//!
//! Fit k-means for every k in a range, record the inertia of each fit, and
//! pick the k where the inertia curve bends: the point furthest below the
//! chord joining the first and last points of the (normalized) curve.
//!
//! ```text
//! inertia
//!   │●
//!   │ ╲●
//!   │  ╲  ●  ← knee: largest gap between chord and curve
//!   │   ╲    ●    ●    ●
//!   └─────────────────────── k
//! ```
//!
//! Restarts are randomized, so the measured curve is not always monotone.
//! Whenever no knee can be found the sweep falls back to [`FALLBACK_K`];
//! the selection itself never fails.

use super::kmeans::Kmeans;
use crate::error::{Error, Result};
use ndarray::Array2;
use std::ops::Range;
use tracing::{debug, info, instrument, warn};

/// Cluster count used when the inertia curve has no knee.
pub const FALLBACK_K: usize = 4;

/// Default candidate range, half-open.
pub const DEFAULT_K_RANGE: Range<usize> = 2..11;

/// Minimum normalized gap below the chord that counts as a knee.
const KNEE_TOLERANCE: f64 = 1e-6;

/// Why no knee was found. Never leaves this module's public API; callers see
/// [`FALLBACK_K`] instead.
#[derive(Debug, thiserror::Error, PartialEq)]
pub(crate) enum KneeDetectionFailure {
    #[error("need at least 3 points, got {0}")]
    TooFewPoints(usize),
    #[error("inertia curve contains non-finite values")]
    NonFinite,
    #[error("inertia curve is flat")]
    Flat,
    #[error("inertia curve is not decreasing")]
    NotDecreasing,
    #[error("no point lies below the chord")]
    NoKnee,
}

/// Inertia per candidate k and the selected k.
#[derive(Debug, Clone, PartialEq)]
pub struct KSweep {
    points: Vec<(usize, f64)>,
    optimal_k: usize,
    knee_found: bool,
}

impl KSweep {
    /// `(k, inertia)` pairs with strictly increasing k.
    pub fn points(&self) -> &[(usize, f64)] {
        &self.points
    }

    /// Inertias in k order.
    pub fn inertias(&self) -> Vec<f64> {
        self.points.iter().map(|&(_, i)| i).collect()
    }

    /// Selected cluster count.
    pub fn optimal_k(&self) -> usize {
        self.optimal_k
    }

    /// `false` if [`FALLBACK_K`] was used.
    pub fn knee_found(&self) -> bool {
        self.knee_found
    }
}

/// Sweeps a range of k and picks the knee of the inertia curve.
#[derive(Debug, Clone)]
pub struct OptimalKFinder {
    k_range: Range<usize>,
    seed: u64,
    n_init: usize,
    max_iter: usize,
}

impl Default for OptimalKFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimalKFinder {
    /// Create a finder over [`DEFAULT_K_RANGE`].
    pub fn new() -> Self {
        Self {
            k_range: DEFAULT_K_RANGE,
            seed: super::outlier_kmeans::DEFAULT_SEED,
            n_init: 10,
            max_iter: 300,
        }
    }

    /// Set the half-open range of candidate k.
    pub fn with_k_range(mut self, k_range: Range<usize>) -> Self {
        self.k_range = k_range;
        self
    }

    /// Set the k-means seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of k-means restarts per candidate.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set the k-means iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Fit every candidate k on `data` and select the knee.
    #[instrument(level = "debug", skip_all, fields(rows = data.nrows(), k_range = ?self.k_range))]
    pub fn find(&self, data: &Array2<f64>) -> Result<KSweep> {
        if data.nrows() == 0 {
            return Err(Error::EmptyInput);
        }
        if self.k_range.start == 0 || self.k_range.is_empty() {
            return Err(Error::config(
                "k_range",
                format!(
                    "must be a non-empty range starting at 1 or more, got {:?}",
                    self.k_range
                ),
            ));
        }

        let mut points = Vec::with_capacity(self.k_range.len());
        for k in self.k_range.clone() {
            if k > data.nrows() {
                warn!(k, rows = data.nrows(), "skipping k larger than row count");
                continue;
            }
            let fit = Kmeans::new(k)
                .with_n_init(self.n_init)
                .with_max_iter(self.max_iter)
                .with_seed(self.seed)
                .fit(data.view())?;
            debug!(k, inertia = fit.inertia, "swept");
            points.push((k, fit.inertia));
        }

        if points.is_empty() {
            return Err(Error::InvalidClusterCount {
                requested: self.k_range.start,
                n_items: data.nrows(),
            });
        }

        let (optimal_k, knee_found) = match detect_knee(&points) {
            Ok(k) => (k, true),
            Err(reason) => {
                info!(%reason, fallback = FALLBACK_K, "no elbow found");
                (FALLBACK_K, false)
            }
        };

        Ok(KSweep {
            points,
            optimal_k,
            knee_found,
        })
    }
}

/// Sweep `k_range` on `data` with the default seed and restarts.
pub fn find_optimal_k(data: &Array2<f64>, k_range: Range<usize>) -> Result<KSweep> {
    OptimalKFinder::new().with_k_range(k_range).find(data)
}

/// Knee of an inertia curve, or [`FALLBACK_K`] if it has none.
pub fn select_k(points: &[(usize, f64)]) -> usize {
    detect_knee(points).unwrap_or(FALLBACK_K)
}

/// Locate the knee of a convex, decreasing curve.
pub(crate) fn detect_knee(points: &[(usize, f64)]) -> std::result::Result<usize, KneeDetectionFailure> {
    if points.len() < 3 {
        return Err(KneeDetectionFailure::TooFewPoints(points.len()));
    }
    if points.iter().any(|&(_, y)| !y.is_finite()) {
        return Err(KneeDetectionFailure::NonFinite);
    }

    let x0 = points[0].0 as f64;
    let x_span = points[points.len() - 1].0 as f64 - x0;
    let (y_min, y_max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    let y_span = y_max - y_min;
    if x_span <= 0.0 || y_span <= f64::EPSILON * y_max.abs().max(1.0) {
        return Err(KneeDetectionFailure::Flat);
    }

    let norm: Vec<(f64, f64)> = points
        .iter()
        .map(|&(k, y)| ((k as f64 - x0) / x_span, (y - y_min) / y_span))
        .collect();
    let first = norm[0].1;
    let last = norm[norm.len() - 1].1;
    if first <= last {
        return Err(KneeDetectionFailure::NotDecreasing);
    }

    // Vertical gap below the chord; proportional to perpendicular distance.
    let mut best: Option<(usize, f64)> = None;
    for (i, &(x, y)) in norm.iter().enumerate() {
        let gap = first + (last - first) * x - y;
        if best.map_or(true, |(_, g)| gap > g) {
            best = Some((i, gap));
        }
    }

    match best {
        Some((i, gap)) if gap > KNEE_TOLERANCE => Ok(points[i].0),
        _ => Err(KneeDetectionFailure::NoKnee),
    }
}

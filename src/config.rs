//! Analysis configuration.
//!
//! Every option has a default, so an empty JSON object is a valid config:
//!
//! ```rust
//! use geotemporal::AnalysisConfig;
//!
//! let config = AnalysisConfig::from_json_str(r#"{ "contamination": 0.05, "k_range": [2, 8] }"#)
//!     .unwrap();
//! assert_eq!(config.contamination, 0.05);
//! assert_eq!(config.k_range.start(), 2);
//! assert_eq!(config.n_clusters, None);
//! ```

use crate::cluster::{DEFAULT_CONTAMINATION, DEFAULT_K_RANGE, DEFAULT_SEED};
use crate::error::{Error, Result};
use crate::prepare::BASE_FEATURES;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Half-open range of candidate cluster counts, serialized as `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct KRange {
    start: usize,
    end: usize,
}

impl KRange {
    /// Create a range `start..end`.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// First candidate.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last candidate.
    pub fn end(&self) -> usize {
        self.end
    }
}

impl Default for KRange {
    fn default() -> Self {
        DEFAULT_K_RANGE.into()
    }
}

impl From<Range<usize>> for KRange {
    fn from(r: Range<usize>) -> Self {
        Self::new(r.start, r.end)
    }
}

impl From<KRange> for Range<usize> {
    fn from(r: KRange) -> Self {
        r.start..r.end
    }
}

impl From<[usize; 2]> for KRange {
    fn from([start, end]: [usize; 2]) -> Self {
        Self::new(start, end)
    }
}

impl From<KRange> for [usize; 2] {
    fn from(r: KRange) -> Self {
        [r.start, r.end]
    }
}

/// Options for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Projection dimensionality; `None` or `Some(0)` disables projection.
    pub n_components: Option<usize>,
    /// Expected anomaly fraction, in `(0, 1)`.
    pub contamination: f64,
    /// Cluster count; derived from the elbow sweep when `None`.
    pub n_clusters: Option<usize>,
    /// Candidate cluster counts for the elbow sweep.
    pub k_range: KRange,
    /// Seed for every randomized stage.
    pub seed: u64,
    /// K-means restarts.
    pub n_init: usize,
    /// K-means iteration cap.
    pub max_iter: usize,
    /// Isolation trees.
    pub n_estimators: usize,
    /// Isolation tree subsample size.
    pub max_samples: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            n_components: None,
            contamination: DEFAULT_CONTAMINATION,
            n_clusters: None,
            k_range: KRange::default(),
            seed: DEFAULT_SEED,
            n_init: 10,
            max_iter: 300,
            n_estimators: 100,
            max_samples: 256,
        }
    }
}

impl AnalysisConfig {
    /// Two projected components and 10% contamination.
    pub fn enhanced() -> Self {
        Self::default().with_n_components(Some(2))
    }

    /// Parse from JSON, filling absent options with defaults, and validate.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the projection dimensionality.
    pub fn with_n_components(mut self, n_components: Option<usize>) -> Self {
        self.n_components = n_components;
        self
    }

    /// Set the anomaly fraction.
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    /// Set an explicit cluster count.
    pub fn with_n_clusters(mut self, n_clusters: Option<usize>) -> Self {
        self.n_clusters = n_clusters;
        self
    }

    /// Set the elbow sweep range.
    pub fn with_k_range(mut self, k_range: impl Into<KRange>) -> Self {
        self.k_range = k_range.into();
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject out-of-range values before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if let Some(c) = self.n_components {
            if c > BASE_FEATURES.len() {
                return Err(Error::config(
                    "n_components",
                    format!("at most {} features are available, got {c}", BASE_FEATURES.len()),
                ));
            }
        }
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            return Err(Error::config(
                "contamination",
                format!("must be in (0, 1), got {}", self.contamination),
            ));
        }
        if self.n_clusters == Some(0) {
            return Err(Error::config("n_clusters", "must be at least 1"));
        }
        if self.k_range.start == 0 || self.k_range.start >= self.k_range.end {
            return Err(Error::config(
                "k_range",
                format!(
                    "must be a non-empty range starting at 1 or more, got [{}, {})",
                    self.k_range.start, self.k_range.end
                ),
            ));
        }
        for (name, value) in [
            ("n_init", self.n_init),
            ("max_iter", self.max_iter),
            ("n_estimators", self.n_estimators),
            ("max_samples", self.max_samples),
        ] {
            if value == 0 {
                return Err(Error::config(name, "must be at least 1"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.n_components, None);
        assert_eq!(config.contamination, 0.1);
        assert_eq!(Range::from(config.k_range), 2..11);
        assert_eq!(config.seed, 42);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(
            AnalysisConfig::from_json_str("{}").unwrap(),
            AnalysisConfig::default()
        );
    }

    #[test]
    fn test_json_round_trip_keeps_k_range_shape() {
        let config = AnalysisConfig::enhanced().with_k_range(3..7);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"k_range\":[3,7]"));
        assert_eq!(AnalysisConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            AnalysisConfig::from_json_str(r#"{ "contamnation": 0.2 }"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            (AnalysisConfig::default().with_contamination(0.0), "contamination"),
            (AnalysisConfig::default().with_contamination(1.0), "contamination"),
            (AnalysisConfig::default().with_n_clusters(Some(0)), "n_clusters"),
            (AnalysisConfig::default().with_k_range(5..5), "k_range"),
            (AnalysisConfig::default().with_k_range(0..5), "k_range"),
            (AnalysisConfig::default().with_n_components(Some(5)), "n_components"),
        ];
        for (config, expected) in cases {
            match config.validate() {
                Err(Error::InvalidConfiguration { name, .. }) => assert_eq!(name, expected),
                other => panic!("expected {expected} error, got {other:?}"),
            }
        }
    }
}

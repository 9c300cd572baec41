//! Caller-owned analysis session.
//!
//! An [`AnalysisSession`] holds one dataset and walks it through the
//! pipeline. There is no process-wide state: two sessions never share
//! anything, and dropping a session discards everything it computed.
//!
//! ```text
//!            prepare()              analyze()
//!  Loaded ─────────────▶ Prepared ─────────────▶ Analyzed
//!    ▲                    ▲   │  ◀── reconfigure() ──┘ │
//!    │                    └───┘ InsufficientData       │
//!    └──────────────────── reset() ────────────────────┘
//! ```
//!
//! * `prepare` scales the base features and, if no cluster count is
//!   configured, sweeps k to pick one.
//! * `analyze` prepares the features again with the configured projection,
//!   runs outlier-aware k-means and attaches the labels. A failure leaves the
//!   session where it was, so the caller can change parameters and retry.
//!
//! ```rust
//! use chrono::{Duration, NaiveDate};
//! use geotemporal::{AnalysisConfig, AnalysisSession, Record, RecordSet};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let records: RecordSet = (0..60)
//!     .map(|i| {
//!         let (lat, lon) = if i % 2 == 0 { (14.6, 121.0) } else { (10.3, 123.9) };
//!         Record::new(
//!             lat + (i % 5) as f64 * 0.01,
//!             lon,
//!             start + Duration::hours(i * 5),
//!             "wire",
//!             "fake",
//!         )
//!     })
//!     .collect();
//!
//! let mut session = AnalysisSession::new(records, AnalysisConfig::enhanced()).unwrap();
//! session.prepare().unwrap();
//! let results = session.analyze().unwrap();
//! assert_eq!(results.labeled.len(), 60);
//! assert_eq!(results.labeled.n_outliers(), 6);
//! ```

use crate::assemble::{assemble, LabeledRecordSet};
use crate::cluster::{KSweep, OptimalKFinder, OutlierAwareKmeans};
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::prepare::{FeaturePreparer, ProjectionBasis};
use crate::record::RecordSet;
use crate::summary::{summarize, ClusteringSummary};
use ndarray::Array2;
use tracing::{info, instrument, warn};

/// Where a session is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// Records loaded, nothing computed.
    Loaded,
    /// Cluster count known; ready to analyze.
    Prepared,
    /// Labels attached.
    Analyzed,
}

impl SessionStage {
    fn name(self) -> &'static str {
        match self {
            SessionStage::Loaded => "Loaded",
            SessionStage::Prepared => "Prepared",
            SessionStage::Analyzed => "Analyzed",
        }
    }
}

/// Output of [`AnalysisSession::analyze`].
#[derive(Debug, Clone)]
pub struct AnalysisResults {
    /// Records with `hour`, `day_of_week`, projected and `cluster` columns.
    pub labeled: LabeledRecordSet,
    /// The matrix that was clustered.
    pub processed: Array2<f64>,
    /// Cluster count used.
    pub n_clusters: usize,
    /// Projection used, if any.
    pub projection: Option<ProjectionBasis>,
    /// Isolation score per row.
    pub anomaly_scores: Vec<f64>,
    /// Inlier centroids in the processed feature space.
    pub centroids: Array2<f64>,
}

impl AnalysisResults {
    /// `true` for rows that belong to a cluster.
    pub fn inlier_mask(&self) -> Vec<bool> {
        self.labeled.inlier_mask()
    }

    /// Per-cluster profiles.
    pub fn summary(&self, top_sources: usize) -> ClusteringSummary {
        summarize(&self.labeled, top_sources)
    }
}

/// One dataset and everything computed from it.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    config: AnalysisConfig,
    records: RecordSet,
    stage: SessionStage,
    sweep: Option<KSweep>,
    n_clusters: Option<usize>,
    results: Option<AnalysisResults>,
}

impl AnalysisSession {
    /// Start a session. The config is validated before anything else.
    pub fn new(records: RecordSet, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        if records.is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(Self {
            config,
            records,
            stage: SessionStage::Loaded,
            sweep: None,
            n_clusters: None,
            results: None,
        })
    }

    /// Current stage.
    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    /// Active configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The session's records.
    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Elbow sweep from [`prepare`](Self::prepare), if one was run.
    pub fn sweep(&self) -> Option<&KSweep> {
        self.sweep.as_ref()
    }

    /// Cluster count chosen by [`prepare`](Self::prepare).
    pub fn n_clusters(&self) -> Option<usize> {
        self.n_clusters
    }

    /// Results of the last successful [`analyze`](Self::analyze).
    pub fn results(&self) -> Option<&AnalysisResults> {
        self.results.as_ref()
    }

    fn require(&self, allowed: &[SessionStage], expected: &'static str) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected,
                actual: self.stage.name(),
            })
        }
    }

    /// Keep only records whose label contains `text` (case-insensitive).
    /// Only allowed before [`prepare`](Self::prepare). Returns the rows kept.
    pub fn filter_by_label(&mut self, text: &str) -> Result<usize> {
        self.require(&[SessionStage::Loaded], "Loaded")?;
        self.records = self.records.filter_label_contains(text)?;
        Ok(self.records.len())
    }

    /// Determine the cluster count: the configured one, or the elbow of a k
    /// sweep over the scaled, unprojected features.
    #[instrument(level = "info", skip_all, fields(rows = self.records.len()))]
    pub fn prepare(&mut self) -> Result<usize> {
        self.require(&[SessionStage::Loaded], "Loaded")?;

        // Surfaces missing features before any clustering work.
        let prepared = FeaturePreparer::new()
            .with_seed(self.config.seed)
            .prepare(&self.records)?;

        let (k, sweep) = match self.config.n_clusters {
            Some(k) => (k, None),
            None => {
                let sweep = OptimalKFinder::new()
                    .with_k_range(self.config.k_range.into())
                    .with_seed(self.config.seed)
                    .with_n_init(self.config.n_init)
                    .with_max_iter(self.config.max_iter)
                    .find(&prepared.scaled)?;
                (sweep.optimal_k(), Some(sweep))
            }
        };
        info!(n_clusters = k, from_sweep = sweep.is_some(), "prepared");

        self.n_clusters = Some(k);
        self.sweep = sweep;
        self.stage = SessionStage::Prepared;
        Ok(k)
    }

    /// Run the outlier-aware clustering and attach labels.
    #[instrument(level = "info", skip_all, fields(rows = self.records.len(), k = ?self.n_clusters))]
    pub fn analyze(&mut self) -> Result<&AnalysisResults> {
        self.require(&[SessionStage::Prepared, SessionStage::Analyzed], "Prepared")?;
        let k = self.n_clusters.ok_or(Error::InvalidState {
            expected: "Prepared",
            actual: self.stage.name(),
        })?;

        let results = match self.run(k) {
            Ok(results) => results,
            Err(err) => {
                if err.is_recoverable() {
                    warn!(%err, "analysis failed; adjust parameters and re-run");
                }
                return Err(err);
            }
        };
        info!(
            outliers = results.labeled.n_outliers(),
            clusters = results.labeled.n_clusters(),
            "analyzed"
        );

        self.stage = SessionStage::Analyzed;
        Ok(self.results.insert(results))
    }

    fn run(&self, k: usize) -> Result<AnalysisResults> {
        let prepared = FeaturePreparer::new()
            .with_n_components(self.config.n_components)
            .with_seed(self.config.seed)
            .prepare(&self.records)?;

        let fit = OutlierAwareKmeans::new(k)
            .with_contamination(self.config.contamination)
            .with_seed(self.config.seed)
            .with_n_init(self.config.n_init)
            .with_max_iter(self.config.max_iter)
            .with_n_estimators(self.config.n_estimators)
            .with_max_samples(self.config.max_samples)
            .fit(&prepared.processed)?;

        let labeled = assemble(&prepared.records, fit.labels())?;
        Ok(AnalysisResults {
            labeled,
            processed: prepared.processed,
            n_clusters: k,
            projection: prepared.projection,
            anomaly_scores: fit.anomaly_scores().to_vec(),
            centroids: fit.centroids().clone(),
        })
    }

    /// Replace the configuration after validating it.
    ///
    /// Results are dropped. An explicit `n_clusters` takes effect
    /// immediately; otherwise a prepared session keeps its swept k unless the
    /// sweep inputs changed, in which case it returns to `Loaded`.
    pub fn reconfigure(&mut self, config: AnalysisConfig) -> Result<()> {
        config.validate()?;
        let sweep_changed = config.k_range != self.config.k_range
            || config.seed != self.config.seed
            || config.n_init != self.config.n_init
            || config.max_iter != self.config.max_iter;

        self.results = None;
        if self.stage != SessionStage::Loaded {
            match config.n_clusters {
                Some(k) => {
                    self.n_clusters = Some(k);
                    self.stage = SessionStage::Prepared;
                }
                None if self.sweep.is_some() && !sweep_changed => {
                    self.n_clusters = self.sweep.as_ref().map(KSweep::optimal_k);
                    self.stage = SessionStage::Prepared;
                }
                None => {
                    self.n_clusters = None;
                    self.sweep = None;
                    self.stage = SessionStage::Loaded;
                }
            }
        }
        self.config = config;
        Ok(())
    }

    /// Discard everything computed and return to `Loaded`.
    pub fn reset(&mut self) {
        self.stage = SessionStage::Loaded;
        self.sweep = None;
        self.n_clusters = None;
        self.results = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::Record;
    use chrono::{Duration, NaiveDate};

    fn records(n: usize) -> RecordSet {
        let start = NaiveDate::from_ymd_opt(2024, 2, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                let hub = [(14.6, 121.0), (10.3, 123.9), (7.1, 125.6)][i % 3];
                Record::new(
                    hub.0 + (i % 4) as f64 * 0.02,
                    hub.1 - (i % 5) as f64 * 0.02,
                    start + Duration::minutes(i as i64 * 97),
                    format!("src{}", i % 4),
                    if i % 2 == 0 { "Fake" } else { "Credible" },
                )
            })
            .collect()
    }

    #[test]
    fn test_stage_order_enforced() {
        let mut session = AnalysisSession::new(records(30), AnalysisConfig::default()).unwrap();
        assert!(matches!(
            session.analyze(),
            Err(Error::InvalidState {
                expected: "Prepared",
                actual: "Loaded"
            })
        ));
        session.prepare().unwrap();
        assert!(matches!(
            session.prepare(),
            Err(Error::InvalidState { .. })
        ));
        assert!(session.filter_by_label("fake").is_err());
    }

    #[test]
    fn test_prepare_with_explicit_k_skips_sweep() {
        let config = AnalysisConfig::default().with_n_clusters(Some(3));
        let mut session = AnalysisSession::new(records(30), config).unwrap();
        assert_eq!(session.prepare().unwrap(), 3);
        assert!(session.sweep().is_none());
    }

    #[test]
    fn test_prepare_sweeps_when_k_absent() {
        let mut session = AnalysisSession::new(records(45), AnalysisConfig::default()).unwrap();
        let k = session.prepare().unwrap();
        let sweep = session.sweep().unwrap();
        assert_eq!(sweep.optimal_k(), k);
        assert_eq!(sweep.points().len(), 9);
    }

    #[test]
    fn test_full_run_and_reset() {
        let config = AnalysisConfig::enhanced().with_n_clusters(Some(3));
        let mut session = AnalysisSession::new(records(60), config).unwrap();
        session.prepare().unwrap();
        let results = session.analyze().unwrap();

        assert_eq!(results.labeled.len(), 60);
        assert_eq!(results.labeled.n_outliers(), 6);
        assert_eq!(results.processed.ncols(), 2);
        assert!(results.projection.is_some());
        assert!(results
            .labeled
            .records()
            .column("principal_component_2")
            .is_some());
        assert_eq!(session.stage(), SessionStage::Analyzed);

        session.reset();
        assert_eq!(session.stage(), SessionStage::Loaded);
        assert!(session.results().is_none());
    }

    #[test]
    fn test_insufficient_data_keeps_prepared_state() {
        let config = AnalysisConfig::default()
            .with_n_clusters(Some(3))
            .with_contamination(0.5);
        let mut session = AnalysisSession::new(records(5), config).unwrap();
        session.prepare().unwrap();

        let err = session.analyze().unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
        assert!(err.is_recoverable());
        assert_eq!(session.stage(), SessionStage::Prepared);

        // Fewer clusters and a lower anomaly rate succeed on the same data.
        let retry = session
            .config()
            .clone()
            .with_n_clusters(Some(2))
            .with_contamination(0.2);
        session.reconfigure(retry).unwrap();
        let results = session.analyze().unwrap();
        assert_eq!(results.labeled.n_outliers(), 1);
    }

    #[test]
    fn test_filter_then_analyze() {
        let mut session = AnalysisSession::new(
            records(40),
            AnalysisConfig::default().with_n_clusters(Some(2)),
        )
        .unwrap();
        assert_eq!(session.filter_by_label("fake").unwrap(), 20);
        session.prepare().unwrap();
        assert_eq!(session.analyze().unwrap().labeled.len(), 20);
    }

    #[test]
    fn test_prepare_reports_missing_feature() {
        let mut rows = records(6).records().to_vec();
        rows[4].timestamp = None;
        let config = AnalysisConfig::default().with_n_clusters(Some(2));
        let mut session = AnalysisSession::new(rows.into(), config).unwrap();
        assert!(matches!(
            session.prepare(),
            Err(Error::MissingFeature {
                row: 4,
                field: "timestamp"
            })
        ));
        assert_eq!(session.stage(), SessionStage::Loaded);
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let config = AnalysisConfig::default().with_contamination(1.2);
        assert!(matches!(
            AnalysisSession::new(records(10), config),
            Err(Error::InvalidConfiguration { .. })
        ));
    }
}

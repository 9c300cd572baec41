//! # geotemporal
//!
//! Outlier-aware clustering of geotagged, timestamped events.
//!
//! Records carry a position, a timestamp, a source and a label. The pipeline
//! turns them into clusters of related activity while keeping anomalous
//! events out of every centroid:
//!
//! 1. [`prepare`] derives hour-of-day and day-of-week, standardizes
//!    `[latitude, longitude, hour, day_of_week]`, and optionally projects the
//!    result onto its leading principal components.
//! 2. [`cluster::OptimalKFinder`] picks a cluster count from the elbow of the
//!    inertia curve when none is given.
//! 3. [`cluster::OutlierAwareKmeans`] flags the most isolated fraction of
//!    events as outliers ([`OUTLIER`]) and runs k-means on the rest.
//! 4. [`assemble()`] attaches the labels as a `cluster` column.
//!
//! [`AnalysisSession`] drives the whole sequence for one dataset, and
//! [`summary`] reduces a labeled set to per-cluster profiles.
//!
//! All randomized steps are seeded. The `parallel` feature (on by default)
//! spreads k-means restarts and isolation trees across threads without
//! changing any result.

pub mod assemble;
pub mod cluster;
pub mod config;
/// Error types used across `geotemporal`.
pub mod error;
pub mod prepare;
pub mod record;
pub mod session;
pub mod summary;


pub use assemble::{assemble, LabeledRecordSet, CLUSTER_COLUMN};
pub use cluster::{
    find_optimal_k, Clustering, IsolationForest, KSweep, Kmeans, OptimalKFinder,
    OutlierAwareFit, OutlierAwareKmeans, OUTLIER,
};
pub use config::{AnalysisConfig, KRange};
pub use error::{Error, Result};
pub use prepare::{prepare, FeaturePreparer, PreparedFeatures, ProjectionBasis, ScalingParameters};
pub use record::{Column, Record, RecordSet};
pub use session::{AnalysisResults, AnalysisSession, SessionStage};
pub use summary::{
    daily_counts, source_credibility, summarize, ActivityHistogram, ClusterProfile,
    ClusteringSummary, Credibility, SourceCredibility,
};

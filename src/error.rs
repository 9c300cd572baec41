use thiserror::Error;

/// Result alias for `geotemporal`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by feature preparation, clustering and session stages.
#[derive(Debug, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Matrix or label dimension mismatch.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid number of clusters requested.
    #[error("cannot create {requested} clusters from {n_items} items")]
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// A record lacks one of the fields the feature set is built from.
    #[error("record {row} is missing required feature '{field}'")]
    MissingFeature {
        /// Row index of the offending record.
        row: usize,
        /// Name of the absent field.
        field: &'static str,
    },

    /// A configuration value is outside its valid range.
    #[error("invalid configuration '{name}': {message}")]
    InvalidConfiguration {
        /// Option name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// Too few inliers survived anomaly filtering to form the requested clusters.
    #[error(
        "only {inliers} inliers remained after outlier removal, \
         not enough to form {n_clusters} clusters"
    )]
    InsufficientData {
        /// Inlier count after thresholding.
        inliers: usize,
        /// Requested cluster count.
        n_clusters: usize,
    },

    /// A session stage was invoked out of order.
    #[error("session is in state {actual}, expected {expected}")]
    InvalidState {
        /// State the operation requires.
        expected: &'static str,
        /// State the session was in.
        actual: &'static str,
    },

    /// Array construction failed.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    /// Configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidConfiguration`].
    pub(crate) fn config(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            name,
            message: message.into(),
        }
    }

    /// Whether re-running with different parameters can succeed.
    ///
    /// The core is deterministic: retrying with identical input and seed
    /// fails the same way.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InsufficientData { .. })
    }
}

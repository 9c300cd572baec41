//! Feature preparation.
//!
//! Turns a [`RecordSet`] into the matrix the clustering stages consume:
//!
//! 1. Derive `hour` (0–23) and `day_of_week` (0–6, Monday = 0) from each
//!    timestamp.
//! 2. Build the base matrix `[latitude, longitude, hour, day_of_week]`, one
//!    row per record, in record order.
//! 3. Standardize every column to zero mean and unit variance.
//! 4. Optionally project onto the `n_components` directions of largest
//!    variance and append them as `principal_component_i` columns.
//!
//! The caller's records are never modified; the augmented copy is returned
//! in [`PreparedFeatures::records`].

mod pca;
mod scaler;
mod temporal;

pub use pca::ProjectionBasis;
pub use scaler::ScalingParameters;
pub use temporal::{day_of_week, hour_of_day};

use crate::error::{Error, Result};
use crate::record::{Column, RecordSet};
use ndarray::Array2;
use tracing::{debug, instrument};

/// Base feature names, in column order.
pub const BASE_FEATURES: [&str; 4] = ["latitude", "longitude", "hour", "day_of_week"];

/// Name of the derived hour-of-day column.
pub const HOUR_COLUMN: &str = "hour";
/// Name of the derived day-of-week column.
pub const DAY_OF_WEEK_COLUMN: &str = "day_of_week";

/// Seed used for the projection when none is given.
pub const DEFAULT_PROJECTION_SEED: u64 = 42;

/// Name of the `i`-th projected column (0-based `i`).
pub fn component_column(i: usize) -> String {
    format!("principal_component_{}", i + 1)
}

/// Output of [`FeaturePreparer::prepare`].
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    /// Standardized base matrix, `n × 4`.
    pub scaled: Array2<f64>,
    /// Matrix for clustering: projected if a projection was requested,
    /// otherwise equal to `scaled`.
    pub processed: Array2<f64>,
    /// Scaling fitted on the base matrix.
    pub scaling: ScalingParameters,
    /// Projection fitted on `scaled`, if requested.
    pub projection: Option<ProjectionBasis>,
    /// Copy of the input with `hour`, `day_of_week` and any projected columns.
    pub records: RecordSet,
}

/// Derives, standardizes and optionally projects the feature matrix.
#[derive(Debug, Clone)]
pub struct FeaturePreparer {
    n_components: Option<usize>,
    seed: u64,
}

impl Default for FeaturePreparer {
    fn default() -> Self {
        Self::new()
    }
}

impl FeaturePreparer {
    /// Create a preparer with projection disabled.
    pub fn new() -> Self {
        Self {
            n_components: None,
            seed: DEFAULT_PROJECTION_SEED,
        }
    }

    /// Set the number of projected components. `None` or `Some(0)` disables
    /// projection.
    pub fn with_n_components(mut self, n_components: Option<usize>) -> Self {
        self.n_components = n_components;
        self
    }

    /// Set the projection seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run feature preparation.
    #[instrument(level = "debug", skip_all, fields(rows = records.len(), n_components = ?self.n_components))]
    pub fn prepare(&self, records: &RecordSet) -> Result<PreparedFeatures> {
        let (base, hours, days) = base_features(records)?;

        let mut augmented = records.clone();
        augmented.set_column(HOUR_COLUMN, Column::Int(hours))?;
        augmented.set_column(DAY_OF_WEEK_COLUMN, Column::Int(days))?;

        let (scaling, scaled) = ScalingParameters::fit_transform(&base)?;
        debug!(mean = ?scaling.mean(), std = ?scaling.std(), "fitted scaling");

        let (processed, projection) = match self.n_components {
            Some(c) if c > 0 => {
                let basis = ProjectionBasis::fit(&scaled, c, self.seed)?;
                let projected = basis.transform(&scaled)?;
                for (i, col) in projected.columns().into_iter().enumerate() {
                    augmented.set_column(component_column(i), Column::Float(col.to_vec()))?;
                }
                debug!(
                    explained_variance_ratio = ?basis.explained_variance_ratio(),
                    "fitted projection"
                );
                (projected, Some(basis))
            }
            _ => (scaled.clone(), None),
        };

        Ok(PreparedFeatures {
            scaled,
            processed,
            scaling,
            projection,
            records: augmented,
        })
    }
}

/// Prepare `records`, projecting onto `n_components` directions if given.
pub fn prepare(records: &RecordSet, n_components: Option<usize>) -> Result<PreparedFeatures> {
    FeaturePreparer::new()
        .with_n_components(n_components)
        .prepare(records)
}

/// Unscaled base matrix plus the derived hour and weekday values.
fn base_features(records: &RecordSet) -> Result<(Array2<f64>, Vec<i64>, Vec<i64>)> {
    if records.is_empty() {
        return Err(Error::EmptyInput);
    }

    let n = records.len();
    let mut flat = Vec::with_capacity(n * BASE_FEATURES.len());
    let mut hours = Vec::with_capacity(n);
    let mut days = Vec::with_capacity(n);

    for (row, record) in records.records().iter().enumerate() {
        let missing = |field| Error::MissingFeature { row, field };
        let lat = record.latitude.ok_or_else(|| missing("latitude"))?;
        let lon = record.longitude.ok_or_else(|| missing("longitude"))?;
        let ts = record.timestamp.as_ref().ok_or_else(|| missing("timestamp"))?;

        let hour = hour_of_day(ts);
        let day = day_of_week(ts);
        flat.extend_from_slice(&[lat, lon, f64::from(hour), f64::from(day)]);
        hours.push(i64::from(hour));
        days.push(i64::from(day));
    }

    let base = Array2::from_shape_vec((n, BASE_FEATURES.len()), flat)?;
    Ok((base, hours, days))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::Record;
    use chrono::{Duration, NaiveDate};

    fn records(n: usize) -> RecordSet {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                Record::new(
                    14.0 + (i % 7) as f64 * 0.3,
                    121.0 - (i % 5) as f64 * 0.2,
                    start + Duration::hours(i as i64 * 13),
                    format!("src{}", i % 3),
                    "fake",
                )
            })
            .collect()
    }

    #[test]
    fn test_prepare_without_projection() {
        let input = records(30);
        let prepared = prepare(&input, None).unwrap();

        assert_eq!(prepared.scaled.dim(), (30, 4));
        assert_eq!(prepared.processed, prepared.scaled);
        assert!(prepared.projection.is_none());

        let names: Vec<_> = prepared.records.column_names().collect();
        assert_eq!(names, vec!["hour", "day_of_week"]);
        // Input untouched.
        assert_eq!(input.column_names().count(), 0);
    }

    #[test]
    fn test_prepare_zero_components_disables_projection() {
        let prepared = prepare(&records(10), Some(0)).unwrap();
        assert!(prepared.projection.is_none());
        assert_eq!(prepared.processed.ncols(), 4);
    }

    #[test]
    fn test_prepare_with_projection_adds_columns() {
        let prepared = prepare(&records(30), Some(2)).unwrap();

        assert_eq!(prepared.processed.dim(), (30, 2));
        let pc1 = prepared
            .records
            .column("principal_component_1")
            .unwrap()
            .as_float()
            .unwrap();
        assert_eq!(pc1.len(), 30);
        assert_eq!(pc1[5], prepared.processed[[5, 0]]);
        assert!(prepared.records.column("principal_component_2").is_some());
        assert!(prepared.records.column("principal_component_3").is_none());
    }

    #[test]
    fn test_temporal_columns_follow_timestamps() {
        let prepared = prepare(&records(3), None).unwrap();
        let hours = prepared.records.column("hour").unwrap().as_int().unwrap();
        let days = prepared
            .records
            .column("day_of_week")
            .unwrap()
            .as_int()
            .unwrap();
        // 2024-01-01 00:00 (Mon), +13h (Mon 13:00), +26h (Tue 02:00).
        assert_eq!(hours, &[0, 13, 2]);
        assert_eq!(days, &[0, 0, 1]);
    }

    #[test]
    fn test_missing_timestamp() {
        let mut input: Vec<Record> = records(4).records().to_vec();
        input[2].timestamp = None;
        let err = prepare(&input.into(), None).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingFeature {
                row: 2,
                field: "timestamp"
            }
        ));
    }

    #[test]
    fn test_missing_longitude() {
        let mut input: Vec<Record> = records(4).records().to_vec();
        input[0].longitude = None;
        assert!(matches!(
            prepare(&input.into(), Some(2)),
            Err(Error::MissingFeature {
                row: 0,
                field: "longitude"
            })
        ));
    }

    #[test]
    fn test_empty_records() {
        assert!(matches!(
            prepare(&RecordSet::default(), None),
            Err(Error::EmptyInput)
        ));
    }
}

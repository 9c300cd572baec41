//! Merging cluster labels back onto records.

use crate::cluster::OUTLIER;
use crate::error::{Error, Result};
use crate::record::{Column, RecordSet};

/// Name of the label column.
pub const CLUSTER_COLUMN: &str = "cluster";

/// A record set carrying a `cluster` column.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecordSet {
    records: RecordSet,
    labels: Vec<i32>,
}

impl LabeledRecordSet {
    /// The augmented records, including the `cluster` column.
    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Consume into the augmented records.
    pub fn into_records(self) -> RecordSet {
        self.records
    }

    /// One label per row; [`OUTLIER`] marks anomalies.
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// `true` for rows that belong to a cluster.
    pub fn inlier_mask(&self) -> Vec<bool> {
        self.labels.iter().map(|&l| l != OUTLIER).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of rows labeled [`OUTLIER`].
    pub fn n_outliers(&self) -> usize {
        self.labels.iter().filter(|&&l| l == OUTLIER).count()
    }

    /// Number of distinct clusters among inliers.
    pub fn n_clusters(&self) -> usize {
        self.labels
            .iter()
            .copied()
            .filter(|&l| l != OUTLIER)
            .max()
            .map_or(0, |m| m as usize + 1)
    }
}

/// Attach `labels` to `augmented` as the `cluster` column.
///
/// An existing `cluster` column is replaced, so assembling the same labels
/// twice gives the same result as assembling them once.
pub fn assemble(augmented: &RecordSet, labels: &[i32]) -> Result<LabeledRecordSet> {
    if labels.len() != augmented.len() {
        return Err(Error::DimensionMismatch {
            expected: augmented.len(),
            found: labels.len(),
        });
    }

    let mut records = augmented.clone();
    records.set_column(
        CLUSTER_COLUMN,
        Column::Int(labels.iter().map(|&l| i64::from(l)).collect()),
    )?;

    Ok(LabeledRecordSet {
        records,
        labels: labels.to_vec(),
    })
}

//! Event records and the column-augmented record set.
//!
//! A [`RecordSet`] owns the caller's [`Record`]s plus any number of named
//! derived columns (`hour`, `day_of_week`, `principal_component_i`,
//! `cluster`). Derived columns are always exactly as long as the record list,
//! and row `i` of every column belongs to record `i`.

use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One geocoded, timestamped event.
///
/// Coordinates and timestamp are optional because upstream geocoding or date
/// parsing can fail; feature preparation rejects records where any is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Event time.
    pub timestamp: Option<NaiveDateTime>,
    /// Free-text source identifier.
    pub source: String,
    /// Free-text label.
    pub label: String,
}

impl Record {
    /// Create a record with all features present.
    pub fn new(
        latitude: f64,
        longitude: f64,
        timestamp: NaiveDateTime,
        source: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            timestamp: Some(timestamp),
            source: source.into(),
            label: label.into(),
        }
    }
}

/// A derived column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum Column {
    /// Integer values (`hour`, `day_of_week`, `cluster`).
    Int(Vec<i64>),
    /// Floating-point values (`principal_component_i`).
    Float(Vec<f64>),
}

impl Column {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
        }
    }

    /// True if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer values, if this is an integer column.
    pub fn as_int(&self) -> Option<&[i64]> {
        match self {
            Column::Int(v) => Some(v),
            Column::Float(_) => None,
        }
    }

    /// Float values, if this is a float column.
    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            Column::Float(v) => Some(v),
            Column::Int(_) => None,
        }
    }

    fn select(&self, rows: &[usize]) -> Column {
        match self {
            Column::Int(v) => Column::Int(rows.iter().map(|&i| v[i]).collect()),
            Column::Float(v) => Column::Float(rows.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// Records plus named derived columns, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    records: Vec<Record>,
    columns: Vec<(String, Column)>,
}

impl RecordSet {
    /// Wrap a list of records with no derived columns.
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            columns: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The underlying records, in row order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Look up a derived column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    /// Names of the derived columns, in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Set a derived column, replacing an existing column of the same name in
    /// place.
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        if column.len() != self.records.len() {
            return Err(Error::DimensionMismatch {
                expected: self.records.len(),
                found: column.len(),
            });
        }
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = column,
            None => self.columns.push((name, column)),
        }
        Ok(())
    }

    /// Remove a derived column, returning it if it existed.
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|(n, _)| n == name)?;
        Some(self.columns.remove(idx).1)
    }

    /// Keep only rows whose label contains `text`, ignoring case.
    ///
    /// Derived columns are filtered with the rows. Fails with
    /// [`Error::EmptyInput`] if no row matches.
    pub fn filter_label_contains(&self, text: &str) -> Result<RecordSet> {
        let needle = text.to_lowercase();
        let rows: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.label.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect();

        info!(
            kept = rows.len(),
            total = self.records.len(),
            filter = text,
            "filtered records by label"
        );

        if rows.is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(self.select(&rows))
    }

    fn select(&self, rows: &[usize]) -> RecordSet {
        RecordSet {
            records: rows.iter().map(|&i| self.records[i].clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.select(rows)))
                .collect(),
        }
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn sample() -> RecordSet {
        vec![
            Record::new(14.6, 121.0, at(1), "a", "Fake News"),
            Record::new(10.3, 123.9, at(2), "b", "credible"),
            Record::new(7.1, 125.6, at(3), "c", "FAKE"),
        ]
        .into()
    }

    #[test]
    fn test_set_column_replaces_in_place() {
        let mut set = sample();
        set.set_column("cluster", Column::Int(vec![0, 1, 2])).unwrap();
        set.set_column("hour", Column::Int(vec![1, 2, 3])).unwrap();
        set.set_column("cluster", Column::Int(vec![2, 1, 0])).unwrap();

        let names: Vec<_> = set.column_names().collect();
        assert_eq!(names, vec!["cluster", "hour"]);
        assert_eq!(
            set.column("cluster").unwrap().as_int().unwrap(),
            &[2, 1, 0]
        );
    }

    #[test]
    fn test_set_column_length_mismatch() {
        let mut set = sample();
        let err = set.set_column("cluster", Column::Int(vec![0])).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                found: 1
            }
        ));
    }

    #[test]
    fn test_filter_label_case_insensitive() {
        let mut set = sample();
        set.set_column("hour", Column::Int(vec![1, 2, 3])).unwrap();

        let fake = set.filter_label_contains("fake").unwrap();
        assert_eq!(fake.len(), 2);
        assert_eq!(fake.records()[1].source, "c");
        assert_eq!(fake.column("hour").unwrap().as_int().unwrap(), &[1, 3]);
    }

    #[test]
    fn test_filter_label_no_match() {
        let set = sample();
        assert!(matches!(
            set.filter_label_contains("satire"),
            Err(Error::EmptyInput)
        ));
    }
}

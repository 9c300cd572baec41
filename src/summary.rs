//! Per-cluster profiles and activity histograms.
//!
//! These are the aggregates reporting views are drawn from: where each
//! cluster sits, when it is active, who reports into it, and how the inlier
//! events spread over the hours of the day and the days of the week.
//! Outliers are counted but never folded into any profile.
//!
//! Source credibility and daily report counts describe the whole record set,
//! outliers included, since they do not depend on the clustering.

use crate::assemble::LabeledRecordSet;
use crate::cluster::OUTLIER;
use crate::prepare::{day_of_week, hour_of_day};
use crate::record::RecordSet;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregates for one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterProfile {
    /// Cluster index.
    pub cluster: i32,
    /// Number of records.
    pub size: usize,
    /// Mean latitude of records with coordinates.
    pub mean_latitude: f64,
    /// Mean longitude of records with coordinates.
    pub mean_longitude: f64,
    /// Most frequent hour of day (lowest on ties).
    pub peak_hour: Option<u32>,
    /// Most frequent day of week, Monday = 0 (lowest on ties).
    pub peak_day: Option<u32>,
    /// Most frequent sources, count descending then name ascending.
    pub top_sources: Vec<(String, usize)>,
    /// Count per label, by label.
    pub labels: BTreeMap<String, usize>,
}

/// Inlier event counts per hour of day and per day of week.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityHistogram {
    /// Counts for hours 0..24.
    pub hourly: [usize; 24],
    /// Counts for days 0..7, Monday first.
    pub weekday: [usize; 7],
}

impl ActivityHistogram {
    /// Hour with the most events, if any were recorded.
    pub fn peak_hour(&self) -> Option<u32> {
        argmax(&self.hourly)
    }

    /// Day with the most events, if any were recorded.
    pub fn peak_day(&self) -> Option<u32> {
        argmax(&self.weekday)
    }

    fn record(&mut self, hour: u32, day: u32) {
        self.hourly[hour as usize] += 1;
        self.weekday[day as usize] += 1;
    }
}

/// Coarse credibility class of a free-text label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Credibility {
    /// Label mentions `credible`, `real` or `true`.
    Credible,
    /// Label mentions `not`, `fake` or `false`.
    NotCredible,
    /// Anything else.
    Other,
}

impl Credibility {
    /// Classify a label, case-insensitively. Negative markers win, so
    /// `"Not Credible"` is [`Credibility::NotCredible`].
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| label.contains(w));
        if mentions(&["not", "fake", "false"]) {
            Credibility::NotCredible
        } else if mentions(&["credible", "real", "true"]) {
            Credibility::Credible
        } else {
            Credibility::Other
        }
    }
}

/// Credibility breakdown of one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceCredibility {
    /// Source identifier.
    pub source: String,
    /// Records classified [`Credibility::Credible`].
    pub credible: usize,
    /// Records classified [`Credibility::NotCredible`].
    pub not_credible: usize,
    /// Records classified [`Credibility::Other`].
    pub other: usize,
}

impl SourceCredibility {
    /// Total records from this source.
    pub fn total(&self) -> usize {
        self.credible + self.not_credible + self.other
    }
}

/// Profiles of all clusters plus the outlier count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringSummary {
    /// One profile per cluster, by cluster index.
    pub clusters: Vec<ClusterProfile>,
    /// Number of records labeled as outliers.
    pub n_outliers: usize,
    /// Activity over all inliers.
    pub activity: ActivityHistogram,
    /// Credibility per source over all records, largest first.
    pub sources: Vec<SourceCredibility>,
    /// Records per calendar day over all records.
    pub daily: BTreeMap<NaiveDate, usize>,
}

#[derive(Default)]
struct Accumulator {
    size: usize,
    lat_sum: f64,
    lon_sum: f64,
    located: usize,
    activity: ActivityHistogram,
    sources: BTreeMap<String, usize>,
    labels: BTreeMap<String, usize>,
}

/// Summarize a labeled record set, keeping the `top_sources` most frequent
/// sources per cluster.
pub fn summarize(labeled: &LabeledRecordSet, top_sources: usize) -> ClusteringSummary {
    let mut per_cluster: BTreeMap<i32, Accumulator> = BTreeMap::new();
    let mut activity = ActivityHistogram::default();
    let mut n_outliers = 0;

    for (record, &label) in labeled.records().records().iter().zip(labeled.labels()) {
        if label == OUTLIER {
            n_outliers += 1;
            continue;
        }
        let acc = per_cluster.entry(label).or_default();
        acc.size += 1;
        if let (Some(lat), Some(lon)) = (record.latitude, record.longitude) {
            acc.lat_sum += lat;
            acc.lon_sum += lon;
            acc.located += 1;
        }
        if let Some(ts) = &record.timestamp {
            let (hour, day) = (hour_of_day(ts), day_of_week(ts));
            acc.activity.record(hour, day);
            activity.record(hour, day);
        }
        *acc.sources.entry(record.source.clone()).or_default() += 1;
        *acc.labels.entry(record.label.clone()).or_default() += 1;
    }

    let clusters = per_cluster
        .into_iter()
        .map(|(cluster, acc)| {
            let located = acc.located.max(1) as f64;
            let mut sources: Vec<(String, usize)> = acc.sources.into_iter().collect();
            // BTreeMap order is by name; a stable sort keeps it within equal counts.
            sources.sort_by(|a, b| b.1.cmp(&a.1));
            sources.truncate(top_sources);

            ClusterProfile {
                cluster,
                size: acc.size,
                mean_latitude: acc.lat_sum / located,
                mean_longitude: acc.lon_sum / located,
                peak_hour: acc.activity.peak_hour(),
                peak_day: acc.activity.peak_day(),
                top_sources: sources,
                labels: acc.labels,
            }
        })
        .collect();

    ClusteringSummary {
        clusters,
        n_outliers,
        activity,
        sources: source_credibility(labeled.records()),
        daily: daily_counts(labeled.records()),
    }
}

/// Credibility breakdown per source, by total descending then name.
pub fn source_credibility(records: &RecordSet) -> Vec<SourceCredibility> {
    let mut per_source: BTreeMap<&str, SourceCredibility> = BTreeMap::new();
    for record in records.records() {
        let entry = per_source
            .entry(record.source.as_str())
            .or_insert_with(|| SourceCredibility {
                source: record.source.clone(),
                ..Default::default()
            });
        match Credibility::from_label(&record.label) {
            Credibility::Credible => entry.credible += 1,
            Credibility::NotCredible => entry.not_credible += 1,
            Credibility::Other => entry.other += 1,
        }
    }

    let mut sources: Vec<SourceCredibility> = per_source.into_values().collect();
    sources.sort_by(|a, b| b.total().cmp(&a.total()));
    sources
}

/// Number of records per calendar day. Records without a timestamp are
/// not counted.
pub fn daily_counts(records: &RecordSet) -> BTreeMap<NaiveDate, usize> {
    let mut daily = BTreeMap::new();
    for ts in records.records().iter().filter_map(|r| r.timestamp.as_ref()) {
        *daily.entry(ts.date()).or_default() += 1;
    }
    daily
}

fn argmax(counts: &[usize]) -> Option<u32> {
    let (idx, &max) = counts
        .iter()
        .enumerate()
        .fold((0, &0), |best, cur| if cur.1 > best.1 { cur } else { best });
    (max > 0).then_some(idx as u32)
}

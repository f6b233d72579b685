//! Reporting and export of the collected statistics.
//!
//! Supports structured log lines, pretty JSON, and CSV snapshot append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

use crate::route::RouteKey;
use crate::stats::StatRecord;
use crate::store::{DailyBucket, StatsStore};

/// One CSV row: a route's all-time statistics at a point in time.
#[derive(Debug, Serialize)]
pub struct SnapshotRow<'a> {
    pub timestamp: DateTime<Utc>,
    pub route: &'a str,
    pub count: u64,
    pub total: f64,
    pub average: Option<u32>,
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub pending: usize,
}

impl<'a> SnapshotRow<'a> {
    pub fn new(timestamp: DateTime<Utc>, route: &'a RouteKey, record: &StatRecord) -> Self {
        Self {
            timestamp,
            route: route.as_str(),
            count: record.count,
            total: record.total,
            average: record.average,
            min: record.min,
            max: record.max,
            pending: record.pending_samples.len(),
        }
    }
}

/// Logs one line per route with its statistics.
pub fn log_records<'a, I>(scope: &str, records: I)
where
    I: IntoIterator<Item = (&'a RouteKey, &'a StatRecord)>,
{
    for (route, record) in records {
        if record.has_history() || !record.pending_samples.is_empty() {
            info!(
                scope,
                route = %route,
                count = record.count,
                average = ?record.average,
                min = ?record.min,
                max = ?record.max,
                pending = record.pending_samples.len(),
                "Route statistics"
            );
        } else {
            info!(scope, route = %route, "No completed batches yet");
        }
    }
}

/// Logs the global rollup and, when present, a single day's bucket.
pub fn log_report(store: &StatsStore, day: Option<(&str, &DailyBucket)>) {
    log_records("global", store.global());
    if let Some((date, bucket)) = day {
        log_records(date, bucket);
    }
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends one row per global route record to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_snapshot(path: &Path, store: &StatsStore, timestamp: DateTime<Utc>) -> Result<usize> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV snapshot");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // header only on the first write
        .from_writer(file);

    let mut rows = 0;
    for (route, record) in store.global() {
        writer.serialize(SnapshotRow::new(timestamp, route, record))?;
        rows += 1;
    }
    writer.flush()?;

    Ok(rows)
}

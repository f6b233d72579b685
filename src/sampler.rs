//! One scheduled sampling run.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::directions::{DirectionsApi, QueryFailure};
use crate::route::{Location, RouteKey};
use crate::store::StatsStore;
use crate::window::{Window, classify_window};

/// What a run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// `None` when the run fell outside both windows and did nothing.
    pub window: Option<Window>,
    pub date: Option<NaiveDate>,
    pub attempted: usize,
    pub succeeded: usize,
    /// Routes whose batch completed during this run, with the period average.
    pub completed: Vec<(RouteKey, u32)>,
    pub pruned_days: usize,
}

impl RunSummary {
    pub fn skipped(&self) -> bool {
        self.window.is_none()
    }

    /// True when queries were attempted and none of them produced a measurement.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.succeeded == 0
    }
}

/// Queries one leg and logs the failure reason if there is one.
pub async fn query_duration(
    api: &dyn DirectionsApi,
    origin: &Location,
    destination: &Location,
) -> Result<u32, QueryFailure> {
    let result = api
        .travel_minutes(&origin.coordinates, &destination.coordinates)
        .await;

    match &result {
        Ok(minutes) => info!(
            origin = %origin.name,
            destination = %destination.name,
            minutes,
            "Travel time sampled"
        ),
        Err(e) => warn!(
            origin = %origin.name,
            destination = %destination.name,
            error = %e,
            "Travel time query failed, sample discarded"
        ),
    }

    result
}

/// Classifies `now`, samples every route of the active window and saves the store.
///
/// Outside both windows nothing is queried and the stats file is not touched.
/// Inside a window the store is saved even if every query failed.
#[tracing::instrument(skip(config, api), fields(data_file = %config.data_file.display()))]
pub async fn run_once(
    config: &Config,
    api: &dyn DirectionsApi,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    let local = config.local_time(&now)?;

    let Some(window) = classify_window(&local, &config.windows) else {
        info!(local_time = %local.format("%H:%M"), "Not a sampling window, skipping");
        return Ok(RunSummary::default());
    };

    let today = local.date_naive();
    info!(%window, date = %today, "Sampling run started");

    let mut store = StatsStore::load(&config.data_file, config.all_routes());
    let mut summary = RunSummary {
        window: Some(window),
        date: Some(today),
        ..Default::default()
    };

    if let Some(cutoff) = config.retention_cutoff(today) {
        summary.pruned_days = store.prune_before(cutoff);
        if summary.pruned_days > 0 {
            info!(pruned = summary.pruned_days, cutoff = %cutoff, "Pruned old daily buckets");
        }
    }

    for (route, origin, destination) in config.routes_for(window) {
        summary.attempted += 1;
        let sample = query_duration(api, origin, destination).await.ok();
        if sample.is_some() {
            summary.succeeded += 1;
        }

        if let Some(period) = store.record_sample(today, &route, sample, config.batch_size) {
            info!(
                route = %route,
                average = period.average,
                min = period.min,
                max = period.max,
                "Batch completed"
            );
            summary.completed.push((route, period.average));
        }
    }

    store.save(&config.data_file)?;

    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        completed = summary.completed.len(),
        "Sampling run finished"
    );
    Ok(summary)
}

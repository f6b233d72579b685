//! Persistent statistics store.
//!
//! The whole history lives in one pretty-printed JSON document: an all-time
//! `"global"` rollup keyed by route, plus one bucket per local date.
//!
//! ```json
//! {
//!   "global": {
//!     "Kharadi_to_office": { "count": 4, "total": 138.0, "avg": 35, "min": 31, "max": 39 }
//!   },
//!   "2026-10-16": {
//!     "Kharadi_to_office": { "count": 0, "total": 0.0, "avg": null, "min": null, "max": null, "samples": [33] }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::route::RouteKey;
use crate::stats::{Period, StatRecord};

/// Per-route records for one local date.
pub type DailyBucket = BTreeMap<RouteKey, StatRecord>;

/// Date key format used for daily buckets.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsStore {
    #[serde(default)]
    global: BTreeMap<RouteKey, StatRecord>,
    #[serde(flatten)]
    days: BTreeMap<String, DailyBucket>,
}

impl StatsStore {
    /// An empty history with a zeroed global record for every route.
    pub fn new<I>(routes: I) -> Self
    where
        I: IntoIterator<Item = RouteKey>,
    {
        let mut store = Self::default();
        store.ensure_routes(routes);
        store
    }

    /// Loads the store from `path`.
    ///
    /// A missing or unreadable file is "no history yet": the result is the
    /// same as [`StatsStore::new`]. Never fails.
    pub fn load<I>(path: &Path, routes: I) -> Self
    where
        I: IntoIterator<Item = RouteKey>,
    {
        let mut store = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<StatsStore>(&content) {
                Ok(store) => {
                    debug!(path = %path.display(), days = store.days.len(), "Loaded stats store");
                    store
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Stats file is unparsable, starting with empty history");
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No stats file yet, starting with empty history");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Stats file is unreadable, starting with empty history");
                Self::default()
            }
        };

        store.ensure_routes(routes);
        store
    }

    /// Writes the full store to `path` as pretty JSON, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write stats file {}", path.display()))?;

        debug!(path = %path.display(), "Stats store saved");
        Ok(())
    }

    /// Seeds a zeroed global record for each route that has none.
    pub fn ensure_routes<I>(&mut self, routes: I)
    where
        I: IntoIterator<Item = RouteKey>,
    {
        for route in routes {
            self.global.entry(route).or_default();
        }
    }

    /// Records one measurement for `route` on `date`.
    ///
    /// `None` is the failure sentinel and leaves the store untouched. When the
    /// day's pending batch fills up, the period is folded into both the daily
    /// and the global record and returned.
    pub fn record_sample(
        &mut self,
        date: NaiveDate,
        route: &RouteKey,
        sample: Option<u32>,
        batch_size: usize,
    ) -> Option<Period> {
        let minutes = sample?;

        let day = self
            .days
            .entry(date.format(DATE_FORMAT).to_string())
            .or_default();
        let period = day
            .entry(route.clone())
            .or_default()
            .push_sample(minutes, batch_size)?;

        self.global
            .entry(route.clone())
            .or_default()
            .fold(Period::averaged(period.average));

        Some(period)
    }

    /// Drops daily buckets dated before `cutoff`. Keys that are not dates are kept.
    pub fn prune_before(&mut self, cutoff: NaiveDate) -> usize {
        let before = self.days.len();
        self.days.retain(|key, _| {
            NaiveDate::parse_from_str(key, DATE_FORMAT).map_or(true, |date| date >= cutoff)
        });
        before - self.days.len()
    }

    pub fn global(&self) -> &BTreeMap<RouteKey, StatRecord> {
        &self.global
    }

    pub fn route(&self, route: &RouteKey) -> Option<&StatRecord> {
        self.global.get(route)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DailyBucket> {
        self.days.get(&date.format(DATE_FORMAT).to_string())
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> Vec<RouteKey> {
        vec![RouteKey::from("Kharadi_to_office"), RouteKey::from("office_to_Kharadi")]
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_new_seeds_zeroed_routes() {
        let store = StatsStore::new(routes());

        assert_eq!(store.global().len(), 2);
        let record = store.route(&RouteKey::from("Kharadi_to_office")).unwrap();
        assert_eq!(record.count, 0);
        assert_eq!(record.average, None);
        assert_eq!(record.min, None);
        assert_eq!(store.day_count(), 0);
    }

    #[test]
    fn test_batch_of_three_updates_day_and_global() {
        let mut store = StatsStore::new(routes());
        let route = RouteKey::from("Kharadi_to_office");
        let today = date("2026-10-16");

        assert!(store.record_sample(today, &route, Some(31), 3).is_none());
        assert!(store.record_sample(today, &route, Some(35), 3).is_none());
        let period = store.record_sample(today, &route, Some(39), 3).unwrap();
        assert_eq!(period.average, 35);

        let daily = &store.day(today).unwrap()[&route];
        assert_eq!(daily.count, 1);
        assert_eq!(daily.average, Some(35));
        assert_eq!(daily.min, Some(31));
        assert_eq!(daily.max, Some(39));
        assert!(daily.pending_samples.is_empty());

        let global = store.route(&route).unwrap();
        assert_eq!(global.count, 1);
        assert_eq!(global.average, Some(35));
        assert_eq!(global.min, Some(35));
        assert_eq!(global.max, Some(35));
    }

    #[test]
    fn test_global_rollup_across_days() {
        let mut store = StatsStore::new(routes());
        let route = RouteKey::from("office_to_Kharadi");

        for v in [40, 42, 44] {
            store.record_sample(date("2026-10-15"), &route, Some(v), 3);
        }
        for v in [50, 51, 52] {
            store.record_sample(date("2026-10-16"), &route, Some(v), 3);
        }

        let global = store.route(&route).unwrap();
        assert_eq!(global.count, 2);
        assert_eq!(global.total, 93.0);
        assert_eq!(global.average, Some(47)); // 46.5
        assert_eq!(global.min, Some(42));
        assert_eq!(global.max, Some(51));
    }

    #[test]
    fn test_failures_never_fill_a_batch() {
        let mut store = StatsStore::new(routes());
        let route = RouteKey::from("Kharadi_to_office");
        let today = date("2026-10-16");

        for _ in 0..3 {
            assert!(store.record_sample(today, &route, None, 3).is_none());
        }
        assert!(store.day(today).is_none());

        assert!(store.record_sample(today, &route, Some(30), 3).is_none());
        let daily = &store.day(today).unwrap()[&route];
        assert_eq!(daily.pending_samples, vec![30]);
        assert_eq!(daily.count, 0);
        assert_eq!(store.route(&route).unwrap().count, 0);
    }

    #[test]
    fn test_load_missing_file_equals_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let loaded = StatsStore::load(&path, routes());
        assert_eq!(loaded, StatsStore::new(routes()));
    }

    #[test]
    fn test_load_corrupt_file_equals_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = StatsStore::load(&path, routes());
        assert_eq!(loaded, StatsStore::new(routes()));
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");
        let route = RouteKey::from("Kharadi_to_office");

        let mut store = StatsStore::new(routes());
        for v in [20, 25, 27, 33] {
            store.record_sample(date("2026-10-16"), &route, Some(v), 3);
        }
        store.save(&path).unwrap();

        let loaded = StatsStore::load(&path, routes());
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_reads_file_written_by_legacy_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"{
  "global": {
    "Kharadi_to_office": {"count": 1, "total": 28, "avg": 28, "min": 28, "max": 28}
  },
  "2026-10-15": {
    "Kharadi_to_office": {"samples": [], "min": 25, "max": 31, "avg": 28}
  }
}"#,
        )
        .unwrap();

        let store = StatsStore::load(&path, routes());
        assert_eq!(store.route(&RouteKey::from("Kharadi_to_office")).unwrap().average, Some(28));
        assert!(store.route(&RouteKey::from("office_to_Kharadi")).is_some());
        assert_eq!(store.day_count(), 1);
    }

    #[test]
    fn test_prune_before_keeps_recent_days() {
        let mut store = StatsStore::new(routes());
        let route = RouteKey::from("Kharadi_to_office");
        for d in ["2026-07-01", "2026-10-01", "2026-10-16"] {
            store.record_sample(date(d), &route, Some(30), 3);
        }

        let removed = store.prune_before(date("2026-10-01"));
        assert_eq!(removed, 1);
        assert!(store.day(date("2026-07-01")).is_none());
        assert!(store.day(date("2026-10-01")).is_some());
        assert_eq!(store.global().len(), 2);
    }
}

//! Runtime configuration.
//!
//! Defaults describe the Pune commute this tool was written for. A JSON file
//! can override any subset of fields:
//! ```json
//! {
//!   "data_file": "/var/lib/commute/data.json",
//!   "homes": [{ "name": "Kharadi", "coordinates": "18.5376206,73.936613" }],
//!   "windows": { "morning": { "start": 8, "end": 11 }, "evening": { "start": 17, "end": 20 } },
//!   "retention_days": 30
//! }
//! ```
//! The API key is only ever read from the environment.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::directions::{API_KEY_ENV, DEFAULT_DIRECTIONS_URL};
use crate::route::{Location, RouteKey};
use crate::stats::DEFAULT_BATCH_SIZE;
use crate::window::{Window, WindowConfig};

/// Asia/Kolkata, which observes no daylight saving.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 5 * 60 + 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_file: PathBuf,
    pub office: Location,
    pub homes: Vec<Location>,
    pub windows: WindowConfig,
    /// Offset of the local time zone used for windows and date buckets.
    pub utc_offset_minutes: i32,
    pub batch_size: usize,
    /// Daily buckets older than this many days are pruned. 0 keeps everything.
    pub retention_days: u32,
    pub request_timeout_secs: u64,
    pub directions_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data.json"),
            office: Location::new("Office", "18.5502336,73.8942478"),
            homes: vec![
                Location::new("Kharadi", "18.5376206,73.936613"),
                Location::new("Keshav Nagar", "18.5306004,73.9454019"),
            ],
            windows: WindowConfig::default(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            batch_size: DEFAULT_BATCH_SIZE,
            retention_days: 90,
            request_timeout_secs: 10,
            directions_url: DEFAULT_DIRECTIONS_URL.to_string(),
            api_key: None,
        }
    }
}

impl Config {
    /// Reads overrides from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Picks up the API key from the environment. A blank value counts as unset.
    pub fn with_env_credentials(mut self) -> Self {
        self.api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.homes.is_empty() {
            bail!("At least one home location must be configured");
        }
        let mut seen = HashSet::new();
        for home in &self.homes {
            if !seen.insert(home.name.as_str()) {
                bail!("Duplicate home location '{}'", home.name);
            }
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        if !self.windows.morning.is_valid() || !self.windows.evening.is_valid() {
            bail!("Window hours must satisfy start <= end <= 23");
        }
        self.time_zone()?;
        Ok(())
    }

    pub fn time_zone(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("UTC offset of {} minutes is out of range", self.utc_offset_minutes))
    }

    /// Converts an instant into the configured local zone.
    pub fn local_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DateTime<FixedOffset>> {
        Ok(now.with_timezone(&self.time_zone()?))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Oldest daily bucket worth keeping on `today`, if retention is enabled.
    pub fn retention_cutoff(&self, today: NaiveDate) -> Option<NaiveDate> {
        if self.retention_days == 0 {
            return None;
        }
        today.checked_sub_days(chrono::Days::new(u64::from(self.retention_days)))
    }

    /// `(route, origin, destination)` for every home, in configured order.
    pub fn routes_for(&self, window: Window) -> Vec<(RouteKey, &Location, &Location)> {
        self.homes
            .iter()
            .map(|home| match window {
                Window::Morning => (RouteKey::to_office(home), home, &self.office),
                Window::Evening => (RouteKey::from_office(home), &self.office, home),
            })
            .collect()
    }

    /// Every tracked route, both directions.
    pub fn all_routes(&self) -> Vec<RouteKey> {
        [Window::Morning, Window::Evening]
            .into_iter()
            .flat_map(|w| self.routes_for(w).into_iter().map(|(key, _, _)| key))
            .collect()
    }
}

//! Time-of-day windows that decide which routes a run samples.

use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which leg of the commute a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    /// Home to office.
    Morning,
    /// Office to home.
    Evening,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Morning => f.write_str("morning"),
            Window::Evening => f.write_str("evening"),
        }
    }
}

/// Inclusive range of local hours, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: u32,
    pub end: u32,
}

impl HourRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start <= hour && hour <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end && self.end <= 23
    }
}

/// Hour ranges for both windows. Deliberately wide so a late scheduler still lands inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub morning: HourRange,
    pub evening: HourRange,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            morning: HourRange::new(9, 12),
            evening: HourRange::new(16, 19),
        }
    }
}

/// Classifies a local timestamp. `None` means the run should do nothing.
///
/// The morning range wins if the two ranges overlap.
pub fn classify_window(now: &DateTime<FixedOffset>, windows: &WindowConfig) -> Option<Window> {
    let hour = now.hour();
    if windows.morning.contains(hour) {
        Some(Window::Morning)
    } else if windows.evening.contains(hour) {
        Some(Window::Evening)
    } else {
        None
    }
}

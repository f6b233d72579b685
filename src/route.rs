//! Named locations and the directed routes between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named point, addressed by a `"lat,lng"` pair or any origin string the
/// directions API accepts (e.g. `place_id:...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub coordinates: String,
}

impl Location {
    pub fn new(name: &str, coordinates: &str) -> Self {
        Self {
            name: name.to_string(),
            coordinates: coordinates.to_string(),
        }
    }
}

/// Stable identifier of a directed route, used as the key in the stats file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    /// `"<home>_to_office"`
    pub fn to_office(home: &Location) -> Self {
        Self(format!("{}_to_office", home.name))
    }

    /// `"office_to_<home>"`
    pub fn from_office(home: &Location) -> Self {
        Self(format!("office_to_{}", home.name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RouteKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

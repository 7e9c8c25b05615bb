use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::PlaceHit;

/// A named geographic point on a route: the origin, the destination, or an
/// intermediate stop. Ids are generated client-side and are unique within
/// one draft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

impl Waypoint {
    /// A stop freshly added to the form: empty name, zero coordinates,
    /// waiting for a place selection.
    pub fn unplaced() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: String::new(),
            address: None,
            lat: 0.0,
            lng: 0.0,
        }
    }

    /// Whether the waypoint has been resolved from a place selection.
    /// Zero coordinates mean text-only input.
    pub fn is_placed(&self) -> bool {
        self.lat != 0.0 || self.lng != 0.0
    }

    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

impl From<PlaceHit> for Waypoint {
    fn from(hit: PlaceHit) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: hit.name,
            address: hit.address,
            lat: hit.lat,
            lng: hit.lng,
        }
    }
}

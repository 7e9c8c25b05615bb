use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::Waypoint;

/// A committed route as the backend returns it. The client holds a cached
/// copy; staleness is acceptable and resolved by re-fetching on navigation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedRoute {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "creatorId", default)]
    pub creator_id: String,
    pub origin: Waypoint,
    pub destination: Waypoint,
    #[serde(rename = "intermediateWaypoints", default)]
    pub stops: Vec<Waypoint>,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
    #[serde(
        rename = "createdAt",
        with = "chrono::serde::ts_milliseconds",
        default = "Utc::now"
    )]
    pub created_at: DateTime<Utc>,
}

/// A photo already attached to a saved route, served from the CDN.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhotoRef {
    pub filename: String,
    #[serde(rename = "cloudfrontUrl")]
    pub url: String,
}

/// The payload submitted to create a route. Origin, destination and every
/// stop must carry resolved coordinates by the time this is sent.
#[derive(Clone, Debug, Serialize)]
pub struct NewRoute {
    pub name: String,
    pub origin: Waypoint,
    pub destination: Waypoint,
    #[serde(rename = "intermediateWaypoints")]
    pub stops: Vec<Waypoint>,
}

/// Distance/duration as the mapping collaborator formats them for display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub distance: String,
    pub duration: String,
}

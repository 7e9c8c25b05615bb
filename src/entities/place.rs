use serde::{Deserialize, Serialize};

/// A resolved place-autocomplete result handed over by the mapping
/// collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceHit {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

mod photo;
mod place;
mod route;
mod share;
mod waypoint;

pub use photo::{LocalFile, UploadUrlInfo, MAX_UPLOAD_BATCH};
pub use place::PlaceHit;
pub use route::{NewRoute, PhotoRef, RouteMetrics, SavedRoute};
pub use share::ShareGrant;
pub use waypoint::Waypoint;

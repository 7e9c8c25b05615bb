use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::api::{ProgressFn, RouteAPI};
use crate::entities::{LocalFile, NewRoute, PlaceHit, SavedRoute, Waypoint, MAX_UPLOAD_BATCH};
use crate::error::{invalid_input_error, invalid_state_error, Error};
use crate::notify::{self, Notice, NoticeSender};

/// Maximum number of intermediate stops in one route.
pub const MAX_STOPS: usize = 8;

/// Vertical travel (logical px) a touch drag must cover before a reorder
/// commits; smaller movements are jitter.
pub const TOUCH_REORDER_THRESHOLD: f64 = 30.0;

/// The planning surface. `Collapsed` shows only the origin search box,
/// `Expanded` the full form, `Saved` the post-save photo-attachment view.
/// Every transition goes through a draft operation; there is no way to
/// represent contradictory combinations like "saved while collapsed".
#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    Collapsed,
    Expanded,
    Saved { route_id: String },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Field {
    RouteName,
    OriginName,
    DestinationName,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlaceRole {
    Origin,
    Destination,
    Stop { id: String },
}

/// A handle to a local photo preview. Owned by exactly one
/// [`PhotoSelection`] and released exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PreviewUrl(pub String);

/// The object-URL contract the browser supplies for free, kept as a seam:
/// previews must be revoked when the photo is removed, the draft resets,
/// or the draft is dropped.
pub trait PreviewUrls: Send + Sync {
    fn create(&self, file: &LocalFile) -> PreviewUrl;
    fn revoke(&self, url: &PreviewUrl);
}

/// In-process preview registry. Hands out unique handles and tracks them,
/// so leaks and double releases are observable.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    active: Mutex<HashSet<String>>,
    created: AtomicUsize,
    revoked: AtomicUsize,
}

impl PreviewRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn revoked(&self) -> usize {
        self.revoked.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

impl PreviewUrls for PreviewRegistry {
    fn create(&self, file: &LocalFile) -> PreviewUrl {
        let url = format!("preview:{}/{}", Uuid::new_v4(), file.name);
        self.active.lock().unwrap().insert(url.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        PreviewUrl(url)
    }

    fn revoke(&self, url: &PreviewUrl) {
        if self.active.lock().unwrap().remove(&url.0) {
            self.revoked.fetch_add(1, Ordering::SeqCst);
        } else {
            tracing::warn!(url = %url.0, "revoking unknown preview url");
        }
    }
}

#[derive(Clone, Debug)]
pub struct PhotoSelection {
    pub file: LocalFile,
    pub preview: PreviewUrl,
}

/// What `preview_route` hands to the map-drawing collaborator: endpoint
/// names plus the ordered stops.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutePreview {
    pub origin: String,
    pub destination: String,
    pub stops: Vec<Waypoint>,
}

/// An uncommitted route under construction. Pure session state: created
/// empty when the planning surface opens, destroyed on finalize, cancel or
/// drop, never persisted.
pub struct RouteDraft {
    stage: Stage,
    route_name: String,
    origin: Option<Waypoint>,
    destination: Option<Waypoint>,
    stops: Vec<Waypoint>,
    photos: Vec<PhotoSelection>,
    previews: Arc<dyn PreviewUrls>,
    notices: NoticeSender,
}

impl RouteDraft {
    pub fn new(previews: Arc<dyn PreviewUrls>, notices: NoticeSender) -> Self {
        Self {
            stage: Stage::Collapsed,
            route_name: String::new(),
            origin: None,
            destination: None,
            stops: Vec::new(),
            photos: Vec::new(),
            previews,
            notices,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn route_name(&self) -> &str {
        &self.route_name
    }

    pub fn origin(&self) -> Option<&Waypoint> {
        self.origin.as_ref()
    }

    pub fn destination(&self) -> Option<&Waypoint> {
        self.destination.as_ref()
    }

    pub fn stops(&self) -> &[Waypoint] {
        &self.stops
    }

    pub fn photos(&self) -> &[PhotoSelection] {
        &self.photos
    }

    /// Focusing the origin search box expands a collapsed form. One-way;
    /// nothing is lost and repeating it is harmless.
    pub fn expand(&mut self) {
        if self.stage == Stage::Collapsed {
            self.stage = Stage::Expanded;
        }
    }

    pub fn set_field(&mut self, field: Field, value: &str) {
        match field {
            Field::RouteName => self.route_name = value.to_string(),
            Field::OriginName => Self::set_endpoint_name(&mut self.origin, value),
            Field::DestinationName => Self::set_endpoint_name(&mut self.destination, value),
        }
    }

    // Typing edits the name in place and keeps any resolved coordinates;
    // only a fresh place selection replaces the waypoint wholesale.
    fn set_endpoint_name(slot: &mut Option<Waypoint>, value: &str) {
        match slot {
            Some(waypoint) => waypoint.name = value.to_string(),
            None => {
                let mut waypoint = Waypoint::unplaced();
                waypoint.name = value.to_string();
                *slot = Some(waypoint);
            }
        }
    }

    pub fn set_stop_name(&mut self, id: &str, value: &str) {
        if let Some(stop) = self.stops.iter_mut().find(|stop| stop.id == id) {
            stop.name = value.to_string();
        }
    }

    /// Resolves an autocomplete hit into the given role. Origin selection
    /// expands a collapsed form.
    pub fn select_place(&mut self, role: PlaceRole, hit: PlaceHit) -> Result<(), Error> {
        if matches!(self.stage, Stage::Saved { .. }) {
            return Err(invalid_state_error());
        }

        match role {
            PlaceRole::Origin => {
                self.origin = Some(Waypoint::from(hit));
                self.expand();
            }
            PlaceRole::Destination => {
                self.destination = Some(Waypoint::from(hit));
            }
            PlaceRole::Stop { id } => {
                let stop = self
                    .stops
                    .iter_mut()
                    .find(|stop| stop.id == id)
                    .ok_or_else(|| invalid_input_error())?;

                // the stop keeps its identity; name falls back to the
                // formatted address when the place has no display name
                stop.name = if hit.name.is_empty() {
                    hit.address.clone().unwrap_or_default()
                } else {
                    hit.name
                };
                stop.address = hit.address;
                stop.lat = hit.lat;
                stop.lng = hit.lng;
            }
        }

        Ok(())
    }

    pub fn can_add_stop(&self) -> bool {
        self.stops.len() < MAX_STOPS
    }

    /// Appends a fresh unplaced stop and returns it so the caller can
    /// focus its input.
    pub fn add_stop(&mut self) -> Result<&Waypoint, Error> {
        if !self.can_add_stop() {
            return Err(invalid_state_error());
        }

        self.stops.push(Waypoint::unplaced());
        Ok(&self.stops[self.stops.len() - 1])
    }

    /// Removes by id; unknown ids are a no-op and other stops keep their
    /// identity.
    pub fn remove_stop(&mut self, id: &str) {
        self.stops.retain(|stop| stop.id != id);
    }

    /// Splice-based move: the stop at `from` ends up at `to`, everything
    /// else keeps its relative order.
    pub fn reorder_stop(&mut self, from: usize, to: usize) -> Result<(), Error> {
        if from >= self.stops.len() || to >= self.stops.len() {
            return Err(invalid_input_error());
        }

        let stop = self.stops.remove(from);
        self.stops.insert(to, stop);
        Ok(())
    }

    pub fn select_photos(&mut self, files: Vec<LocalFile>) {
        for file in files {
            let preview = self.previews.create(&file);
            self.photos.push(PhotoSelection { file, preview });
        }
    }

    pub fn remove_photo(&mut self, index: usize) -> Result<(), Error> {
        if index >= self.photos.len() {
            return Err(invalid_input_error());
        }

        let selection = self.photos.remove(index);
        self.previews.revoke(&selection.preview);
        Ok(())
    }

    pub fn can_save(&self) -> bool {
        self.stage == Stage::Expanded && self.endpoints().is_ok()
    }

    /// Emits the current endpoints and stops for the map collaborator.
    /// Read-only: the draft is untouched.
    pub fn preview_route(&self) -> Result<RoutePreview, Error> {
        if self.stage != Stage::Expanded {
            return Err(invalid_state_error());
        }
        let (origin, destination) = self.endpoints()?;

        notify::post(
            &self.notices,
            Notice::info("Previewing route", "Showing the route on the map."),
        );

        Ok(RoutePreview {
            origin: origin.name.clone(),
            destination: destination.name.clone(),
            stops: self.stops.clone(),
        })
    }

    /// Persists the draft through the gateway. Requires both endpoints
    /// non-blank; rejected attempts never reach the network. On success
    /// the draft moves to `Saved` for photo attachment without clearing,
    /// and on failure it stays editable so the save can be retried.
    pub async fn save(&mut self, api: &dyn RouteAPI) -> Result<SavedRoute, Error> {
        if self.stage != Stage::Expanded {
            return Err(invalid_state_error());
        }

        let (origin, destination) = match self.endpoints() {
            Ok(endpoints) => endpoints,
            Err(err) => {
                notify::post(
                    &self.notices,
                    Notice::error("Cannot save route", "Set both origin and destination first."),
                );
                return Err(err);
            }
        };

        let submission = NewRoute {
            name: if self.route_name.trim().is_empty() {
                format!("Journey {}", Utc::now().format("%Y-%m-%d"))
            } else {
                self.route_name.clone()
            },
            origin: origin.clone(),
            destination: destination.clone(),
            stops: self.stops.clone(),
        };

        match api.create_route(submission).await {
            Ok(saved) => {
                self.stage = Stage::Saved {
                    route_id: saved.id.clone(),
                };
                notify::post(
                    &self.notices,
                    Notice::success(
                        "Route saved",
                        "Your journey has been created. Add photos or plan another route.",
                    ),
                );
                Ok(saved)
            }
            Err(err) => {
                notify::post(
                    &self.notices,
                    Notice::error("Error saving route", err.message.clone()),
                );
                Err(err)
            }
        }
    }

    /// Uploads any attached photos, then resets to `Collapsed`, also when
    /// the upload failed; the error is returned for the caller to
    /// surface. An oversized batch aborts before anything happens so the
    /// user can thin it out and retry.
    pub async fn finalize(
        &mut self,
        api: &dyn RouteAPI,
        progress: Option<ProgressFn>,
    ) -> Result<(), Error> {
        let route_id = match &self.stage {
            Stage::Saved { route_id } => route_id.clone(),
            _ => return Err(invalid_state_error()),
        };

        if self.photos.len() > MAX_UPLOAD_BATCH {
            notify::post(
                &self.notices,
                Notice::error(
                    "Too many photos",
                    format!("You can upload at most {} images at once.", MAX_UPLOAD_BATCH),
                ),
            );
            return Err(invalid_input_error());
        }

        let outcome = if self.photos.is_empty() {
            notify::post(
                &self.notices,
                Notice::success("Journey complete", "Your route has been saved without photos."),
            );
            Ok(())
        } else {
            let files: Vec<LocalFile> = self
                .photos
                .iter()
                .map(|selection| selection.file.clone())
                .collect();

            match api.upload_route_photos(&route_id, &files, progress).await {
                Ok(()) => {
                    notify::post(
                        &self.notices,
                        Notice::success(
                            "Photos uploaded",
                            "Your journey photos are on their way.",
                        ),
                    );
                    Ok(())
                }
                Err(err) => {
                    notify::post(
                        &self.notices,
                        Notice::error(
                            "Photo upload error",
                            "There was a problem uploading your photos.",
                        ),
                    );
                    Err(err)
                }
            }
        };

        self.reset_to_collapsed();
        outcome
    }

    /// Explicit close from `Expanded` or `Saved`; same clearing contract
    /// as finalize.
    pub fn cancel(&mut self) {
        self.reset_to_collapsed();
    }

    fn endpoints(&self) -> Result<(&Waypoint, &Waypoint), Error> {
        let origin = self
            .origin
            .as_ref()
            .filter(|waypoint| waypoint.has_name())
            .ok_or_else(|| invalid_input_error())?;
        let destination = self
            .destination
            .as_ref()
            .filter(|waypoint| waypoint.has_name())
            .ok_or_else(|| invalid_input_error())?;

        Ok((origin, destination))
    }

    fn reset_to_collapsed(&mut self) {
        self.release_previews();
        self.stage = Stage::Collapsed;
        self.route_name.clear();
        self.origin = None;
        self.destination = None;
        self.stops.clear();
    }

    fn release_previews(&mut self) {
        for selection in self.photos.drain(..) {
            self.previews.revoke(&selection.preview);
        }
    }
}

impl Drop for RouteDraft {
    fn drop(&mut self) {
        self.release_previews();
    }
}

/// Touch-hold reorder gesture. A reorder only commits once the finger has
/// travelled [`TOUCH_REORDER_THRESHOLD`] vertically from its anchor, then
/// the anchor re-bases so a continuing drag can keep moving the stop.
/// Desktop drag-and-drop calls [`RouteDraft::reorder_stop`] directly.
#[derive(Clone, Debug)]
pub struct TouchDrag {
    index: usize,
    anchor_y: f64,
}

impl TouchDrag {
    pub fn begin(index: usize, y: f64) -> Self {
        Self { index, anchor_y: y }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns whether a reorder committed.
    pub fn move_to(
        &mut self,
        draft: &mut RouteDraft,
        hover: usize,
        y: f64,
    ) -> Result<bool, Error> {
        if hover == self.index {
            return Ok(false);
        }
        if (y - self.anchor_y).abs() <= TOUCH_REORDER_THRESHOLD {
            return Ok(false);
        }

        draft.reorder_stop(self.index, hover)?;
        self.index = hover;
        self.anchor_y = y;
        Ok(true)
    }
}

#[cfg(test)]
#[derive(Default)]
struct RecordingGateway {
    created: AtomicUsize,
    uploads: AtomicUsize,
    fail_uploads: bool,
}

#[cfg(test)]
#[async_trait::async_trait]
impl RouteAPI for RecordingGateway {
    async fn create_route(&self, submission: NewRoute) -> Result<SavedRoute, Error> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(SavedRoute {
            id: "route-1".into(),
            name: submission.name,
            creator_id: "kai@example.com".into(),
            origin: submission.origin,
            destination: submission.destination,
            stops: submission.stops,
            photos: Vec::new(),
            created_at: Utc::now(),
        })
    }

    async fn get_routes(&self) -> Result<Vec<SavedRoute>, Error> {
        Err(crate::error::unexpected_error())
    }

    async fn get_route_by_id(&self, _id: &str) -> Result<SavedRoute, Error> {
        Err(crate::error::unexpected_error())
    }

    async fn delete_route(&self, _id: &str) -> Result<(), Error> {
        Err(crate::error::unexpected_error())
    }

    async fn generate_upload_urls(
        &self,
        _route_id: &str,
        _filenames: &[String],
        _content_types: &[String],
    ) -> Result<Vec<crate::entities::UploadUrlInfo>, Error> {
        Err(crate::error::unexpected_error())
    }

    async fn upload_route_photos(
        &self,
        _route_id: &str,
        _files: &[LocalFile],
        progress: Option<ProgressFn>,
    ) -> Result<(), Error> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads {
            return Err(crate::error::upstream_error());
        }
        if let Some(progress) = progress {
            progress(100);
        }
        Ok(())
    }
}

#[cfg(test)]
fn test_draft() -> (RouteDraft, Arc<PreviewRegistry>) {
    let registry = PreviewRegistry::new();
    let (tx, rx) = crate::notify::channel();
    // notices are fire-and-forget here
    std::mem::forget(rx);
    let draft = RouteDraft::new(registry.clone(), tx);
    (draft, registry)
}

#[cfg(test)]
fn hit(name: &str) -> PlaceHit {
    PlaceHit {
        name: name.into(),
        address: Some(format!("{} street 1", name)),
        lat: 52.37,
        lng: 4.89,
    }
}

#[cfg(test)]
fn picked(name: &str) -> LocalFile {
    LocalFile {
        name: name.into(),
        content_type: Some("image/jpeg".into()),
        bytes: vec![0xff, 0xd8],
    }
}

#[test]
fn save_is_rejected_while_endpoints_are_blank() {
    use tokio_test::block_on;

    let gateway = RecordingGateway::default();
    let (mut draft, _) = test_draft();
    draft.expand();

    assert!(block_on(draft.save(&gateway)).is_err());

    // whitespace-only names do not count either
    draft.set_field(Field::OriginName, "   ");
    draft.set_field(Field::DestinationName, "Lisbon");
    assert!(!draft.can_save());
    assert!(block_on(draft.save(&gateway)).is_err());

    assert_eq!(gateway.created.load(Ordering::SeqCst), 0);
    assert_eq!(*draft.stage(), Stage::Expanded);
}

#[test]
fn reorder_moves_one_stop_and_keeps_relative_order() {
    let (mut draft, _) = test_draft();
    draft.expand();

    for name in ["a", "b", "c", "d"] {
        draft.add_stop().unwrap();
        let id = draft.stops().last().unwrap().id.clone();
        draft.set_stop_name(&id, name);
    }

    draft.reorder_stop(1, 3).unwrap();
    let names: Vec<&str> = draft.stops().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["a", "c", "d", "b"]);

    // swapped arguments undo the move when nothing happened in between
    draft.reorder_stop(3, 1).unwrap();
    let names: Vec<&str> = draft.stops().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c", "d"]);

    assert!(draft.reorder_stop(0, 4).is_err());
}

#[test]
fn previews_are_released_exactly_once() {
    let (mut draft, registry) = test_draft();

    draft.select_photos(vec![picked("one.jpg"), picked("two.jpg"), picked("three.jpg")]);
    assert_eq!(registry.created(), 3);
    assert_eq!(registry.active(), 3);

    draft.remove_photo(1).unwrap();
    assert_eq!(registry.revoked(), 1);
    assert!(draft.remove_photo(5).is_err());

    draft.cancel();
    assert_eq!(registry.active(), 0);
    assert_eq!(registry.revoked(), registry.created());

    // the draft is already empty; dropping it must not double-release
    drop(draft);
    assert_eq!(registry.revoked(), 3);
}

#[test]
fn dropping_an_open_draft_releases_previews() {
    let (mut draft, registry) = test_draft();
    draft.select_photos(vec![picked("one.jpg")]);
    drop(draft);

    assert_eq!(registry.active(), 0);
    assert_eq!(registry.revoked(), 1);
}

#[test]
fn origin_selection_expands_a_collapsed_form() {
    let (mut draft, _) = test_draft();
    assert_eq!(*draft.stage(), Stage::Collapsed);

    draft.select_place(PlaceRole::Origin, hit("Amsterdam")).unwrap();
    assert_eq!(*draft.stage(), Stage::Expanded);
    assert!(draft.origin().unwrap().is_placed());
}

#[test]
fn add_stop_caps_at_eight() {
    let (mut draft, _) = test_draft();
    draft.expand();

    for _ in 0..MAX_STOPS {
        let stop = draft.add_stop().unwrap();
        assert!(stop.name.is_empty());
        assert!(!stop.is_placed());
    }
    assert!(!draft.can_add_stop());
    assert!(draft.add_stop().is_err());
    assert_eq!(draft.stops().len(), MAX_STOPS);
}

#[test]
fn remove_stop_with_unknown_id_is_a_noop() {
    let (mut draft, _) = test_draft();
    draft.expand();
    draft.add_stop().unwrap();

    draft.remove_stop("no-such-id");
    assert_eq!(draft.stops().len(), 1);

    let id = draft.stops()[0].id.clone();
    draft.remove_stop(&id);
    assert!(draft.stops().is_empty());
}

#[test]
fn touch_drag_commits_only_past_the_jitter_threshold() {
    let (mut draft, _) = test_draft();
    draft.expand();

    for name in ["a", "b", "c"] {
        draft.add_stop().unwrap();
        let id = draft.stops().last().unwrap().id.clone();
        draft.set_stop_name(&id, name);
    }

    let mut drag = TouchDrag::begin(0, 100.0);

    // small wiggle over another stop: no reorder
    assert!(!drag.move_to(&mut draft, 1, 120.0).unwrap());
    let names: Vec<&str> = draft.stops().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);

    // past the threshold the move commits and the gesture re-anchors
    assert!(drag.move_to(&mut draft, 1, 140.0).unwrap());
    let names: Vec<&str> = draft.stops().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["b", "a", "c"]);
    assert_eq!(drag.index(), 1);
}

#[test]
fn plan_save_finalize_round_trip() {
    use tokio_test::block_on;

    let gateway = RecordingGateway::default();
    let (mut draft, _) = test_draft();

    draft.select_place(PlaceRole::Origin, hit("A")).unwrap();
    draft.select_place(PlaceRole::Destination, hit("B")).unwrap();
    draft.add_stop().unwrap();
    draft.add_stop().unwrap();
    draft.reorder_stop(0, 1).unwrap();

    let saved = block_on(draft.save(&gateway)).unwrap();
    assert_eq!(gateway.created.load(Ordering::SeqCst), 1);
    assert_eq!(saved.origin.name, "A");
    assert_eq!(
        *draft.stage(),
        Stage::Saved {
            route_id: "route-1".into()
        }
    );
    // saving keeps the draft for photo attachment
    assert_eq!(draft.stops().len(), 2);

    block_on(draft.finalize(&gateway, None)).unwrap();
    assert_eq!(gateway.uploads.load(Ordering::SeqCst), 0);
    assert_eq!(*draft.stage(), Stage::Collapsed);
    assert_eq!(draft.route_name(), "");
    assert!(draft.origin().is_none());
    assert!(draft.destination().is_none());
    assert!(draft.stops().is_empty());
}

#[test]
fn blank_route_name_gets_a_journey_default() {
    use tokio_test::block_on;

    let gateway = RecordingGateway::default();
    let (mut draft, _) = test_draft();

    draft.select_place(PlaceRole::Origin, hit("A")).unwrap();
    draft.select_place(PlaceRole::Destination, hit("B")).unwrap();

    let saved = block_on(draft.save(&gateway)).unwrap();
    assert!(saved.name.starts_with("Journey "));
}

#[test]
fn finalize_resets_even_when_the_upload_fails() {
    use tokio_test::block_on;

    let gateway = RecordingGateway {
        fail_uploads: true,
        ..RecordingGateway::default()
    };
    let (mut draft, registry) = test_draft();

    draft.select_place(PlaceRole::Origin, hit("A")).unwrap();
    draft.select_place(PlaceRole::Destination, hit("B")).unwrap();
    block_on(draft.save(&gateway)).unwrap();

    draft.select_photos(vec![picked("one.jpg")]);
    assert!(block_on(draft.finalize(&gateway, None)).is_err());

    assert_eq!(gateway.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(*draft.stage(), Stage::Collapsed);
    assert_eq!(registry.active(), 0);
}

#[test]
fn oversized_photo_batch_aborts_finalize_without_reset() {
    use tokio_test::block_on;

    let gateway = RecordingGateway::default();
    let (mut draft, _) = test_draft();

    draft.select_place(PlaceRole::Origin, hit("A")).unwrap();
    draft.select_place(PlaceRole::Destination, hit("B")).unwrap();
    block_on(draft.save(&gateway)).unwrap();

    let batch: Vec<LocalFile> = (0..MAX_UPLOAD_BATCH + 1)
        .map(|i| picked(&format!("{}.jpg", i)))
        .collect();
    draft.select_photos(batch);

    assert!(block_on(draft.finalize(&gateway, None)).is_err());
    assert_eq!(gateway.uploads.load(Ordering::SeqCst), 0);
    // the draft stays in Saved so the user can thin the batch and retry
    assert!(matches!(draft.stage(), Stage::Saved { .. }));
}

#[test]
fn preview_emits_names_without_mutating_the_draft() {
    let (mut draft, _) = test_draft();

    draft.expand();
    assert!(draft.preview_route().is_err());

    draft.set_field(Field::RouteName, "Coast trip");
    draft.set_field(Field::OriginName, "A");
    draft.set_field(Field::DestinationName, "B");
    draft.add_stop().unwrap();

    let preview = draft.preview_route().unwrap();
    assert_eq!(preview.origin, "A");
    assert_eq!(preview.destination, "B");
    assert_eq!(preview.stops.len(), 1);

    // read-only: a second preview sees the same draft
    assert_eq!(draft.preview_route().unwrap(), preview);
    assert_eq!(draft.route_name(), "Coast trip");
}

#[test]
fn selecting_a_place_for_a_stop_keeps_its_identity() {
    let (mut draft, _) = test_draft();
    draft.expand();

    draft.add_stop().unwrap();
    let id = draft.stops()[0].id.clone();

    draft
        .select_place(PlaceRole::Stop { id: id.clone() }, hit("Utrecht"))
        .unwrap();

    let stop = &draft.stops()[0];
    assert_eq!(stop.id, id);
    assert_eq!(stop.name, "Utrecht");
    assert!(stop.is_placed());

    let missing = draft.select_place(PlaceRole::Stop { id: "gone".into() }, hit("Delft"));
    assert!(missing.is_err());
}

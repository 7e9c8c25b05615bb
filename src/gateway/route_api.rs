use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::{reject, Gateway};
use crate::api::{ProgressFn, RouteAPI};
use crate::entities::{
    LocalFile, NewRoute, SavedRoute, UploadUrlInfo, Waypoint, MAX_UPLOAD_BATCH,
};
use crate::error::{invalid_input_error, Error};
use crate::external::object_store;
use crate::http::Request;

#[derive(Deserialize)]
struct CreatedRoute {
    id: String,
}

#[derive(Deserialize)]
struct UploadUrls {
    urls: Vec<UploadUrlInfo>,
}

#[async_trait]
impl RouteAPI for Gateway {
    /// Text-only waypoints are not accepted here: everything submitted
    /// must carry coordinates resolved from a place selection.
    #[tracing::instrument(skip(self, submission), fields(name = %submission.name))]
    async fn create_route(&self, submission: NewRoute) -> Result<SavedRoute, Error> {
        let resolved = std::iter::once(&submission.origin)
            .chain(std::iter::once(&submission.destination))
            .chain(submission.stops.iter())
            .all(Waypoint::is_placed);

        if !resolved {
            return Err(invalid_input_error()
                .with_message("origin, destination and stops need resolved coordinates"));
        }

        let response = self
            .client
            .send(Request::post("/api/routes", serde_json::to_value(&submission)?))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }

        let CreatedRoute { id } = response.decode()?;
        tracing::info!(%id, "route created");

        // the create endpoint answers with the id only; the cached copy is
        // assembled from what was submitted
        Ok(SavedRoute {
            id,
            name: submission.name,
            creator_id: self
                .session
                .profile()
                .map(|profile| profile.email)
                .unwrap_or_default(),
            origin: submission.origin,
            destination: submission.destination,
            stops: submission.stops,
            photos: Vec::new(),
            created_at: Utc::now(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_routes(&self) -> Result<Vec<SavedRoute>, Error> {
        let response = self.client.send(Request::get("/api/routes")).await?;
        if !response.is_success() {
            return Err(reject(&response));
        }
        response.decode()
    }

    #[tracing::instrument(skip(self))]
    async fn get_route_by_id(&self, id: &str) -> Result<SavedRoute, Error> {
        let response = self
            .client
            .send(Request::get(format!("/api/routes/{}", id)))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }
        response.decode()
    }

    #[tracing::instrument(skip(self))]
    async fn delete_route(&self, id: &str) -> Result<(), Error> {
        let response = self
            .client
            .send(Request::delete(format!("/api/routes/{}", id)))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, filenames, content_types), fields(count = filenames.len()))]
    async fn generate_upload_urls(
        &self,
        route_id: &str,
        filenames: &[String],
        content_types: &[String],
    ) -> Result<Vec<UploadUrlInfo>, Error> {
        if filenames.is_empty()
            || filenames.len() > MAX_UPLOAD_BATCH
            || filenames.len() != content_types.len()
        {
            return Err(invalid_input_error());
        }

        let response = self
            .client
            .send(Request::post(
                format!("/api/routes/{}/generate-upload-urls", route_id),
                json!({ "filenames": filenames, "contentTypes": content_types }),
            ))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }

        let UploadUrls { urls } = response.decode()?;
        Ok(urls)
    }

    #[tracing::instrument(skip(self, files, progress), fields(count = files.len()))]
    async fn upload_route_photos(
        &self,
        route_id: &str,
        files: &[LocalFile],
        progress: Option<ProgressFn>,
    ) -> Result<(), Error> {
        let filenames: Vec<String> = files.iter().map(|file| file.name.clone()).collect();
        let content_types: Vec<String> = files
            .iter()
            .map(|file| file.content_type_or_default().to_string())
            .collect();

        let urls = self
            .generate_upload_urls(route_id, &filenames, &content_types)
            .await?;

        object_store::upload_batch(self.client.transport(), files, &urls, progress).await
    }
}

#[test]
fn create_route_requires_resolved_coordinates() {
    use super::{test_gateway, StubBackend};
    use tokio_test::block_on;

    let backend = StubBackend::new(vec![]);
    let (gateway, _) = test_gateway(backend.clone());

    let placed = |name: &str| Waypoint {
        id: name.into(),
        name: name.into(),
        address: None,
        lat: 52.0,
        lng: 4.0,
    };
    let mut text_only = placed("B");
    text_only.lat = 0.0;
    text_only.lng = 0.0;

    let submission = NewRoute {
        name: "Coast trip".into(),
        origin: placed("A"),
        destination: text_only,
        stops: vec![],
    };

    let err = block_on(gateway.create_route(submission)).unwrap_err();
    assert_eq!(err.code, 101);
    // rejected locally, nothing went out
    assert_eq!(backend.calls("/api/routes"), 0);
}

#[test]
fn create_route_assembles_the_cached_copy() {
    use super::{test_gateway, StubBackend};
    use serde_json::json;
    use tokio_test::block_on;

    let backend = StubBackend::new(vec![(
        "/api/routes",
        201,
        json!({ "Message": "Route created successfully", "id": "r-77" }),
    )]);
    let (gateway, _) = test_gateway(backend);

    let placed = |name: &str| Waypoint {
        id: name.into(),
        name: name.into(),
        address: None,
        lat: 52.0,
        lng: 4.0,
    };

    let saved = block_on(gateway.create_route(NewRoute {
        name: "Coast trip".into(),
        origin: placed("A"),
        destination: placed("B"),
        stops: vec![placed("C")],
    }))
    .unwrap();

    assert_eq!(saved.id, "r-77");
    assert_eq!(saved.stops.len(), 1);
    assert!(saved.photos.is_empty());
}

#[test]
fn missing_route_maps_to_not_found() {
    use super::{test_gateway, StubBackend};
    use serde_json::json;
    use tokio_test::block_on;

    let backend = StubBackend::new(vec![(
        "/api/routes/gone",
        404,
        json!({ "message": "route not found" }),
    )]);
    let (gateway, _) = test_gateway(backend);

    let err = block_on(gateway.get_route_by_id("gone")).unwrap_err();
    assert_eq!(err.code, 103);
    assert_eq!(err.message, "route not found");
}

#[test]
fn oversized_upload_batches_are_rejected_locally() {
    use super::{test_gateway, StubBackend};
    use tokio_test::block_on;

    let backend = StubBackend::new(vec![]);
    let (gateway, _) = test_gateway(backend.clone());

    let filenames: Vec<String> = (0..MAX_UPLOAD_BATCH + 1)
        .map(|i| format!("{}.jpg", i))
        .collect();
    let content_types = vec!["image/jpeg".to_string(); filenames.len()];

    let err =
        block_on(gateway.generate_upload_urls("r-1", &filenames, &content_types)).unwrap_err();
    assert_eq!(err.code, 101);
    assert!(backend.log.lock().unwrap().is_empty());
}

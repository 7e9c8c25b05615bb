use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::{reject, Gateway};
use crate::api::ShareAPI;
use crate::entities::{SavedRoute, ShareGrant};
use crate::error::{unauthorized_error, Error};
use crate::http::Request;

#[derive(Deserialize)]
struct ShareResponse {
    #[serde(rename = "shareToken")]
    share_token: String,
    #[serde(rename = "expiresAt", default)]
    expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl ShareAPI for Gateway {
    #[tracing::instrument(skip(self))]
    async fn share_route(
        &self,
        route_id: &str,
        expiry_hours: Option<u32>,
    ) -> Result<ShareGrant, Error> {
        let body = match expiry_hours {
            Some(hours) => json!({ "expiryHours": hours }),
            None => json!({}),
        };

        let response = self
            .client
            .send(Request::post(
                format!("/api/routes/{}/share", route_id),
                body,
            ))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }

        let ShareResponse {
            share_token,
            expires_at,
        } = response.decode()?;

        // the server only hands out the token; the link people actually
        // open is composed against this client's public origin
        let share_url = format!("{}/shared-routes/{}", self.public_origin, share_token);

        Ok(ShareGrant {
            share_token,
            share_url,
            expires_at,
        })
    }

    /// Idempotent from this side: revoking a grant that is already gone
    /// still ends with no active grant, which is what the caller wanted.
    #[tracing::instrument(skip(self))]
    async fn revoke_route_share(&self, route_id: &str) -> Result<(), Error> {
        let response = self
            .client
            .send(Request::delete(format!("/api/routes/{}/share", route_id)))
            .await?;

        if response.is_success() || response.status == 404 {
            return Ok(());
        }
        Err(reject(&response))
    }

    #[tracing::instrument(skip(self))]
    async fn get_shared_route(&self, token: &str) -> Result<SavedRoute, Error> {
        let response = self
            .client
            .send(Request::get(format!("/api/shared-routes/{}", token)))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }
        response.decode()
    }

    #[tracing::instrument(skip(self))]
    async fn join_shared_route(&self, token: &str) -> Result<(), Error> {
        // the guard redirects anonymous visitors to login with the token
        // stashed; reaching this without a session is a bug upstream
        if !self.session.is_authenticated() {
            return Err(unauthorized_error());
        }

        let response = self
            .client
            .send(Request::post(
                format!("/api/shared-routes/{}/join", token),
                json!({}),
            ))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }
        Ok(())
    }
}

#[test]
fn share_url_is_composed_against_the_public_origin() {
    use super::{test_gateway, StubBackend};
    use tokio_test::block_on;

    let backend = StubBackend::new(vec![(
        "/api/routes/r-1/share",
        200,
        json!({ "shareToken": "tok-42", "expiresAt": "2026-09-01T00:00:00Z" }),
    )]);
    let (gateway, _) = test_gateway(backend);

    let grant = block_on(gateway.share_route("r-1", Some(24))).unwrap();
    assert_eq!(grant.share_token, "tok-42");
    assert_eq!(
        grant.share_url,
        "https://journeys.example.com/shared-routes/tok-42"
    );
    assert!(grant.expires_at.is_some());
}

#[test]
fn share_without_expiry_never_expires() {
    use super::{test_gateway, StubBackend};
    use tokio_test::block_on;

    let backend = StubBackend::new(vec![(
        "/api/routes/r-1/share",
        200,
        json!({ "shareToken": "tok-43" }),
    )]);
    let (gateway, _) = test_gateway(backend);

    let grant = block_on(gateway.share_route("r-1", None)).unwrap();
    assert_eq!(grant.expires_at, None);
}

#[test]
fn revoke_is_idempotent() {
    use super::{test_gateway, StubBackend};
    use tokio_test::block_on;

    // first revoke succeeds, the second hits an already-revoked grant
    let backend = StubBackend::new(vec![
        ("/api/routes/r-1/share", 200, json!({})),
        ("/api/routes/r-1/share", 404, json!({ "message": "no active share" })),
    ]);
    let (gateway, _) = test_gateway(backend.clone());

    block_on(gateway.revoke_route_share("r-1")).unwrap();
    block_on(gateway.revoke_route_share("r-1")).unwrap();
    assert_eq!(backend.calls("/api/routes/r-1/share"), 2);
}

#[test]
fn joining_requires_authentication() {
    use super::{test_gateway, StubBackend};
    use tokio_test::block_on;

    let backend = StubBackend::new(vec![]);
    let (gateway, session) = test_gateway(backend.clone());
    session.clear();

    let err = block_on(gateway.join_shared_route("tok-1")).unwrap_err();
    assert_eq!(err.code, 102);
    assert!(backend.log.lock().unwrap().is_empty());
}

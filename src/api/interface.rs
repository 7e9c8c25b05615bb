use async_trait::async_trait;
use std::sync::Arc;

use crate::entities::{LocalFile, NewRoute, SavedRoute, ShareGrant, UploadUrlInfo};
use crate::error::Error;
use crate::session::AuthTokens;

/// Aggregate upload progress callback, fed `completed * 100 / total`.
pub type ProgressFn = Arc<dyn Fn(u32) + Send + Sync>;

#[async_trait]
pub trait RouteAPI {
    async fn create_route(&self, submission: NewRoute) -> Result<SavedRoute, Error>;

    async fn get_routes(&self) -> Result<Vec<SavedRoute>, Error>;

    async fn get_route_by_id(&self, id: &str) -> Result<SavedRoute, Error>;

    async fn delete_route(&self, id: &str) -> Result<(), Error>;

    async fn generate_upload_urls(
        &self,
        route_id: &str,
        filenames: &[String],
        content_types: &[String],
    ) -> Result<Vec<UploadUrlInfo>, Error>;

    /// Requests upload targets for the batch, then PUTs every file
    /// directly to object storage.
    async fn upload_route_photos(
        &self,
        route_id: &str,
        files: &[LocalFile],
        progress: Option<ProgressFn>,
    ) -> Result<(), Error>;
}

#[async_trait]
pub trait ShareAPI {
    async fn share_route(
        &self,
        route_id: &str,
        expiry_hours: Option<u32>,
    ) -> Result<ShareGrant, Error>;

    async fn revoke_route_share(&self, route_id: &str) -> Result<(), Error>;

    async fn get_shared_route(&self, token: &str) -> Result<SavedRoute, Error>;

    async fn join_shared_route(&self, token: &str) -> Result<(), Error>;
}

#[async_trait]
pub trait AuthAPI {
    async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, Error>;

    /// Registers the account; the backend mails a one-time code which
    /// [`AuthAPI::verify_otp`] exchanges for tokens.
    async fn signup(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), Error>;

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<AuthTokens, Error>;

    async fn request_reset(&self, email: &str) -> Result<(), Error>;

    async fn reset_password(
        &self,
        email: &str,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), Error>;

    /// Returns the provider authorization URL to open; the CSRF state it
    /// came with is stashed for the callback to check.
    async fn google_oauth_url(&self) -> Result<String, Error>;

    async fn exchange_oauth_code(&self, code: &str, state: &str) -> Result<AuthTokens, Error>;

    fn logout(&self);
}

pub trait API: RouteAPI + ShareAPI + AuthAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;

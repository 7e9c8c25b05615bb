use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{reject, Gateway};
use crate::api::AuthAPI;
use crate::error::{unauthorized_error, Error};
use crate::http::Request;
use crate::session::AuthTokens;

#[derive(Deserialize)]
struct OAuthUrlResponse {
    auth_url: String,
    state: String,
}

#[async_trait]
impl AuthAPI for Gateway {
    #[tracing::instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, Error> {
        let response = self
            .client
            .send(Request::post(
                "/user/login",
                json!({ "email": email, "password": password }),
            ))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }

        let tokens: AuthTokens = response.decode()?;
        self.session.install(&tokens);
        tracing::info!("logged in");

        Ok(tokens)
    }

    #[tracing::instrument(skip(self, password))]
    async fn signup(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), Error> {
        let response = self
            .client
            .send(Request::post(
                "/user/signup",
                json!({
                    "email": email,
                    "password": password,
                    "first_name": first_name,
                    "last_name": last_name,
                }),
            ))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, otp))]
    async fn verify_otp(&self, email: &str, otp: &str) -> Result<AuthTokens, Error> {
        let response = self
            .client
            .send(Request::post(
                "/user/verify-otp",
                json!({ "email": email, "otp": otp }),
            ))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }

        let tokens: AuthTokens = response.decode()?;
        self.session.install(&tokens);

        Ok(tokens)
    }

    #[tracing::instrument(skip(self))]
    async fn request_reset(&self, email: &str) -> Result<(), Error> {
        let response = self
            .client
            .send(Request::post("/user/request-reset", json!({ "email": email })))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, reset_token, new_password))]
    async fn reset_password(
        &self,
        email: &str,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        let response = self
            .client
            .send(Request::post(
                "/user/reset-password",
                json!({ "email": email, "token": reset_token, "password": new_password }),
            ))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn google_oauth_url(&self) -> Result<String, Error> {
        let response = self
            .client
            .send(Request::get("/user/oauth/google/url"))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }

        let OAuthUrlResponse { auth_url, state } = response.decode()?;
        // the callback checks the round-tripped state against this stash
        self.session.stash_oauth_state(&state);

        Ok(auth_url)
    }

    #[tracing::instrument(skip(self, code, state))]
    async fn exchange_oauth_code(&self, code: &str, state: &str) -> Result<AuthTokens, Error> {
        // CSRF check, local and one-shot: a mismatch burns the stashed
        // state and never reaches the network
        match self.session.take_oauth_state() {
            Some(expected) if expected == state => {}
            _ => return Err(unauthorized_error().with_message("oauth state mismatch")),
        }

        let response = self
            .client
            .send(Request::post(
                "/user/oauth/google/callback",
                json!({ "code": code, "state": state }),
            ))
            .await?;
        if !response.is_success() {
            return Err(reject(&response));
        }

        let tokens: AuthTokens = response.decode()?;
        self.session.install(&tokens);
        tracing::info!("oauth exchange completed");

        Ok(tokens)
    }

    fn logout(&self) {
        self.session.clear();
        tracing::info!("session cleared");
    }
}

#[cfg(test)]
fn token_payload() -> serde_json::Value {
    json!({
        "access_token": "a-1",
        "refresh_token": "r-1",
        "email": "kai@example.com",
        "first_name": "Kai",
        "last_name": "Doe",
    })
}

#[test]
fn login_installs_the_session() {
    use super::{test_gateway, StubBackend};
    use tokio_test::block_on;

    let backend = StubBackend::new(vec![("/user/login", 200, token_payload())]);
    let (gateway, session) = test_gateway(backend);
    session.clear();

    block_on(gateway.login("kai@example.com", "hunter2")).unwrap();

    assert_eq!(session.access_token().as_deref(), Some("a-1"));
    assert_eq!(session.profile().unwrap().first_name, "Kai");

    gateway.logout();
    assert!(!session.is_authenticated());
}

#[test]
fn oauth_state_mismatch_fails_locally() {
    use super::{test_gateway, StubBackend};
    use tokio_test::block_on;

    let backend = StubBackend::new(vec![
        (
            "/user/oauth/google/url",
            200,
            json!({ "auth_url": "https://accounts.example.com/auth", "state": "expected" }),
        ),
        ("/user/oauth/google/callback", 200, token_payload()),
    ]);
    let (gateway, session) = test_gateway(backend.clone());

    block_on(gateway.google_oauth_url()).unwrap();

    let err = block_on(gateway.exchange_oauth_code("code", "tampered")).unwrap_err();
    assert_eq!(err.code, 102);
    // no exchange went out, and the stashed state was burned
    assert_eq!(backend.calls("/user/oauth/google/callback"), 0);
    assert_eq!(session.take_oauth_state(), None);
}

#[test]
fn oauth_exchange_with_matching_state_succeeds() {
    use super::{test_gateway, StubBackend};
    use tokio_test::block_on;

    let backend = StubBackend::new(vec![
        (
            "/user/oauth/google/url",
            200,
            json!({ "auth_url": "https://accounts.example.com/auth", "state": "s-9" }),
        ),
        ("/user/oauth/google/callback", 200, token_payload()),
    ]);
    let (gateway, session) = test_gateway(backend);
    session.clear();

    block_on(gateway.google_oauth_url()).unwrap();
    block_on(gateway.exchange_oauth_code("code", "s-9")).unwrap();

    assert!(session.is_authenticated());
}

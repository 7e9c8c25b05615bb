use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::session::{AuthTokens, SessionStore};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Clone, Debug)]
pub enum Body {
    Empty,
    Json(Value),
    Raw {
        bytes: Vec<u8>,
        content_type: String,
        cache_control: Option<String>,
    },
}

/// An outbound request. `url` is a backend path (`/api/routes`) or an
/// absolute URL for direct-to-object-store traffic.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub body: Body,
    pub bearer: Option<String>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: Body::Empty,
            bearer: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Body::Json(body),
            bearer: None,
        }
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            url: url.into(),
            body: Body::Empty,
            bearer: None,
        }
    }

    pub fn put_raw(
        url: impl Into<String>,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> Self {
        Self {
            method: Method::Put,
            url: url.into(),
            body: Body::Raw {
                bytes,
                content_type: content_type.to_string(),
                cache_control: cache_control.map(str::to_string),
            },
            bearer: None,
        }
    }

    fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

#[derive(Clone, Debug)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_auth_failure(&self) -> bool {
        self.status == 401
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// The human-readable message backends put in error payloads, under
    /// either of the field names this one uses.
    pub fn message(&self) -> Option<String> {
        for key in ["message", "error"] {
            if let Some(text) = self.body.get(key).and_then(Value::as_str) {
                return Some(text.to_string());
            }
        }
        None
    }
}

/// The wire seam. Production traffic goes through [`HttpTransport`]; tests
/// script this trait directly.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, Error>;
}

pub struct HttpTransport {
    base: String,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            http: reqwest::Client::new(),
        }
    }

    fn url_for(&self, url: &str) -> String {
        if url.starts_with("http") {
            url.to_string()
        } else {
            format!("{}{}", self.base, url)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, Error> {
        let url = self.url_for(&request.url);

        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
            Method::Delete => self.http.delete(&url),
        };

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Raw {
                bytes,
                content_type,
                cache_control,
            } => {
                let mut builder = builder.header("Content-Type", content_type).body(bytes);
                if let Some(cache) = cache_control {
                    builder = builder.header("Cache-Control", cache);
                }
                builder
            }
        };

        let res = builder.send().await?;
        let status = res.status().as_u16();
        let text = res.text().await?;

        // object-store PUTs answer with empty or non-JSON bodies
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        Ok(Response { status, body })
    }
}

/// Wraps the transport with bearer-token attachment and a one-shot
/// recovery from authorization failures via the refresh token.
pub struct Client {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    refresh_gate: Mutex<()>,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        Self {
            transport,
            session,
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Sends the request with the stored access token attached. On a 401,
    /// performs at most one refresh-and-retry; the retried request is
    /// never refreshed again, so recursion is structurally impossible. A
    /// failed or unavailable refresh returns the original 401 unmodified.
    pub async fn send(&self, request: Request) -> Result<Response, Error> {
        let access = self.session.access_token();
        let first = self
            .transport
            .send(request.clone().bearer(access.clone()))
            .await?;

        if !first.is_auth_failure() {
            return Ok(first);
        }

        match self.recover(access).await {
            Some(token) => self.transport.send(request.bearer(Some(token))).await,
            None => Ok(first),
        }
    }

    /// One recovery attempt, coalesced across concurrent callers: whoever
    /// holds the gate refreshes, everyone queued behind it reuses the
    /// outcome. Returns a token to retry with, or None when the session
    /// could not be recovered.
    async fn recover(&self, stale: Option<String>) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.session.access_token();
        if current != stale {
            // another caller finished a refresh while we waited
            return current;
        }

        let refresh_token = self.session.refresh_token()?;

        let request = Request::post("/user/refresh", json!({ "refresh_token": refresh_token }));
        let tokens: AuthTokens = match self.transport.send(request).await {
            Ok(response) if response.is_success() => match response.decode() {
                Ok(tokens) => tokens,
                Err(_) => return self.purge_session(),
            },
            _ => return self.purge_session(),
        };

        self.session
            .set_tokens(&tokens.access_token, &tokens.refresh_token);
        tracing::info!("access token refreshed");

        Some(tokens.access_token)
    }

    fn purge_session(&self) -> Option<String> {
        tracing::warn!("token refresh failed, clearing session tokens");
        self.session.clear_tokens();
        None
    }
}

#[cfg(test)]
#[derive(Default)]
struct ScriptedBackend {
    refresh_ok: bool,
    refresh_payload_missing_tokens: bool,
    refresh_calls: std::sync::atomic::AtomicUsize,
    data_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
#[async_trait]
impl Transport for ScriptedBackend {
    async fn send(&self, request: Request) -> Result<Response, Error> {
        use std::sync::atomic::Ordering;

        if request.url == "/user/refresh" {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);

            if !self.refresh_ok {
                return Ok(Response {
                    status: 500,
                    body: Value::Null,
                });
            }
            if self.refresh_payload_missing_tokens {
                return Ok(Response {
                    status: 200,
                    body: json!({ "access_token": "fresh-access" }),
                });
            }
            return Ok(Response {
                status: 200,
                body: json!({
                    "access_token": "fresh-access",
                    "refresh_token": "fresh-refresh",
                }),
            });
        }

        self.data_calls.fetch_add(1, Ordering::SeqCst);

        // only a freshly minted access token is accepted
        match request.bearer.as_deref() {
            Some("fresh-access") => Ok(Response {
                status: 200,
                body: json!({ "ok": true }),
            }),
            _ => Ok(Response {
                status: 401,
                body: Value::Null,
            }),
        }
    }
}

#[cfg(test)]
fn stale_session() -> Arc<SessionStore> {
    let session = Arc::new(SessionStore::new());
    session.set_tokens("stale-access", "valid-refresh");
    session
}

#[test]
fn auth_failure_refreshes_once_and_retries_once() {
    use std::sync::atomic::Ordering;
    use tokio_test::block_on;

    let backend = Arc::new(ScriptedBackend {
        refresh_ok: true,
        ..ScriptedBackend::default()
    });
    let session = stale_session();
    let client = Client::new(backend.clone(), session.clone());

    let response = block_on(client.send(Request::get("/api/routes"))).unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.data_calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.access_token().as_deref(), Some("fresh-access"));
    assert_eq!(session.refresh_token().as_deref(), Some("fresh-refresh"));
}

#[test]
fn failed_refresh_clears_tokens_and_returns_original_response() {
    use std::sync::atomic::Ordering;
    use tokio_test::block_on;

    let backend = Arc::new(ScriptedBackend::default());
    let session = stale_session();
    let client = Client::new(backend.clone(), session.clone());

    let response = block_on(client.send(Request::get("/api/routes"))).unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.data_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.access_token(), None);
    assert_eq!(session.refresh_token(), None);
}

#[test]
fn refresh_payload_without_tokens_counts_as_failure() {
    use tokio_test::block_on;

    let backend = Arc::new(ScriptedBackend {
        refresh_ok: true,
        refresh_payload_missing_tokens: true,
        ..ScriptedBackend::default()
    });
    let session = stale_session();
    let client = Client::new(backend.clone(), session.clone());

    let response = block_on(client.send(Request::get("/api/routes"))).unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(session.access_token(), None);
    assert_eq!(session.refresh_token(), None);
}

#[test]
fn missing_refresh_token_returns_original_unmodified() {
    use std::sync::atomic::Ordering;
    use tokio_test::block_on;

    let backend = Arc::new(ScriptedBackend {
        refresh_ok: true,
        ..ScriptedBackend::default()
    });
    let session = Arc::new(SessionStore::new());
    let client = Client::new(backend.clone(), session.clone());

    let response = block_on(client.send(Request::get("/api/routes"))).unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.data_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_auth_failures_share_one_refresh() {
    use std::sync::atomic::Ordering;
    use tokio_test::block_on;

    let backend = Arc::new(ScriptedBackend {
        refresh_ok: true,
        ..ScriptedBackend::default()
    });
    let session = stale_session();
    let client = Client::new(backend.clone(), session);

    let (left, right) = block_on(async {
        futures::join!(
            client.send(Request::get("/api/routes")),
            client.send(Request::get("/api/my-shared-routes")),
        )
    });

    assert_eq!(left.unwrap().status, 200);
    assert_eq!(right.unwrap().status, 200);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
}

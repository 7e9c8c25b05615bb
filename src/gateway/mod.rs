mod auth_api;
mod route_api;
mod share_api;

use std::sync::Arc;

use crate::api::API;
use crate::config::Config;
use crate::error::{not_found_error, unauthorized_error, upstream_error, Error};
use crate::http::{Client, Response, Transport};
use crate::session::SessionStore;

/// Translates UI intents into backend calls over the authenticated HTTP
/// client and normalizes responses. Expected failures come back as
/// `Err(Error)`, never as panics, so callers branch exactly once.
pub struct Gateway {
    client: Client,
    session: Arc<SessionStore>,
    public_origin: String,
}

impl Gateway {
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            client: Client::new(transport, session.clone()),
            session,
            public_origin: config.public_origin.trim_end_matches('/').to_string(),
        }
    }
}

impl API for Gateway {}

/// Maps a non-2xx backend response onto the error taxonomy, carrying the
/// payload's message through when there is one. Permission failures group
/// with not-found: both get the dedicated "you cannot see this" view.
pub(crate) fn reject(response: &Response) -> Error {
    let err = match response.status {
        401 => unauthorized_error(),
        403 | 404 => not_found_error(),
        _ => upstream_error(),
    };

    match response.message() {
        Some(message) => err.with_message(message),
        None => err,
    }
}

#[cfg(test)]
pub(crate) struct StubBackend {
    responses: std::sync::Mutex<
        std::collections::HashMap<String, std::collections::VecDeque<(u16, serde_json::Value)>>,
    >,
    pub(crate) log: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl StubBackend {
    pub(crate) fn new(script: Vec<(&str, u16, serde_json::Value)>) -> Arc<Self> {
        let mut responses: std::collections::HashMap<
            String,
            std::collections::VecDeque<(u16, serde_json::Value)>,
        > = std::collections::HashMap::new();

        for (url, status, body) in script {
            responses
                .entry(url.to_string())
                .or_default()
                .push_back((status, body));
        }

        Arc::new(Self {
            responses: std::sync::Mutex::new(responses),
            log: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.ends_with(url))
            .count()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl Transport for StubBackend {
    async fn send(&self, request: crate::http::Request) -> Result<Response, Error> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{:?} {}", request.method, request.url));

        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&request.url)
            .and_then(std::collections::VecDeque::pop_front)
            .unwrap_or((404, serde_json::Value::Null));

        Ok(Response { status, body })
    }
}

#[cfg(test)]
pub(crate) fn test_gateway(backend: Arc<StubBackend>) -> (Gateway, Arc<SessionStore>) {
    let session = Arc::new(SessionStore::new());
    session.set_tokens("access", "refresh");

    let config = Config {
        api_base: "https://api.example.com".into(),
        public_origin: "https://journeys.example.com".into(),
    };

    (Gateway::new(&config, backend, session.clone()), session)
}

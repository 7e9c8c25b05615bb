use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// The token payload the backend returns from login, OTP verification,
/// refresh and OAuth exchange. Profile fields are absent on refresh.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Default)]
struct Fields {
    access_token: Option<String>,
    refresh_token: Option<String>,
    profile: Option<Profile>,
    redirect_after_login: Option<String>,
    pending_shared_route_token: Option<String>,
    oauth_state: Option<String>,
}

/// The one piece of shared mutable state in the client: tokens, profile
/// fields, and a few one-shot keys that are cleared on their single
/// intended read. All writers overwrite whole fields; there are no partial
/// merges. The HTTP client, gateway and navigation guards each hold an
/// `Arc<SessionStore>`.
#[derive(Debug, Default)]
pub struct SessionStore {
    fields: Mutex<Fields>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Fields> {
        // a poisoned lock means a panic mid-write; nothing to salvage
        self.fields.lock().unwrap()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.lock().refresh_token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().access_token.is_some()
    }

    /// Overwrites both tokens under one lock acquisition, so no reader can
    /// observe a new access token paired with the old refresh token.
    pub fn set_tokens(&self, access: &str, refresh: &str) {
        let mut fields = self.lock();
        fields.access_token = Some(access.to_string());
        fields.refresh_token = Some(refresh.to_string());
    }

    /// Drops both tokens; downstream guards read this as "logged out".
    pub fn clear_tokens(&self) {
        let mut fields = self.lock();
        fields.access_token = None;
        fields.refresh_token = None;
    }

    /// Stores tokens and profile together, the login/OAuth success path.
    pub fn install(&self, tokens: &AuthTokens) {
        let mut fields = self.lock();
        fields.access_token = Some(tokens.access_token.clone());
        fields.refresh_token = Some(tokens.refresh_token.clone());
        fields.profile = Some(Profile {
            email: tokens.email.clone(),
            first_name: tokens.first_name.clone(),
            last_name: tokens.last_name.clone(),
        });
    }

    pub fn profile(&self) -> Option<Profile> {
        self.lock().profile.clone()
    }

    pub fn set_profile(&self, profile: Profile) {
        self.lock().profile = Some(profile);
    }

    /// Full logout: tokens, profile and every pending one-shot key.
    pub fn clear(&self) {
        *self.lock() = Fields::default();
    }

    pub fn stash_redirect_after_login(&self, path: &str) {
        self.lock().redirect_after_login = Some(path.to_string());
    }

    pub fn take_redirect_after_login(&self) -> Option<String> {
        self.lock().redirect_after_login.take()
    }

    pub fn stash_pending_shared_route_token(&self, token: &str) {
        self.lock().pending_shared_route_token = Some(token.to_string());
    }

    pub fn take_pending_shared_route_token(&self) -> Option<String> {
        self.lock().pending_shared_route_token.take()
    }

    pub fn stash_oauth_state(&self, state: &str) {
        self.lock().oauth_state = Some(state.to_string());
    }

    pub fn take_oauth_state(&self) -> Option<String> {
        self.lock().oauth_state.take()
    }

    /// Exports the durable fields as a key/value map so an embedding shell
    /// can back the store with whatever storage it has. The OAuth state is
    /// deliberately absent: it never outlives the exchange it protects.
    pub fn persist(&self) -> HashMap<String, String> {
        let fields = self.lock();
        let mut map = HashMap::new();

        if let Some(access) = &fields.access_token {
            map.insert("access_token".into(), access.clone());
        }
        if let Some(refresh) = &fields.refresh_token {
            map.insert("refresh_token".into(), refresh.clone());
        }
        if let Some(profile) = &fields.profile {
            map.insert("email".into(), profile.email.clone());
            map.insert("first_name".into(), profile.first_name.clone());
            map.insert("last_name".into(), profile.last_name.clone());
        }
        if let Some(redirect) = &fields.redirect_after_login {
            map.insert("redirectAfterLogin".into(), redirect.clone());
        }
        if let Some(token) = &fields.pending_shared_route_token {
            map.insert("pendingSharedRouteToken".into(), token.clone());
        }

        map
    }

    pub fn restore(&self, map: &HashMap<String, String>) {
        let mut fields = self.lock();
        fields.access_token = map.get("access_token").cloned();
        fields.refresh_token = map.get("refresh_token").cloned();
        fields.profile = map.get("email").map(|email| Profile {
            email: email.clone(),
            first_name: map.get("first_name").cloned().unwrap_or_default(),
            last_name: map.get("last_name").cloned().unwrap_or_default(),
        });
        fields.redirect_after_login = map.get("redirectAfterLogin").cloned();
        fields.pending_shared_route_token = map.get("pendingSharedRouteToken").cloned();
        fields.oauth_state = None;
    }
}

#[test]
fn one_shot_keys_clear_on_read() {
    let store = SessionStore::new();

    store.stash_oauth_state("s-123");
    assert_eq!(store.take_oauth_state().as_deref(), Some("s-123"));
    assert_eq!(store.take_oauth_state(), None);

    store.stash_pending_shared_route_token("tok");
    store.stash_redirect_after_login("/shared-routes/tok");
    assert_eq!(
        store.take_redirect_after_login().as_deref(),
        Some("/shared-routes/tok")
    );
    assert_eq!(store.take_pending_shared_route_token().as_deref(), Some("tok"));
    assert_eq!(store.take_pending_shared_route_token(), None);
}

#[test]
fn install_and_clear() {
    let store = SessionStore::new();

    store.install(&AuthTokens {
        access_token: "a".into(),
        refresh_token: "r".into(),
        email: "kai@example.com".into(),
        first_name: "Kai".into(),
        last_name: "Doe".into(),
    });

    assert!(store.is_authenticated());
    assert_eq!(store.access_token().as_deref(), Some("a"));
    assert_eq!(store.profile().unwrap().email, "kai@example.com");

    store.clear_tokens();
    assert!(!store.is_authenticated());
    // profile survives a token purge, only logout clears it
    assert!(store.profile().is_some());

    store.clear();
    assert!(store.profile().is_none());
}

#[test]
fn persist_skips_oauth_state() {
    let store = SessionStore::new();
    store.set_tokens("a", "r");
    store.stash_oauth_state("csrf");

    let map = store.persist();
    assert_eq!(map.get("access_token").map(String::as_str), Some("a"));
    assert!(!map.contains_key("oauth_state"));

    let restored = SessionStore::new();
    restored.restore(&map);
    assert_eq!(restored.refresh_token().as_deref(), Some("r"));
    assert_eq!(restored.take_oauth_state(), None);
}

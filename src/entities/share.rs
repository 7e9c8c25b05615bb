use chrono::{DateTime, Utc};

/// A revocable grant giving read/contribute access to a saved route. At
/// most one grant is active per route; revoking clears it.
#[derive(Clone, Debug, PartialEq)]
pub struct ShareGrant {
    pub share_token: String,
    /// Composed client-side from the configured public origin; the server
    /// only hands out the token.
    pub share_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

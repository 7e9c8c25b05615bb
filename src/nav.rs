use crate::session::SessionStore;

/// The client-side navigation surface.
#[derive(Clone, Debug, PartialEq)]
pub enum Page {
    Home,
    Login,
    Signup,
    App,
    RouteDetails { id: String },
    RequestReset,
    ResetPassword,
    OAuthCallback,
    SharedRoute { token: String },
    NotFound { path: String },
}

impl Page {
    pub fn parse(path: &str) -> Page {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };

        match trimmed {
            "/" => Page::Home,
            "/login" => Page::Login,
            "/signup" => Page::Signup,
            "/app" => Page::App,
            "/request-reset" => Page::RequestReset,
            "/reset-password" => Page::ResetPassword,
            "/oauth/callback" => Page::OAuthCallback,
            _ => {
                if let Some(id) = trimmed.strip_prefix("/route/") {
                    if !id.is_empty() && !id.contains('/') {
                        return Page::RouteDetails { id: id.into() };
                    }
                }
                if let Some(token) = trimmed.strip_prefix("/shared-routes/") {
                    if !token.is_empty() && !token.contains('/') {
                        return Page::SharedRoute {
                            token: token.into(),
                        };
                    }
                }
                Page::NotFound { path: path.into() }
            }
        }
    }

    pub fn path(&self) -> String {
        match self {
            Page::Home => "/".into(),
            Page::Login => "/login".into(),
            Page::Signup => "/signup".into(),
            Page::App => "/app".into(),
            Page::RouteDetails { id } => format!("/route/{}", id),
            Page::RequestReset => "/request-reset".into(),
            Page::ResetPassword => "/reset-password".into(),
            Page::OAuthCallback => "/oauth/callback".into(),
            Page::SharedRoute { token } => format!("/shared-routes/{}", token),
            Page::NotFound { path } => path.clone(),
        }
    }

    fn requires_auth(&self) -> bool {
        matches!(
            self,
            Page::App | Page::RouteDetails { .. } | Page::SharedRoute { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Access {
    Allow,
    RedirectToLogin,
}

/// Route guard. Visiting a shared-route link while logged out stashes the
/// token and the return path so the join resumes right after login.
pub fn guard(page: &Page, session: &SessionStore) -> Access {
    if !page.requires_auth() || session.is_authenticated() {
        return Access::Allow;
    }

    if let Page::SharedRoute { token } = page {
        session.stash_redirect_after_login(&page.path());
        session.stash_pending_shared_route_token(token);
    }

    Access::RedirectToLogin
}

/// Where to land after a successful login: the stashed return path, or the
/// main planning surface.
pub fn resume_after_login(session: &SessionStore) -> Page {
    match session.take_redirect_after_login() {
        Some(path) => Page::parse(&path),
        None => Page::App,
    }
}

#[test]
fn paths_round_trip() {
    let pages = [
        Page::Home,
        Page::Login,
        Page::App,
        Page::RouteDetails { id: "abc123".into() },
        Page::SharedRoute { token: "tok-9".into() },
        Page::OAuthCallback,
    ];

    for page in pages {
        assert_eq!(Page::parse(&page.path()), page);
    }

    assert!(matches!(Page::parse("/route/"), Page::NotFound { .. }));
    assert!(matches!(Page::parse("/nowhere"), Page::NotFound { .. }));
}

#[test]
fn shared_route_guard_stashes_pending_token() {
    let session = SessionStore::new();
    let page = Page::SharedRoute { token: "tok-1".into() };

    assert_eq!(guard(&page, &session), Access::RedirectToLogin);

    // after login the visit resumes exactly where it left off
    session.set_tokens("a", "r");
    assert_eq!(resume_after_login(&session), page);
    assert_eq!(
        session.take_pending_shared_route_token().as_deref(),
        Some("tok-1")
    );

    // one-shot: a second login does not resume again
    assert_eq!(resume_after_login(&session), Page::App);
    assert_eq!(guard(&page, &session), Access::Allow);
}

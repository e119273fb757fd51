//! Protected-route gating.
//!
//! The guard does not validate anything itself. It reads an [`AuthSnapshot`]
//! taken from the session manager and decides whether the protected output
//! is produced, a placeholder is shown while the session is still being
//! restored, or the visitor is sent to the login page with the requested path
//! remembered for afterwards.

use std::sync::Arc;

use crate::notify::{Notice, Notifier};
use crate::state::AuthSnapshot;

pub const LOGIN_PATH: &str = "/login";
pub const DEFAULT_AFTER_LOGIN: &str = "/admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    /// Path to return to once the visitor has logged in.
    pub from: Option<String>,
    /// Full page navigation rather than an in-app transition.
    pub hard: bool,
}

impl Redirect {
    pub fn to_login(from: &str) -> Self {
        Self { to: LOGIN_PATH.to_string(), from: Some(from.to_string()), hard: false }
    }

    pub fn hard_to_login() -> Self {
        Self { to: LOGIN_PATH.to_string(), from: None, hard: true }
    }
}

/// Where to go after a successful login.
pub fn post_login_target(redirect: Option<&Redirect>) -> String {
    redirect
        .and_then(|r| r.from.as_deref())
        .filter(|from| !from.is_empty() && *from != LOGIN_PATH)
        .unwrap_or(DEFAULT_AFTER_LOGIN)
        .to_string()
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, redirect: &Redirect);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Denied,
    Allowed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    Placeholder,
    Redirect(Redirect),
    Render(T),
}

impl<T> Guarded<T> {
    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Guarded::Redirect(r) => Some(r),
            _ => None,
        }
    }
}

pub struct RouteGuard {
    notifier: Arc<dyn Notifier>,
    state: GuardState,
    denial_notified: bool,
}

impl RouteGuard {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier, state: GuardState::Checking, denial_notified: false }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Starts a fresh navigation attempt to a protected path.
    pub fn begin_navigation(&mut self) {
        self.state = GuardState::Checking;
    }

    pub fn guard<T>(
        &mut self,
        auth: &AuthSnapshot,
        requested_path: &str,
        render_protected: impl FnOnce() -> T,
    ) -> Guarded<T> {
        if auth.is_loading {
            self.state = GuardState::Checking;
            return Guarded::Placeholder;
        }

        if !auth.is_authenticated || !auth.has_token {
            self.state = GuardState::Denied;
            if !self.denial_notified {
                self.denial_notified = true;
                self.notifier.notify(Notice::LoginRequired);
            }
            tracing::debug!(path = requested_path, "Protected route denied");
            return Guarded::Redirect(Redirect::to_login(requested_path));
        }

        self.state = GuardState::Allowed;
        self.denial_notified = false;
        Guarded::Render(render_protected())
    }
}

impl std::fmt::Debug for RouteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGuard")
            .field("state", &self.state)
            .field("denial_notified", &self.denial_notified)
            .finish()
    }
}

/// Path prefixes that sit behind the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRoutes {
    prefixes: Vec<String>,
}

impl ProtectedRoutes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { prefixes: prefixes.into_iter().map(Into::into).collect() }
    }

    /// `/admin` covers `/admin` and `/admin/blogs`, not `/administrator`.
    pub fn is_protected(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        self.prefixes.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

impl Default for ProtectedRoutes {
    fn default() -> Self {
        Self::new(["/dashboard", "/admin"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;

    fn guard() -> (RouteGuard, Arc<MemoryNotifier>) {
        let notifier = Arc::new(MemoryNotifier::new());
        (RouteGuard::new(notifier.clone()), notifier)
    }

    #[test]
    fn test_loading_renders_placeholder_without_deciding() {
        let (mut g, notifier) = guard();
        let out = g.guard(&AuthSnapshot::LOADING, "/dashboard", || "secret");
        assert_eq!(out, Guarded::Placeholder);
        assert_eq!(g.state(), GuardState::Checking);
        assert!(notifier.notices().is_empty());
    }

    #[test]
    fn test_unauthenticated_redirects_with_origin() {
        let (mut g, notifier) = guard();
        let out = g.guard(&AuthSnapshot::ANONYMOUS, "/dashboard", || "secret");
        assert_eq!(out, Guarded::Redirect(Redirect::to_login("/dashboard")));
        assert_eq!(g.state(), GuardState::Denied);
        assert_eq!(notifier.notices(), vec![Notice::LoginRequired]);
    }

    #[test]
    fn test_denial_notice_once_per_loss_of_auth() {
        let (mut g, notifier) = guard();
        g.guard(&AuthSnapshot::ANONYMOUS, "/dashboard", || ());
        g.begin_navigation();
        g.guard(&AuthSnapshot::ANONYMOUS, "/admin/blogs", || ());
        assert_eq!(notifier.count(&Notice::LoginRequired), 1);

        g.guard(&AuthSnapshot::AUTHENTICATED, "/dashboard", || ());
        g.guard(&AuthSnapshot::ANONYMOUS, "/dashboard", || ());
        assert_eq!(notifier.count(&Notice::LoginRequired), 2);
    }

    #[test]
    fn test_authenticated_renders_protected_output() {
        let (mut g, _) = guard();
        assert_eq!(g.guard(&AuthSnapshot::AUTHENTICATED, "/dashboard", || 42), Guarded::Render(42));
        assert_eq!(g.state(), GuardState::Allowed);
    }

    #[test]
    fn test_allowed_to_denied_when_session_cleared() {
        let (mut g, _) = guard();
        g.guard(&AuthSnapshot::AUTHENTICATED, "/dashboard", || ());
        let expired = AuthSnapshot { is_loading: false, is_authenticated: false, has_token: true };
        let out = g.guard(&expired, "/dashboard", || ());
        assert!(out.redirect().is_some());
        assert_eq!(g.state(), GuardState::Denied);
    }

    #[test]
    fn test_token_without_authentication_is_denied() {
        let (mut g, _) = guard();
        let odd = AuthSnapshot { is_loading: false, is_authenticated: true, has_token: false };
        assert!(g.guard(&odd, "/dashboard", || ()).redirect().is_some());
    }

    #[test]
    fn test_render_closure_not_called_when_denied() {
        let (mut g, _) = guard();
        let out: Guarded<()> =
            g.guard(&AuthSnapshot::ANONYMOUS, "/dashboard", || panic!("rendered"));
        assert!(out.redirect().is_some());
    }

    #[test]
    fn test_post_login_target() {
        assert_eq!(post_login_target(Some(&Redirect::to_login("/admin/blogs"))), "/admin/blogs");
        assert_eq!(post_login_target(None), DEFAULT_AFTER_LOGIN);
        assert_eq!(post_login_target(Some(&Redirect::hard_to_login())), DEFAULT_AFTER_LOGIN);
        assert_eq!(post_login_target(Some(&Redirect::to_login(LOGIN_PATH))), DEFAULT_AFTER_LOGIN);
    }

    #[test]
    fn test_protected_prefixes() {
        let routes = ProtectedRoutes::default();
        assert!(routes.is_protected("/dashboard"));
        assert!(routes.is_protected("/admin/blogs?page=2"));
        assert!(!routes.is_protected("/administrator"));
        assert!(!routes.is_protected("/blogs"));
        assert!(!routes.is_protected("/"));
    }
}

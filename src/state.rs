use crate::session::{AdminUser, Session};

/// What observers of the session manager see. Published whole through a
/// watch channel, never field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session: Option<Session>,
    /// True until the restore attempt at start-up has finished.
    pub is_loading: bool,
}

impl SessionState {
    pub fn loading() -> Self {
        Self { session: None, is_loading: true }
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn user(&self) -> Option<&AdminUser> {
        self.session.as_ref().map(|s| &s.user)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::loading()
    }
}

/// Point-in-time view consumed by the route guard. `is_authenticated` has
/// already been checked against the token's expiry when the snapshot is
/// taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub has_token: bool,
}

impl AuthSnapshot {
    pub const LOADING: Self =
        Self { is_loading: true, is_authenticated: false, has_token: false };
    pub const ANONYMOUS: Self =
        Self { is_loading: false, is_authenticated: false, has_token: false };
    pub const AUTHENTICATED: Self =
        Self { is_loading: false, is_authenticated: true, has_token: true };
}

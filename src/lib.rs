//! Session lifecycle for the portfolio admin dashboard.
//!
//! [`SessionManager`] owns the bearer token and the signed-in admin, keeps
//! them in a [`KeyValueStore`], and re-checks the token's expiry on a timer.
//! [`RouteGuard`] turns the manager's state into allow / wait / redirect
//! decisions for protected paths, and [`ApiClient`] is the shared HTTP client
//! whose 401 handling ends sessions from anywhere in the application.

pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod manager;
pub mod notify;
pub mod request;
pub mod session;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod token;

#[cfg(feature = "python")]
mod python;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use error::{ApiError, AuthError, StorageError, TokenError};
pub use guard::{
    GuardState, Guarded, Navigator, ProtectedRoutes, Redirect, RouteGuard, post_login_target,
};
pub use manager::{SessionManager, SessionManagerBuilder};
pub use notify::{MemoryNotifier, Notice, Notifier, TracingNotifier};
pub use request::{ApiClient, AuthApi, HttpAuthApi};
pub use session::{AdminUser, Credentials, Session};
pub use state::{AuthSnapshot, SessionState};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

use std::sync::Arc;

/// Wires a manager to the HTTP login endpoint and a file-backed store, as
/// configured.
pub fn session_from_config(
    config: &SessionConfig,
    notifier: Arc<dyn Notifier>,
) -> Result<SessionManager, reqwest::Error> {
    let api = HttpAuthApi::new(&config.api_base_url, config.request_timeout())?;
    let store = FileStore::new(config.storage_path());
    Ok(SessionManager::builder(Arc::new(api), Arc::new(store))
        .notifier(notifier)
        .revalidate_every(config.revalidate_interval())
        .build())
}

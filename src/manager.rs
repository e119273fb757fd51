//! The session manager: owner of the token and the current user.
//!
//! A manager is an explicit, injectable object. Construct one per
//! application with [`SessionManager::builder`], call [`SessionManager::init`]
//! once at start-up and [`SessionManager::teardown`] when the owner goes
//! away. Clones share the same session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, Result, StorageError};
use crate::notify::{Notice, Notifier, TracingNotifier};
use crate::request::AuthApi;
use crate::session::{AdminUser, Credentials, Session};
use crate::state::{AuthSnapshot, SessionState};
use crate::storage::{KeyValueStore, TOKEN_KEY, USER_KEY};
use crate::token::decode_unexpired;

pub const DEFAULT_REVALIDATE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<SessionState>,
    revalidate_every: Option<Duration>,
    revalidation: Mutex<Option<JoinHandle<()>>>,
    initialized: AtomicBool,
}

pub struct SessionManagerBuilder {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    revalidate_every: Option<Duration>,
}

impl SessionManagerBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// A zero interval turns periodic re-validation off.
    pub fn revalidate_every(mut self, interval: Duration) -> Self {
        self.revalidate_every = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn build(self) -> SessionManager {
        let (state, _) = watch::channel(SessionState::loading());
        SessionManager {
            inner: Arc::new(Inner {
                api: self.api,
                store: self.store,
                notifier: self.notifier,
                clock: self.clock,
                state,
                revalidate_every: self.revalidate_every,
                revalidation: Mutex::new(None),
                initialized: AtomicBool::new(false),
            }),
        }
    }
}

impl SessionManager {
    pub fn builder(api: Arc<dyn AuthApi>, store: Arc<dyn KeyValueStore>) -> SessionManagerBuilder {
        SessionManagerBuilder {
            api,
            store,
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
            revalidate_every: Some(DEFAULT_REVALIDATE_INTERVAL),
        }
    }

    /// Restores a persisted session. Stale or partial state is removed from
    /// storage. `is_loading` flips to false here and only here; later calls
    /// are no-ops that report the current authentication status.
    ///
    /// Periodic re-validation needs a Tokio runtime; without one the restore
    /// still happens but no timer is started.
    pub fn init(&self) -> bool {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return self.is_authenticated();
        }

        let restored = self.inner.restore();
        let authenticated = restored.is_some();
        self.inner.state.send_modify(|state| {
            if restored.is_some() {
                state.session = restored;
            }
            state.is_loading = false;
        });

        if authenticated {
            tracing::info!("Restored persisted session");
            self.start_revalidation();
        } else {
            tracing::debug!("No valid persisted session");
        }
        authenticated
    }

    /// Cancels periodic re-validation. Stored state is left as is so the next
    /// start-up can restore it.
    pub fn teardown(&self) {
        self.inner.cancel_revalidation();
    }

    #[tracing::instrument(skip(self, identifier, secret), fields(email = %identifier.trim()))]
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<()> {
        let email = identifier.trim();
        if email.is_empty() || secret.is_empty() {
            return Err(self.fail_login(AuthError::MissingCredentials));
        }

        self.inner.notifier.notify(Notice::LoggingIn);
        let credentials = Credentials { email: email.to_string(), password: secret.to_string() };

        let response = match self.inner.api.login(&credentials).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = ?e, "Login rejected");
                return Err(self.fail_login(e));
            }
        };

        if let Err(e) = decode_unexpired(&response.token, self.inner.clock.now()) {
            tracing::warn!(error = %e, "Login returned an unusable token");
            self.inner.clear_session();
            return Err(self.fail_login(AuthError::InvalidToken(e)));
        }

        let session = Session { token: response.token, user: response.data.admin };
        if let Err(e) = self.inner.persist(&session) {
            tracing::error!(error = %e, "Failed to persist session");
            return Err(self.fail_login(e.into()));
        }

        let username = session.user.username.clone();
        self.inner.state.send_modify(|state| state.session = Some(session));
        self.inner.notifier.notify(Notice::LoginSuccessful);
        tracing::info!(user = %username, "Login successful");

        self.start_revalidation();
        Ok(())
    }

    /// Ends the session locally. Safe to call with no session.
    pub fn logout(&self) {
        self.inner.clear_session();
        self.inner.notifier.notify(Notice::LoggedOut);
        tracing::info!("Logged out");
    }

    /// Drops the session without the logout notice. Used when the server has
    /// already told us the session is gone.
    pub fn invalidate(&self) {
        self.inner.clear_session();
    }

    /// Checks the persisted token's expiry, clearing the session when it is
    /// missing, unreadable or expired.
    pub fn validate_token(&self) -> bool {
        self.inner.validate_token()
    }

    /// Recomputed on each call from the in-memory session and the clock.
    pub fn is_authenticated(&self) -> bool {
        let state = self.inner.state.borrow();
        state
            .token()
            .is_some_and(|token| decode_unexpired(token, self.inner.clock.now()).is_ok())
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        let (is_loading, has_token) = {
            let state = self.inner.state.borrow();
            (state.is_loading, state.session.is_some())
        };
        AuthSnapshot {
            is_loading,
            is_authenticated: !is_loading && self.is_authenticated(),
            has_token,
        }
    }

    pub fn current_user(&self) -> Option<AdminUser> {
        self.inner.state.borrow().user().cloned()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().token().map(str::to_string)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let token = self.token()?;
        decode_unexpired(&token, self.inner.clock.now()).ok()?.expires_at()
    }

    /// Seconds left on the current token, `None` without a live session.
    pub fn lease_seconds(&self) -> Option<i64> {
        let token = self.token()?;
        let now = self.inner.clock.now();
        decode_unexpired(&token, now).ok().map(|claims| claims.remaining_secs(now))
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.store
    }

    pub fn is_revalidating(&self) -> bool {
        self.inner
            .revalidation
            .lock()
            .map(|handle| handle.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    fn fail_login(&self, err: AuthError) -> AuthError {
        self.inner.notifier.notify(Notice::LoginFailed(err.to_string()));
        err
    }

    fn start_revalidation(&self) {
        let Some(period) = self.inner.revalidate_every else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No Tokio runtime, periodic session re-validation disabled");
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.revalidate_tick() {
                    break;
                }
            }
            tracing::debug!("Session re-validation stopped");
        });

        if let Ok(mut slot) = self.inner.revalidation.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
        tracing::debug!(interval_secs = period.as_secs(), "Session re-validation started");
    }
}

impl Inner {
    fn persisted_token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted token");
                None
            }
        }
    }

    fn validate_token(&self) -> bool {
        let Some(token) = self.persisted_token() else {
            self.clear_session();
            return false;
        };
        match decode_unexpired(&token, self.clock.now()) {
            Ok(_) => true,
            Err(e) => {
                tracing::info!(reason = %e, "Session token no longer valid");
                self.clear_session();
                false
            }
        }
    }

    /// Returns whether the timer should keep running.
    fn revalidate_tick(&self) -> bool {
        if self.persisted_token().is_none() {
            // Ended elsewhere; drop any in-memory leftovers without a notice.
            self.validate_token();
            return false;
        }
        if self.validate_token() {
            return true;
        }
        self.notifier.notify(Notice::SessionExpired);
        false
    }

    fn restore(&self) -> Option<Session> {
        let token = self.persisted_token();
        let user = match self.store.get(USER_KEY) {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted user");
                None
            }
        };

        let session = match (token, user) {
            (Some(token), Some(user)) => match decode_unexpired(&token, self.clock.now()) {
                Ok(_) => match serde_json::from_str::<AdminUser>(&user) {
                    Ok(user) => Some(Session { token, user }),
                    Err(e) => {
                        tracing::warn!(error = %e, "Persisted user record is unreadable");
                        None
                    }
                },
                Err(e) => {
                    tracing::info!(reason = %e, "Persisted token rejected");
                    None
                }
            },
            (None, None) => return None,
            _ => {
                tracing::warn!("Persisted session is incomplete");
                None
            }
        };

        if session.is_none() {
            self.remove_persisted();
        }
        session
    }

    /// Writes both keys. If the second write fails the first is rolled back
    /// to its previous value.
    fn persist(&self, session: &Session) -> Result<(), StorageError> {
        let user = serde_json::to_string(&session.user)?;
        let previous_token = self.store.get(TOKEN_KEY)?;

        self.store.set(TOKEN_KEY, &session.token)?;
        if let Err(e) = self.store.set(USER_KEY, &user) {
            let rollback = match previous_token {
                Some(token) => self.store.set(TOKEN_KEY, &token),
                None => self.store.remove(TOKEN_KEY),
            };
            if let Err(rollback_err) = rollback {
                tracing::error!(
                    error = %rollback_err,
                    "Failed to roll back token after storage error"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    fn remove_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, error = %e, "Failed to remove persisted session key");
            }
        }
    }

    fn clear_session(&self) {
        self.cancel_revalidation();
        self.remove_persisted();
        self.state.send_if_modified(|state| state.session.take().is_some());
    }

    fn cancel_revalidation(&self) {
        let handle = self.revalidation.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_revalidation();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("SessionManager")
            .field("is_loading", &state.is_loading)
            .field("user", &state.user().map(|u| &u.username))
            .field("revalidate_every", &self.inner.revalidate_every)
            .finish()
    }
}

//! User-visible notices (the dashboard's toasts).

use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Transient, shown while the login call is in flight.
    LoggingIn,
    LoginSuccessful,
    LoginFailed(String),
    LoggedOut,
    SessionExpired,
    LoginRequired,
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::LoggingIn => "Logging in...",
            Notice::LoginSuccessful => "Login successful",
            Notice::LoginFailed(msg) => msg,
            Notice::LoggedOut => "Logged out successfully",
            Notice::SessionExpired => "Session expired. Please login again.",
            Notice::LoginRequired => "Please login to access this page",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Notice::LoggingIn => Level::Info,
            Notice::LoginSuccessful | Notice::LoggedOut => Level::Success,
            Notice::LoginFailed(_) | Notice::SessionExpired | Notice::LoginRequired => Level::Error,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Routes notices into the log. Used when nothing renders toasts.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level() {
            Level::Error => tracing::warn!(notice = %notice, "notification"),
            Level::Info | Level::Success => tracing::info!(notice = %notice, "notification"),
        }
    }
}

/// Keeps every notice it receives, in order.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn count(&self, notice: &Notice) -> usize {
        self.notices().iter().filter(|n| *n == notice).count()
    }

    pub fn clear(&self) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.clear();
        }
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}

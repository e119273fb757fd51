use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use clap::{Args, ValueEnum};

use crate::manager::DEFAULT_REVALIDATE_INTERVAL;
use crate::storage::FileStore;

#[derive(Clone, Debug, Args)]
pub struct SessionConfig {
    /// Base URL of the portfolio API; the login endpoint is `<base>/auth/login`
    #[arg(long, env = "FOLIO_API_BASE_URL", default_value = "http://localhost:5000/api")]
    pub api_base_url: String,

    /// Seconds between periodic session checks (0 disables them)
    #[arg(long, env = "FOLIO_REVALIDATE_INTERVAL_SECS", default_value_t = 60)]
    pub revalidate_interval_secs: u64,

    /// HTTP request timeout in seconds (0 means no timeout)
    #[arg(long, env = "FOLIO_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Where the session is persisted between runs
    #[arg(long, env = "FOLIO_STORAGE_PATH")]
    pub storage_path: Option<PathBuf>,

    /// Timezone used when displaying token expiry
    #[arg(long, env = "FOLIO_TIMEZONE", default_value = "UTC")]
    pub timezone: String,
}

impl SessionConfig {
    pub fn revalidate_interval(&self) -> Duration {
        Duration::from_secs(self.revalidate_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage_path.clone().unwrap_or_else(FileStore::default_path)
    }

    /// Falls back to UTC for unknown zone names.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.timezone, "Unknown timezone, using UTC");
            Tz::UTC
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            revalidate_interval_secs: DEFAULT_REVALIDATE_INTERVAL.as_secs(),
            request_timeout_secs: 30,
            storage_path: None,
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "FOLIO_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        session: SessionConfig,
    }

    #[test]
    fn test_defaults_match_library_defaults() {
        let parsed = Harness::parse_from(["folio-auth"]).session;
        let defaults = SessionConfig::default();
        assert_eq!(parsed.revalidate_interval(), defaults.revalidate_interval());
        assert_eq!(parsed.revalidate_interval(), Duration::from_secs(60));
        assert_eq!(parsed.request_timeout_secs, defaults.request_timeout_secs);
    }

    #[test]
    fn test_flags_override() {
        let parsed = Harness::parse_from([
            "folio-auth",
            "--api-base-url",
            "https://api.example.com",
            "--revalidate-interval-secs",
            "15",
            "--timezone",
            "Europe/Paris",
        ])
        .session;
        assert_eq!(parsed.api_base_url, "https://api.example.com");
        assert_eq!(parsed.revalidate_interval(), Duration::from_secs(15));
        assert_eq!(parsed.tz(), chrono_tz::Europe::Paris);
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        let config = SessionConfig { timezone: "Mars/Olympus".into(), ..SessionConfig::default() };
        assert_eq!(config.tz(), Tz::UTC);
    }
}

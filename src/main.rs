use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use termion::color;
use termion::input::TermRead;

use folio_auth::config::TelemetryConfig;
use folio_auth::guard::{
    Guarded, Navigator, ProtectedRoutes, Redirect, RouteGuard, post_login_target,
};
use folio_auth::notify::{Level, Notice, Notifier};
use folio_auth::storage::REDIRECT_KEY;
use folio_auth::{
    ApiClient, AuthError, SessionConfig, SessionManager, session_from_config, telemetry,
};

#[derive(Parser)]
#[command(name = "folio-auth", version, about = "Admin session tool for the portfolio dashboard")]
struct Cli {
    #[command(flatten)]
    session: SessionConfig,

    #[command(flatten)]
    telemetry: TelemetryConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and persist the session
    Login {
        #[arg(long, short)]
        email: Option<String>,
        /// Prompted for (hidden) when omitted
        #[arg(long, short)]
        password: Option<String>,
    },
    /// End the current session
    Logout,
    /// Show the signed-in admin and when the session expires
    Status,
    /// Check whether a dashboard path may be opened
    Open { path: String },
    /// Authenticated GET against the API
    Get { path: String },
    /// Stay in the foreground and re-check the session periodically
    Watch,
}

/// Prints notices to stderr, coloured by level.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        let mut stderr = io::stderr().lock();
        let reset = color::Fg(color::Reset);
        let _ = match notice.level() {
            Level::Success => writeln!(stderr, "{}{notice}{reset}", color::Fg(color::Green)),
            Level::Error => writeln!(stderr, "{}{notice}{reset}", color::Fg(color::Red)),
            Level::Info => writeln!(stderr, "{}{notice}{reset}", color::Fg(color::Blue)),
        };
    }
}

struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, redirect: &Redirect) {
        eprintln!("-> {}", redirect.to);
    }
}

/// Login failures have already been shown by the notifier.
fn already_reported(err: &anyhow::Error) -> bool {
    err.downcast_ref::<AuthError>().is_some()
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.telemetry)?;

    let session = session_from_config(&cli.session, Arc::new(TerminalNotifier))
        .context("Failed to build HTTP client")?;
    session.init();

    let result = match cli.command {
        Command::Login { email, password } => login(&session, email, password).await,
        Command::Logout => {
            session.logout();
            Ok(())
        }
        Command::Status => status(&session, &cli.session),
        Command::Open { path } => open(&session, &path),
        Command::Get { path } => get(&session, &cli.session, &path).await,
        Command::Watch => watch(&session).await,
    };

    session.teardown();
    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if already_reported(&e) => {
            tracing::debug!(error = %e, "Command failed");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e),
    }
}

fn prompt(label: &str, hidden: bool) -> Result<String> {
    let mut stdout = io::stdout().lock();
    let mut stdin = io::stdin().lock();
    write!(stdout, "{label}: ")?;
    stdout.flush()?;

    let line = if hidden { stdin.read_passwd(&mut stdout)? } else { stdin.read_line()? };
    if hidden {
        writeln!(stdout)?;
    }
    line.context("No input")
}

async fn login(
    session: &SessionManager,
    email: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email", false)?,
    };
    let password = match password {
        Some(password) => password,
        None => prompt("Password", true)?,
    };

    session.login(&email, &password).await?;

    let store = session.store();
    let remembered = store.get(REDIRECT_KEY)?.map(|from| Redirect::to_login(&from));
    store.remove(REDIRECT_KEY)?;
    println!("Continue to {}", post_login_target(remembered.as_ref()));
    Ok(())
}

fn status(session: &SessionManager, config: &SessionConfig) -> Result<()> {
    let Some(user) = session.current_user() else {
        println!("Not logged in");
        return Ok(());
    };
    println!("{} <{}> ({})", user.username, user.email, user.role);

    let tz = config.tz();
    match (session.expires_at(), session.lease_seconds()) {
        (Some(expires), Some(remaining)) => {
            let local = expires.with_timezone(&tz);
            println!("Expires {} ({remaining}s left)", local.format("%Y-%m-%d %H:%M:%S %Z"));
        }
        _ => println!("Session expired"),
    }
    Ok(())
}

fn open(session: &SessionManager, path: &str) -> Result<()> {
    if !ProtectedRoutes::default().is_protected(path) {
        println!("{path} is public");
        return Ok(());
    }

    let mut guard = RouteGuard::new(Arc::new(TerminalNotifier));
    let snapshot = session.snapshot();
    match guard.guard(&snapshot, path, || session.current_user()) {
        Guarded::Render(Some(user)) => println!("Opening {path} as {}", user.username),
        Guarded::Render(None) | Guarded::Placeholder => println!("Loading..."),
        Guarded::Redirect(redirect) => {
            if let Some(from) = &redirect.from {
                session.store().set(REDIRECT_KEY, from)?;
            }
            println!("Redirecting to {}", redirect.to);
        }
    }
    Ok(())
}

async fn get(session: &SessionManager, config: &SessionConfig, path: &str) -> Result<()> {
    let client = ApiClient::new(
        &config.api_base_url,
        config.request_timeout(),
        session.clone(),
        Arc::new(TerminalNavigator),
    )?;
    let body = client.get(path).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn watch(session: &SessionManager) -> Result<()> {
    if !session.is_authenticated() {
        bail!("Not logged in");
    }
    let mut rx = session.subscribe();
    tracing::info!(lease_secs = ?session.lease_seconds(), "Watching session");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                return Ok(());
            }
            changed = rx.changed() => {
                if changed.is_err() || rx.borrow_and_update().session.is_none() {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_auth::StorageError;

    #[test]
    fn test_login_errors_are_not_printed_twice() {
        let rejected = anyhow::Error::from(AuthError::Rejected("Invalid credentials".into()));
        assert!(already_reported(&rejected));
        let storage = anyhow::Error::from(AuthError::Storage(StorageError::Poisoned));
        assert!(already_reported(&storage));

        assert!(!already_reported(&anyhow::anyhow!("Not logged in")));
        let wrapped = anyhow::Error::from(StorageError::Poisoned);
        assert!(!already_reported(&wrapped));
    }
}

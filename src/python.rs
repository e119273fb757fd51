//! Python bindings, built with `--features python`.
//!
//! The manager and its runtime are process-wide here because a Python module
//! has no other place to keep them; the Rust API stays injectable.

use std::path::PathBuf;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use tokio::runtime::Runtime;

use crate::config::SessionConfig;
use crate::manager::SessionManager;
use crate::notify::TracingNotifier;

static RUNTIME: Lazy<Result<Runtime, String>> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| e.to_string())
});

static SESSION: Lazy<Mutex<Option<SessionManager>>> = Lazy::new(|| Mutex::new(None));

fn runtime() -> PyResult<&'static Runtime> {
    RUNTIME.as_ref().map_err(|e| PyRuntimeError::new_err(format!("Runtime error: {}", e)))
}

fn session() -> PyResult<SessionManager> {
    let stored = SESSION.lock().map_err(|_| PyRuntimeError::new_err("Session lock poisoned"))?;
    stored.clone().ok_or_else(|| PyRuntimeError::new_err("Not configured. Call configure() first."))
}

#[pyfunction]
#[pyo3(signature = (base_url, storage_path=None, revalidate_interval_secs=60))]
fn configure(
    base_url: String,
    storage_path: Option<String>,
    revalidate_interval_secs: u64,
) -> PyResult<bool> {
    let config = SessionConfig {
        api_base_url: base_url,
        storage_path: storage_path.map(PathBuf::from),
        revalidate_interval_secs,
        ..SessionConfig::default()
    };
    let manager = crate::session_from_config(&config, std::sync::Arc::new(TracingNotifier))
        .map_err(|e| PyRuntimeError::new_err(format!("Client error: {}", e)))?;

    let authenticated = {
        let _guard = runtime()?.enter();
        manager.init()
    };

    let mut stored = SESSION.lock().map_err(|_| PyRuntimeError::new_err("Session lock poisoned"))?;
    if let Some(previous) = stored.replace(manager) {
        previous.teardown();
    }
    Ok(authenticated)
}

#[pyfunction]
fn login(py: Python<'_>, email: String, password: String) -> PyResult<()> {
    let manager = session()?;
    let rt = runtime()?;
    py.allow_threads(|| rt.block_on(manager.login(&email, &password)))
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

#[pyfunction]
fn logout() -> PyResult<()> {
    session()?.logout();
    Ok(())
}

#[pyfunction]
fn validate_token() -> PyResult<bool> {
    Ok(session()?.validate_token())
}

#[pyfunction]
fn is_authenticated() -> PyResult<bool> {
    Ok(session()?.is_authenticated())
}

/// The signed-in admin as a JSON string, or None.
#[pyfunction]
fn current_user() -> PyResult<Option<String>> {
    session()?
        .current_user()
        .map(|user| serde_json::to_string(&user))
        .transpose()
        .map_err(|e| PyRuntimeError::new_err(format!("Invalid JSON: {}", e)))
}

#[pyfunction]
fn lease_token() -> PyResult<i64> {
    session()?
        .lease_seconds()
        .ok_or_else(|| PyRuntimeError::new_err("No live session. Call login() first."))
}

#[pymodule]
fn pyfolioauth(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(configure, m)?)?;
    m.add_function(wrap_pyfunction!(login, m)?)?;
    m.add_function(wrap_pyfunction!(logout, m)?)?;
    m.add_function(wrap_pyfunction!(validate_token, m)?)?;
    m.add_function(wrap_pyfunction!(is_authenticated, m)?)?;
    m.add_function(wrap_pyfunction!(current_user, m)?)?;
    m.add_function(wrap_pyfunction!(lease_token, m)?)?;
    Ok(())
}

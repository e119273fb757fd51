use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::error::{ApiError, AuthError, Result};
use crate::guard::{Navigator, Redirect};
use crate::manager::SessionManager;
use crate::session::{AuthResponse, Credentials, ErrorBody};
use crate::storage::TOKEN_KEY;

const LOGIN_FALLBACK: &str = "Login failed";

/// The authentication endpoint as seen by the session manager.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse>;
}

fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// `POST {base_url}/auth/login` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: Client,
    login_url: String,
}

impl HttpAuthApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self { client: build_client(timeout)?, login_url: join_url(base_url, "auth/login") })
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let res = self
            .client
            .post(&self.login_url)
            .json(credentials)
            .send()
            .await
            .map_err(AuthError::Network)?;

        let status = res.status();
        if !status.is_success() {
            let body: ErrorBody = res.json().await.unwrap_or_default();
            let message = body
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| LOGIN_FALLBACK.to_string());
            tracing::debug!(%status, %message, "Login endpoint returned an error");
            return Err(AuthError::Rejected(message));
        }

        res.json::<AuthResponse>().await.map_err(|e| {
            tracing::warn!(error = %e, "Login response did not match the expected shape");
            AuthError::Rejected(LOGIN_FALLBACK.to_string())
        })
    }
}

/// The dashboard's shared API client. Every request carries the persisted
/// bearer token; any 401 ends the session and sends the user to the login
/// page.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionManager,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session: SessionManager,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            navigator,
        })
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.send(Method::DELETE, path, None).await
    }

    #[tracing::instrument(skip(self, body), fields(method = %method))]
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = join_url(&self.base_url, path);
        let mut req = self.client.request(method, &url);

        match self.session.store().get(TOKEN_KEY) {
            Ok(Some(token)) => req = req.bearer_auth(token),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read token for request"),
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await.map_err(ApiError::Network)?;
        let status = res.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %url, "Request unauthorized, ending session");
            self.session.invalidate();
            self.navigator.navigate(&Redirect::hard_to_login());
            return Err(ApiError::Unauthorized);
        }

        let text = res.text().await.map_err(ApiError::Network)?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(text);
            return Err(ApiError::Status { status: status.as_u16(), message });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("base_url", &self.base_url).finish()
    }
}

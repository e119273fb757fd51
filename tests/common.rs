#![allow(dead_code)]
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use folio_auth::guard::{Navigator, Redirect};
use folio_auth::{HttpAuthApi, MemoryNotifier, MemoryStore, SessionManager};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("folio_auth=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

pub const PASSWORD: &str = "secret";
pub const NO_MESSAGE_EMAIL: &str = "silent@x.com";

pub fn mint(exp: i64) -> String {
    let claims = json!({ "exp": exp, "sub": "1" });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"server-secret")).unwrap()
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

struct Backend {
    token: String,
}

/// Stand-in for the portfolio API: the login endpoint plus one protected
/// resource that only accepts the token it issued.
pub struct TestServer {
    pub base_url: String,
    pub token: String,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_issuing(mint(now() + 3600)).await
    }

    pub async fn spawn_issuing(token: String) -> Self {
        setup_tracing();
        let backend = Arc::new(Backend { token: token.clone() });
        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/blogs", get(blogs).post(create_blog))
            .route("/api/broken", get(broken))
            .with_state(backend);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url: format!("http://{addr}/api"), token }
    }

    pub fn manager(
        &self,
        store: Arc<MemoryStore>,
        notifier: Arc<MemoryNotifier>,
    ) -> SessionManager {
        let api = HttpAuthApi::new(&self.base_url, Duration::from_secs(5)).unwrap();
        SessionManager::builder(Arc::new(api), store)
            .notifier(notifier)
            .revalidate_every(Duration::ZERO)
            .build()
    }
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if email == NO_MESSAGE_EMAIL {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if body["password"] != PASSWORD {
        let body = json!({ "status": "fail", "message": "Invalid credentials" });
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }
    Json(json!({
        "status": "success",
        "token": backend.token,
        "data": { "admin": { "id": "1", "username": "a", "email": email, "role": "admin" } }
    }))
    .into_response()
}

fn is_authorized(backend: &Backend, headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", backend.token);
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(expected.as_str())
}

fn not_authorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Not authorized" }))).into_response()
}

async fn blogs(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !is_authorized(&backend, &headers) {
        return not_authorized();
    }
    Json(json!([{ "title": "Hello" }])).into_response()
}

async fn create_blog(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !is_authorized(&backend, &headers) {
        return not_authorized();
    }
    (StatusCode::CREATED, Json(json!({ "data": body }))).into_response()
}

async fn broken() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "boom" }))).into_response()
}

#[derive(Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<Redirect>>,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<Redirect> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, redirect: &Redirect) {
        self.visits.lock().unwrap().push(redirect.clone());
    }
}

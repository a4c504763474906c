// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mock forum backend for integration tests.
//!
//! A real axum server on an ephemeral port, with per-endpoint call counters
//! and failure toggles so tests can script auth failures, refresh
//! rejections, and slow refreshes.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Signing key for test tokens. The client never verifies signatures, but
/// minting real HS256 tokens keeps the payload layout honest.
#[allow(dead_code)]
pub const TEST_JWT_SECRET: &[u8] = b"test_signing_key_32_bytes_long!!";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    /// Unique per issued token so two tokens minted in the same second differ.
    jti: usize,
}

/// Mint an HS256 token expiring `ttl_secs` from now.
#[allow(dead_code)]
pub fn mint_token(ttl_secs: i64, jti: usize) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as i64;

    let claims = Claims {
        sub: "42".to_string(),
        iat: now,
        exp: now + ttl_secs,
        jti,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .expect("Failed to mint test JWT")
}

/// Shared mock-backend state, inspected and scripted by tests.
pub struct BackendState {
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub business_calls: AtomicUsize,

    /// Refresh endpoint returns 401 when set.
    pub fail_refresh: AtomicBool,
    /// Logout endpoint returns 500 when set.
    pub fail_logout: AtomicBool,
    /// Business endpoints return 401 even for the current token when set.
    pub reject_bearer: AtomicBool,
    /// TTL applied to tokens minted from now on.
    pub token_ttl_secs: AtomicI64,
    /// Artificial latency for the refresh endpoint, to widen the
    /// single-flight window.
    pub refresh_delay_ms: AtomicU64,

    issued: AtomicUsize,
    current_access: Mutex<Option<String>>,
    current_refresh: Mutex<Option<String>>,
}

impl BackendState {
    fn new() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            business_calls: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
            fail_logout: AtomicBool::new(false),
            reject_bearer: AtomicBool::new(false),
            token_ttl_secs: AtomicI64::new(3600),
            refresh_delay_ms: AtomicU64::new(0),
            issued: AtomicUsize::new(0),
            current_access: Mutex::new(None),
            current_refresh: Mutex::new(None),
        }
    }

    /// Mint a fresh pair and make it the pair the backend accepts.
    fn issue(&self) -> (String, String) {
        let jti = self.issued.fetch_add(1, Ordering::SeqCst);
        let access = mint_token(self.token_ttl_secs.load(Ordering::SeqCst), jti);
        let refresh = format!("refresh-{jti}");
        *self.current_access.lock().unwrap() = Some(access.clone());
        *self.current_refresh.lock().unwrap() = Some(refresh.clone());
        (access, refresh)
    }

    #[allow(dead_code)]
    pub fn current_access(&self) -> Option<String> {
        self.current_access.lock().unwrap().clone()
    }
}

/// Handle to a running mock backend.
pub struct TestBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
}

impl TestBackend {
    /// Mint a pair with the given TTL, register it as the pair the backend
    /// accepts, and return it for seeding a client-side credential store.
    #[allow(dead_code)]
    pub fn seed_session(&self, ttl_secs: i64) -> (String, String) {
        let previous = self.state.token_ttl_secs.swap(ttl_secs, Ordering::SeqCst);
        let pair = self.state.issue();
        self.state.token_ttl_secs.store(previous, Ordering::SeqCst);
        pair
    }
}

/// Start the mock backend on an ephemeral port.
#[allow(dead_code)]
pub async fn spawn_backend() -> TestBackend {
    let state = Arc::new(BackendState::new());

    let app = Router::new()
        .route("/users/login", post(login))
        .route("/users/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/widgets", get(widgets))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    TestBackend {
        base_url: format!("http://{addr}"),
        state,
    }
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    username: String,
    #[allow(dead_code)]
    password: String,
}

async fn login(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<LoginBody>,
) -> impl IntoResponse {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    if body.username.is_empty() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "bad credentials"})),
        );
    }
    let (token, refresh_token) = state.issue();
    (
        StatusCode::OK,
        Json(json!({"data": {"token": token, "refreshToken": refresh_token}})),
    )
}

async fn refresh(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if state.fail_refresh.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "refresh rejected"})),
        );
    }

    let presented = body
        .get("refreshToken")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let current = state.current_refresh.lock().unwrap().clone();
    if current.as_deref() != Some(presented) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unknown refresh token"})),
        );
    }

    let (token, refresh_token) = state.issue();
    (
        StatusCode::OK,
        Json(json!({"data": {"token": token, "refreshToken": refresh_token}})),
    )
}

async fn logout(State(state): State<Arc<BackendState>>) -> impl IntoResponse {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    if state.fail_logout.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "boom"})),
        );
    }
    (StatusCode::OK, Json(json!({"success": true, "data": null})))
}

async fn widgets(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> impl IntoResponse {
    state.business_calls.fetch_add(1, Ordering::SeqCst);

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    let current = state.current_access.lock().unwrap().clone();
    let authorized = !state.reject_bearer.load(Ordering::SeqCst)
        && bearer.is_some()
        && bearer == current.as_deref();

    if authorized {
        (
            StatusCode::OK,
            Json(json!({"success": true, "data": ["announcements", "wallet"]})),
        )
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})))
    }
}

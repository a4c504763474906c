// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed API client over the forum REST backend.
//!
//! Every business call goes through two interceptors: before dispatch, an
//! expiring access token is refreshed and attached; after an authorization
//! failure, the call is refreshed-and-retried exactly once. Repeated
//! failures trip a circuit breaker that ends the session. UI code never
//! touches tokens or retry policy -- it sees typed responses, typed errors,
//! and a session event channel.

use crate::auth::credentials::CredentialStore;
use crate::auth::inspect;
use crate::auth::monitor::RefreshMonitor;
use crate::auth::refresh::RefreshCoordinator;
use crate::config::ClientConfig;
use crate::error::{ApiError, AuthError, LogoutReason, Result};
use crate::models::{LoginRequest, TokenEnvelope};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Session lifecycle, observable through [`ApiClient::session_events`].
///
/// `Expired` is the client-side rendition of the front end's forced
/// redirect to the login page with a reason query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    Active,
    Expired(LogoutReason),
}

/// Per-call metadata the interceptors act on.
///
/// `skip_auth_refresh` marks calls that must never recurse into refresh
/// handling (the logout call itself, and anything the embedding app sends
/// unauthenticated). `is_retry` is set internally once a call has been
/// replayed after a refresh, so a call is retried at most once.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    pub skip_auth_refresh: bool,
    is_retry: bool,
}

impl RequestOptions {
    /// Options for calls that bypass all auth refresh handling.
    pub fn skip_auth_refresh() -> Self {
        Self {
            skip_auth_refresh: true,
            is_retry: false,
        }
    }
}

/// The API client. Cheap to clone; all clones share one credential store,
/// one refresh coordinator, and one background monitor (the single-flight
/// guarantee depends on that sharing).
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    monitor: Arc<RefreshMonitor>,
    session_tx: Arc<watch::Sender<SessionState>>,
    refresh_buffer_secs: i64,
}

impl ApiClient {
    /// Build a client from config, creating the credential store from
    /// `config.credentials_path` (memory-only when absent).
    pub fn new(config: ClientConfig) -> Result<Self> {
        let store = match &config.credentials_path {
            Some(path) => CredentialStore::with_file(path.clone()),
            None => CredentialStore::in_memory(),
        };
        Self::with_store(config, Arc::new(store))
    }

    /// Build a client around an existing credential store.
    pub fn with_store(config: ClientConfig, store: Arc<CredentialStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let coordinator = Arc::new(RefreshCoordinator::new(
            http.clone(),
            format!("{}/users/refresh", base_url),
            store.clone(),
            config.failure_threshold,
            config.failure_window,
        ));
        let monitor = Arc::new(RefreshMonitor::new(
            store.clone(),
            coordinator.clone(),
            config.poll_interval,
            config.refresh_buffer_secs,
        ));

        let initial = if store.access_token().is_some() {
            SessionState::Active
        } else {
            SessionState::SignedOut
        };
        let (session_tx, _) = watch::channel(initial);

        Ok(Self {
            http,
            base_url,
            store,
            coordinator,
            monitor,
            session_tx: Arc::new(session_tx),
            refresh_buffer_secs: config.refresh_buffer_secs,
        })
    }

    /// Subscribe to session lifecycle changes. The embedding app reacts to
    /// `Expired` by showing its login view with the carried reason.
    pub fn session_events(&self) -> watch::Receiver<SessionState> {
        self.session_tx.subscribe()
    }

    /// The background monitor. Call `start()` after restoring a persisted
    /// session at startup; `login` starts it automatically.
    pub fn monitor(&self) -> &RefreshMonitor {
        &self.monitor
    }

    /// The shared credential store.
    pub fn credentials(&self) -> Arc<CredentialStore> {
        self.store.clone()
    }

    /// The shared refresh coordinator (exposed for observability).
    pub fn refresh_coordinator(&self) -> Arc<RefreshCoordinator> {
        self.coordinator.clone()
    }

    // ─── Auth surface ────────────────────────────────────────────────────

    /// Authenticate and begin a session. Auth endpoints never pass through
    /// the interceptors, so a failed login cannot trigger refresh handling.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/users/login", self.base_url))
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let envelope: TokenEnvelope = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        self.store
            .save(&envelope.data.token, &envelope.data.refresh_token);
        self.coordinator.reset_failures().await;
        self.monitor.start();
        self.session_tx.send_replace(SessionState::Active);

        tracing::info!(username, "Logged in");
        Ok(())
    }

    /// End the session. The server-side logout is best effort -- its
    /// failure is ignored -- but local credentials are always cleared and
    /// the monitor stopped.
    pub async fn logout(&self) {
        let result = self
            .execute(
                Method::POST,
                "/auth/logout",
                None,
                RequestOptions::skip_auth_refresh(),
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "Server logout failed, clearing local session anyway");
        }

        self.store.clear();
        self.monitor.stop();
        self.session_tx.send_replace(SessionState::SignedOut);
        tracing::info!("Logged out");
    }

    // ─── Typed verbs ─────────────────────────────────────────────────────

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with(path, RequestOptions::default()).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let response = self.execute(Method::GET, path, None, options).await?;
        decode_json(response).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.post_with(path, body, RequestOptions::default()).await
    }

    pub async fn post_with<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T> {
        let body = to_body(body)?;
        let response = self.execute(Method::POST, path, Some(body), options).await?;
        decode_json(response).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = to_body(body)?;
        let response = self
            .execute(Method::PUT, path, Some(body), RequestOptions::default())
            .await?;
        decode_json(response).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .execute(Method::DELETE, path, None, RequestOptions::default())
            .await?;
        decode_json(response).await
    }

    // ─── Interceptors ────────────────────────────────────────────────────

    /// Dispatch one logical call through both interceptors.
    ///
    /// State machine per call: Pending -> Failed(auth) -> Refreshing ->
    /// Retried -> {Succeeded | Failed}; non-auth failures go terminal
    /// directly, and Retried is entered at most once.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        mut options: RequestOptions,
    ) -> Result<reqwest::Response> {
        loop {
            let token = self.prepare_token(&options).await?;

            let mut request = self
                .http
                .request(method.clone(), format!("{}{}", self.base_url, path));
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = request.send().await?;
            if response.status().is_success() {
                // Any success ends the authorization-failure streak.
                if !options.skip_auth_refresh {
                    self.coordinator.reset_failures().await;
                }
                return Ok(response);
            }

            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();

            // Flagged calls get their failure back untouched.
            if options.skip_auth_refresh {
                return Err(status_error(status, body_text));
            }

            let auth_failure =
                status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
            if !auth_failure || options.is_retry {
                return Err(status_error(status, body_text));
            }

            if self.coordinator.circuit_open().await {
                let failures = self.coordinator.failure_count().await;
                tracing::warn!(failures, "Circuit open, forcing logout without refresh");
                return Err(self.force_logout(LogoutReason::TooManyFailures));
            }

            match self.coordinator.refresh().await {
                Ok(_) => {
                    tracing::debug!(%method, path, "Retrying after token refresh");
                    options.is_retry = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Refresh after authorization failure failed");
                    return Err(self.force_logout(logout_reason_for(&e)));
                }
            }
        }
    }

    /// Request interceptor: produce the bearer token to attach, refreshing
    /// first when the stored one is expired or inside the buffer window.
    async fn prepare_token(&self, options: &RequestOptions) -> Result<Option<String>> {
        let credentials = self.store.read();

        // Flagged calls attach whatever is stored, valid or not.
        if options.skip_auth_refresh {
            return Ok(credentials.access_token);
        }

        if let Some(token) = &credentials.access_token {
            if !inspect::is_expired_or_expiring(token, self.refresh_buffer_secs) {
                return Ok(Some(token.clone()));
            }
        } else if credentials.refresh_token.is_none() {
            // Never logged in: send unauthenticated and let the backend
            // decide, rather than manufacturing a session failure.
            return Ok(None);
        }

        match self.coordinator.refresh().await {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!(error = %e, "Pre-request token refresh failed");
                Err(self.force_logout(logout_reason_for(&e)))
            }
        }
    }

    /// Terminal session end: clear credentials directly (no network call),
    /// stop the monitor, and notify subscribers. Returns the error the
    /// aborted call propagates.
    fn force_logout(&self, reason: LogoutReason) -> ApiError {
        self.store.clear();
        self.monitor.stop();
        self.session_tx.send_replace(SessionState::Expired(reason));
        tracing::warn!(%reason, "Session forcibly ended");
        ApiError::SessionExpired { reason }
    }
}

fn logout_reason_for(error: &AuthError) -> LogoutReason {
    match error {
        AuthError::CircuitOpen => LogoutReason::TooManyFailures,
        AuthError::NoRefreshToken | AuthError::RefreshRejected(_) => LogoutReason::RefreshFailed,
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

fn status_error(status: StatusCode, body: String) -> ApiError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ApiError::Authorization { status, body }
    } else {
        ApiError::Http { status, body }
    }
}

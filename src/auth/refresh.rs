// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-flight token refresh.
//!
//! At most one refresh network call is outstanding at any instant. Callers
//! that arrive while one is in flight park on a oneshot waiter and receive
//! that cycle's outcome verbatim, so every caller of a cycle observes the
//! same result and never a partially-updated credential store.

use crate::auth::credentials::CredentialStore;
use crate::error::AuthError;
use crate::models::{RefreshRequest, TokenEnvelope};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};

/// Outcome broadcast to every caller of one refresh cycle.
type RefreshOutcome = Result<String, AuthError>;

/// Mutable coordination state. All lock sections are synchronous; the
/// network call happens outside the lock.
struct RefreshState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    failure_count: u32,
    window_started: Instant,
}

/// Coordinates token refresh across the request interceptor, the response
/// interceptor, and the background monitor. One instance per client,
/// shared by `Arc` -- the single-flight guarantee only holds through a
/// single shared instance.
pub struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<CredentialStore>,
    state: Mutex<RefreshState>,
    failure_threshold: u32,
    failure_window: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        http: reqwest::Client,
        refresh_url: String,
        store: Arc<CredentialStore>,
        failure_threshold: u32,
        failure_window: Duration,
    ) -> Self {
        Self {
            http,
            refresh_url,
            store,
            state: Mutex::new(RefreshState {
                in_flight: false,
                waiters: Vec::new(),
                failure_count: 0,
                window_started: Instant::now(),
            }),
            failure_threshold,
            failure_window,
        }
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Joins the in-flight cycle when one exists; otherwise dispatches the
    /// network call itself. On success the new pair is persisted before any
    /// waiter is released; on failure the store is cleared and every waiter
    /// receives the same error.
    pub async fn refresh(&self) -> RefreshOutcome {
        let waiter = {
            let mut state = self.state.lock().await;
            self.tick_window(&mut state);
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else if state.failure_count >= self.failure_threshold {
                // Breaker open: no further refresh attempts until the
                // window resets or a call succeeds.
                return Err(AuthError::CircuitOpen);
            } else {
                state.in_flight = true;
                state.failure_count += 1;
                None
            }
        };

        if let Some(rx) = waiter {
            tracing::debug!("Joining in-flight token refresh");
            return match rx.await {
                Ok(outcome) => outcome,
                // The refreshing task was dropped mid-cycle (client teardown).
                Err(_) => Err(AuthError::RefreshRejected("refresh cycle abandoned".to_string())),
            };
        }

        let outcome = self.dispatch().await;
        self.settle(&outcome).await;
        outcome
    }

    /// The actual network call. Persists the new pair on success.
    async fn dispatch(&self) -> RefreshOutcome {
        let refresh_token = self
            .store
            .refresh_token()
            .ok_or(AuthError::NoRefreshToken)?;

        tracing::debug!("Refreshing access token");

        let response = self
            .http
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| AuthError::RefreshRejected(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Token refresh rejected");
            return Err(AuthError::RefreshRejected(format!("HTTP {}: {}", status, body)));
        }

        let envelope: TokenEnvelope = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshRejected(format!("Malformed refresh response: {}", e)))?;

        // Persist before anyone is released, so no waiter can observe the
        // old pair alongside the new token.
        self.store
            .save(&envelope.data.token, &envelope.data.refresh_token);

        tracing::info!("Access token refreshed");
        Ok(envelope.data.token)
    }

    /// Close out a cycle: flip `in_flight`, clear credentials on failure,
    /// and drain every waiter with this cycle's outcome.
    async fn settle(&self, outcome: &RefreshOutcome) {
        if outcome.is_err() {
            self.store.clear();
        }
        let waiters = {
            let mut state = self.state.lock().await;
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            // A waiter that gave up (dropped receiver) is fine to skip.
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Whether the circuit breaker is open: `failure_threshold` refresh
    /// cycles were dispatched without an intervening successful retry or
    /// window reset.
    pub async fn circuit_open(&self) -> bool {
        let mut state = self.state.lock().await;
        self.tick_window(&mut state);
        state.failure_count >= self.failure_threshold
    }

    /// Current consecutive-failure count (after applying the window reset).
    pub async fn failure_count(&self) -> u32 {
        let mut state = self.state.lock().await;
        self.tick_window(&mut state);
        state.failure_count
    }

    /// Reset the failure counter; called when a retried call succeeds,
    /// proving the refreshed token is actually accepted.
    pub async fn reset_failures(&self) {
        let mut state = self.state.lock().await;
        state.failure_count = 0;
        state.window_started = Instant::now();
    }

    /// Leaky-bucket reset: the counter drops to zero once per wall-clock
    /// window regardless of outcomes, so stale failures cannot trip the
    /// breaker minutes later.
    fn tick_window(&self, state: &mut RefreshState) {
        if state.window_started.elapsed() >= self.failure_window {
            state.failure_count = 0;
            state.window_started = Instant::now();
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_url", &self.refresh_url)
            .field("failure_threshold", &self.failure_threshold)
            .finish()
    }
}

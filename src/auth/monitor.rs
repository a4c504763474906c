// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Proactive background token refresh.
//!
//! A single polling task refreshes the access token shortly before it
//! expires so that ordinary traffic rarely observes an expired token. Fully
//! expired tokens are deliberately left alone here; the interceptors handle
//! those on the next request.

use crate::auth::credentials::CredentialStore;
use crate::auth::inspect;
use crate::auth::refresh::RefreshCoordinator;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Owns the polling task. One instance per client; `start` is idempotent
/// and `stop` is safe to call at any time.
pub struct RefreshMonitor {
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    poll_interval: Duration,
    buffer_secs: i64,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshMonitor {
    pub fn new(
        store: Arc<CredentialStore>,
        coordinator: Arc<RefreshCoordinator>,
        poll_interval: Duration,
        buffer_secs: i64,
    ) -> Self {
        Self {
            store,
            coordinator,
            poll_interval,
            buffer_secs,
            handle: Mutex::new(None),
        }
    }

    /// Start polling. Any previously started task is aborted first, so
    /// calling this twice leaves exactly one active timer.
    pub fn start(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = handle.take() {
            previous.abort();
        }

        let store = self.store.clone();
        let coordinator = self.coordinator.clone();
        let poll_interval = self.poll_interval;
        let buffer_secs = self.buffer_secs;

        tracing::debug!(interval_secs = poll_interval.as_secs_f64(), "Starting refresh monitor");

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                poll_once(&store, &coordinator, buffer_secs).await;
            }
        }));
    }

    /// Stop polling. No-op when not running.
    pub fn stop(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(task) = handle.take() {
            task.abort();
            tracing::debug!("Refresh monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        let handle = self.handle.lock().unwrap_or_else(|p| p.into_inner());
        handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RefreshMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One polling step: refresh only when the token is alive but inside the
/// expiry buffer. Missing, undecodable, or already-expired tokens are left
/// for the interceptors.
async fn poll_once(store: &CredentialStore, coordinator: &RefreshCoordinator, buffer_secs: i64) {
    let Some(token) = store.access_token() else {
        return;
    };
    match inspect::remaining_seconds(&token) {
        Some(remaining) if remaining > 0 && remaining < buffer_secs => {
            tracing::debug!(remaining, "Token expiring soon, refreshing proactively");
            if let Err(e) = coordinator.refresh().await {
                // The interceptors own the terminal handling; the monitor
                // just stops being useful until the next login.
                tracing::warn!(error = %e, "Proactive refresh failed");
            }
        }
        _ => {}
    }
}

impl std::fmt::Debug for RefreshMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshMonitor")
            .field("poll_interval", &self.poll_interval)
            .field("buffer_secs", &self.buffer_secs)
            .field("running", &self.is_running())
            .finish()
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Redundant credential storage.
//!
//! The web front end keeps the token pair in two places at once (durable
//! local storage plus a session cookie) and treats them as one logical
//! value. This module keeps that shape: a [`CredentialStore`] writes every
//! backend on save, reads in priority order, and clears all backends on
//! logout even when one of them fails. Callers never reason about a
//! particular backend.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// One storage location for credential fields.
pub trait CredentialBackend: Send + Sync {
    /// Backend name, for logging only.
    fn name(&self) -> &'static str;

    fn read(&self, key: &str) -> Option<String>;

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()>;

    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// The token pair as read back from storage. A `None` field was found in no
/// backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Ordered list of backends behind one save/read/clear surface.
///
/// The first backend is the priority read source; later backends are
/// consulted per-field only when earlier ones come up empty.
pub struct CredentialStore {
    backends: Vec<Box<dyn CredentialBackend>>,
}

impl CredentialStore {
    pub fn new(backends: Vec<Box<dyn CredentialBackend>>) -> Self {
        Self { backends }
    }

    /// Durable file store backed by an in-memory fallback.
    pub fn with_file(path: PathBuf) -> Self {
        Self::new(vec![
            Box::new(FileBackend::new(path)),
            Box::new(MemoryBackend::default()),
        ])
    }

    /// Memory-only store (tests, or callers that never persist sessions).
    pub fn in_memory() -> Self {
        Self::new(vec![Box::new(MemoryBackend::default())])
    }

    /// Write both tokens to every backend, best effort. After a fully
    /// successful save all backends hold the same pair; a backend that
    /// errors is logged and skipped.
    pub fn save(&self, access_token: &str, refresh_token: &str) {
        for backend in &self.backends {
            if let Err(e) = backend.write(ACCESS_TOKEN_KEY, access_token) {
                tracing::warn!(backend = backend.name(), error = %e, "Failed to store access token");
            }
            if let Err(e) = backend.write(REFRESH_TOKEN_KEY, refresh_token) {
                tracing::warn!(backend = backend.name(), error = %e, "Failed to store refresh token");
            }
        }
    }

    /// Read both fields, each resolved independently in priority order.
    pub fn read(&self) -> Credentials {
        Credentials {
            access_token: self.read_field(ACCESS_TOKEN_KEY),
            refresh_token: self.read_field(REFRESH_TOKEN_KEY),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read_field(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_field(REFRESH_TOKEN_KEY)
    }

    /// Remove both tokens from every backend. Never fails loudly: every
    /// backend is attempted even when an earlier one errors.
    pub fn clear(&self) {
        for backend in &self.backends {
            for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
                if let Err(e) = backend.remove(key) {
                    tracing::warn!(backend = backend.name(), key, error = %e, "Failed to clear credential");
                }
            }
        }
    }

    fn read_field(&self, key: &str) -> Option<String> {
        self.backends.iter().find_map(|b| b.read(key))
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field(
                "backends",
                &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Durable backend: a small JSON object on disk.
pub struct FileBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> HashMap<String, String> {
        let Ok(bytes) = fs::read(&self.path) else {
            return HashMap::new();
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                .collect(),
            _ => HashMap::new(),
        }
    }

    fn persist(&self, map: &HashMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(map)?)?;
        Ok(())
    }
}

impl CredentialBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn read(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        self.load().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut map = self.load();
        map.insert(key.to_string(), value.to_string());
        self.persist(&map)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut map = self.load();
        if map.remove(key).is_some() || self.path.exists() {
            self.persist(&map)?;
        }
        Ok(())
    }
}

/// Process-local backend; the stand-in for the front end's session cookie.
#[derive(Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl CredentialBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn read(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.remove(key);
        Ok(())
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session credential handling: storage, inspection, refresh, monitoring.

pub mod credentials;
pub mod inspect;
pub mod monitor;
pub mod refresh;

pub use credentials::{CredentialBackend, CredentialStore, Credentials, FileBackend, MemoryBackend};
pub use inspect::TokenClaims;
pub use monitor::RefreshMonitor;
pub use refresh::RefreshCoordinator;

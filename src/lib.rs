// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Forum API client with transparent session handling.
//!
//! This crate wraps the forum's REST backend in a typed client that manages
//! the JWT session on behalf of its callers: credentials are stored
//! redundantly, expiring access tokens are refreshed proactively (with a
//! single in-flight refresh shared by all concurrent requests), calls that
//! fail authorization are retried exactly once, and repeated failures end
//! the session through a circuit breaker. Consumers see only typed request
//! functions, typed errors, and a session event channel.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;

pub use client::{ApiClient, RequestOptions, SessionState};
pub use config::ClientConfig;
pub use error::{ApiError, AuthError, LogoutReason};
pub use models::{ApiResponse, TokenPair};

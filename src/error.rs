// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client error types covering transport, authorization, and session failures.

use reqwest::StatusCode;

/// Why a session was forcibly ended.
///
/// Carried on the session event channel so the embedding UI can show the
/// right message on its login view (the value doubles as the query-string
/// reason the web front end appends to the login redirect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// Circuit breaker tripped: too many consecutive authorization failures.
    TooManyFailures,
    /// The refresh endpoint rejected the refresh token (or none was stored).
    RefreshFailed,
}

impl LogoutReason {
    /// Query-string spelling used by the web front end.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutReason::TooManyFailures => "too_many_failures",
            LogoutReason::RefreshFailed => "refresh_failed",
        }
    }
}

impl std::fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of the token refresh cycle itself.
///
/// Cloneable because one refresh outcome is broadcast to every caller that
/// joined the in-flight cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("refresh rejected: {0}")]
    RefreshRejected(String),

    #[error("too many consecutive authorization failures")]
    CircuitOpen,
}

/// Errors surfaced to callers of the API client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The session was forcibly ended; credentials are already cleared and a
    /// session event was emitted. Not recoverable by retrying.
    #[error("session expired ({reason})")]
    SessionExpired { reason: LogoutReason },

    /// A call failed with 401/403 and could not be recovered by a retry.
    #[error("authorization failure: HTTP {status}")]
    Authorization { status: StatusCode, body: String },

    /// Any non-auth HTTP failure, propagated untouched for the UI to display.
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("response decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// True for 401/403 failures, the only class the response interceptor
    /// may recover from.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, ApiError::Authorization { .. })
    }
}

/// Result type alias for client calls.
pub type Result<T> = std::result::Result<T, ApiError>;

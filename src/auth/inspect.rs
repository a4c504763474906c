// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unverified JWT payload inspection.
//!
//! The client only needs the expiry claim to decide when to refresh, so the
//! payload segment is decoded without any signature check. The backend
//! remains the authority on whether a token is actually valid.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;

/// Claims the client cares about. Unknown claims are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Subject (user identifier).
    #[serde(default)]
    pub sub: String,
    /// Issued at (Unix timestamp).
    #[serde(default)]
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

/// Decode a JWT's payload segment. Any structurally invalid input yields
/// `None`; parse failures never escape this boundary.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    // Tolerate both padded and unpadded base64url encodings.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Seconds until the token expires; `None` when it cannot be decoded.
pub fn remaining_seconds(token: &str) -> Option<i64> {
    decode_claims(token).map(|claims| claims.exp - chrono::Utc::now().timestamp())
}

/// Whether the token is expired, expiring within `buffer_secs`, or
/// undecodable (which counts as expired).
pub fn is_expired_or_expiring(token: &str, buffer_secs: i64) -> bool {
    match remaining_seconds(token) {
        Some(remaining) => remaining <= buffer_secs,
        None => true,
    }
}

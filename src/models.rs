// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wire types for the forum REST backend.

use serde::{Deserialize, Serialize};

/// Credentials sent to `POST /users/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Access/refresh token pair as the backend serializes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token (a JWT).
    pub token: String,
    /// Longer-lived token, only ever sent to the refresh endpoint.
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Envelope the auth endpoints (`/users/login`, `/users/refresh`) wrap a
/// token pair in.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEnvelope {
    pub data: TokenPair,
}

/// Body sent to `POST /users/refresh`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Envelope every business endpoint responds with. UI code reads only
/// `success` and `data`; tokens and retry policy never leak past the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

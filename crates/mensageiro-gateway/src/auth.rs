// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for bridge requests.
//!
//! When no token is configured, every request is rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

#[derive(Clone)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    /// Checks an `Authorization` header value against the configured token.
    pub fn accepts(&self, header: Option<&str>) -> bool {
        let Some(expected) = self.bearer_token.as_deref() else {
            return false;
        };
        header
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected)
    }
}

pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.bearer_token.is_none() {
        tracing::error!("gateway has no bearer token configured, rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());
    if auth.accepts(header) {
        Ok(next.run(request).await)
    } else {
        tracing::debug!("bridge request with missing or wrong token");
        Err(StatusCode::UNAUTHORIZED)
    }
}

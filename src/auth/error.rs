// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors raised while authenticating a request.
//!
//! Every variant except [`AuthError::InternalError`] is a 401; the body
//! carries a stable `error_code` so clients can tell an expired session
//! from a revoked one.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingAuthHeader,

    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,

    #[error("Token is malformed")]
    MalformedToken,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Session has expired, please log in again")]
    TokenExpired,

    #[error("Session was ended by logout")]
    TokenRevoked,

    /// The token is valid but its customer record is gone.
    #[error("Customer for this token no longer exists")]
    UnknownCustomer,

    #[error("Internal authentication error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody<'a> {
    error: String,
    error_code: &'a str,
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingAuthHeader => "missing_auth_header",
            Self::InvalidAuthHeader => "invalid_auth_header",
            Self::MalformedToken => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenExpired => "token_expired",
            Self::TokenRevoked => "token_revoked",
            Self::UnknownCustomer => "unknown_customer",
            Self::InternalError(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        if matches!(self, Self::InternalError(_)) {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::UNAUTHORIZED
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::InternalError(detail) => {
                error!(error = %detail, "Authentication failed internally");
                "Internal authentication error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(AuthErrorBody {
            error: message,
            error_code: self.error_code(),
        });
        (status, body).into_response()
    }
}

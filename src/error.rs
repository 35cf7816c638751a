// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::pdf::PdfError;
use crate::storage::{FileError, StoreError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Per-field validation messages.
    pub fields: Option<BTreeMap<String, String>>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<BTreeMap<String, String>>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fields: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    /// An upstream service (payment gateway) failed.
    pub fn failed_dependency(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FAILED_DEPENDENCY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 400 carrying a map of field name to message.
    pub fn validation(fields: BTreeMap<String, String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Validation failed".to_string(),
            fields: Some(fields),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            fields: self.fields,
        });
        (self.status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::not_found(format!("Not found: {what}")),
            StoreError::Conflict(what) => Self::conflict(what),
            StoreError::InvalidState(reason) => Self::bad_request(reason),
            StoreError::InsufficientFunds => Self::unprocessable("Insufficient balance"),
            other => {
                error!(error = %other, "Database operation failed");
                Self::internal("Internal storage error")
            }
        }
    }
}

impl From<FileError> for ApiError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotFound(_) => Self::not_found("File not found"),
            FileError::AlreadyExists(_) => Self::conflict("File already exists"),
            other => {
                error!(error = %other, "File storage operation failed");
                Self::internal("Internal storage error")
            }
        }
    }
}

impl From<PdfError> for ApiError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::Write(reason) => {
                error!(error = %reason, "Failed to write PDF");
                Self::internal("Failed to produce PDF")
            }
            other => Self::bad_request(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let unp = ApiError::unprocessable("oops");
        assert_eq!(unp.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unp.message, "oops");

        assert_eq!(
            ApiError::failed_dependency("gateway").status,
            StatusCode::FAILED_DEPENDENCY
        );
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[tokio::test]
    async fn validation_errors_include_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("email".to_string(), "Invalid email".to_string());
        let response = ApiError::validation(fields).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["fields"]["email"], "Invalid email");
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let nf: ApiError = StoreError::NotFound("customer".into()).into();
        assert_eq!(nf.status, StatusCode::NOT_FOUND);

        let conflict: ApiError = StoreError::Conflict("dup".into()).into();
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let state: ApiError = StoreError::InvalidState("already signed".into()).into();
        assert_eq!(state.status, StatusCode::BAD_REQUEST);
        assert_eq!(state.message, "already signed");

        let funds: ApiError = StoreError::InsufficientFunds.into();
        assert_eq!(funds.status, StatusCode::UNPROCESSABLE_ENTITY);

        let overflow: ApiError = StoreError::BalanceOverflow.into();
        assert_eq!(overflow.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn pdf_input_errors_are_bad_requests() {
        let encrypted: ApiError = PdfError::Encrypted.into();
        assert_eq!(encrypted.status, StatusCode::BAD_REQUEST);

        let write: ApiError = PdfError::Write("disk".into()).into();
        assert_eq!(write.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}

// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod auth;
pub mod cron;
pub mod dashboard;
pub mod staff;
pub mod tasks;

use axum::{
    extract::{
        FromRequest, FromRequestParts, Json,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::auth::{LoginError, PasswordError, SessionError};

// --- Custom Error Handling ---
// Internal errors (e.g., from the database) become a generic 500; everything
// the caller can act on keeps its own status and message.

/// Our custom error type for the application.
#[derive(Debug)]
pub struct AppError {
    code: StatusCode,
    message: String,
    errors: Vec<String>,
}

impl AppError {
    pub fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            errors: Vec::new(),
        }
    }

    /// 400 carrying the full list of validation problems.
    pub fn validation(errors: Vec<String>) -> Self {
        Self {
            code: StatusCode::BAD_REQUEST,
            message: "Validation failed".to_string(),
            errors,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn forbidden(message: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: &str) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// JSON body extractor whose decode failures come back as a 400 validation
/// error instead of axum's plain-text 422.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Query-string counterpart of [`AppJson`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(vec![rejection.body_text()])
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(vec![rejection.body_text()])
    }
}

/// Allows converting an `anyhow::Error` (coming from `database`) into our `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Log the internal error for debugging.
        tracing::error!("Internal server error: {:?}", err);
        Self::internal()
    }
}

impl From<LoginError> for AppError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::InvalidCredentials => Self::new(StatusCode::UNAUTHORIZED, &err.to_string()),
            LoginError::AccountDisabled => Self::new(StatusCode::FORBIDDEN, &err.to_string()),
            LoginError::AccountLocked => Self::new(StatusCode::LOCKED, &err.to_string()),
            LoginError::Internal(inner) => inner.into(),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        tracing::error!("Password hashing failed: {}", err);
        Self::internal()
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        tracing::error!("Session token failure: {}", err);
        Self::internal()
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.code.is_server_error() {
            tracing::error!(
                "Responding with error: status_code={}, message={}",
                self.code.as_u16(),
                self.message
            );
        } else {
            tracing::debug!(
                "Responding with error: status_code={}, message={}",
                self.code.as_u16(),
                self.message
            );
        }

        let body = if self.errors.is_empty() {
            serde_json::json!({ "message": self.message })
        } else {
            serde_json::json!({ "errors": self.errors })
        };
        (self.code, Json(body)).into_response()
    }
}

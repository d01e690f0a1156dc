//! Error taxonomy and its HTTP representation.
//!
//! Bodies follow the shapes clients of the accounts API already expect:
//! field validation problems are reported as `{"field": ["message", ...]}`,
//! everything else as `{"detail": "...", "code": "..."}`.

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub const FIELD_REQUIRED: &str = "This field is required.";
pub const FIELD_BLANK: &str = "This field may not be blank.";

/// Per-field validation messages, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("{detail}")]
    AuthenticationFailed {
        detail: String,
        code: Option<&'static str>,
    },

    #[error("{0}")]
    NotImplemented(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    pub fn authentication_failed(detail: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            detail: detail.into(),
            code: None,
        }
    }

    pub fn token_not_valid(detail: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            detail: detail.into(),
            code: Some("token_not_valid"),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotAuthenticated | Self::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{"detail": ..., "code": ...}` body
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorDetail {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorDetail {
    fn new(detail: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            detail: detail.into(),
            code: code.map(str::to_string),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let mut response = match self {
            Self::Validation(errors) => (status, Json(errors)).into_response(),
            Self::BadRequest(detail) | Self::NotImplemented(detail) => {
                (status, Json(ErrorDetail::new(detail, None))).into_response()
            }
            Self::NotAuthenticated => {
                let detail = Self::NotAuthenticated.to_string();
                (status, Json(ErrorDetail::new(detail, None))).into_response()
            }
            Self::AuthenticationFailed { detail, code } => {
                (status, Json(ErrorDetail::new(detail, code))).into_response()
            }
            Self::Database(err) => {
                tracing::error!(error = %err, "Database error while handling request");
                server_error(status)
            }
            Self::Internal(message) => {
                tracing::error!(error = %message, "Internal error while handling request");
                server_error(status)
            }
        };

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"api\""),
            );
        }

        response
    }
}

fn server_error(status: StatusCode) -> Response {
    (status, Json(ErrorDetail::new("A server error occurred.", None))).into_response()
}

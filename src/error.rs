use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// A single rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed ({} field errors)", .0.len())]
    Validation(Vec<FieldError>),
    #[error("user already exists")]
    Conflict,
    /// Unknown email and wrong password both land here.
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("{message}")]
    Internal {
        message: &'static str,
        detail: anyhow::Error,
    },
}

impl ApiError {
    /// Wraps an unexpected failure; `message` is the only text the client sees.
    pub fn internal(message: &'static str) -> impl FnOnce(anyhow::Error) -> ApiError {
        move |detail| ApiError::Internal { message, detail }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict | ApiError::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => json!({
                "message": "Validation failed",
                "errors": errors,
            }),
            ApiError::Conflict => json!({ "message": "User already exists" }),
            ApiError::InvalidCredentials => json!({ "message": "Invalid email or password" }),
            ApiError::Internal { message, detail } => {
                tracing::error!(error = %format!("{detail:#}"), "{}", message);
                json!({ "message": message })
            }
        };
        (status, Json(body)).into_response()
    }
}

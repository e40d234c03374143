// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("No steps recorded")]
    NoSteps,

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { available: u64, requested: u64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Activity already settled")]
    AlreadySettled,

    #[error("Implausible activity: {0}")]
    ImplausibleActivity(String),

    #[error("Tracking session already active")]
    AlreadyActive,

    #[error("Tracking not active")]
    NotTracking,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::NoSteps => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "no_steps",
                Some("No steps recorded. Try moving your device more.".to_string()),
            ),
            AppError::InsufficientFunds { .. } => (
                StatusCode::CONFLICT,
                "insufficient_funds",
                Some(self.to_string()),
            ),
            AppError::InvalidAmount(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_amount",
                Some(self.to_string()),
            ),
            AppError::AlreadySettled => (StatusCode::CONFLICT, "already_settled", None),
            AppError::ImplausibleActivity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "implausible_activity",
                Some(msg.clone()),
            ),
            AppError::AlreadyActive => (StatusCode::CONFLICT, "already_active", None),
            AppError::NotTracking => (StatusCode::CONFLICT, "not_tracking", None),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

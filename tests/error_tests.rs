// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use stepfarm::error::AppError;

async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED, "unauthorized"),
        (AppError::InvalidToken, StatusCode::UNAUTHORIZED, "invalid_token"),
        (AppError::NoSteps, StatusCode::UNPROCESSABLE_ENTITY, "no_steps"),
        (
            AppError::InsufficientFunds {
                available: 30,
                requested: 50,
            },
            StatusCode::CONFLICT,
            "insufficient_funds",
        ),
        (
            AppError::InvalidAmount("-1".to_string()),
            StatusCode::BAD_REQUEST,
            "invalid_amount",
        ),
        (AppError::AlreadySettled, StatusCode::CONFLICT, "already_settled"),
        (AppError::AlreadyActive, StatusCode::CONFLICT, "already_active"),
        (AppError::NotTracking, StatusCode::CONFLICT, "not_tracking"),
        (
            AppError::NotFound("x".to_string()),
            StatusCode::NOT_FOUND,
            "not_found",
        ),
    ];

    for (err, status, code) in cases {
        let (actual, body) = render(err).await;
        assert_eq!(actual, status);
        assert_eq!(body["error"], code);
    }
}

#[tokio::test]
async fn test_insufficient_funds_details() {
    let (_, body) = render(AppError::InsufficientFunds {
        available: 30,
        requested: 50,
    })
    .await;
    assert_eq!(
        body["details"],
        "Insufficient funds: requested 50, available 30"
    );
}

#[tokio::test]
async fn test_database_message_not_leaked() {
    let (status, body) = render(AppError::Database("connection reset by peer".to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "database_error");
    assert!(body.get("details").is_none());

    let (status, body) = render(AppError::Internal(anyhow::anyhow!("boom"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_error");
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitness sync endpoint: settles client-submitted activities.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::ActivityPayload;
use crate::services::SettlementResult;
use crate::AppState;
use axum::{body::Bytes, extract::State, routing::post, Extension, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/fitness/sync", post(sync_fitness))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// At most 50 activities per request
    #[serde(alias = "activity_data")]
    #[validate(length(min = 1, max = 50), nested)]
    pub activity_data: Vec<ActivityPayload>,
}

async fn sync_fitness(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<SettlementResult>> {
    let request: SyncRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid activity data format: {}", e)))?;

    request
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid activity data: {}", e)))?;

    tracing::debug!(
        user_id = %user.user_id,
        activities = request.activity_data.len(),
        "Fitness sync requested"
    );

    let result = state
        .settlement
        .settle_activities(&user.user_id, request.activity_data)
        .await?;

    Ok(Json(result))
}

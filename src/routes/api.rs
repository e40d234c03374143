// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{CurrencySummary, FitnessActivity, Profile};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me))
        .route("/api/currency", get(get_currency))
        .route("/api/activities", get(get_activities))
}

// ─── User Profile ────────────────────────────────────────────

/// Get current user profile, `null` if none has been created.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Option<Profile>>> {
    Ok(Json(state.db.get_profile(&user.user_id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(url)]
    pub avatar_url: Option<String>,
}

/// Create or update the current user's profile.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>> {
    update
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid profile: {}", e)))?;

    let now = chrono::Utc::now();
    let created_at = state
        .db
        .get_profile(&user.user_id)
        .await?
        .map_or(now, |existing| existing.created_at);

    let profile = Profile {
        user_id: user.user_id.clone(),
        username: update.username.trim().to_string(),
        avatar_url: update.avatar_url,
        created_at,
        updated_at: now,
    };
    state.db.upsert_profile(&profile).await?;

    tracing::info!(user_id = %user.user_id, "Profile updated");
    Ok(Json(profile))
}

// ─── Currency ────────────────────────────────────────────────

async fn get_currency(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<CurrencySummary>> {
    let balance = state.db.get_balance(&user.user_id).await?;
    Ok(Json(CurrencySummary::from(balance)))
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Number of most recent activities
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    7
}

const MAX_DAYS: u32 = 100;

/// Most recent activities, newest first.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ActivitiesQuery>,
) -> Result<Json<Vec<FitnessActivity>>> {
    let limit = query.days.clamp(1, MAX_DAYS);
    let activities = state
        .db
        .get_recent_activities(&user.user_id, limit)
        .await?;
    Ok(Json(activities))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Companion game client endpoint.
//!
//! `GET|POST /api/companion/{operation}`. The operation name and body are
//! decoded into a typed request before anything else happens.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::{CompanionRequest, CompanionResponse};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/companion/{operation}",
        get(handle_companion).post(handle_companion),
    )
}

async fn handle_companion(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(operation): Path<String>,
    body: Bytes,
) -> Result<Json<CompanionResponse>> {
    let request = CompanionRequest::decode(&operation, &body)?;
    let response = state.companion.dispatch(&user.user_id, request).await?;
    Ok(Json(response))
}

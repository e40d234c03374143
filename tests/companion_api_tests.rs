// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Companion game client API tests.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use stepfarm::models::{GameProgress, Profile};
use tower::ServiceExt;

mod common;
use common::{get, json_body, post_json};

/// Give `user_id` some coins through the sync endpoint.
async fn earn(app: &axum::Router, user_id: &str, steps: u32) {
    let body = json!({
        "activityData": [{
            "steps": steps,
            "start_time": "2024-08-01T07:00:00Z",
            "end_time": "2024-08-01T09:00:00Z"
        }]
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/fitness/sync", user_id, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_spend_coins() {
    let (app, _, _) = common::create_test_app();
    earn(&app, "gamer", 4_000).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/companion/spend-coins",
            "gamer",
            json!({ "amount": 15 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["coins"], 25);
    assert_eq!(body["user_id"], "gamer");
}

#[tokio::test]
async fn test_spend_more_than_balance() {
    let (app, _, _) = common::create_test_app();
    earn(&app, "broke", 3_000).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/companion/spend-coins",
            "broke",
            json!({ "amount": 50 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "insufficient_funds");

    let response = app.oneshot(get("/api/currency", "broke")).await.unwrap();
    assert_eq!(json_body(response).await["coins"], 30);
}

#[tokio::test]
async fn test_spend_invalid_amounts() {
    let (app, _, _) = common::create_test_app();

    for amount in [json!(0), json!(-3), json!(1.5)] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/companion/spend-coins",
                "anyone",
                json!({ "amount": amount }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "invalid_amount");
    }

    let response = app
        .oneshot(post_json(
            "/api/companion/spend-coins",
            "anyone",
            json!({ "amount": "ten" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "bad_request");
}

#[tokio::test]
async fn test_get_user_data() {
    let (app, state, _) = common::create_test_app();

    let now = chrono::Utc::now();
    state
        .db
        .upsert_profile(&Profile {
            user_id: "farmer".to_string(),
            username: "Farmer Jo".to_string(),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    earn(&app, "farmer", 1_200).await;

    let response = app
        .oneshot(get("/api/companion/get-user-data", "farmer"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["profile"]["username"], "Farmer Jo");
    assert_eq!(body["currency"]["coins"], 12);
    assert_eq!(body["fitness"].as_array().unwrap().len(), 1);
    assert_eq!(body["fitness"][0]["steps"], 1_200);
}

#[tokio::test]
async fn test_get_user_data_for_new_user() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(get("/api/companion/get-user-data", "newcomer"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["profile"].is_null());
    assert_eq!(body["currency"]["coins"], 0);
    assert_eq!(body["fitness"], json!([]));
}

#[tokio::test]
async fn test_add_game_progress_is_persisted() {
    let (app, _, memory) = common::create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/companion/add-game-progress",
            "player",
            json!({ "progress": { "kind": "crop_harvested", "crop": "pumpkin", "quantity": 4 } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "success": true }));

    let stored = memory.game_progress_for("player");
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored[0].progress,
        GameProgress::CropHarvested {
            crop: "pumpkin".to_string(),
            quantity: 4
        }
    );
}

#[tokio::test]
async fn test_add_game_progress_rejects_unknown_shape() {
    let (app, _, memory) = common::create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/companion/add-game-progress",
            "player",
            json!({ "progress": { "score": 9001 } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(memory.game_progress_for("player").is_empty());
}

#[tokio::test]
async fn test_unknown_operation() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/companion/grant-coins",
            "sneaky",
            json!({ "amount": 1_000 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_companion_requires_auth() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/companion/spend-coins")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"amount": 1}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

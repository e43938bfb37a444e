//! In-process router tests (spec SPEC_FULL.md §E) — no real TCP bind.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hub_server::config::Config;
use hub_server::state::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn test_state(dir: &TempDir, auth_token: Option<&str>) -> AppState {
    AppState::new(&Config {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        data_dir: dir.path().to_path_buf(),
        auth_token: auth_token.map(str::to_string),
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_and_root_bypass_auth() {
    let dir = TempDir::new().unwrap();
    let app = hub_server::build_router(test_state(&dir, Some("secret")));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_route_without_token_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = hub_server::build_router(test_state(&dir, Some("secret")));

    let response = app
        .oneshot(Request::builder().uri("/api/state").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bearer_token_unlocks_protected_routes() {
    let dir = TempDir::new().unwrap();
    let app = hub_server::build_router(test_state(&dir, Some("secret")));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/state")
                .header("Authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn claim_then_claim_by_another_agent_reports_conflict_not_an_http_error() {
    let dir = TempDir::new().unwrap();
    let app = hub_server::build_router(test_state(&dir, None));

    let claim = |app: axum::Router, agent: &'static str| {
        let body = json!({ "taskId": "t1", "agent": agent }).to_string();
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/claim_task")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
    };

    let response = claim(app.clone(), "alice").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = body_json(response).await;
    assert_eq!(parsed["ok"], true);

    let response = claim(app, "bob").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = body_json(response).await;
    assert_eq!(parsed["ok"], false);
    assert_eq!(parsed["claimedBy"], "alice");
}

#[tokio::test]
async fn stats_reflect_a_claimed_task() {
    let dir = TempDir::new().unwrap();
    let app = hub_server::build_router(test_state(&dir, None));

    let body = json!({ "taskId": "t1", "agent": "alice" }).to_string();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/claim_task")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/api/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["activeTasks"], 1);
}

#[tokio::test]
async fn github_webhook_appends_and_does_not_require_auth_bypass_beyond_token() {
    let dir = TempDir::new().unwrap();
    let app = hub_server::build_router(test_state(&dir, None));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/github/webhook")
                .header("x-github-event", "push")
                .body(Body::from("{\"ref\":\"refs/heads/main\"}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/api/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let events = body_json(response).await;
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "github.push");
}

//! Shared helpers for router-level tests against the in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

use habitctl_server::{build_router, AppState, MemoryStore};

/// Fresh app over an empty in-memory store.
pub fn test_app() -> Router {
    test_app_with_store().0
}

/// Fresh app plus a handle on its store for direct inspection.
pub fn test_app_with_store() -> (Router, Arc<MemoryStore>) {
    let store = MemoryStore::new_shared();
    let app = build_router(AppState::new(store.clone()), false);
    (app, store)
}

/// Send a request and decode the JSON body (`Value::Null` when empty).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

/// Register `username` and return its user id.
pub async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "correct horse battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    body["id"].as_str().unwrap().to_owned()
}

/// Log in and return the (access, refresh) pair.
pub async fn login(app: &Router, username: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/token",
        None,
        Some(json!({
            "username": username,
            "password": "correct horse battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    (
        body["access"].as_str().unwrap().to_owned(),
        body["refresh"].as_str().unwrap().to_owned(),
    )
}

/// Register + login, returning an access token.
pub async fn signed_in(app: &Router, username: &str) -> String {
    register(app, username).await;
    login(app, username).await.0
}

/// Create a habit and return its id.
pub async fn create_habit(app: &Router, token: &str, title: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/habits",
        Some(token),
        Some(json!({ "title": title })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create habit failed: {}", body);
    body["id"].as_str().unwrap().to_owned()
}

/// Log a completion; returns the raw response.
pub async fn log_completion(
    app: &Router,
    token: &str,
    habit_id: &str,
    date: &str,
) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/logs",
        Some(token),
        Some(json!({ "habit": habit_id, "completed_date": date })),
    )
    .await
}

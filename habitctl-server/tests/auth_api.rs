//! Registration, tokens and route protection.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use common::{
    create_habit, log_completion, login, register, send, signed_in, test_app, test_app_with_store,
};
use habitctl_server::db::{NewToken, TokenKind};
use habitctl_server::HabitStore;

#[tokio::test]
async fn health_is_public() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn data_routes_require_a_token() {
    let app = test_app();

    for (method, uri) in [
        ("GET", "/api/habits"),
        ("POST", "/api/habits"),
        ("GET", "/api/habits/00000000-0000-0000-0000-000000000000"),
        ("GET", "/api/logs"),
        ("POST", "/api/logs"),
        ("DELETE", "/api/logs/00000000-0000-0000-0000-000000000000"),
        ("GET", "/api/me"),
    ] {
        let body = (method == "POST").then(|| json!({}));
        let (status, json) = send(&app, method, uri, None, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(json["error"], "unauthorized");
    }

    let (status, _) = send(&app, "GET", "/api/habits", Some("made-up-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_returns_account_without_password() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "Alice@Example.com",
            "password": "correct horse battery",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn register_rejects_bad_and_duplicate_input() {
    let app = test_app();
    register(&app, "alice").await;

    let cases = [
        json!({ "username": "alice", "email": "other@example.com", "password": "correct horse" }),
        json!({ "username": "bob", "email": "alice@example.com", "password": "correct horse" }),
        json!({ "username": "bob", "email": "not-an-email", "password": "correct horse" }),
        json!({ "username": "bob", "email": "bob@example.com", "password": "short" }),
        json!({ "username": "bob", "email": "bob@example.com", "password": "1234567890" }),
        json!({ "username": "has space", "email": "bob@example.com", "password": "correct horse" }),
    ];

    for case in cases {
        let (status, body) = send(&app, "POST", "/api/register", None, Some(case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", case);
        assert_eq!(body["error"], "validation_error");
    }

    let (_, body) = send(
        &app,
        "POST",
        "/api/register",
        None,
        Some(json!({ "username": "alice", "email": "x@example.com", "password": "correct horse" })),
    )
    .await;
    assert_eq!(body["message"], "a user with that username already exists");
}

#[tokio::test]
async fn login_rejects_wrong_password_and_unknown_user() {
    let app = test_app();
    register(&app, "alice").await;

    for (username, password) in [("alice", "wrong password"), ("nobody", "correct horse battery")] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/token",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["message"],
            "no active account found with the given credentials"
        );
    }
}

#[tokio::test]
async fn refresh_issues_working_access_token() {
    let app = test_app();
    register(&app, "alice").await;
    let (_, refresh) = login(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/token/refresh",
        None,
        Some(json!({ "refresh": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().unwrap();

    let (status, me) = send(&app, "GET", "/api/me", Some(access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
}

#[tokio::test]
async fn refresh_purges_expired_tokens() {
    let (app, store) = test_app_with_store();
    let user_id: Uuid = register(&app, "alice").await.parse().unwrap();
    let (_, refresh) = login(&app, "alice").await;

    store
        .insert_token(NewToken {
            token_hash: "stale".into(),
            user_id,
            kind: TokenKind::Access,
            expires_at: Utc::now() - Duration::days(2),
        })
        .await
        .unwrap();

    let (status, _) = send(
        &app,
        "POST",
        "/api/token/refresh",
        None,
        Some(json!({ "refresh": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The refresh already swept it
    assert_eq!(store.purge_expired_tokens(Utc::now()).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_user_and_wrong_password_look_alike() {
    let app = test_app();
    register(&app, "alice").await;

    let mut responses = Vec::new();
    for username in ["alice", "nobody"] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/token",
            None,
            Some(json!({ "username": username, "password": "wrong password" })),
        )
        .await;
        responses.push((status, body));
    }
    assert_eq!(responses[0], responses[1]);
    assert_eq!(responses[0].0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_are_not_interchangeable() {
    let app = test_app();
    register(&app, "alice").await;
    let (access, refresh) = login(&app, "alice").await;

    // A refresh token is not a bearer credential
    let (status, _) = send(&app, "GET", "/api/habits", Some(refresh.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // An access token cannot be refreshed
    let (status, _) = send(
        &app,
        "POST",
        "/api/token/refresh",
        None,
        Some(json!({ "refresh": access })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deleting_account_removes_everything() {
    let app = test_app();
    let token = signed_in(&app, "alice").await;
    let habit = create_habit(&app, &token, "Drink water").await;
    log_completion(&app, &token, &habit, "2024-01-01").await;

    let (status, _) = send(&app, "DELETE", "/api/me", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/api/habits", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The username is free again and the new account starts empty
    let fresh = signed_in(&app, "alice").await;
    let (_, habits) = send(&app, "GET", "/api/habits", Some(fresh.as_str()), None).await;
    assert!(habits.as_array().unwrap().is_empty());
    let (_, logs) = send(&app, "GET", "/api/logs", Some(fresh.as_str()), None).await;
    assert!(logs.as_array().unwrap().is_empty());
}

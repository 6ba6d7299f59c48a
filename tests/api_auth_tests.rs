// SPDX-License-Identifier: MIT

//! HTTP-level authentication and validation tests.
//!
//! These run against the full router with an offline database: everything
//! they assert is decided before any store access.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use calsync::models::Role;
use common::{create_test_app, session_token_for};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn api_without_token_is_unauthorized() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn api_with_garbage_token_is_invalid_session() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, "Bearer not-a-real-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_session");
}

#[tokio::test]
async fn create_event_rejects_empty_title() {
    let (app, _state) = create_test_app();
    let token = session_token_for("user-1", Role::User);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/events")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "title": "",
                        "start_time": "2024-06-01T09:00:00Z",
                        "end_time": "2024-06-01T10:00:00Z"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn create_event_rejects_end_before_start() {
    let (app, _state) = create_test_app();
    let token = session_token_for("user-1", Role::User);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/events")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "title": "Backwards",
                        "start_time": "2024-06-01T10:00:00Z",
                        "end_time": "2024-06-01T09:00:00Z"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let (app, _state) = create_test_app();
    let token = session_token_for("user-1", Role::User);

    // A cookie-authenticated request that fails validation proves the cookie
    // got past the auth middleware (otherwise this would be a 401).
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/events")
                .header(header::COOKIE, format!("calsync_token={}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "title": "",
                        "start_time": "2024-06-01T09:00:00Z",
                        "end_time": "2024-06-01T10:00:00Z"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mock_login_rejects_invalid_email() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/mock-google")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "email": "not-an-email",
                        "name": "Test"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn auth_start_redirects_to_google_consent() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/google")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
    assert!(location.contains("access_type=offline"));
    assert!(location.contains("prompt=consent"));
    assert!(location.contains("state="));
}

#[tokio::test]
async fn security_headers_are_applied() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("X-Frame-Options").unwrap(), "DENY");
}

//! HTTP-level integration tests for the slot lock endpoints.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener. Time is driven through the store's
//! manual clock.

mod common;

use axum::body::Body;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{Method, Request, StatusCode};
use common::{body_json, delete, get, post, send};

const H1: Option<&str> = Some("holder1");
const H2: Option<&str> = Some("holder2");

// ---------------------------------------------------------------------------
// Acquire / release handover
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_contention_release_handover_scenario() {
    let app = common::build_test_app();

    let response = post(&app.router, "/api/v1/slots/1/lock", H1).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"success": true, "expires_in": 60})
    );

    let response = post(&app.router, "/api/v1/slots/1/lock", H2).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"success": false, "error": "locked", "expires_in": 60})
    );

    let response = delete(&app.router, "/api/v1/slots/1/lock", H1).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post(&app.router, "/api/v1/slots/1/lock", H2).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
}

#[tokio::test]
async fn test_reacquire_by_same_holder_succeeds() {
    let app = common::build_test_app();

    post(&app.router, "/api/v1/slots/1/lock", H1).await;
    let response = post(&app.router, "/api/v1/slots/1/lock", H1).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"success": true, "expires_in": 60})
    );
}

#[tokio::test]
async fn test_foreign_release_is_silent_noop() {
    let app = common::build_test_app();
    post(&app.router, "/api/v1/slots/1/lock", H1).await;

    let response = delete(&app.router, "/api/v1/slots/1/lock", H2).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let json = body_json(get(&app.router, "/api/v1/locks?slot_ids=1", H1).await).await;
    assert_eq!(json["1"]["locked_by_me"], true);
}

#[tokio::test]
async fn test_beacon_release_variant() {
    let app = common::build_test_app();
    post(&app.router, "/api/v1/slots/4/lock", H1).await;

    let response = post(&app.router, "/api/v1/slots/4/lock/release", H1).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let json = body_json(get(&app.router, "/api/v1/locks?slot_ids=4", H2).await).await;
    assert_eq!(json["4"]["locked"], false);
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_status_after_ttl_reports_unlocked() {
    let app = common::build_test_app();
    post(&app.router, "/api/v1/slots/1/lock", H1).await;

    app.clock.advance_secs(61);

    let json = body_json(get(&app.router, "/api/v1/locks?slot_ids=1", H1).await).await;
    assert_eq!(json, serde_json::json!({"1": {"locked": false, "locked_by_me": false}}));

    let response = post(&app.router, "/api/v1/slots/1/lock", H2).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_denied_reports_remaining_seconds() {
    let app = common::build_test_app();
    post(&app.router, "/api/v1/slots/1/lock", H1).await;
    app.clock.advance_secs(45);

    let json = body_json(post(&app.router, "/api/v1/slots/1/lock", H2).await).await;
    assert_eq!(json["expires_in"], 15);
}

// ---------------------------------------------------------------------------
// Bulk status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_bulk_status_distinguishes_mine_theirs_and_free() {
    let app = common::build_test_app();
    post(&app.router, "/api/v1/slots/1/lock", H1).await;
    post(&app.router, "/api/v1/slots/2/lock", H2).await;

    let response = get(&app.router, "/api/v1/locks?slot_ids=1,2,3", H1).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(
        json,
        serde_json::json!({
            "1": {"locked": true, "locked_by_me": true, "expires_in": 60},
            "2": {"locked": true, "locked_by_me": false, "expires_in": 60},
            "3": {"locked": false, "locked_by_me": false}
        })
    );
    assert!(!json.to_string().contains("holder2"));
}

#[tokio::test]
async fn test_empty_status_query_returns_empty_map() {
    let app = common::build_test_app();
    let response = get(&app.router, "/api/v1/locks", H1).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({}));
}

#[tokio::test]
async fn test_malformed_slot_ids_return_400() {
    let app = common::build_test_app();
    let response = get(&app.router, "/api/v1/locks?slot_ids=1,two", H1).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Validation and identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_non_positive_slot_id_returns_400() {
    let app = common::build_test_app();
    let response = post(&app.router, "/api/v1/slots/0/lock", H1).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_non_numeric_slot_id_returns_error_envelope() {
    let app = common::build_test_app();
    let response = post(&app.router, "/api/v1/slots/abc/lock", H1).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_missing_holder_returns_401() {
    let app = common::build_test_app();
    let response = post(&app.router, "/api/v1/slots/1/lock", None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_invalid_holder_returns_401() {
    let app = common::build_test_app();
    let response = post(&app.router, "/api/v1/slots/1/lock", Some("bad token!")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_identifies_holder() {
    let app = common::build_test_app();

    let response = post(&app.router, "/api/v1/session", None).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .expect("session must set a cookie")
        .to_str()
        .unwrap()
        .to_string();
    let token = body_json(response).await["data"]["holder_token"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with(&format!("slotlock_holder={token}")));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/slots/9/lock")
        .header(COOKIE, format!("slotlock_holder={token}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app.router, request).await.status(), StatusCode::OK);

    let json = body_json(get(&app.router, "/api/v1/locks?slot_ids=9", Some(&token)).await).await;
    assert_eq!(json["9"]["locked_by_me"], true);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_http_acquires_grant_exactly_one() {
    let app = common::build_test_app();

    let attempts = (0..32).map(|i| {
        let router = app.router.clone();
        async move {
            let holder = format!("holder{i}");
            post(&router, "/api/v1/slots/77/lock", Some(&holder)).await.status()
        }
    });
    let statuses = futures::future::join_all(attempts).await;

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(),
        31
    );
}

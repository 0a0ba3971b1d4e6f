// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated request wrapper tests.
//!
//! These tests verify that:
//! 1. An expired token is refreshed once and the request retried once
//! 2. A second rejection is terminal
//! 3. Malformed and network failures are never retried
//! 4. Pipeline headers and bearer credentials are attached

use serde_json::json;
use wellness_client::error::{AppError, AuthErrorKind};
use wellness_client::services::{ApiRequest, RawResponse, TransportError};

mod common;
use common::{
    harness, json_ok, jwt_expired, session_expiring_in, MockProvider, MockTransport,
    RefreshBehavior,
};

fn moods_request(h: &common::Harness) -> ApiRequest {
    ApiRequest::get(h.api.rest_url("mood_entries?select=*"))
}

#[tokio::test]
async fn test_expired_token_refreshed_and_retried_once() {
    let transport = MockTransport::new(|_, index| match index {
        0 => Ok(jwt_expired()),
        _ => Ok(json_ok(json!([{ "id": 7 }]))),
    });
    let h = harness(
        MockProvider::new(RefreshBehavior::Succeed(3600)),
        transport,
        Some(session_expiring_in(3600, "access-old")),
    )
    .await;

    let body = h.api.execute(moods_request(&h)).await.unwrap();
    assert_eq!(body, json!([{ "id": 7 }]));

    assert_eq!(h.provider.refreshes(), 1);
    let requests = h.transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].header("Authorization"), Some("Bearer access-old"));
    assert_eq!(
        requests[1].header("Authorization"),
        Some("Bearer access-refreshed-1")
    );
}

#[tokio::test]
async fn test_second_rejection_is_terminal() {
    let h = harness(
        MockProvider::new(RefreshBehavior::Succeed(3600)),
        MockTransport::always(jwt_expired()),
        Some(session_expiring_in(3600, "access-old")),
    )
    .await;

    let result = h.api.execute(moods_request(&h)).await;
    assert!(matches!(result, Err(AppError::Auth(AuthErrorKind::Expired))));
    assert_eq!(h.provider.refreshes(), 1);
    assert_eq!(h.transport.count(), 2);
}

#[tokio::test]
async fn test_rejected_refresh_ends_session_without_retry() {
    let h = harness(
        MockProvider::new(RefreshBehavior::Reject),
        MockTransport::always(jwt_expired()),
        Some(session_expiring_in(3600, "access-old")),
    )
    .await;
    let mut events = h.sessions.subscribe();

    let result = h.api.execute(moods_request(&h)).await;
    assert!(matches!(result, Err(AppError::Auth(AuthErrorKind::Expired))));
    assert_eq!(h.provider.refreshes(), 1);
    // The original request went out once and was not retried.
    assert_eq!(h.transport.count(), 1);
    assert!(!h.sessions.is_authenticated().await);

    let event = events.recv().await.unwrap();
    assert!(!event.is_authenticated);
    assert!(events.try_recv().is_err(), "session must end exactly once");
}

#[tokio::test]
async fn test_html_response_not_retried() {
    let h = harness(
        MockProvider::new(RefreshBehavior::Succeed(3600)),
        MockTransport::always(RawResponse::new(
            200,
            Some("text/html"),
            "<!DOCTYPE html><html><body>Welcome</body></html>",
        )),
        Some(session_expiring_in(3600, "access-1")),
    )
    .await;

    let result = h.api.execute(moods_request(&h)).await;
    match result {
        Err(err @ AppError::MalformedResponse(_)) => {
            assert_eq!(err.to_string(), "Malformed response: unexpected-html");
            assert!(err.user_message().contains("temporarily unavailable"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(h.transport.count(), 1);
    assert_eq!(h.provider.refreshes(), 0);
}

#[tokio::test]
async fn test_html_on_401_with_json_content_type_not_retried() {
    let h = harness(
        MockProvider::new(RefreshBehavior::Succeed(3600)),
        MockTransport::always(RawResponse::new(
            401,
            Some("application/json"),
            "<html><body>Unauthorized</body></html>",
        )),
        Some(session_expiring_in(3600, "access-1")),
    )
    .await;

    let result = h.api.execute(moods_request(&h)).await;
    assert!(matches!(result, Err(AppError::MalformedResponse(_))));
    assert_eq!(h.transport.count(), 1);
    assert_eq!(h.provider.refreshes(), 0);
}

#[tokio::test]
async fn test_auth_error_without_session_not_refreshed() {
    let h = harness(
        MockProvider::new(RefreshBehavior::Succeed(3600)),
        MockTransport::always(RawResponse::json(
            401,
            &json!({"message": "No API key found in request"}),
        )),
        None,
    )
    .await;

    let result = h.api.execute(moods_request(&h)).await;
    assert!(matches!(
        result,
        Err(AppError::Auth(AuthErrorKind::Unauthorized))
    ));
    assert_eq!(h.transport.count(), 1);
    assert_eq!(h.provider.refreshes(), 0);
    assert_eq!(h.transport.requests()[0].header("Authorization"), None);
}

#[tokio::test]
async fn test_network_failure_not_retried() {
    let h = harness(
        MockProvider::new(RefreshBehavior::Succeed(3600)),
        MockTransport::new(|_, _| Err(TransportError::Timeout("after 10s".to_string()))),
        Some(session_expiring_in(3600, "access-1")),
    )
    .await;

    let result = h.api.execute(moods_request(&h)).await;
    assert!(matches!(result, Err(AppError::Network(_))));
    assert_eq!(h.transport.count(), 1);
}

#[tokio::test]
async fn test_server_error_propagates_unchanged() {
    let h = harness(
        MockProvider::new(RefreshBehavior::Succeed(3600)),
        MockTransport::always(RawResponse::json(
            500,
            &json!({"code": "XX000", "message": "internal error"}),
        )),
        Some(session_expiring_in(3600, "access-1")),
    )
    .await;

    match h.api.execute(moods_request(&h)).await {
        Err(AppError::Api {
            status, message, ..
        }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "internal error");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(h.transport.count(), 1);
}

#[tokio::test]
async fn test_pipeline_headers_attached() {
    let h = harness(
        MockProvider::new(RefreshBehavior::Succeed(3600)),
        MockTransport::always(json_ok(json!([]))),
        Some(session_expiring_in(3600, "access-1")),
    )
    .await;

    h.api.execute(moods_request(&h)).await.unwrap();

    let request = &h.transport.requests()[0];
    assert_eq!(request.header("apikey"), Some("anon-key"));
    assert_eq!(request.header("Accept"), Some("application/json"));
    assert!(request
        .header("X-Client-Info")
        .unwrap()
        .starts_with("wellness-client/"));
    assert_eq!(request.url, "http://backend.test/rest/v1/mood_entries?select=*");
}

#[tokio::test]
async fn test_execute_json_reports_shape_mismatch() {
    let h = harness(
        MockProvider::new(RefreshBehavior::Succeed(3600)),
        MockTransport::always(json_ok(json!({ "unexpected": "object" }))),
        Some(session_expiring_in(3600, "access-1")),
    )
    .await;

    let result: Result<Vec<serde_json::Value>, _> = h.api.execute_json(moods_request(&h)).await;
    assert!(matches!(result, Err(AppError::MalformedResponse(_))));
}

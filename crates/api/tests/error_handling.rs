//! Error response shapes for the event endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, post_raw};
use serde_json::json;

#[tokio::test]
async fn missing_fields_return_validation_details() {
    let test = common::build_test_app().await;
    let response = post_json(test.app(), "/api/events", json!({"event_type": "USER_CREATED"})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "Invalid event");
    assert!(json["details"]["source_module"].is_array());
    assert!(json["details"]["data"].is_array());
    assert!(json["details"].get("event_type").is_none());
}

#[tokio::test]
async fn unknown_event_type_is_rejected_and_not_stored() {
    let test = common::build_test_app().await;
    let response = post_json(
        test.app(),
        "/api/events",
        json!({"event_type": "INVOICE_PAID", "source_module": "billing", "data": {}}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    let message = json["details"]["event_type"][0].as_str().unwrap();
    assert!(message.contains("CUSTOM_"));

    assert_eq!(test.store.stats().await.total_events, 0);
}

#[tokio::test]
async fn unknown_priority_is_rejected() {
    let test = common::build_test_app().await;
    let response = post_json(
        test.app(),
        "/api/events",
        json!({
            "event_type": "DATA_CREATED",
            "source_module": "inventory",
            "priority": "urgent",
            "data": {}
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["details"]["priority"].is_array());
}

#[tokio::test]
async fn missing_event_returns_404_json() {
    let test = common::build_test_app().await;
    let response = get(test.app(), "/api/events/does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Event with id does-not-exist not found");
}

#[tokio::test]
async fn bad_timestamp_filter_returns_400() {
    let test = common::build_test_app().await;
    let response = get(test.app(), "/api/events?start_time=yesterday").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["error"].as_str().unwrap().contains("start_time"));
}

#[tokio::test]
async fn bad_purge_cutoff_returns_400() {
    let test = common::build_test_app().await;
    let response = post_json(test.app(), "/api/events/purge", json!({"older_than": "soon"})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let test = common::build_test_app().await;
    let response = post_raw(test.app(), "/api/events", "{not json").await;

    assert!(response.status().is_client_error());
}

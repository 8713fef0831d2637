//! HTTP-level integration tests over the in-memory backend: proves the
//! create/push/get/update/delete contract end to end against the real
//! router, not just the engine underneath it.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use queuey_core::ports::{MetadataBackend, StorageBackend};
use queuey_core::{PolicyConfig, QueueEngine};
use queuey_memory::{MemoryMetadata, MemoryStorage};
use queuey_server::router::build_router;
use queuey_server::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

const APP_KEY: &str = "testkey123";

fn test_app() -> axum::Router {
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let metadata: Arc<dyn MetadataBackend> = Arc::new(MemoryMetadata::new());
    let engine = QueueEngine::new(storage, metadata, PolicyConfig::default());
    let state = AppState {
        engine: Arc::new(engine),
        app_keys: Arc::new(HashMap::from([(APP_KEY.to_string(), "notty".to_string())])),
    };
    build_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn auth_header() -> String {
    format!("Application {APP_KEY}")
}

#[tokio::test]
async fn create_push_and_get_round_trips_a_message() {
    let app = test_app();

    let create = app
        .clone()
        .oneshot(
            Request::post("/v1/notty")
                .header("Authorization", auth_header())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from("".to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::CREATED);
    let created = body_json(create).await;
    let queue_name = created["queue_name"].as_str().unwrap().to_string();
    assert_eq!(queue_name.len(), 32);

    let push = app
        .clone()
        .oneshot(
            Request::post(format!("/v1/notty/{queue_name}"))
                .header("Authorization", auth_header())
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(push.status(), StatusCode::CREATED);
    let pushed = body_json(push).await;
    let key = pushed["messages"][0]["key"].as_str().unwrap().to_string();
    assert_eq!(key.len(), 32);
    assert_eq!(pushed["messages"][0]["partition"], 1);

    let get = app
        .clone()
        .oneshot(
            Request::get(format!("/v1/notty/{queue_name}"))
                .header("Authorization", auth_header())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get.status(), StatusCode::OK);
    let fetched = body_json(get).await;
    let messages = fetched["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["body"], "hello");
    assert_eq!(messages[0]["message_id"], key);
}

#[tokio::test]
async fn missing_application_key_rejects_create() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::post("/v1/notty")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from("".to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["error_msg"].get("AccessDenied").is_some());
}

#[tokio::test]
async fn unrecognized_application_key_is_401() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::post("/v1/notty")
                .header("Authorization", "Application bogus")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from("".to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn partition_update_is_monotonic() {
    let app = test_app();

    let create = app
        .clone()
        .oneshot(
            Request::post("/v1/notty")
                .header("Authorization", auth_header())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from("partitions=1"))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = body_json(create).await;
    let queue_name = created["queue_name"].as_str().unwrap().to_string();

    let grow = app
        .clone()
        .oneshot(
            Request::put(format!("/v1/notty/{queue_name}"))
                .header("Authorization", auth_header())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from("partitions=2"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(grow.status(), StatusCode::OK);

    let shrink = app
        .oneshot(
            Request::put(format!("/v1/notty/{queue_name}"))
                .header("Authorization", auth_header())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from("partitions=1"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(shrink.status(), StatusCode::BAD_REQUEST);
    let body = body_json(shrink).await;
    assert!(body["error_msg"].get("InvalidUpdate").is_some());
}

#[tokio::test]
async fn delete_queue_then_get_is_not_found() {
    let app = test_app();

    let create = app
        .clone()
        .oneshot(
            Request::post("/v1/notty")
                .header("Authorization", auth_header())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from("".to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = body_json(create).await;
    let queue_name = created["queue_name"].as_str().unwrap().to_string();

    let delete = app
        .clone()
        .oneshot(
            Request::delete(format!("/v1/notty/{queue_name}"))
                .header("Authorization", auth_header())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::OK);

    let get = app
        .oneshot(
            Request::get(format!("/v1/notty/{queue_name}"))
                .header("Authorization", auth_header())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get.status(), StatusCode::NOT_FOUND);
}

//! Failure injection: unhealthy dependencies must degrade, not break, the API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use property_managing::config::EnrichmentMode;
use serde_json::{json, Value};

mod common;

use common::{row, spawn_server, start_programmable_backend, test_config};

/// A backend that counts calls and answers with `respond(call_index)`.
async fn counting_backend<R>(respond: R) -> (String, Arc<AtomicU32>)
where
    R: Fn(u32) -> (u16, String) + Send + Sync + 'static,
{
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let respond = Arc::new(respond);
    let url = start_programmable_backend(move || {
        let n = cc.fetch_add(1, Ordering::SeqCst);
        let respond = respond.clone();
        async move { respond(n) }
    })
    .await;
    (url, calls)
}

#[tokio::test]
async fn test_breaker_opens_and_fails_fast() {
    let (store_url, calls) = counting_backend(|_| (503, "{}".into())).await;
    let server = spawn_server(test_config(&store_url, &store_url)).await;

    // fail_max = 2: two exhausted retry sequences open the breaker.
    for _ in 0..2 {
        let res = server.get("/properties").await;
        assert_eq!(res.status(), 503);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 6);

    let res = server.get("/properties").await;
    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("circuit open"));
    assert_eq!(calls.load(Ordering::SeqCst), 6, "open breaker must not touch the store");
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let (store_url, calls) = counting_backend(|n| {
        if n < 2 {
            (502, "{}".into())
        } else {
            (200, json!([row("p1", "u1")]).to_string())
        }
    })
    .await;
    let server = spawn_server(test_config(&store_url, &store_url)).await;

    let res = server.get("/properties").await;
    assert_eq!(res.status(), 200);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let (store_url, calls) =
        counting_backend(|_| (400, r#"{"message":"invalid input syntax for type uuid"}"#.into())).await;
    let server = spawn_server(test_config(&store_url, &store_url)).await;

    let res = server.get("/properties/not-a-uuid").await;
    assert_eq!(res.status(), 400);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let store_url = start_programmable_backend(move || {
        cc.fetch_add(1, Ordering::SeqCst);
        async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            (200, "[]".to_string())
        }
    })
    .await;

    let mut config = test_config(&store_url, &store_url);
    config.store.timeout_ms = 50;
    let server = spawn_server(config).await;

    let res = server.get("/properties").await;
    assert_eq!(res.status(), 503);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_request_timeout_returns_json_detail() {
    let store_url = start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        (200, "[]".to_string())
    })
    .await;

    let mut config = test_config(&store_url, &store_url);
    config.store.timeout_ms = 400;
    config.retries.base_delay_ms = 200;
    config.retries.max_delay_ms = 400;
    config.server.request_timeout_secs = 1;
    let server = spawn_server(config).await;

    let res = server.get("/properties").await;
    assert_eq!(res.status(), 503);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["detail"],
        "Service temporarily unavailable: request did not complete within 1s"
    );
}

#[tokio::test]
async fn test_user_service_outage_respects_enrichment_mode() {
    let store = MockServer::start_async().await;
    store
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/properties").query_param("id", "eq.p1");
            then.status(200).json_body(json!([row("p1", "u1")]));
        })
        .await;
    let (users_url, user_calls) = counting_backend(|_| (503, "{}".into())).await;

    let server = spawn_server(test_config(&store.base_url(), &users_url)).await;
    let res = server.get("/properties/p1").await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], "p1");
    assert!(body.get("user_data").is_none());
    assert_eq!(user_calls.load(Ordering::SeqCst), 3);

    let mut config = test_config(&store.base_url(), &users_url);
    config.users.enrichment = EnrichmentMode::Required;
    let strict = spawn_server(config).await;
    let res = strict.get("/properties/p1").await;
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_view_event_is_published() {
    let store = MockServer::start_async().await;
    store
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/properties").query_param("id", "eq.p1");
            then.status(200).json_body(json!([row("p1", "u1")]));
        })
        .await;
    store
        .mock_async(|when, then| {
            when.method(GET).path("/users/u1");
            then.status(200).json_body(json!({"id": "u1"}));
        })
        .await;
    let broker = MockServer::start_async().await;
    let publish = broker
        .mock_async(|when, then| {
            when.method(POST)
                .path("/topics/property-views")
                .body_contains(r#""key":"viewer-7""#)
                .body_contains(r#""property_id":"p1""#);
            then.status(200);
        })
        .await;

    let mut config = test_config(&store.base_url(), &store.base_url());
    config.events.broker_url = Some(broker.base_url());
    let server = spawn_server(config).await;

    let res = server.get("/properties/p1/viewer-7").await;
    assert_eq!(res.status(), 200);

    let mut published = 0;
    for _ in 0..50 {
        published = publish.hits_async().await;
        if published > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(published, 1);
}

/// Serve `p1` through a server whose broker answers every publish with `broker_status`.
async fn view_with_broker(broker_status: u16) -> (u16, Value) {
    let store = MockServer::start_async().await;
    store
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/properties").query_param("id", "eq.p1");
            then.status(200).json_body(json!([row("p1", "u1")]));
        })
        .await;
    store
        .mock_async(|when, then| {
            when.method(GET).path("/users/u1");
            then.status(200).json_body(json!({"id": "u1", "name": "Ada"}));
        })
        .await;
    let broker = MockServer::start_async().await;
    broker
        .mock_async(|when, then| {
            when.method(POST);
            then.status(broker_status);
        })
        .await;

    let mut config = test_config(&store.base_url(), &store.base_url());
    config.events.broker_url = Some(broker.base_url());
    let server = spawn_server(config).await;

    let res = server.get("/properties/p1/viewer-7").await;
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn test_event_sink_failure_does_not_change_response() {
    let (healthy_status, healthy_body) = view_with_broker(200).await;
    let (failing_status, failing_body) = view_with_broker(500).await;

    assert_eq!(healthy_status, 200);
    assert_eq!(failing_status, healthy_status);
    assert_eq!(failing_body, healthy_body);
    assert_eq!(failing_body["user_data"]["name"], "Ada");
}

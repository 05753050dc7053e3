//! End-to-end delivery tests against a real PostgreSQL instance.
//!
//! Run with `cargo test --features integration` and `DATABASE_URL` set.
//! Each test creates its own endpoint and messages, runs a short-interval
//! delivery worker against a wiremock target, and asserts on the resulting
//! row state.

#![cfg(feature = "integration")]

mod common;

use std::time::Duration;

use common::*;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer};

use trs_db::{
    run_migrations, CreateWebhookEndpoint, CreateWebhookMessage, WebhookEndpoint, WebhookMessage,
};
use trs_webhooks::{DeliveryWorker, EndpointCache, EventMapper, WebhookEvent, WorkerConfig};

async fn test_pool() -> PgPool {
    let url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("failed to connect to test database");
    run_migrations(&pool).await.expect("migrations failed");
    pool
}

async fn create_endpoint(pool: &PgPool, address: &str, enabled: bool) -> WebhookEndpoint {
    WebhookEndpoint::create(
        pool,
        CreateWebhookEndpoint {
            application_id: Uuid::new_v4(),
            address: address.to_string(),
            api_version: "20240101".to_string(),
            cloud_event_types: vec!["alert.created".to_string()],
            enabled,
        },
    )
    .await
    .expect("failed to create endpoint")
}

async fn create_due_message(pool: &PgPool, endpoint_id: Uuid) -> WebhookMessage {
    WebhookMessage::create(
        pool,
        CreateWebhookMessage {
            webhook_endpoint_id: endpoint_id,
            cloud_event_id: Uuid::new_v4().to_string(),
            cloud_event_type: "alert.created".to_string(),
            api_version: "20240101".to_string(),
            timestamp: chrono::Utc::now(),
            data: serde_json::json!({"trn": "1234567"}),
            next_delivery_attempt: chrono::Utc::now(),
        },
    )
    .await
    .expect("failed to create message")
}

fn spawn_worker(pool: PgPool) -> CancellationToken {
    spawn_worker_with(pool, Duration::from_millis(500), 20)
}

fn spawn_worker_with(pool: PgPool, poll_interval: Duration, batch_size: usize) -> CancellationToken {
    let (sender, _) = test_sender();
    let cancel = CancellationToken::new();
    let worker = DeliveryWorker::new(
        pool,
        sender,
        WorkerConfig {
            poll_interval,
            batch_size,
            poll_retry_attempts: 2,
            poll_retry_delay: Duration::from_millis(100),
        },
        cancel.clone(),
    );
    tokio::spawn(worker.run());
    cancel
}

/// Poll the message row until `predicate` holds or the timeout elapses.
async fn wait_for_message<F>(pool: &PgPool, id: Uuid, timeout: Duration, predicate: F) -> WebhookMessage
where
    F: Fn(&WebhookMessage) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let message = WebhookMessage::find_by_id(pool, id)
            .await
            .expect("query failed")
            .expect("message disappeared");
        if predicate(&message) || tokio::time::Instant::now() >= deadline {
            return message;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[tokio::test]
async fn published_event_fans_out_to_subscribed_endpoints() {
    let pool = test_pool().await;
    let cache = std::sync::Arc::new(EndpointCache::with_ttl(
        pool.clone(),
        Duration::from_millis(1),
    ));
    let mapper = EventMapper::new(pool.clone(), cache);

    // Unique event type so concurrently running tests cannot fan in
    let event_type = format!("fanout.test.{}", Uuid::new_v4().simple());
    let subscribe = |address: &str, enabled: bool| {
        let pool = pool.clone();
        let address = address.to_string();
        let event_type = event_type.clone();
        async move {
            WebhookEndpoint::create(
                &pool,
                CreateWebhookEndpoint {
                    application_id: Uuid::new_v4(),
                    address,
                    api_version: "20240101".to_string(),
                    cloud_event_types: vec![event_type],
                    enabled,
                },
            )
            .await
            .expect("failed to create endpoint")
        }
    };

    let subscribed = subscribe("https://one.example.org/hook", true).await;
    let also_subscribed = subscribe("https://two.example.org/hook", true).await;
    let disabled = subscribe("https://three.example.org/hook", false).await;

    let event = WebhookEvent {
        event_type: event_type.clone(),
        api_version: "20240101".to_string(),
        timestamp: chrono::Utc::now(),
        data: serde_json::json!({"trn": "7654321"}),
    };
    let created = mapper.publish_event(&event).await.expect("publish failed");

    assert_eq!(created.len(), 2);

    let mut cloud_event_ids = std::collections::HashSet::new();
    let mut endpoint_ids = std::collections::HashSet::new();
    for id in &created {
        let row = WebhookMessage::find_by_id(&pool, *id)
            .await
            .expect("query failed")
            .expect("message missing");
        assert_eq!(row.status(), "pending");
        assert!(row.next_delivery_attempt.is_some());
        cloud_event_ids.insert(row.cloud_event_id);
        endpoint_ids.insert(row.webhook_endpoint_id);
    }
    // One event, one shared CloudEvents id across every fan-out row
    assert_eq!(cloud_event_ids.len(), 1);
    assert!(endpoint_ids.contains(&subscribed.id));
    assert!(endpoint_ids.contains(&also_subscribed.id));
    assert!(!endpoint_ids.contains(&disabled.id));

    // An event type nobody subscribes to creates nothing
    let unmatched = WebhookEvent {
        event_type: "alert.archived".to_string(),
        api_version: "20240101".to_string(),
        timestamp: chrono::Utc::now(),
        data: serde_json::json!({}),
    };
    assert!(mapper
        .publish_event(&unmatched)
        .await
        .expect("publish failed")
        .is_empty());
}

#[tokio::test]
async fn due_message_is_delivered_and_marked() {
    let pool = test_pool().await;
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();

    Mock::given(method("POST"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let endpoint = create_endpoint(&pool, &mock_server.uri(), true).await;
    let message = create_due_message(&pool, endpoint.id).await;

    let cancel = spawn_worker(pool.clone());
    let row = wait_for_message(&pool, message.id, Duration::from_secs(10), |m| {
        m.delivered.is_some()
    })
    .await;
    cancel.cancel();

    assert!(row.delivered.is_some(), "message should be delivered");
    assert!(row.next_delivery_attempt.is_none());
    assert_eq!(row.delivery_attempts.len(), 1);
    assert!(row.delivery_errors.is_empty());
    assert_eq!(row.status(), "delivered");

    let captured = &capture.requests()[0];
    assert_eq!(
        captured.header("ce-id"),
        Some(message.cloud_event_id.as_str())
    );
}

#[tokio::test]
async fn failed_delivery_is_recorded_and_rescheduled() {
    let pool = test_pool().await;
    let mock_server = MockServer::start().await;
    let counting = CountingResponder::with_status(500);

    Mock::given(method("POST"))
        .respond_with(counting.clone())
        .mount(&mock_server)
        .await;

    let endpoint = create_endpoint(&pool, &mock_server.uri(), true).await;
    let message = create_due_message(&pool, endpoint.id).await;

    let before = chrono::Utc::now();
    let cancel = spawn_worker(pool.clone());
    let row = wait_for_message(&pool, message.id, Duration::from_secs(10), |m| {
        !m.delivery_attempts.is_empty()
    })
    .await;
    cancel.cancel();

    assert!(row.delivered.is_none());
    assert_eq!(row.delivery_attempts.len(), 1);
    assert_eq!(row.delivery_errors.len(), 1);
    assert!(row.delivery_errors[0].contains("HTTP 500"));
    assert_eq!(row.status(), "pending");

    // First retry lands on the 5-second step of the backoff table
    let next = row.next_delivery_attempt.expect("retry should be scheduled");
    assert!(next > before);
    assert!(next <= chrono::Utc::now() + chrono::Duration::seconds(6));
}

#[tokio::test]
async fn disabled_endpoint_is_not_delivered() {
    let pool = test_pool().await;
    let mock_server = MockServer::start().await;
    let counting = CountingResponder::new();

    Mock::given(method("POST"))
        .respond_with(counting.clone())
        .mount(&mock_server)
        .await;

    let endpoint = create_endpoint(&pool, &mock_server.uri(), false).await;
    let message = create_due_message(&pool, endpoint.id).await;

    let cancel = spawn_worker(pool.clone());
    tokio::time::sleep(Duration::from_secs(2)).await;
    cancel.cancel();

    let row = WebhookMessage::find_by_id(&pool, message.id)
        .await
        .expect("query failed")
        .expect("message disappeared");

    assert_eq!(counting.count(), 0, "disabled endpoint must not be called");
    assert!(row.delivered.is_none());
    assert!(row.delivery_attempts.is_empty());
    assert!(row.next_delivery_attempt.is_some(), "message stays claimable");
}

#[tokio::test]
async fn inactive_application_is_not_delivered() {
    let pool = test_pool().await;
    let mock_server = MockServer::start().await;
    let counting = CountingResponder::new();

    Mock::given(method("POST"))
        .respond_with(counting.clone())
        .mount(&mock_server)
        .await;

    let endpoint = create_endpoint(&pool, &mock_server.uri(), true).await;
    WebhookEndpoint::set_application_active(&pool, endpoint.application_id, false)
        .await
        .expect("toggle failed");
    let message = create_due_message(&pool, endpoint.id).await;

    let cancel = spawn_worker(pool.clone());
    tokio::time::sleep(Duration::from_secs(2)).await;
    cancel.cancel();

    let row = WebhookMessage::find_by_id(&pool, message.id)
        .await
        .expect("query failed")
        .expect("message disappeared");

    assert_eq!(counting.count(), 0);
    assert!(row.delivery_attempts.is_empty());
}

#[tokio::test]
async fn overflow_batch_drains_without_waiting_for_next_tick() {
    let pool = test_pool().await;
    let mock_server = MockServer::start().await;
    let counting = CountingResponder::new();

    Mock::given(method("POST"))
        .respond_with(counting.clone())
        .mount(&mock_server)
        .await;

    let endpoint = create_endpoint(&pool, &mock_server.uri(), true).await;
    let mut ids = Vec::new();
    for _ in 0..11 {
        ids.push(create_due_message(&pool, endpoint.id).await.id);
    }

    // A one-hour poll interval: only the immediate more-records re-poll can
    // drain the backlog within the test window.
    let cancel = spawn_worker_with(pool.clone(), Duration::from_secs(3600), 5);
    let last = *ids.last().unwrap();
    wait_for_message(&pool, last, Duration::from_secs(10), |m| {
        m.delivered.is_some()
    })
    .await;
    cancel.cancel();

    for id in ids {
        let row = WebhookMessage::find_by_id(&pool, id)
            .await
            .expect("query failed")
            .expect("message disappeared");
        assert!(row.delivered.is_some(), "all due messages should drain");
    }
    assert_eq!(counting.count(), 11);
}

#[tokio::test]
async fn concurrent_workers_deliver_each_message_exactly_once() {
    let pool = test_pool().await;
    let mock_server = MockServer::start().await;
    let counting = CountingResponder::new();

    Mock::given(method("POST"))
        .respond_with(counting.clone())
        .mount(&mock_server)
        .await;

    let endpoint = create_endpoint(&pool, &mock_server.uri(), true).await;
    let mut ids = Vec::new();
    for _ in 0..30 {
        ids.push(create_due_message(&pool, endpoint.id).await.id);
    }

    // Two pollers racing over the same backlog; row locking is the only
    // coordination between them.
    let cancel_a = spawn_worker_with(pool.clone(), Duration::from_millis(200), 5);
    let cancel_b = spawn_worker_with(pool.clone(), Duration::from_millis(200), 5);

    for id in &ids {
        wait_for_message(&pool, *id, Duration::from_secs(15), |m| {
            m.delivered.is_some()
        })
        .await;
    }
    cancel_a.cancel();
    cancel_b.cancel();

    for id in ids {
        let row = WebhookMessage::find_by_id(&pool, id)
            .await
            .expect("query failed")
            .expect("message disappeared");
        assert!(row.delivered.is_some());
        assert_eq!(
            row.delivery_attempts.len(),
            1,
            "a claimed row must never be attempted by a second poller"
        );
        assert!(row.delivery_errors.is_empty());
    }
    assert_eq!(counting.count(), 30, "each message reaches the endpoint once");
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let pool = test_pool().await;
    let mock_server = MockServer::start().await;
    let failing = FailingResponder::fail_times(1);

    Mock::given(method("POST"))
        .respond_with(failing.clone())
        .mount(&mock_server)
        .await;

    let endpoint = create_endpoint(&pool, &mock_server.uri(), true).await;
    let message = create_due_message(&pool, endpoint.id).await;

    // The 5s first-retry step plus polling overhead fits in the timeout
    let cancel = spawn_worker(pool.clone());
    let row = wait_for_message(&pool, message.id, Duration::from_secs(20), |m| {
        m.delivered.is_some()
    })
    .await;
    cancel.cancel();

    assert!(row.delivered.is_some());
    assert_eq!(row.delivery_attempts.len(), 2);
    assert_eq!(row.delivery_errors.len(), 1);
    assert_eq!(failing.attempt_count(), 2);
}

//! End-to-end delivery tests against a mock HTTP endpoint.

use hookwire::{
    BusConfig, Delivery, DeliveryStatus, Event, EventBus, Filter, FilterOp, RetryConfig, Signer,
    Webhook, types,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        multiplier: 2.0,
        timeout: Duration::from_secs(5),
    }
}

fn test_bus() -> EventBus {
    EventBus::builder()
        .config(BusConfig::builder().workers(2).queue_capacity(64).build())
        .build()
}

/// Poll delivery history until `count` records exist.
async fn wait_for_deliveries(bus: &EventBus, webhook_id: &str, count: usize) -> Vec<Delivery> {
    for _ in 0..200 {
        let history = bus.delivery_history(webhook_id).await.unwrap();
        if history.len() >= count {
            return history;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {count} deliveries");
}

/// Poll until the DLQ is non-empty.
async fn wait_for_dead_letter(bus: &EventBus) -> Delivery {
    for _ in 0..200 {
        let entries = bus.dead_letters(10);
        if let Some(entry) = entries.into_iter().next() {
            return entry;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for a dead letter");
}

#[tokio::test]
async fn signed_delivery_succeeds_on_first_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let bus = test_bus();
    let webhook_id = bus
        .create_webhook(
            Webhook::builder(format!("{}/hook", server.uri()))
                .secret("s1")
                .events(vec![types::USER_LOGIN])
                .retry(fast_retry(3))
                .build(),
        )
        .await
        .unwrap();

    let event = Event::new(types::USER_LOGIN).with_id("e1");
    let enqueued = bus.publish(event).await.unwrap();
    assert_eq!(enqueued, 1);

    let history = wait_for_deliveries(&bus, &webhook_id, 1).await;
    let delivery = &history[0];
    assert!(delivery.success);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.status_code, Some(200));
    assert_eq!(delivery.status, DeliveryStatus::Succeeded);
    assert!(delivery.delivered_at.is_some());
    assert!(delivery.next_retry_at.is_none());

    // The request carried the exact envelope signature and headers
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let expected = Signer::new("s1").sign(&request.body);
    assert_eq!(
        request
            .headers
            .get("X-Webhook-Signature")
            .expect("signature header missing"),
        expected.as_str()
    );
    assert_eq!(request.headers.get("X-Event-ID").unwrap(), "e1");
    assert_eq!(request.headers.get("X-Event-Type").unwrap(), "user.login");
    assert_eq!(request.headers.get("X-Webhook-ID").unwrap(), webhook_id.as_str());
    assert_eq!(request.headers.get("Content-Type").unwrap(), "application/json");

    // Webhook bookkeeping observed the success
    let webhook = bus.get_webhook(&webhook_id).unwrap();
    assert!(webhook.last_triggered.is_some());
    assert_eq!(webhook.failure_count, 0);
}

#[tokio::test]
async fn empty_secret_sends_unsigned_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let bus = test_bus();
    let webhook_id = bus
        .create_webhook(
            Webhook::builder(server.uri())
                .secret("")
                .events(vec![types::USER_LOGIN])
                .build(),
        )
        .await
        .unwrap();

    bus.publish(Event::new(types::USER_LOGIN)).await.unwrap();
    wait_for_deliveries(&bus, &webhook_id, 1).await;

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("X-Webhook-Signature").is_none());
}

#[tokio::test]
async fn custom_headers_are_merged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let bus = test_bus();
    let webhook_id = bus
        .create_webhook(
            Webhook::builder(server.uri())
                .events(vec![types::USER_LOGIN])
                .header("X-Team", "sec-ops")
                .build(),
        )
        .await
        .unwrap();

    bus.publish(Event::new(types::USER_LOGIN)).await.unwrap();
    let history = wait_for_deliveries(&bus, &webhook_id, 1).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers.get("X-Team").unwrap(), "sec-ops");
    // Headers are recorded on the delivery as actually sent
    assert_eq!(history[0].headers.get("X-Team").unwrap(), "sec-ops");
}

#[tokio::test]
async fn server_error_is_retried_until_success() {
    let server = MockServer::start().await;
    // First attempt fails with 500, the retry succeeds
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let bus = test_bus();
    let webhook_id = bus
        .create_webhook(
            Webhook::builder(server.uri())
                .events(vec![types::USER_LOGIN])
                .retry(fast_retry(3))
                .build(),
        )
        .await
        .unwrap();

    bus.publish(Event::new(types::USER_LOGIN)).await.unwrap();

    let history = wait_for_deliveries(&bus, &webhook_id, 2).await;
    assert_eq!(history.len(), 2);

    let first = &history[0];
    assert!(!first.success);
    assert_eq!(first.attempts, 1);
    assert_eq!(first.status_code, Some(500));
    assert_eq!(first.status, DeliveryStatus::Failed);
    assert!(first.next_retry_at.is_some());
    assert!(first.delivered_at.is_none());

    let second = &history[1];
    assert!(second.success);
    assert_eq!(second.attempts, 2);
    assert!(second.next_retry_at.is_none());
    assert!(second.delivered_at.is_some());

    // A retry produces a new record, not an update of the old one
    assert_ne!(first.id, second.id);
    assert!(bus.dead_letters(10).is_empty());
}

#[tokio::test]
async fn exhausted_retries_are_dead_lettered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let bus = test_bus();
    let webhook_id = bus
        .create_webhook(
            Webhook::builder(server.uri())
                .events(vec![types::USER_LOGIN])
                .retry(fast_retry(2))
                .build(),
        )
        .await
        .unwrap();

    bus.publish(Event::new(types::USER_LOGIN)).await.unwrap();

    // Initial attempt plus two retries, then the third failure dead-letters
    let entry = wait_for_dead_letter(&bus).await;
    assert_eq!(entry.attempts, 3);
    assert_eq!(entry.status, DeliveryStatus::PermanentlyFailed);
    assert!(entry.next_retry_at.is_none());

    let history = wait_for_deliveries(&bus, &webhook_id, 3).await;
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|d| !d.success));
    assert!(history[0].next_retry_at.is_some());
    assert!(history[1].next_retry_at.is_some());
    assert!(history[2].next_retry_at.is_none());

    // Terminal state is idempotent: no further attempts happen
    tokio::time::sleep(Duration::from_millis(300)).await;
    let history = bus.delivery_history(&webhook_id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(bus.dead_letters(10).len(), 1);
}

#[tokio::test]
async fn client_error_goes_straight_to_dead_letter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let bus = test_bus();
    let webhook_id = bus
        .create_webhook(
            Webhook::builder(server.uri())
                .events(vec![types::USER_LOGIN])
                .retry(fast_retry(5))
                .build(),
        )
        .await
        .unwrap();

    bus.publish(Event::new(types::USER_LOGIN)).await.unwrap();

    let entry = wait_for_dead_letter(&bus).await;
    assert_eq!(entry.attempts, 1);
    assert_eq!(entry.status_code, Some(404));

    // The retry budget was not consumed on a deterministic rejection
    let history = bus.delivery_history(&webhook_id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn retry_after_header_overrides_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let bus = test_bus();
    let webhook_id = bus
        .create_webhook(
            Webhook::builder(server.uri())
                .events(vec![types::USER_LOGIN])
                // Computed backoff would wait far longer than the poll window
                .retry(RetryConfig {
                    max_retries: 2,
                    initial_delay: Duration::from_secs(30),
                    max_delay: Duration::from_secs(30),
                    multiplier: 1.0,
                    timeout: Duration::from_secs(5),
                })
                .build(),
        )
        .await
        .unwrap();

    bus.publish(Event::new(types::USER_LOGIN)).await.unwrap();

    // The retry lands within the Retry-After second, not after 30s
    let history = wait_for_deliveries(&bus, &webhook_id, 2).await;
    assert!(history[1].success);
    assert_eq!(history[1].attempts, 2);
}

#[tokio::test]
async fn filtered_event_is_not_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let bus = test_bus();
    bus.create_webhook(
        Webhook::builder(server.uri())
            .events(vec![types::USER_LOGIN])
            .filter(Filter::new("result", FilterOp::Equals, json!("failure")))
            .build(),
    )
    .await
    .unwrap();

    let event = Event::new(types::USER_LOGIN).with_result("success");
    let enqueued = bus.publish(event).await.unwrap();
    assert_eq!(enqueued, 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn each_matching_webhook_gets_exactly_one_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let bus = test_bus();
    let first = bus
        .create_webhook(
            Webhook::builder(format!("{}/a", server.uri()))
                .events(vec![types::USER_LOGIN])
                .build(),
        )
        .await
        .unwrap();
    let second = bus
        .create_webhook(
            Webhook::builder(format!("{}/b", server.uri()))
                .events(vec!["user.*"])
                .build(),
        )
        .await
        .unwrap();
    let unrelated = bus
        .create_webhook(
            Webhook::builder(format!("{}/c", server.uri()))
                .events(vec![types::TOKEN_REVOKED])
                .build(),
        )
        .await
        .unwrap();

    let enqueued = bus.publish(Event::new(types::USER_LOGIN)).await.unwrap();
    assert_eq!(enqueued, 2);

    assert_eq!(wait_for_deliveries(&bus, &first, 1).await.len(), 1);
    assert_eq!(wait_for_deliveries(&bus, &second, 1).await.len(), 1);
    assert!(bus.delivery_history(&unrelated).await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn dead_letter_retry_starts_a_fresh_attempt_sequence() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let bus = test_bus();
    let webhook_id = bus
        .create_webhook(
            Webhook::builder(server.uri())
                .events(vec![types::USER_LOGIN])
                .retry(fast_retry(0))
                .build(),
        )
        .await
        .unwrap();

    bus.publish(Event::new(types::USER_LOGIN)).await.unwrap();
    let entry = wait_for_dead_letter(&bus).await;
    assert_eq!(entry.attempts, 1);

    // The endpoint recovers
    server.reset().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    bus.retry_dead_letter(&entry.id).await.unwrap();
    assert!(bus.dead_letters(10).is_empty());

    let history = wait_for_deliveries(&bus, &webhook_id, 2).await;
    let resubmitted = &history[1];
    assert!(resubmitted.success);
    // Fresh sequence: counter restarts, new record ID
    assert_eq!(resubmitted.attempts, 1);
    assert_ne!(resubmitted.id, entry.id);
}

#[tokio::test]
async fn manual_test_delivery_reports_its_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let bus = test_bus();
    let webhook_id = bus
        .create_webhook(
            Webhook::builder(server.uri())
                .events(vec![types::USER_LOGIN])
                .build(),
        )
        .await
        .unwrap();

    let delivery = bus.test_webhook(&webhook_id).await.unwrap();
    assert!(delivery.success);
    assert_eq!(delivery.attempts, 1);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get("X-Event-Type").unwrap(),
        types::WEBHOOK_TEST
    );
}

#[tokio::test]
async fn drain_shutdown_completes_queued_deliveries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let bus = test_bus();
    let webhook_id = bus
        .create_webhook(
            Webhook::builder(server.uri())
                .events(vec![types::USER_LOGIN])
                .build(),
        )
        .await
        .unwrap();

    bus.publish(Event::new(types::USER_LOGIN)).await.unwrap();
    bus.shutdown_drain().await;

    let history = bus.delivery_history(&webhook_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].success);

    // New work is refused after shutdown
    let err = bus.publish(Event::new(types::USER_LOGIN)).await.unwrap_err();
    assert!(matches!(
        err,
        hookwire::EventBusError::Webhook(hookwire::WebhookError::ShuttingDown)
    ));
}

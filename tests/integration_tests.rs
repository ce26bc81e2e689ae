use std::time::Duration;

use apns_core::{
    ApnsError, Environment, Identity, Notification, Outcome, PushQueue, QueueConfig,
    MAX_PAYLOAD_SIZE, MAX_RETRY_ATTEMPTS,
};
use serde_json::json;
use tokio::time::{sleep, timeout};

const DEVICE_TOKEN: &str = "bedb115e0f9afef1bbc49eb03cd789365956aa4bef1f6229f504541f8e2dfdca";

fn sample_payload() -> serde_json::Value {
    json!({
        "aps": {
            "alert": "You've got emails.",
            "badge": 9,
            "sound": "bingbong.aiff",
        },
        "foo": "bar",
        "answer": 42,
    })
}

fn self_signed_identity() -> Identity {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    Identity::from_der(
        vec![certified.cert.der().to_vec()],
        certified.key_pair.serialize_der(),
    )
    .unwrap()
}

async fn wait_for_tracked(queue: &PushQueue, identifier: u32) -> Notification {
    for _ in 0..200 {
        if let Some(notification) = queue.tracked(identifier) {
            return notification;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("notification {} never reached the correlation table", identifier);
}

#[tokio::test]
async fn test_full_dispatch_cycle_in_test_environment() {
    let queue = PushQueue::new(Environment::Test, None).unwrap();
    assert_eq!(queue.env(), Environment::Test);

    queue
        .submit(Notification::new(DEVICE_TOKEN, sample_payload()))
        .await
        .unwrap();

    let tracked = wait_for_tracked(&queue, 1).await;
    assert_eq!(tracked.outcome(), Outcome::Sent);
    assert_eq!(tracked.attempts(), 0);
    assert!(tracked.error().is_none());

    println!("✓ Dispatch cycle: submitted → sent → tracked under identifier 1");
}

#[tokio::test]
async fn test_submission_order_is_preserved() {
    let queue = PushQueue::new(Environment::Test, None).unwrap();
    let sender = queue.sender();

    for n in 0..10u64 {
        sender
            .send(Notification::new(DEVICE_TOKEN, json!({ "aps": {}, "seq": n })))
            .await
            .unwrap();
    }

    for identifier in 1..=10 {
        let tracked = wait_for_tracked(&queue, identifier).await;
        assert_eq!(tracked.outcome(), Outcome::Sent);
        let seq = tracked.payload["seq"].as_u64().unwrap();
        assert_eq!(seq, identifier as u64 - 1, "identifier {} carries wrong payload", identifier);
    }

    println!("✓ Ordering: 10 submissions dispatched in submission order");
}

#[tokio::test]
async fn test_bad_token_surfaces_on_failure_queue() {
    let mut queue = PushQueue::new(Environment::Test, None).unwrap();
    let mut failures = queue.take_failures().unwrap();

    queue
        .submit(Notification::new("not-a-token", sample_payload()))
        .await
        .unwrap();

    let failed = timeout(Duration::from_secs(2), failures.recv())
        .await
        .expect("failure never published")
        .unwrap();
    assert_eq!(failed.outcome(), Outcome::Invalid);
    assert_eq!(failed.error(), Some(&ApnsError::BadDeviceToken));

    println!("✓ Validation: bad token rejected without a transport attempt");
}

#[tokio::test]
async fn test_oversize_payload_surfaces_on_failure_queue() {
    let mut queue = PushQueue::new(Environment::Test, None).unwrap();
    let mut failures = queue.take_failures().unwrap();

    let padding = "x".repeat(MAX_PAYLOAD_SIZE + 20);
    queue
        .submit(Notification::new(DEVICE_TOKEN, json!({ "pad": padding })))
        .await
        .unwrap();

    let failed = timeout(Duration::from_secs(2), failures.recv())
        .await
        .expect("failure never published")
        .unwrap();
    assert_eq!(failed.outcome(), Outcome::Invalid);
    match failed.error() {
        Some(ApnsError::PayloadTooLarge { size }) => assert!(*size > MAX_PAYLOAD_SIZE),
        other => panic!("expected PayloadTooLarge, got {:?}", other),
    }

    println!("✓ Validation: oversize payload rejected without a transport attempt");
}

#[tokio::test]
async fn test_retry_exhaustion_against_unreachable_gateway() {
    // Port 1 refuses connections immediately, so every attempt is a
    // fast transport failure.
    let config = QueueConfig::new()
        .with_gateway_addr("127.0.0.1:1")
        .with_retry_delay(Duration::from_millis(20));
    let mut queue =
        PushQueue::with_config(Environment::Sandbox, Some(self_signed_identity()), config)
            .unwrap();
    let mut failures = queue.take_failures().unwrap();

    queue
        .submit(Notification::new(DEVICE_TOKEN, sample_payload()))
        .await
        .unwrap();

    let failed = timeout(Duration::from_secs(5), failures.recv())
        .await
        .expect("failure never published")
        .unwrap();
    assert_eq!(failed.outcome(), Outcome::Failed);
    assert_eq!(failed.error(), Some(&ApnsError::RefusedByGateway));
    assert_eq!(failed.attempts(), MAX_RETRY_ATTEMPTS);

    // The retry budget is spent; nothing else may arrive for this
    // notification.
    assert!(timeout(Duration::from_millis(200), failures.recv())
        .await
        .is_err());

    println!(
        "✓ Retry exhaustion: {} retries then terminal failure",
        MAX_RETRY_ATTEMPTS
    );
}

#[tokio::test]
async fn test_mixed_batch_partitions_into_sent_and_failed() {
    let mut queue = PushQueue::new(Environment::Test, None).unwrap();
    let mut failures = queue.take_failures().unwrap();

    queue
        .submit(Notification::new(DEVICE_TOKEN, sample_payload()))
        .await
        .unwrap();
    queue
        .submit(Notification::new("deadbeef", sample_payload()))
        .await
        .unwrap();
    queue
        .submit(Notification::new(DEVICE_TOKEN, json!({ "ok": true })))
        .await
        .unwrap();

    let failed = timeout(Duration::from_secs(2), failures.recv())
        .await
        .expect("failure never published")
        .unwrap();
    assert_eq!(failed.identifier(), 2);
    assert_eq!(failed.error(), Some(&ApnsError::BadDeviceToken));

    let first = wait_for_tracked(&queue, 1).await;
    let third = wait_for_tracked(&queue, 3).await;
    assert_eq!(first.outcome(), Outcome::Sent);
    assert_eq!(third.outcome(), Outcome::Sent);
    assert!(queue.tracked(2).is_none());

    println!("✓ Mixed batch: failures isolated, valid notifications delivered");
}

//! Integration tests for the decision channel contract.

use std::time::Duration;

use latchkey_network::DecisionChannel;
use latchkey_network::mock::MockDecisionChannel;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_decision_from_another_task_is_visible() {
    let (channel, authority) = MockDecisionChannel::new();

    let responder = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        authority.deliver("{\"status\":\"allow\"}\n");
        authority
    });

    channel.publish_request("{\"type\":\"qr\",\"data\":\"x\"}").await.unwrap();
    let sent = Instant::now();

    let decision = loop {
        if let Some(decision) = channel.latest_decision() {
            break decision;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    assert_eq!(decision.payload, "{\"status\":\"allow\"}");
    assert!(decision.received_at >= sent);
    assert_eq!(responder.await.unwrap().publish_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_only_the_latest_message_is_kept() {
    let (channel, authority) = MockDecisionChannel::new();
    let base = Instant::now();

    authority.deliver_at("{\"status\":\"deny\"}", base);
    authority.deliver_at("{\"status\":\"allow\"}", base + Duration::from_millis(5));

    let latest = channel.latest_decision().unwrap();
    assert_eq!(latest.payload, "{\"status\":\"allow\"}");
    assert_eq!(latest.received_at, base + Duration::from_millis(5));
}

#[tokio::test(start_paused = true)]
async fn test_old_decision_survives_a_new_publish() {
    let (channel, authority) = MockDecisionChannel::new();
    authority.deliver("{\"status\":\"allow\"}");

    tokio::time::advance(Duration::from_secs(1)).await;
    channel.publish_request("next").await.unwrap();

    let latest = channel.latest_decision().unwrap();
    assert!(latest.received_at < authority.last_published_at().unwrap());
}

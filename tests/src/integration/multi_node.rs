//! # Multi-Node Flows
//!
//! Envelopes sealed on one node and delivered over the wire to another:
//! the receiver verifies the seal, merges the sender's clock and applies
//! the payload with the sender's causal stamp.

use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;

use bb_04_stream_relay::StreamEvent;
use node_runtime::{IngressRequest, RegionWorker};
use shared_bus::{BackboneEvent, EventFilter, EventTopic, Subscription};
use shared_types::{
    ControlCommand, Enrichment, Envelope, Payload, Region, SecurityLevel, VectorClock,
};

use super::harness::{node_config, EchoBackend, TestNode, VocabularyEmbedder};

const WAIT: Duration = Duration::from_secs(5);

/// Seal `payload` on `sender` with the given clock.
fn sealed_on(sender: &TestNode, payload: Payload, priority: i64, clock: VectorClock) -> Envelope {
    let mut envelope =
        Envelope::create(payload, priority, Region::Local, SecurityLevel::Internal).unwrap();
    envelope
        .enrich(
            Enrichment::new()
                .with_causal_stamp(sender.container.clock.node_id(), clock)
                .with_meta("source", "replication"),
        )
        .unwrap();
    envelope
        .seal(sender.container.signer.as_ref())
        .unwrap();
    envelope
}

/// Decode and verify on `receiver`, as its transport would.
fn deliver(receiver: &TestNode, wire: &str) -> Envelope {
    let envelope = Envelope::from_wire(wire).unwrap();
    assert!(envelope.verify(receiver.container.signer.as_ref()));
    envelope
}

async fn next_memory_write(events: &mut Subscription) -> String {
    loop {
        match timeout(WAIT, events.recv()).await.expect("event within deadline") {
            Some(BackboneEvent::MemoryWritten { outcome, .. }) => return outcome,
            Some(_) => continue,
            None => panic!("bus closed"),
        }
    }
}

#[tokio::test]
async fn test_replicated_write_merges_sender_clock() {
    let node_a = TestNode::started("node-a");
    let node_b = TestNode::started("node-b");
    let mut writes = node_b
        .container
        .event_bus
        .subscribe(EventFilter::topics(vec![EventTopic::Memory]));

    let clock = node_a.container.clock.tick();
    let envelope = sealed_on(
        &node_a,
        Payload::memory_upsert("fact-1", "The secret password is 'Blueberry'."),
        1,
        clock,
    );
    let received = deliver(&node_b, &envelope.to_wire().unwrap());
    node_b.container.dispatcher.enqueue(received).unwrap();

    assert_eq!(next_memory_write(&mut writes).await, "inserted");
    let merged = node_b.container.clock.snapshot();
    assert_eq!(merged.get("node-a"), 1);

    // The next local tick dominates what node-a sent
    let next = node_b.container.clock.tick();
    assert_eq!(next.get("node-a"), 1);
    assert_eq!(next.get("node-b"), 1);

    node_a.runtime.shutdown().await;
    node_b.runtime.shutdown().await;
}

#[tokio::test]
async fn test_every_sealed_envelope_verifies_on_peer() {
    let node_a = TestNode::started("node-a");
    let node_b = TestNode::started("node-b");

    for round in 0..500 {
        let envelope = sealed_on(
            &node_a,
            Payload::memory_upsert(format!("fact-{round}"), "replicated fact"),
            round % 11,
            node_a.container.clock.tick(),
        );
        let received = deliver(&node_b, &envelope.to_wire().unwrap());
        assert_eq!(received.timestamp(), envelope.timestamp());
    }

    node_a.runtime.shutdown().await;
    node_b.runtime.shutdown().await;
}

#[tokio::test]
async fn test_tampered_envelope_fails_verification() {
    let node_a = TestNode::started("node-a");
    let node_b = TestNode::started("node-b");

    let envelope = sealed_on(
        &node_a,
        Payload::memory_upsert("fact-1", "my name is Ada"),
        1,
        node_a.container.clock.tick(),
    );
    let wire = envelope
        .to_wire()
        .unwrap()
        .replace("my name is Ada", "my name is Eve");
    let forged = Envelope::from_wire(&wire).unwrap();

    assert!(!forged.verify(node_b.container.signer.as_ref()));

    node_a.runtime.shutdown().await;
    node_b.runtime.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_writes_resolve_the_same_everywhere() {
    let node_a = TestNode::started("node-a");
    let node_c = TestNode::started("node-c");
    let node_b = TestNode::build(
        node_config("node-b"),
        std::sync::Arc::new(VocabularyEmbedder),
        EchoBackend::new(),
    );
    let worker = RegionWorker::new(Region::Local, 0, node_b.container.clone());

    let from_a = sealed_on(
        &node_a,
        Payload::memory_upsert("fact-1", "weather is sunny"),
        5,
        node_a.container.clock.tick(),
    );
    let from_c = sealed_on(
        &node_c,
        Payload::memory_upsert("fact-1", "weather is rainy"),
        1,
        node_c.container.clock.tick(),
    );

    for envelope in [from_c, from_a] {
        let received = deliver(&node_b, &envelope.to_wire().unwrap());
        worker.handle(received).await;
    }

    let history = node_b.container.memory.history("fact-1").await.unwrap();
    assert_eq!(history.current.value.text, "weather is sunny");
    assert_eq!(history.current.stamp.node_id, "node-a");
    assert_eq!(history.superseded.len(), 1);
    assert_eq!(history.superseded[0].version.value.text, "weather is rainy");

    let lookup = node_b.container.memory.search("weather today?", 1).await;
    assert_eq!(lookup.as_context().as_deref(), Some("weather is sunny"));

    node_a.runtime.shutdown().await;
    node_c.runtime.shutdown().await;
}

#[tokio::test]
async fn test_remote_cancel_reaches_running_stream() {
    let node_a = TestNode::started("node-a");
    let gate = std::sync::Arc::new(Semaphore::new(1));
    let node_b = TestNode::build(
        node_config("node-b"),
        std::sync::Arc::new(VocabularyEmbedder),
        EchoBackend::gated(gate.clone()),
    );
    node_b.runtime.start();

    let mut submission = node_b
        .runtime
        .ingress()
        .submit(IngressRequest::new("stream a long answer"))
        .await
        .unwrap();
    assert_eq!(
        timeout(WAIT, submission.stream.recv()).await.unwrap(),
        Some(StreamEvent::token("stream "))
    );

    let control = sealed_on(
        &node_a,
        Payload::Control {
            command: ControlCommand::Cancel {
                trace_id: submission.trace_id.clone(),
            },
        },
        10,
        node_a.container.clock.tick(),
    );
    let received = deliver(&node_b, &control.to_wire().unwrap());
    node_b.container.dispatcher.enqueue(received).unwrap();

    assert_eq!(
        timeout(WAIT, submission.stream.recv()).await.unwrap(),
        Some(StreamEvent::Cancelled)
    );
    assert_eq!(node_b.backend.closes(), 1);

    gate.add_permits(16);
    node_a.runtime.shutdown().await;
    node_b.runtime.shutdown().await;
}

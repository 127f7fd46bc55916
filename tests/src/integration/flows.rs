//! # Single-Node Flows
//!
//! ```text
//! Ingress ──→ MemoryGateway(2) ──→ Dispatcher(3) ──→ RegionWorker ──→ StreamRelay(4) ──→ caller
//! ```
//!
//! 1. **Degraded memory**: chat still completes without context
//! 2. **Duplicate delivery**: a trace id is dispatched at most once
//! 3. **Cancellation**: tokens stop and the backend is released
//! 4. **Shutdown**: queued callers fail, running streams are cancelled
//! 5. **Retrieval**: a remembered fact reaches a later prompt
//! 6. **Priority**: user chat overtakes queued memory writes

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;

use bb_03_dispatcher::DispatchError;
use bb_04_stream_relay::StreamEvent;
use node_runtime::{IngressError, IngressRequest};
use shared_bus::{BackboneEvent, EventFilter, EventTopic, StreamOutcome, Subscription};
use shared_types::{Payload, Region, TraceId};

use super::harness::{node_config, EchoBackend, TestNode, UnreachableEmbedder, VocabularyEmbedder};

const WAIT: Duration = Duration::from_secs(5);

/// Events until (and including) the matching `StreamFinished`.
async fn until_finished(events: &mut Subscription) -> Vec<BackboneEvent> {
    let mut seen = Vec::new();
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("event within deadline")
            .expect("bus open");
        let done = matches!(event, BackboneEvent::StreamFinished { .. });
        seen.push(event);
        if done {
            return seen;
        }
    }
}

async fn next_memory_write(events: &mut Subscription) -> (String, String) {
    loop {
        match timeout(WAIT, events.recv()).await.expect("event within deadline") {
            Some(BackboneEvent::MemoryWritten { key, outcome }) => return (key, outcome),
            Some(_) => continue,
            None => panic!("bus closed"),
        }
    }
}

#[tokio::test]
async fn test_chat_completes_when_memory_backend_down() {
    let node = TestNode::build(
        node_config("node-1"),
        Arc::new(UnreachableEmbedder),
        EchoBackend::new(),
    );
    node.runtime.start();
    let trace = TraceId::parse("joke-1").unwrap();
    let mut events = node
        .container
        .event_bus
        .subscribe(EventFilter::for_trace(trace.clone()));

    let submission = node
        .runtime
        .ingress()
        .submit(IngressRequest::new("tell me a joke").with_trace_id("joke-1"))
        .await
        .unwrap();
    let (text, terminal) = timeout(WAIT, submission.stream.collect_text())
        .await
        .unwrap();

    assert_eq!(text, "tell me a joke");
    assert_eq!(terminal, Some(StreamEvent::Completed));
    assert_eq!(node.backend.prompts(), vec!["tell me a joke".to_string()]);

    let seen = until_finished(&mut events).await;
    assert!(seen
        .iter()
        .any(|e| matches!(e, BackboneEvent::MemoryDegraded { .. })));
    assert!(seen
        .iter()
        .any(|e| matches!(e, BackboneEvent::EnvelopeDispatched { .. })));
    assert!(matches!(
        seen.last(),
        Some(BackboneEvent::StreamFinished {
            outcome: StreamOutcome::Completed,
            tokens: 4,
            error: None,
            ..
        })
    ));

    node.runtime.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_trace_id_dispatched_once() {
    let gate = Arc::new(Semaphore::new(0));
    let node = TestNode::build(
        node_config("node-1"),
        Arc::new(VocabularyEmbedder),
        EchoBackend::gated(Arc::clone(&gate)),
    );
    node.runtime.start();
    let ingress = node.runtime.ingress();

    let first = ingress
        .submit(IngressRequest::new("hello there").with_trace_id("req-7"))
        .await
        .unwrap();
    let again = ingress
        .submit(IngressRequest::new("hello there").with_trace_id("req-7"))
        .await
        .unwrap_err();
    assert!(matches!(
        again,
        IngressError::Dispatch(DispatchError::Duplicate { .. })
    ));

    gate.add_permits(16);
    let (text, terminal) = timeout(WAIT, first.stream.collect_text()).await.unwrap();
    assert_eq!(text, "hello there");
    assert_eq!(terminal, Some(StreamEvent::Completed));

    // Retired ids stay owned until their TTL expires
    let late = ingress
        .submit(IngressRequest::new("hello there").with_trace_id("req-7"))
        .await
        .unwrap_err();
    assert!(matches!(
        late,
        IngressError::Dispatch(DispatchError::Duplicate { .. })
    ));
    assert_eq!(node.backend.prompts().len(), 1);

    node.runtime.shutdown().await;
}

#[tokio::test]
async fn test_cancel_mid_stream_stops_tokens() {
    let gate = Arc::new(Semaphore::new(1));
    let node = TestNode::build(
        node_config("node-1"),
        Arc::new(VocabularyEmbedder),
        EchoBackend::gated(Arc::clone(&gate)),
    );
    node.runtime.start();
    let ingress = node.runtime.ingress();
    let mut stream_events = node
        .container
        .event_bus
        .subscribe(EventFilter::topics(vec![EventTopic::Stream]));

    let mut submission = ingress
        .submit(IngressRequest::new("one two three four"))
        .await
        .unwrap();
    assert_eq!(
        timeout(WAIT, submission.stream.recv()).await.unwrap(),
        Some(StreamEvent::token("one "))
    );

    assert!(ingress.cancel(&submission.trace_id).await);
    gate.add_permits(16);

    assert_eq!(
        timeout(WAIT, submission.stream.recv()).await.unwrap(),
        Some(StreamEvent::Cancelled)
    );
    assert_eq!(submission.stream.recv().await, None);
    assert_eq!(node.backend.closes(), 1);

    let seen = until_finished(&mut stream_events).await;
    assert!(matches!(
        seen.last(),
        Some(BackboneEvent::StreamFinished {
            outcome: StreamOutcome::Cancelled,
            tokens: 1,
            ..
        })
    ));

    node.runtime.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_answers_every_live_caller() {
    let gate = Arc::new(Semaphore::new(1));
    let mut config = node_config("node-1");
    config.dispatch.region_workers = [(Region::Local, 1)].into();
    let node = TestNode::build(
        config,
        Arc::new(VocabularyEmbedder),
        EchoBackend::gated(Arc::clone(&gate)),
    );
    node.runtime.start();
    let ingress = node.runtime.ingress();

    let mut streaming = ingress
        .submit(IngressRequest::new("one two three"))
        .await
        .unwrap();
    assert_eq!(
        timeout(WAIT, streaming.stream.recv()).await.unwrap(),
        Some(StreamEvent::token("one "))
    );
    let queued = ingress.submit(IngressRequest::new("still waiting")).await.unwrap();

    let abandoned = timeout(WAIT, node.runtime.shutdown())
        .await
        .expect("shutdown within deadline");
    assert_eq!(abandoned, 1);

    let (text, terminal) = timeout(WAIT, queued.stream.collect_text()).await.unwrap();
    assert_eq!(text, "");
    assert!(matches!(terminal, Some(StreamEvent::Failed { .. })));

    assert_eq!(
        timeout(WAIT, streaming.stream.recv()).await.unwrap(),
        Some(StreamEvent::Cancelled)
    );
    assert_eq!(streaming.stream.recv().await, None);
    assert_eq!(node.backend.closes(), 1);
    assert!(node.backend.prompts().iter().all(|p| !p.contains("still waiting")));
}

#[tokio::test]
async fn test_remembered_fact_reaches_later_prompt() {
    let node = TestNode::started("node-1");
    let ingress = node.runtime.ingress();
    let mut memory_events = node
        .container
        .event_bus
        .subscribe(EventFilter::topics(vec![EventTopic::Memory]));

    ingress
        .remember("fact-1", "My name is Super Elit and I use Debian Linux.")
        .await
        .unwrap();
    assert_eq!(
        next_memory_write(&mut memory_events).await,
        ("fact-1".to_string(), "inserted".to_string())
    );

    let submission = ingress
        .submit(IngressRequest::new("Which distro do I run, Debian?"))
        .await
        .unwrap();
    let (text, terminal) = timeout(WAIT, submission.stream.collect_text())
        .await
        .unwrap();

    assert_eq!(text, "Which distro do I run, Debian?");
    assert_eq!(terminal, Some(StreamEvent::Completed));
    assert_eq!(
        node.backend.prompts(),
        vec![
            "Context: My name is Super Elit and I use Debian Linux.\n\n\
             User Question: Which distro do I run, Debian?"
                .to_string()
        ]
    );

    node.runtime.shutdown().await;
}

#[tokio::test]
async fn test_chat_overtakes_queued_memory_writes() {
    let node = TestNode::build(
        node_config("node-1"),
        Arc::new(VocabularyEmbedder),
        EchoBackend::new(),
    );
    let ingress = node.runtime.ingress();

    ingress.remember("fact-1", "weather is mild").await.unwrap();
    ingress.remember("fact-2", "rust is fun").await.unwrap();
    let chat = ingress
        .submit(IngressRequest::new("hello"))
        .await
        .unwrap();

    let dispatcher = &node.container.dispatcher;
    let first = dispatcher.try_dequeue(Region::Local).unwrap();
    assert_eq!(first.trace_id(), &chat.trace_id);
    assert!(matches!(first.payload(), Payload::ChatCompletion { .. }));
    assert_eq!(dispatcher.depth(Region::Local), 2);

    assert_eq!(node.runtime.shutdown().await, 2);
}

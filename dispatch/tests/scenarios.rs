//! End-to-end dispatcher scenarios against the in-memory broker.
//!
//! These tests pin the retry/dead-letter state machine:
//! - a transiently failing handler is retried with an incremented counter and
//!   eventually acknowledged,
//! - an always-failing handler exhausts its budget and lands in the DLQ with
//!   its payload intact,
//! - undecodable and permanently rejected payloads dead-letter immediately.

#![allow(clippy::unwrap_used)]

use coursehub_core::envelope::Envelope;
use coursehub_core::handler::{EventHandler, HandlerError};
use coursehub_core::queue::{BoxFuture, MessageQueue};
use coursehub_core::topology::{QueueTopology, Topology};
use coursehub_dispatch::{Dispatcher, Publisher};
use coursehub_testing::handlers::FlakyHandler;
use coursehub_testing::InMemoryBroker;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseCreation {
    course_id: String,
    educator_id: String,
}

fn course_event() -> CourseCreation {
    CourseCreation {
        course_id: "c-42".to_owned(),
        educator_id: "e-7".to_owned(),
    }
}

fn topology() -> Topology {
    Topology::new().with_queue(QueueTopology::new("course_creation"))
}

async fn declared_broker(topology: &Topology) -> Arc<InMemoryBroker> {
    let broker = Arc::new(InMemoryBroker::new());
    broker.declare_topology(topology).await.unwrap();
    broker
}

/// Poll until `check` holds, or fail the test after five seconds.
async fn eventually<F, Fut>(check: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn handler_failing_twice_is_acked_on_third_delivery() {
    let topology = topology();
    let broker = declared_broker(&topology).await;
    let publisher = Publisher::new(broker.clone());
    publisher
        .publish("course_creation", &course_event())
        .await
        .unwrap();

    let handler = FlakyHandler::failing(2);
    let (dispatcher, shutdown) = Dispatcher::<CourseCreation, _>::new(
        broker.clone(),
        &topology,
        "course_creation",
        handler.clone(),
    )
    .unwrap();
    let worker = tokio::spawn(dispatcher.run());

    tokio::time::timeout(Duration::from_secs(5), handler.wait_until_succeeded())
        .await
        .unwrap();
    // The ack trails the handler's success signal by one await.
    eventually(|| {
        let broker = broker.clone();
        async move { broker.queue_len("course_creation").await == 0 }
    })
    .await;

    shutdown.send(true).unwrap();
    worker.await.unwrap().unwrap();

    assert_eq!(handler.retry_counts().await, vec![0, 1, 2]);
    assert_eq!(broker.queue_len("course_creation").await, 0);
    assert_eq!(broker.queue_len("course_creation_dlq").await, 0);
}

#[tokio::test]
async fn exhausted_retry_budget_dead_letters_with_payload_intact() {
    let topology = topology();
    let broker = declared_broker(&topology).await;
    let publisher = Publisher::new(broker.clone());
    publisher
        .publish("course_creation", &course_event())
        .await
        .unwrap();

    let handler = FlakyHandler::always_failing();
    let (dispatcher, shutdown) = Dispatcher::<CourseCreation, _>::new(
        broker.clone(),
        &topology,
        "course_creation",
        handler.clone(),
    )
    .unwrap();
    let worker = tokio::spawn(dispatcher.run());

    eventually(|| {
        let broker = broker.clone();
        async move { broker.queue_len("course_creation_dlq").await == 1 }
    })
    .await;

    shutdown.send(true).unwrap();
    worker.await.unwrap().unwrap();

    // Deliveries carried retry counts 0 through max_retries; the message was
    // dead-lettered exactly when the counter reached the budget.
    assert_eq!(handler.retry_counts().await, vec![0, 1, 2, 3]);
    assert_eq!(broker.queue_len("course_creation").await, 0);

    let dead = broker.messages("course_creation_dlq").await;
    let wire: serde_json::Value = serde_json::from_slice(&dead[0]).unwrap();
    assert_eq!(wire["courseId"], json!("c-42"));
    assert_eq!(wire["educatorId"], json!("e-7"));
    assert_eq!(wire["retryCount"], json!(3));
}

#[tokio::test]
async fn undecodable_payload_dead_letters_without_invoking_handler() {
    let topology = topology();
    let broker = declared_broker(&topology).await;
    broker
        .publish("course_creation", b"not json at all".to_vec())
        .await
        .unwrap();

    let handler = FlakyHandler::failing(0);
    let (dispatcher, shutdown) = Dispatcher::<CourseCreation, _>::new(
        broker.clone(),
        &topology,
        "course_creation",
        handler.clone(),
    )
    .unwrap();
    let worker = tokio::spawn(dispatcher.run());

    eventually(|| {
        let broker = broker.clone();
        async move { broker.queue_len("course_creation_dlq").await == 1 }
    })
    .await;

    shutdown.send(true).unwrap();
    worker.await.unwrap().unwrap();

    assert!(handler.retry_counts().await.is_empty());
    assert_eq!(
        broker.messages("course_creation_dlq").await,
        vec![b"not json at all".to_vec()]
    );
}

#[tokio::test]
async fn permanent_classification_skips_retries() {
    let topology = topology();
    let broker = declared_broker(&topology).await;
    let publisher = Publisher::new(broker.clone());
    publisher
        .publish("course_creation", &course_event())
        .await
        .unwrap();

    let handler = FlakyHandler::permanently_failing();
    let (dispatcher, shutdown) = Dispatcher::<CourseCreation, _>::new(
        broker.clone(),
        &topology,
        "course_creation",
        handler.clone(),
    )
    .unwrap();
    let worker = tokio::spawn(dispatcher.run());

    eventually(|| {
        let broker = broker.clone();
        async move { broker.queue_len("course_creation_dlq").await == 1 }
    })
    .await;

    shutdown.send(true).unwrap();
    worker.await.unwrap().unwrap();

    // A single delivery: permanent failures never retry.
    assert_eq!(handler.retry_counts().await, vec![0]);
    assert_eq!(broker.queue_len("course_creation").await, 0);
}

#[tokio::test]
async fn retry_republish_preserves_unknown_payload_fields() {
    // A producer newer than this consumer may include fields the typed event
    // does not model; they must survive the retry round-trip into the DLQ.
    let topology =
        Topology::new().with_queue(QueueTopology::new("course_creation").with_max_retries(1));
    let broker = declared_broker(&topology).await;

    let body = serde_json::to_vec(&json!({
        "courseId": "c-42",
        "educatorId": "e-7",
        "rolloutFlag": {"cohort": "beta"},
        "timestamp": "2025-01-01T00:00:00Z",
        "retryCount": 0,
    }))
    .unwrap();
    broker.publish("course_creation", body).await.unwrap();

    let handler = FlakyHandler::always_failing();
    let (dispatcher, shutdown) = Dispatcher::<CourseCreation, _>::new(
        broker.clone(),
        &topology,
        "course_creation",
        handler.clone(),
    )
    .unwrap();
    let worker = tokio::spawn(dispatcher.run());

    eventually(|| {
        let broker = broker.clone();
        async move { broker.queue_len("course_creation_dlq").await == 1 }
    })
    .await;

    shutdown.send(true).unwrap();
    worker.await.unwrap().unwrap();

    let dead = broker.messages("course_creation_dlq").await;
    let wire: serde_json::Value = serde_json::from_slice(&dead[0]).unwrap();
    assert_eq!(wire["rolloutFlag"], json!({"cohort": "beta"}));
    assert_eq!(wire["retryCount"], json!(1));
}

/// Handler that parks until released, to observe shutdown draining.
struct GatedHandler {
    started: watch::Sender<bool>,
    gate: Arc<Notify>,
    completed: watch::Sender<bool>,
}

impl GatedHandler {
    fn new() -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let (started, _) = watch::channel(false);
        let (completed, _) = watch::channel(false);
        (
            Arc::new(Self {
                started,
                gate: Arc::clone(&gate),
                completed,
            }),
            gate,
        )
    }
}

impl EventHandler<serde_json::Value> for GatedHandler {
    fn handle<'a>(
        &'a self,
        _envelope: &'a Envelope<serde_json::Value>,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let _ = self.started.send(true);
            self.gate.notified().await;
            let _ = self.completed.send(true);
            Ok(())
        })
    }
}

#[tokio::test]
async fn shutdown_drains_in_flight_deliveries() {
    let topology = topology();
    let broker = declared_broker(&topology).await;
    broker
        .publish(
            "course_creation",
            serde_json::to_vec(&json!({
                "courseId": "c-1",
                "timestamp": "2025-01-01T00:00:00Z",
            }))
            .unwrap(),
        )
        .await
        .unwrap();

    let (handler, gate) = GatedHandler::new();
    let (dispatcher, shutdown) = Dispatcher::<serde_json::Value, _>::new(
        broker.clone(),
        &topology,
        "course_creation",
        handler.clone(),
    )
    .unwrap();
    let worker = tokio::spawn(dispatcher.run());

    let mut started = handler.started.subscribe();
    tokio::time::timeout(Duration::from_secs(5), started.wait_for(|v| *v))
        .await
        .unwrap()
        .unwrap();

    // Signal shutdown while the handler is mid-flight, then release it.
    shutdown.send(true).unwrap();
    gate.notify_one();
    worker.await.unwrap().unwrap();

    let completed = *handler.completed.subscribe().borrow();
    assert!(completed, "in-flight handler should finish before run returns");
    assert_eq!(broker.queue_len("course_creation").await, 0);
}

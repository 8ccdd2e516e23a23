//! Shared fixtures: the movie schema and a transport that records what it
//! is given
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use graphsub::errors::TransportError;
use graphsub::events::Properties;
use graphsub::graphql::parse_subscription;
use graphsub::{
    EngineConfig, RawMutationRecord, SchemaMetadata, SubscriptionEngine, SubscriptionHandle,
    Transport, TypeRegistry,
};
use serde_json::Value;
use tokio::sync::{mpsc, Semaphore};

pub const MOVIE_SCHEMA: &str = r#"
types:
  - name: Movie
    fields:
      - { name: id, kind: ID, nullable: false }
      - { name: title, kind: String }
      - { name: releasedIn, kind: Int }
      - { name: averageRating, kind: Float }
      - { name: tags, kind: String, list: true }
    relationships:
      - name: actors
        type: ACTED_IN
        direction: IN
        target: Actor
        properties:
          - { name: screenTime, kind: Int }
      - name: directors
        type: DIRECTED
        direction: IN
        target: Director
        properties:
          - { name: year, kind: Int }
      - name: reviewers
        type: REVIEWED
        direction: IN
        target: Reviewer
        properties:
          - { name: score, kind: Float }
  - name: Actor
    fields:
      - { name: name, kind: String, nullable: false }
    relationships:
      - name: movies
        type: ACTED_IN
        direction: OUT
        target: Movie
        properties:
          - { name: screenTime, kind: Int }
      - name: directed
        type: DIRECTED
        direction: OUT
        target: Movie
        properties:
          - { name: year, kind: Int }
  - name: Person
    implements: [Reviewer]
    fields:
      - { name: name, kind: String, nullable: false }
      - { name: reputation, kind: Int }
    relationships:
      - name: reviewed
        type: REVIEWED
        direction: OUT
        target: Movie
        properties:
          - { name: score, kind: Float }
  - name: Influencer
    implements: [Reviewer]
    fields:
      - { name: url, kind: String }
      - { name: reputation, kind: Int }
interfaces:
  - name: Reviewer
    fields:
      - { name: reputation, kind: Int }
unions:
  - name: Director
    members: [Person, Actor]
"#;

pub fn schema() -> TypeRegistry {
    let metadata = SchemaMetadata::from_yaml_str(MOVIE_SCHEMA).unwrap();
    TypeRegistry::from_metadata(metadata).unwrap()
}

pub fn engine() -> SubscriptionEngine {
    SubscriptionEngine::start(schema(), EngineConfig::default())
}

pub fn props(value: Value) -> Properties {
    value.as_object().cloned().unwrap_or_default()
}

pub fn movie(id: i64, properties: Value) -> (i64, &'static str, Properties) {
    (id, "Movie", props(properties))
}

pub fn node(id: i64, type_name: &'static str, properties: Value) -> (i64, &'static str, Properties) {
    (id, type_name, props(properties))
}

pub fn create_movie(id: i64, properties: Value) -> RawMutationRecord {
    RawMutationRecord::create(id, "Movie", props(properties))
}

/// Transport that forwards every payload to a [`Recorder`]
pub struct RecordingTransport {
    sender: mpsc::UnboundedSender<(SubscriptionHandle, Value)>,
    closed: Mutex<Vec<SubscriptionHandle>>,
    failing: AtomicBool,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingTransport {
    pub fn new() -> (Arc<Self>, Recorder) {
        Self::build(None)
    }

    /// Every delivery waits for a permit on `gate`
    pub fn gated(gate: Arc<Semaphore>) -> (Arc<Self>, Recorder) {
        Self::build(Some(gate))
    }

    fn build(gate: Option<Arc<Semaphore>>) -> (Arc<Self>, Recorder) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            sender,
            closed: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate,
        });
        (transport, Recorder { receiver })
    }

    /// Reject every delivery from now on
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn closed_handles(&self) -> Vec<SubscriptionHandle> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn deliver(&self, handle: SubscriptionHandle, payload: Value) -> Result<(), TransportError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(|_| TransportError::Closed)?.forget();
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("client went away".to_string()));
        }
        self.sender
            .send((handle, payload))
            .map_err(|_| TransportError::Closed)
    }

    async fn closed(&self, handle: SubscriptionHandle) {
        self.closed.lock().unwrap().push(handle);
    }
}

pub struct Recorder {
    receiver: mpsc::UnboundedReceiver<(SubscriptionHandle, Value)>,
}

impl Recorder {
    /// Next delivered payload; panics if none arrives within a second
    pub async fn next(&mut self) -> Value {
        match tokio::time::timeout(Duration::from_secs(1), self.receiver.recv()).await {
            Ok(Some((_, payload))) => payload,
            Ok(None) => panic!("transport dropped"),
            Err(_) => panic!("no payload delivered"),
        }
    }

    /// Everything delivered until deliveries go quiet
    pub async fn drain(&mut self) -> Vec<Value> {
        let mut payloads = Vec::new();
        while let Ok(Some((_, payload))) =
            tokio::time::timeout(Duration::from_millis(100), self.receiver.recv()).await
        {
            payloads.push(payload);
        }
        payloads
    }

    /// Assert nothing is delivered within a short grace period
    pub async fn assert_silent(&mut self) {
        if let Ok(Some((_, payload))) =
            tokio::time::timeout(Duration::from_millis(100), self.receiver.recv()).await
        {
            panic!("unexpected payload: {}", payload);
        }
    }
}

/// Subscribe with a GraphQL document, recording deliveries
pub fn subscribe(
    engine: &SubscriptionEngine,
    document: &str,
) -> (SubscriptionHandle, Arc<RecordingTransport>, Recorder) {
    let (transport, recorder) = RecordingTransport::new();
    let request = parse_subscription(engine.schema(), document, &Value::Null, None).unwrap();
    let handle = engine
        .subscribe(request, Arc::clone(&transport) as Arc<dyn Transport>)
        .unwrap();
    (handle, transport, recorder)
}

//! Broadcast transport boundary.
//!
//! The consensus engine only ever sees this seam: named fanout topics,
//! best-effort delivery, a copy of every published payload for every current
//! subscriber. A subscriber that is absent at publish time simply misses the
//! message, and delivery may duplicate or drop; the protocol above is built
//! to tolerate both.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::warn;
use thiserror::Error;
use tokio::sync::mpsc;

/// Topic carrying Prepare/Accept traffic toward every acceptor.
pub const FOR_ACCEPTORS: &str = "FOR_ACCEPTORS";

/// Topic carrying Promise/Accepted traffic back toward proposers.
pub const FOR_PROPOSERS: &str = "FOR_PROPOSERS";

const SUBSCRIBER_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum BusErr {
    #[error("unknown topic {0}")]
    UnknownTopic(String),

    #[error("bus unreachable")]
    Unreachable,
}

#[async_trait]
pub trait BroadcastBus {
    /// Bring a fanout topic into existence. Idempotent.
    async fn declare(&self, topic: &str) -> Result<(), BusErr>;

    /// Deliver a copy of `payload` to every current subscriber of `topic`.
    /// Publishing into a topic nobody listens on is a silent loss, not an
    /// error.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusErr>;

    /// Open a continuous stream of payloads published to `topic` from now
    /// on. Declares the topic if needed.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusErr>;
}

/// One subscriber's inbound stream. Transport bindings pump their deliveries
/// into the channel half they keep.
pub struct Subscription {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { rx }
    }

    /// Next payload, or `None` once the topic is gone.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

/// Process-local fanout hub. Every node of an in-process cluster holds a
/// clone of the same bus, which is the whole "broker".
#[derive(Clone, Default)]
pub struct InMemoryBus {
    topics: Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BroadcastBus for InMemoryBus {
    async fn declare(&self, topic: &str) -> Result<(), BusErr> {
        self.topics
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_insert_with(Vec::new);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusErr> {
        let mut topics = self.topics.lock().unwrap();
        let subscribers = match topics.get_mut(topic) {
            Some(subscribers) => subscribers,
            None => return Err(BusErr::UnknownTopic(topic.to_string())),
        };
        subscribers.retain(|tx| !tx.is_closed());
        for tx in subscribers.iter() {
            // a full subscriber queue is a lost delivery, like any other.
            if tx.try_send(payload.clone()).is_err() {
                warn!("subscriber on {} lagging, message lost", topic);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusErr> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.topics
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_insert_with(Vec::new)
            .push(tx);
        Ok(Subscription::new(rx))
    }
}

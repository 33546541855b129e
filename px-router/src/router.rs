//! The dispatcher: the only component that touches the broadcast bus.
//!
//! Locally produced Prepare/Accept go out sealed on the acceptor-bound
//! topic, locally produced Promise/Accepted on the proposer-bound topic.
//! Inbound envelopes are demultiplexed by kind: acceptor-bound traffic is
//! always forwarded, proposer-bound traffic only while an attempt is in
//! flight — nobody is listening otherwise.

use std::time::Duration;

use log::{debug, error, info};
use thiserror::Error;

use paxos_rs::acceptor::{AcceptorEvent, AsyncAcceptor, Reply};
use paxos_rs::proposer::Proposer;
use paxos_rs::{TchanR, TchanS};
use px_bus::{BroadcastBus, BusErr, Subscription, FOR_ACCEPTORS, FOR_PROPOSERS};
use px_data::{Accept, Accepted, Envelope, PaxosMsg, Prepare, Promise, ProposerID, Value, WireErr};

use crate::flight::SingleFlight;

const CHANNEL_SIZE: usize = 128;

/// How long a forward to a local task may block before the message is
/// dropped like any other lost delivery.
const FORWARD_TIMEOUT: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum RouterErr {
    /// Transport unreachable or topic declaration failed. Fatal: without
    /// the bus this process serves no purpose.
    #[error("startup failed: {0}")]
    Startup(#[from] BusErr),
}

/// Outcome of one externally triggered proposal.
#[derive(Debug, PartialEq)]
pub enum ProposeOutcome {
    Chosen(Value),
    NoConsensus,
    /// Another attempt is in flight; rejected, not queued.
    Busy,
}

/// Trigger-facing half of a node: runs attempts behind the single-flight
/// guard while the router loop feeds the reply channels.
pub struct ProposeHandle {
    id: ProposerID,
    proposer: tokio::sync::Mutex<Proposer>,
    gauge: paxos_rs::acceptor::BallotGauge,
    flight: SingleFlight,
}

impl ProposeHandle {
    pub async fn propose(&self, value: Value, deadline: Duration) -> ProposeOutcome {
        let _guard = match self.flight.begin() {
            Some(guard) => guard,
            None => {
                info!("proposer {}: attempt already in flight, rejecting", self.id);
                return ProposeOutcome::Busy;
            }
        };
        // uncontended while the guard is held.
        let mut proposer = self.proposer.lock().await;
        match proposer.propose(value, self.gauge.load(), deadline).await {
            Some(value) => ProposeOutcome::Chosen(value),
            None => ProposeOutcome::NoConsensus,
        }
    }
}

/// One replica's channel fabric, ready to run: the router loop, the
/// acceptor task, and the propose handle for the trigger endpoint.
pub struct Node<B: BroadcastBus> {
    pub router: Router<B>,
    pub acceptor: AsyncAcceptor,
    pub handle: ProposeHandle,
}

/// Build the full fabric for one replica on `bus`: declare both topics and
/// subscribe before anything can publish. An error here is fatal, the
/// process has no business running without the bus.
pub async fn wire<B: BroadcastBus>(
    bus: B,
    replica_id: impl Into<ProposerID>,
    total_acceptors: usize,
    max_retry: usize,
) -> Result<Node<B>, RouterErr> {
    let replica_id = replica_id.into();

    bus.declare(FOR_ACCEPTORS).await?;
    bus.declare(FOR_PROPOSERS).await?;
    let acceptor_sub = bus.subscribe(FOR_ACCEPTORS).await?;
    let proposer_sub = bus.subscribe(FOR_PROPOSERS).await?;

    let (prepare_tx, prepare_rx) = tokio::sync::mpsc::channel(CHANNEL_SIZE);
    let (promise_tx, promise_rx) = tokio::sync::mpsc::channel(CHANNEL_SIZE);
    let (accept_tx, accept_rx) = tokio::sync::mpsc::channel(CHANNEL_SIZE);
    let (accepted_tx, accepted_rx) = tokio::sync::mpsc::channel(CHANNEL_SIZE);
    let (event_tx, event_rx) = tokio::sync::mpsc::channel(CHANNEL_SIZE);
    let (reply_tx, reply_rx) = tokio::sync::mpsc::channel(CHANNEL_SIZE);

    let acceptor = AsyncAcceptor::new(event_rx, reply_tx);
    let flight = SingleFlight::new();

    let proposer = Proposer::new(
        replica_id.clone(),
        total_acceptors,
        max_retry,
        prepare_tx,
        promise_rx,
        accept_tx,
        accepted_rx,
    );

    let handle = ProposeHandle {
        id: replica_id.clone(),
        proposer: tokio::sync::Mutex::new(proposer),
        gauge: acceptor.gauge(),
        flight: flight.clone(),
    };

    let router = Router {
        id: replica_id,
        bus,
        proposing: flight,
        acceptor_sub,
        proposer_sub,
        prepare_in: prepare_rx,
        accept_in: accept_rx,
        promise_out: promise_tx,
        accepted_out: accepted_tx,
        acceptor_events: event_tx,
        reply_in: reply_rx,
    };

    Ok(Node {
        router,
        acceptor,
        handle,
    })
}

pub struct Router<B: BroadcastBus> {
    id: ProposerID,
    bus: B,
    proposing: SingleFlight,

    acceptor_sub: Subscription,
    proposer_sub: Subscription,

    // proposer side
    prepare_in: TchanR<Prepare>,
    accept_in: TchanR<Accept>,
    promise_out: TchanS<Promise>,
    accepted_out: TchanS<Accepted>,

    // acceptor side
    acceptor_events: TchanS<AcceptorEvent>,
    reply_in: TchanR<Reply>,
}

impl<B: BroadcastBus + Send + Sync> Router<B> {
    pub async fn run(mut self, mut quit_ch: TchanR<()>) {
        info!("router {} up", self.id);
        let mut quit = false;
        while !quit {
            tokio::select! {
                Some(()) = quit_ch.recv() => {
                    quit = true;
                },
                Some(prepare) = self.prepare_in.recv() => {
                    self.publish(FOR_ACCEPTORS, Envelope::prepare(&prepare)).await;
                },
                Some(accept) = self.accept_in.recv() => {
                    self.publish(FOR_ACCEPTORS, Envelope::accept(&accept)).await;
                },
                Some(reply) = self.reply_in.recv() => {
                    match reply {
                        Reply::Promise(promise) => {
                            self.publish(FOR_PROPOSERS, Envelope::promise(&promise)).await;
                        }
                        Reply::Accepted(accepted) => {
                            self.publish(FOR_PROPOSERS, Envelope::accepted(&accepted)).await;
                        }
                        Reply::Nil => {}
                    }
                },
                payload = self.acceptor_sub.recv() => match payload {
                    Some(bytes) => self.deliver_to_acceptor(&bytes).await,
                    None => quit = true,
                },
                payload = self.proposer_sub.recv() => match payload {
                    Some(bytes) => self.deliver_to_proposer(&bytes).await,
                    None => quit = true,
                },
                else => {
                    quit = true;
                },
            }
        }
        info!("router {} down", self.id);
    }

    async fn publish(&self, topic: &str, sealed: Result<Envelope, WireErr>) {
        let bytes = match sealed.and_then(|env| env.to_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("router {}: failed to seal outbound message: {}", self.id, e);
                return;
            }
        };
        if let Err(e) = self.bus.publish(topic, bytes).await {
            error!("router {}: publish to {} failed: {}", self.id, topic, e);
        }
    }

    /// Acceptor-bound traffic is forwarded unconditionally; the acceptor
    /// always listens.
    async fn deliver_to_acceptor(&mut self, bytes: &[u8]) {
        let event = match Envelope::from_bytes(bytes).and_then(|env| env.open()) {
            Ok(PaxosMsg::Prepare(prepare)) => AcceptorEvent::RecvPrepare(prepare),
            Ok(PaxosMsg::Accept(accept)) => AcceptorEvent::RecvAccept(accept),
            Ok(other) => {
                debug!("router {}: {:?} on {}, skipping", self.id, other, FOR_ACCEPTORS);
                return;
            }
            Err(e) => {
                error!("router {}: drop malformed acceptor-bound message: {}", self.id, e);
                return;
            }
        };
        if let Err(e) = self
            .acceptor_events
            .send_timeout(event, FORWARD_TIMEOUT)
            .await
        {
            error!("router {}: forward to acceptor failed: {}", self.id, e);
        }
    }

    /// Proposer-bound traffic is forwarded only while an attempt is in
    /// flight; otherwise nobody is listening and the message is skipped.
    async fn deliver_to_proposer(&mut self, bytes: &[u8]) {
        if !self.proposing.is_up() {
            debug!("router {}: no attempt in flight, skip proposer-bound message", self.id);
            return;
        }
        match Envelope::from_bytes(bytes).and_then(|env| env.open()) {
            Ok(PaxosMsg::Promise(promise)) => {
                if let Err(e) = self
                    .promise_out
                    .send_timeout(promise, FORWARD_TIMEOUT)
                    .await
                {
                    error!("router {}: forward promise failed: {}", self.id, e);
                }
            }
            Ok(PaxosMsg::Accepted(accepted)) => {
                if let Err(e) = self
                    .accepted_out
                    .send_timeout(accepted, FORWARD_TIMEOUT)
                    .await
                {
                    error!("router {}: forward accepted failed: {}", self.id, e);
                }
            }
            Ok(other) => {
                debug!("router {}: {:?} on {}, skipping", self.id, other, FOR_PROPOSERS);
            }
            Err(e) => {
                error!("router {}: drop malformed proposer-bound message: {}", self.id, e);
            }
        }
    }
}

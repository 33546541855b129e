//! Acceptor state machine.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use log::{debug, info};
use px_data::{Accept, Accepted, BallotNumber, Prepare, Promise, ProposalNumber, Value};

use crate::{CtlRecvr, TchanR, TchanS};

/// Inbound work for one acceptor replica.
#[derive(Debug, Clone)]
pub enum AcceptorEvent {
    RecvPrepare(Prepare),
    RecvAccept(Accept),
}

/// Outcome of one handled event. `Nil` is a deliberate non-reply: a stale
/// or duplicate request is ignored, never answered and never an error.
#[derive(Debug, Clone)]
pub enum Reply {
    Nil,
    Promise(Promise),
    Accepted(Accepted),
}

/// Promised-ballot snapshot shared with a co-located proposer, so a fresh
/// attempt does not start below a ballot this replica already promised away.
#[derive(Debug, Clone, Default)]
pub struct BallotGauge(Arc<AtomicU64>);

impl BallotGauge {
    pub fn load(&self) -> BallotNumber {
        self.0.load(Ordering::SeqCst)
    }

    fn store(&self, ballot: BallotNumber) {
        self.0.store(ballot, Ordering::SeqCst);
    }
}

/// Promise/accept state of one replica for the single consensus instance.
///
/// State lives for the process lifetime only; a restart resets it, which is
/// an accepted liveness/safety risk of this design.
pub struct Acceptor {
    promised: ProposalNumber,
    accepted_value: Option<Value>,
}

impl Acceptor {
    pub fn new() -> Self {
        Self {
            promised: ProposalNumber::default(),
            accepted_value: None,
        }
    }

    pub fn promised(&self) -> &ProposalNumber {
        &self.promised
    }

    pub fn accepted_value(&self) -> Option<&Value> {
        self.accepted_value.as_ref()
    }

    /// Promise iff the ballot is strictly higher than anything promised so
    /// far. The promised ballot never decreases.
    pub fn on_recv_prepare(&mut self, prepare: &Prepare) -> Reply {
        if prepare.proposal_number.ballot > self.promised.ballot {
            self.promised = prepare.proposal_number.clone();
            info!("promise ballot {}", self.promised.ballot);
            Reply::Promise(Promise {
                proposal_number: self.promised.clone(),
            })
        } else {
            debug!(
                "stale prepare at ballot {} (promised {})",
                prepare.proposal_number.ballot, self.promised.ballot
            );
            Reply::Nil
        }
    }

    /// Accept on a strictly higher ballot, or on the exact promised number
    /// again. The second branch re-accepts a retry of the same proposer at
    /// the same ballot; identity is pinned, so the re-emitted `Accepted`
    /// always carries that proposer's own value.
    pub fn on_recv_accept(&mut self, accept: &Accept) -> Reply {
        let n = &accept.proposal_number;
        if n.ballot > self.promised.ballot
            || (n.ballot == self.promised.ballot && n.proposer_id == self.promised.proposer_id)
        {
            self.promised = n.clone();
            self.accepted_value = Some(accept.value.clone());
            info!("accept ballot {} from {}", n.ballot, n.proposer_id);
            Reply::Accepted(Accepted {
                proposal_number: self.promised.clone(),
                value: accept.value.clone(),
            })
        } else {
            debug!(
                "stale accept at ballot {} (promised {})",
                n.ballot, self.promised.ballot
            );
            Reply::Nil
        }
    }

    pub fn process(&mut self, event: AcceptorEvent) -> Reply {
        match event {
            AcceptorEvent::RecvPrepare(prepare) => self.on_recv_prepare(&prepare),
            AcceptorEvent::RecvAccept(accept) => self.on_recv_accept(&accept),
        }
    }
}

impl Default for Acceptor {
    fn default() -> Self {
        Self::new()
    }
}

/// Async wrapper owning one `Acceptor`. The machine is mutated only on this
/// task; other tasks observe it through the ballot gauge.
pub struct AsyncAcceptor {
    event_in: TchanR<AcceptorEvent>,
    reply_out: TchanS<Reply>,
    machine: Acceptor,
    gauge: BallotGauge,
}

impl AsyncAcceptor {
    pub fn new(event_in: TchanR<AcceptorEvent>, reply_out: TchanS<Reply>) -> Self {
        Self {
            event_in,
            reply_out,
            machine: Acceptor::new(),
            gauge: BallotGauge::default(),
        }
    }

    pub fn gauge(&self) -> BallotGauge {
        self.gauge.clone()
    }

    pub async fn run(mut self, mut quit_ch: CtlRecvr) {
        info!("acceptor up");
        let mut quit = false;
        while !quit {
            tokio::select! {
                _ = quit_ch.recv() => {
                    quit = true;
                },
                event = self.event_in.recv() => match event {
                    Some(event) => {
                        let reply = self.machine.process(event);
                        self.gauge.store(self.machine.promised().ballot);
                        if let Reply::Nil = &reply {
                            continue;
                        }
                        if self.reply_out.send(reply).await.is_err() {
                            // Receiver half is closed.
                            quit = true;
                        }
                    }
                    None => {
                        quit = true;
                    }
                },
            }
        }
        info!("acceptor down");
    }
}

//! Proposer round driver.

use std::time::Duration;

use futures_timer::Delay;
use log::{debug, error, info};
use px_data::{Accept, Accepted, BallotNumber, Prepare, Promise, ProposalNumber, ProposerID, Value};

use crate::{TchanR, TchanS};

/// Per-phase round timeout.
pub const ROUND_TIMEOUT: Duration = Duration::from_millis(300);

/// Rounds per phase before an attempt gives up.
pub const DEFAULT_MAX_RETRY: usize = 3;

enum Phase {
    Quorum,
    Exhausted,
    // Deadline fired or the dispatcher went away; the attempt stops at the
    // current suspension point either way.
    Aborted,
}

/// Drives one propose attempt at a time over the four proposer channels.
/// Attempt state (ballot, reply counters) is rebuilt per call, nothing
/// carries over between attempts except the ballot hint the caller passes.
pub struct Proposer {
    id: ProposerID,
    total_acceptors: usize,
    max_retry: usize,

    prepare_out: TchanS<Prepare>,
    promise_in: TchanR<Promise>,
    accept_out: TchanS<Accept>,
    accepted_in: TchanR<Accepted>,
}

impl Proposer {
    pub fn new(
        id: impl Into<ProposerID>,
        total_acceptors: usize,
        max_retry: usize,
        prepare_out: TchanS<Prepare>,
        promise_in: TchanR<Promise>,
        accept_out: TchanS<Accept>,
        accepted_in: TchanR<Accepted>,
    ) -> Self {
        Self {
            id: id.into(),
            total_acceptors,
            max_retry,
            prepare_out,
            promise_in,
            accept_out,
            accepted_in,
        }
    }

    /// Strict majority of the acceptor set.
    fn quorum(&self) -> usize {
        self.total_acceptors / 2 + 1
    }

    /// Run one full attempt for `value`. Returns the chosen value on
    /// quorum, `None` on retry exhaustion or deadline; never an error, the
    /// caller is free to try again.
    ///
    /// `ballot_hint` seeds the first round (the co-located acceptor's
    /// promised ballot), so the attempt does not open below a ballot this
    /// replica has already seen superseded.
    pub async fn propose(
        &mut self,
        value: Value,
        ballot_hint: BallotNumber,
        deadline: Duration,
    ) -> Option<Value> {
        let mut deadline = Delay::new(deadline);
        let mut number = ProposalNumber::new(ballot_hint, self.id.clone());

        match self.prepare_phase(&mut number, &mut deadline).await {
            Phase::Quorum => {}
            Phase::Exhausted | Phase::Aborted => return None,
        }
        match self.accept_phase(&number, &value, &mut deadline).await {
            Phase::Quorum => {
                info!("proposer {}: value chosen at ballot {}", self.id, number.ballot);
                Some(value)
            }
            Phase::Exhausted | Phase::Aborted => None,
        }
    }

    /// Phase 1: a fresh ballot per round, counting exactly-matching
    /// promises until quorum or the round timer runs out.
    async fn prepare_phase(&mut self, number: &mut ProposalNumber, deadline: &mut Delay) -> Phase {
        for _ in 0..self.max_retry {
            number.ballot += 1;
            let prepare = Prepare {
                proposal_number: number.clone(),
            };
            if self.prepare_out.send(prepare).await.is_err() {
                error!("proposer {}: dispatcher gone, aborting", self.id);
                return Phase::Aborted;
            }
            info!("proposer {}: PREPARE at ballot {}", self.id, number.ballot);

            let mut promises = 0usize;
            let mut round = Delay::new(ROUND_TIMEOUT);
            while promises < self.quorum() {
                tokio::select! {
                    () = &mut *deadline => {
                        info!("proposer {}: deadline during prepare", self.id);
                        return Phase::Aborted;
                    },
                    () = &mut round => {
                        info!(
                            "proposer {}: prepare round at ballot {} timed out, retrying",
                            self.id, number.ballot
                        );
                        break;
                    },
                    promise = self.promise_in.recv() => match promise {
                        Some(promise) if promise.proposal_number.matches(number) => {
                            promises += 1;
                        }
                        Some(stale) => {
                            debug!(
                                "proposer {}: discard promise for {:?}",
                                self.id, stale.proposal_number
                            );
                        }
                        None => return Phase::Aborted,
                    },
                }
            }
            if promises >= self.quorum() {
                return Phase::Quorum;
            }
        }
        info!(
            "proposer {}: no prepare quorum within {} rounds",
            self.id, self.max_retry
        );
        Phase::Exhausted
    }

    /// Phase 2: re-broadcast the accept under the prepared number each
    /// round; the ballot stays fixed, acceptors treat the resend as an
    /// idempotent retry.
    async fn accept_phase(
        &mut self,
        number: &ProposalNumber,
        value: &Value,
        deadline: &mut Delay,
    ) -> Phase {
        for _ in 0..self.max_retry {
            let accept = Accept {
                proposal_number: number.clone(),
                value: value.clone(),
            };
            if self.accept_out.send(accept).await.is_err() {
                error!("proposer {}: dispatcher gone, aborting", self.id);
                return Phase::Aborted;
            }
            info!("proposer {}: ACCEPT at ballot {}", self.id, number.ballot);

            let mut accepts = 0usize;
            let mut round = Delay::new(ROUND_TIMEOUT);
            while accepts < self.quorum() {
                tokio::select! {
                    () = &mut *deadline => {
                        info!("proposer {}: deadline during accept", self.id);
                        return Phase::Aborted;
                    },
                    () = &mut round => {
                        info!(
                            "proposer {}: accept round at ballot {} timed out, retrying",
                            self.id, number.ballot
                        );
                        break;
                    },
                    accepted = self.accepted_in.recv() => match accepted {
                        Some(accepted) if accepted.proposal_number.matches(number) => {
                            accepts += 1;
                        }
                        Some(stale) => {
                            debug!(
                                "proposer {}: discard accepted for {:?}",
                                self.id, stale.proposal_number
                            );
                        }
                        None => return Phase::Aborted,
                    },
                }
            }
            if accepts >= self.quorum() {
                return Phase::Quorum;
            }
        }
        info!(
            "proposer {}: no accept quorum within {} rounds",
            self.id, self.max_retry
        );
        Phase::Exhausted
    }
}

//! Tagged wire wrapper for the broadcast bus.
//!
//! Only envelopes travel on the bus. The inner message is encoded as an
//! opaque JSON body and decoded according to `kind` on the receiving side.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Accept, Accepted, Prepare, Promise};

pub type Result<T> = core::result::Result<T, WireErr>;

#[derive(Debug, Error)]
pub enum WireErr {
    #[error("undecodable envelope: {0}")]
    BadEnvelope(serde_json::Error),

    #[error("undecodable {0:?} body: {1}")]
    BadBody(MsgKind, serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MsgKind {
    Prepare,
    Promise,
    Accept,
    Accepted,
}

/// A protocol message demultiplexed out of an envelope.
#[derive(Debug, Clone)]
pub enum PaxosMsg {
    Prepare(Prepare),
    Promise(Promise),
    Accept(Accept),
    Accepted(Accepted),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: MsgKind,
    pub body: serde_json::Value,
}

impl Envelope {
    fn seal<T: Serialize>(kind: MsgKind, msg: &T) -> Result<Self> {
        let body = serde_json::to_value(msg).map_err(|e| WireErr::BadBody(kind, e))?;
        Ok(Self { kind, body })
    }

    pub fn prepare(p: &Prepare) -> Result<Self> {
        Self::seal(MsgKind::Prepare, p)
    }

    pub fn promise(p: &Promise) -> Result<Self> {
        Self::seal(MsgKind::Promise, p)
    }

    pub fn accept(a: &Accept) -> Result<Self> {
        Self::seal(MsgKind::Accept, a)
    }

    pub fn accepted(a: &Accepted) -> Result<Self> {
        Self::seal(MsgKind::Accepted, a)
    }

    /// Decode the body according to `kind`.
    pub fn open(&self) -> Result<PaxosMsg> {
        let kind = self.kind;
        let body = self.body.clone();
        let bad = move |e| WireErr::BadBody(kind, e);
        Ok(match kind {
            MsgKind::Prepare => PaxosMsg::Prepare(serde_json::from_value(body).map_err(bad)?),
            MsgKind::Promise => PaxosMsg::Promise(serde_json::from_value(body).map_err(bad)?),
            MsgKind::Accept => PaxosMsg::Accept(serde_json::from_value(body).map_err(bad)?),
            MsgKind::Accepted => PaxosMsg::Accepted(serde_json::from_value(body).map_err(bad)?),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(WireErr::BadEnvelope)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(WireErr::BadEnvelope)
    }
}

//! Single-decree Paxos: the two protocol state machines.
//!
//! `Acceptor` and `Proposer` are independent machines that talk only through
//! the message boundary, so acceptors can run in other processes without any
//! code change here.

pub mod acceptor;
pub mod proposer;

pub type TchanR<T> = tokio::sync::mpsc::Receiver<T>;
pub type TchanS<T> = tokio::sync::mpsc::Sender<T>;
pub type CtlRecvr = tokio::sync::broadcast::Receiver<()>;
pub type CtlSender = tokio::sync::broadcast::Sender<()>;

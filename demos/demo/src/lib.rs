//! Demo node: replica wiring plus the HTTP trigger endpoint.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde::Deserialize;
use warp::{http::StatusCode, Filter};

use paxos_rs::{CtlSender, TchanS};
use px_bus::InMemoryBus;
use px_router::{wire, ProposeHandle, ProposeOutcome, RouterErr};

/// One running replica: acceptor task and router loop spawned, trigger
/// handle ready for use.
pub struct BootedNode {
    pub handle: Arc<ProposeHandle>,
    quit: TchanS<()>,
    ctrl: CtlSender,
}

impl BootedNode {
    pub async fn shutdown(&self) {
        let _ = self.quit.send(()).await;
        let _ = self.ctrl.send(());
    }
}

pub async fn boot_node(
    bus: InMemoryBus,
    name: impl Into<String>,
    total_acceptors: usize,
    max_retry: usize,
) -> Result<BootedNode, RouterErr> {
    let node = wire(bus, name, total_acceptors, max_retry).await?;

    let (ctrl, _) = tokio::sync::broadcast::channel(1);
    tokio::spawn(node.acceptor.run(ctrl.subscribe()));

    let (quit_tx, quit_rx) = tokio::sync::mpsc::channel(1);
    tokio::spawn(node.router.run(quit_rx));

    Ok(BootedNode {
        handle: Arc::new(node.handle),
        quit: quit_tx,
        ctrl,
    })
}

/// Boot `replicas` nodes sharing one in-memory bus. The proposer on each
/// node still counts quorum against `total_acceptors`, so booting fewer
/// replicas than that simulates unreachable acceptors.
pub async fn boot_local_cluster(
    bus: &InMemoryBus,
    replicas: usize,
    total_acceptors: usize,
    max_retry: usize,
) -> Result<Vec<BootedNode>, RouterErr> {
    let mut nodes = Vec::with_capacity(replicas);
    for i in 0..replicas {
        let node = boot_node(
            bus.clone(),
            format!("replica-{}", i),
            total_acceptors,
            max_retry,
        )
        .await?;
        nodes.push(node);
    }
    info!("local cluster of {} replicas up", replicas);
    Ok(nodes)
}

#[derive(Debug, Deserialize)]
pub struct ProposeRequest {
    pub message: String,
}

pub async fn process_propose(
    handle: Arc<ProposeHandle>,
    deadline: Duration,
    req: ProposeRequest,
) -> Result<impl warp::Reply, warp::Rejection> {
    let value = serde_json::Value::String(req.message);
    let reply = match handle.propose(value, deadline).await {
        ProposeOutcome::Chosen(chosen) => {
            warp::reply::with_status(format!("consensus reached: {}", chosen), StatusCode::OK)
        }
        ProposeOutcome::NoConsensus => warp::reply::with_status(
            format!("consensus not reached"),
            StatusCode::CONFLICT,
        ),
        ProposeOutcome::Busy => warp::reply::with_status(
            format!("another proposal is in flight"),
            StatusCode::CONFLICT,
        ),
    };
    Ok(reply)
}

/// `POST /propose {"message": "..."}` → 200 on consensus, 409 otherwise.
/// Malformed bodies are rejected by warp with 400 before the handler runs.
pub fn propose_filter(
    handle: Arc<ProposeHandle>,
    deadline: Duration,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let handle_fn = warp::any().map(move || handle.clone());
    let deadline_fn = warp::any().map(move || deadline);

    warp::post()
        .and(warp::path("propose"))
        .and(warp::path::end())
        .and(handle_fn)
        .and(deadline_fn)
        .and(warp::body::content_length_limit(2 << 20).and(warp::body::json()))
        .and_then(process_propose)
}

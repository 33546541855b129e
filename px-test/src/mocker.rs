//! Mock cluster for scenario tests.

use std::sync::Arc;

use paxos_rs::{CtlSender, TchanS};
use px_bus::{BroadcastBus, InMemoryBus};
use px_router::{wire, ProposeHandle};

pub struct MockReplica {
    pub handle: Arc<ProposeHandle>,
    quit: TchanS<()>,
    ctrl: CtlSender,
}

/// `live` replicas of an acceptor set sized `total`, all on one in-memory
/// bus. Booting fewer replicas than `total` leaves the rest permanently
/// unreachable, which is how partition scenarios are staged.
pub struct MockCluster {
    bus: InMemoryBus,
    pub replicas: Vec<MockReplica>,
}

impl MockCluster {
    pub async fn boot(total: usize, live: usize, max_retry: usize) -> Self {
        assert!(live <= total);

        let bus = InMemoryBus::new();
        let mut replicas = Vec::with_capacity(live);
        for i in 0..live {
            let node = wire(bus.clone(), format!("replica-{}", i), total, max_retry)
                .await
                .expect("in-memory bus can't fail startup");

            let (ctrl, _) = tokio::sync::broadcast::channel(1);
            tokio::spawn(node.acceptor.run(ctrl.subscribe()));

            let (quit_tx, quit_rx) = tokio::sync::mpsc::channel(1);
            tokio::spawn(node.router.run(quit_rx));

            replicas.push(MockReplica {
                handle: Arc::new(node.handle),
                quit: quit_tx,
                ctrl,
            });
        }

        Self { bus, replicas }
    }

    pub fn handle(&self, i: usize) -> Arc<ProposeHandle> {
        self.replicas[i].handle.clone()
    }

    /// Push raw bytes onto a topic, bypassing the envelope codec. This is
    /// how corrupted traffic gets injected.
    pub async fn inject_raw(&self, topic: &str, payload: &[u8]) {
        self.bus.publish(topic, payload.to_vec()).await.unwrap();
    }

    pub async fn shutdown(&self) {
        for replica in &self.replicas {
            let _ = replica.quit.send(()).await;
            let _ = replica.ctrl.send(());
        }
    }
}

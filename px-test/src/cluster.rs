//! End-to-end scenarios over the in-memory bus.

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use serde_json::json;

    use px_bus::{FOR_ACCEPTORS, FOR_PROPOSERS};
    use px_router::ProposeOutcome;

    use crate::mocker::MockCluster;
    use crate::utils::init_logger;

    #[test]
    fn test_five_replicas_choose_value() {
        //
        //  replica-0 ----PREPARE----> {replica-0..4}
        //            <---PROMISE x5--
        //            ----ACCEPT-----> {replica-0..4}
        //            <---ACCEPTED x5-
        //
        //  One round per phase, value chosen.
        //
        init_logger();
        tokio::runtime::Runtime::new().unwrap().block_on(async move {
            let cluster = MockCluster::boot(5, 5, 3).await;

            let outcome = cluster
                .handle(0)
                .propose(json!("hello"), Duration::from_secs(5))
                .await;
            assert_eq!(outcome, ProposeOutcome::Chosen(json!("hello")));

            cluster.shutdown().await;
        });
    }

    #[test]
    fn test_no_consensus_with_two_of_five() {
        //
        //  Quorum is 3 but only replica-0 and replica-1 are up. Every round
        //  collects 2 promises and times out until the retries are gone.
        //
        init_logger();
        tokio::runtime::Runtime::new().unwrap().block_on(async move {
            let cluster = MockCluster::boot(5, 2, 2).await;

            let outcome = cluster
                .handle(0)
                .propose(json!("x"), Duration::from_secs(5))
                .await;
            assert_eq!(outcome, ProposeOutcome::NoConsensus);

            cluster.shutdown().await;
        });
    }

    #[test]
    fn test_deadline_clears_single_flight() {
        //
        //  The deadline fires mid prepare-phase; the attempt reports no
        //  consensus within the bound and the next trigger is admitted
        //  immediately (not Busy).
        //
        init_logger();
        tokio::runtime::Runtime::new().unwrap().block_on(async move {
            let cluster = MockCluster::boot(5, 1, 3).await;
            let handle = cluster.handle(0);

            let started = Instant::now();
            let outcome = handle
                .propose(json!("first"), Duration::from_millis(200))
                .await;
            assert_eq!(outcome, ProposeOutcome::NoConsensus);
            assert!(started.elapsed() < Duration::from_millis(600));

            let outcome = handle
                .propose(json!("second"), Duration::from_millis(200))
                .await;
            assert_ne!(outcome, ProposeOutcome::Busy);

            cluster.shutdown().await;
        });
    }

    #[test]
    fn test_concurrent_trigger_is_rejected() {
        //
        //  While the first attempt is still collecting promises a second
        //  trigger arrives on the same replica. It must be refused, not
        //  queued behind the first.
        //
        init_logger();
        tokio::runtime::Runtime::new().unwrap().block_on(async move {
            let cluster = MockCluster::boot(5, 2, 3).await;
            let handle = cluster.handle(0);

            let first = {
                let handle = handle.clone();
                tokio::spawn(async move {
                    handle.propose(json!("slow"), Duration::from_secs(2)).await
                })
            };
            tokio::time::sleep(Duration::from_millis(100)).await;

            let second = handle.propose(json!("rushed"), Duration::from_secs(2)).await;
            assert_eq!(second, ProposeOutcome::Busy);

            assert_eq!(first.await.unwrap(), ProposeOutcome::NoConsensus);

            cluster.shutdown().await;
        });
    }

    #[test]
    fn test_malformed_envelopes_do_not_kill_dispatch() {
        //
        //  Garbage lands on both topics; every dispatcher logs and drops
        //  it, and a proposal afterwards still completes normally.
        //
        init_logger();
        tokio::runtime::Runtime::new().unwrap().block_on(async move {
            let cluster = MockCluster::boot(5, 5, 3).await;

            cluster.inject_raw(FOR_ACCEPTORS, b"definitely not json").await;
            cluster.inject_raw(FOR_PROPOSERS, b"\xff\xfe\x00garbage").await;
            cluster
                .inject_raw(FOR_ACCEPTORS, br#"{"kind":"GOSSIP","body":{}}"#)
                .await;

            let outcome = cluster
                .handle(1)
                .propose(json!("survivor"), Duration::from_secs(5))
                .await;
            assert_eq!(outcome, ProposeOutcome::Chosen(json!("survivor")));

            cluster.shutdown().await;
        });
    }
}

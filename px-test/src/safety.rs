//! Acceptor-set safety scenarios, driven directly against the machines so
//! delivery order and duplication are fully under test control.

#[cfg(test)]
mod test {
    use paxos_rs::acceptor::{Acceptor, Reply};
    use px_data::{Accept, Accepted, Prepare, ProposalNumber, Value};
    use serde_json::json;

    const QUORUM_OF_5: usize = 3;

    fn acceptors(n: usize) -> Vec<Acceptor> {
        (0..n).map(|_| Acceptor::new()).collect()
    }

    fn broadcast_prepare(accs: &mut [Acceptor], ballot: u64, id: &str) -> usize {
        let prepare = Prepare {
            proposal_number: ProposalNumber::new(ballot, id),
        };
        accs.iter_mut()
            .map(|acc| acc.on_recv_prepare(&prepare))
            .filter(|reply| matches!(reply, Reply::Promise(_)))
            .count()
    }

    fn broadcast_accept(accs: &mut [Acceptor], ballot: u64, id: &str, value: &Value) -> Vec<Accepted> {
        let accept = Accept {
            proposal_number: ProposalNumber::new(ballot, id),
            value: value.clone(),
        };
        accs.iter_mut()
            .filter_map(|acc| match acc.on_recv_accept(&accept) {
                Reply::Accepted(accepted) => Some(accepted),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_two_proposer_race() {
        //
        //  A: PREPARE(5) ----> promised 5 everywhere
        //  B: PREPARE(6) ----> promised 6 everywhere
        //  A: ACCEPT(5,"a") -> stale, zero ACCEPTED
        //  B: ACCEPT(6,"b") -> chosen
        //
        //  The loser's accepted count must never reach quorum for its own
        //  lower ballot.
        //
        let mut accs = acceptors(5);

        assert_eq!(broadcast_prepare(&mut accs, 5, "A"), 5);
        assert_eq!(broadcast_prepare(&mut accs, 6, "B"), 5);

        let lost = broadcast_accept(&mut accs, 5, "A", &json!("a"));
        assert!(lost.len() < QUORUM_OF_5);
        assert!(lost.is_empty());

        let won = broadcast_accept(&mut accs, 6, "B", &json!("b"));
        assert!(won.len() >= QUORUM_OF_5);
        for accepted in &won {
            assert_eq!(accepted.value, json!("b"));
        }
    }

    #[test]
    fn test_duplicates_and_stale_traffic_keep_one_value() {
        //
        //  Chosen at ballot 4, then the transport misbehaves: the ACCEPT is
        //  delivered again and stale messages from B arrive late. Every
        //  quorum the set ever forms must carry the same value.
        //
        let mut accs = acceptors(5);

        assert_eq!(broadcast_prepare(&mut accs, 4, "A"), 5);
        let first = broadcast_accept(&mut accs, 4, "A", &json!("v"));
        assert!(first.len() >= QUORUM_OF_5);

        // duplicate delivery: an equivalent ACCEPTED is re-emitted, state
        // unchanged.
        let replay = broadcast_accept(&mut accs, 4, "A", &json!("v"));
        assert_eq!(replay.len(), 5);
        for accepted in &replay {
            assert_eq!(accepted.proposal_number, ProposalNumber::new(4, "A"));
            assert_eq!(accepted.value, json!("v"));
        }

        // stale traffic from a slower proposer changes nothing.
        assert_eq!(broadcast_prepare(&mut accs, 2, "B"), 0);
        assert!(broadcast_accept(&mut accs, 3, "B", &json!("w")).is_empty());

        for acc in &accs {
            assert_eq!(acc.accepted_value(), Some(&json!("v")));
            assert_eq!(acc.promised().ballot, 4);
        }
    }

    #[test]
    fn test_promised_ballot_never_decreases() {
        let mut acc = Acceptor::new();
        let mut high_water = 0;

        let steps: Vec<Box<dyn Fn(&mut Acceptor) -> Reply>> = vec![
            Box::new(|a| {
                a.on_recv_prepare(&Prepare {
                    proposal_number: ProposalNumber::new(5, "A"),
                })
            }),
            Box::new(|a| {
                a.on_recv_prepare(&Prepare {
                    proposal_number: ProposalNumber::new(3, "B"),
                })
            }),
            Box::new(|a| {
                a.on_recv_accept(&Accept {
                    proposal_number: ProposalNumber::new(5, "A"),
                    value: json!("v"),
                })
            }),
            Box::new(|a| {
                a.on_recv_accept(&Accept {
                    proposal_number: ProposalNumber::new(9, "B"),
                    value: json!("w"),
                })
            }),
            Box::new(|a| {
                a.on_recv_prepare(&Prepare {
                    proposal_number: ProposalNumber::new(7, "A"),
                })
            }),
        ];

        for step in steps {
            let _ = step(&mut acc);
            assert!(acc.promised().ballot >= high_water);
            high_water = acc.promised().ballot;
        }
        assert_eq!(high_water, 9);
    }

    #[test]
    fn test_quorum_needs_strict_majority() {
        //
        //  5 acceptors, quorum 3. An ACCEPT that only reaches 2 replicas
        //  chooses nothing; once a third distinct replica accepts, the
        //  value is chosen.
        //
        let mut accs = acceptors(5);
        assert_eq!(broadcast_prepare(&mut accs, 1, "A"), 5);

        let partial = broadcast_accept(&mut accs[..2], 1, "A", &json!("v"));
        assert!(partial.len() < QUORUM_OF_5);

        // the retry reaches everyone; the two early acceptors just re-emit.
        let full = broadcast_accept(&mut accs, 1, "A", &json!("v"));
        assert!(full.len() >= QUORUM_OF_5);
    }
}

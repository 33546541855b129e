//! Protocol messages.

use serde::{Deserialize, Serialize};

use crate::{BallotNumber, ProposerID, Value};

/// Identifier of one proposal attempt. Ordered by ballot first, proposer id
/// as the lexicographic tie-break, so any two numbers are comparable.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposalNumber {
    pub ballot: BallotNumber,
    pub proposer_id: ProposerID,
}

impl ProposalNumber {
    pub fn new(ballot: BallotNumber, proposer_id: impl Into<ProposerID>) -> Self {
        Self {
            ballot,
            proposer_id: proposer_id.into(),
        }
    }

    /// Replies are credited to an attempt only on an exact match of both
    /// ballot and proposer identity. Anything else is cross-talk from a
    /// stale round or a foreign proposer.
    #[inline]
    pub fn matches(&self, other: &ProposalNumber) -> bool {
        self.ballot == other.ballot && self.proposer_id == other.proposer_id
    }
}

/// Phase-1 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prepare {
    pub proposal_number: ProposalNumber,
}

/// Phase-1 acknowledgment. Carries the promised number only; previously
/// accepted values are not propagated back to the proposer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promise {
    pub proposal_number: ProposalNumber,
}

/// Phase-2 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accept {
    pub proposal_number: ProposalNumber,
    pub value: Value,
}

/// Phase-2 acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accepted {
    pub proposal_number: ProposalNumber,
    pub value: Value,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_proposal_number_order() {
        let low = ProposalNumber::new(3, "zed");
        let high = ProposalNumber::new(4, "ann");

        // ballot dominates the proposer id.
        assert!(low < high);

        // same ballot falls back to lexicographic id.
        let a = ProposalNumber::new(4, "A");
        let b = ProposalNumber::new(4, "B");
        assert!(a < b);
    }

    #[test]
    fn test_proposal_number_match() {
        let n = ProposalNumber::new(7, "replica-0");
        assert!(n.matches(&ProposalNumber::new(7, "replica-0")));
        assert!(!n.matches(&ProposalNumber::new(7, "replica-1")));
        assert!(!n.matches(&ProposalNumber::new(6, "replica-0")));
    }

    #[test]
    fn test_initial_number_is_zero() {
        let n = ProposalNumber::default();
        assert_eq!(n.ballot, 0);
        assert!(n.proposer_id.is_empty());
    }
}

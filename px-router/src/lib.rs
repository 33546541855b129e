//! Bridges the proposer/acceptor channel fabric to the two broadcast
//! topics, and guards the one-attempt-per-process rule.

pub mod flight;
pub mod router;

pub use flight::{FlightGuard, SingleFlight};
pub use router::{wire, Node, ProposeHandle, ProposeOutcome, Router, RouterErr};

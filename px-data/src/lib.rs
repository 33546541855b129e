pub mod envelope;
pub mod msg;

pub use envelope::*;
pub use msg::*;

pub type ProposerID = String;
pub type BallotNumber = u64;

/// Opaque proposal payload. The consensus core only carries it; whatever
/// schema it has is decoded by the application that consumes the chosen
/// value.
pub type Value = serde_json::Value;

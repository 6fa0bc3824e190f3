//! Errors returned by the accumulators and the proof codec.
//!
//! None of these are recoverable inside the accumulator itself: an operation that fails
//! leaves the [Forest](super::forest::Forest) or [Pollard](super::pollard::Pollard) exactly
//! as it was before the call.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccumulatorError {
    /// Position arithmetic would overflow the addressable range.
    #[error("cannot add {adding} leaves to an accumulator with {leaves} leaves")]
    Capacity { leaves: u64, adding: u64 },
    /// A delete target that is not a current leaf.
    #[error("position {0} is not a leaf of this accumulator")]
    InvalidPosition(u64),
    /// The same position was passed twice, or targets are not sorted.
    #[error("position {0} is repeated or out of order")]
    DuplicatePosition(u64),
    /// A leaf hash that is already in the forest, or repeated in the same batch.
    #[error("leaf {0} is already in the forest")]
    DuplicateLeaf(String),
    /// A proof was requested for a hash that isn't in the forest.
    #[error("leaf {0} not found")]
    LeafNotFound(String),
    /// The proof doesn't hash up to our roots. This is the peer's fault, not ours.
    #[error("proof for target {target} doesn't verify: {reason}")]
    ProofVerification { target: u64, reason: String },
    /// A node needed to apply a deletion is neither remembered nor part of an ingested proof.
    #[error("node at position {0} is unknown, ingest a proof first")]
    MissingNode(u64),
    /// The proof is structurally broken (wrong number of hashes, bad encoding...).
    #[error("malformed proof: {0}")]
    MalformedProof(String),
}

impl From<std::io::Error> for AccumulatorError {
    fn from(err: std::io::Error) -> Self {
        AccumulatorError::MalformedProof(err.to_string())
    }
}

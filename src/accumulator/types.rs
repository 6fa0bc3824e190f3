#[cfg(feature = "with-serde")]
use serde::Deserialize;
#[cfg(feature = "with-serde")]
use serde::Serialize;

use super::node_hash::AccumulatorHash;
use super::node_hash::BitcoinNodeHash;

/// A leaf being added to the accumulator. Its position is whatever slot is free when it gets
/// added; `remember` tells a [Pollard](super::pollard::Pollard) to keep this leaf, and
/// whatever is needed to prove it, until it gets deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
pub struct Leaf<Hash: AccumulatorHash = BitcoinNodeHash> {
    pub hash: Hash,
    pub remember: bool,
}

impl<Hash: AccumulatorHash> Leaf<Hash> {
    pub fn new(hash: Hash, remember: bool) -> Self {
        Leaf { hash, remember }
    }

    /// A leaf the pollard may forget as soon as it is no longer needed.
    pub fn forgettable(hash: Hash) -> Self {
        Leaf {
            hash,
            remember: false,
        }
    }
}

impl<Hash: AccumulatorHash> From<Hash> for Leaf<Hash> {
    fn from(hash: Hash) -> Self {
        Leaf::forgettable(hash)
    }
}

//! A fake chain to drive the accumulators with. Every block creates some leaves, each with a
//! random lifetime, and spends the leaves whose lifetime ran out. Same seed, same chain.
//!
//! # Example
//! ```
//! use utreexo::accumulator::forest::Forest;
//! use utreexo::accumulator::pollard::Pollard;
//! use utreexo::simchain::SimChain;
//!
//! let mut chain = SimChain::new(0x07).with_lookahead(4);
//! let mut forest = Forest::new();
//! let mut pollard = Pollard::new();
//!
//! for _ in 0..20 {
//!     let (adds, dels) = chain.next_block(8);
//!     let proof = forest.prove_block(&dels).unwrap();
//!     pollard.ingest_block_proof(&proof).unwrap();
//!
//!     let tops = forest.modify(&adds, proof.targets()).unwrap();
//!     assert_eq!(pollard.modify(&adds, proof.targets()).unwrap(), tops);
//! }
//! ```
use std::collections::VecDeque;

use bitcoin_hashes::sha256;
use bitcoin_hashes::Hash;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::accumulator::node_hash::BitcoinNodeHash;
use crate::accumulator::types::Leaf;

pub struct SimChain {
    /// Leaves to spend, one entry per upcoming block.
    ttl_slices: VecDeque<Vec<BitcoinNodeHash>>,
    block_height: i32,
    leaf_counter: u64,
    duration_mask: u32,
    lookahead: u32,
    rng: StdRng,
}

impl SimChain {
    /// Lifetimes are random numbers masked with `duration_mask`, so a mask of `0x07` means
    /// leaves live up to 7 blocks. A lifetime of 0 means the leaf is never spent.
    pub fn new(duration_mask: u32) -> Self {
        Self::with_seed(duration_mask, 0)
    }

    pub fn with_seed(duration_mask: u32, seed: u64) -> Self {
        SimChain {
            ttl_slices: VecDeque::new(),
            block_height: -1,
            leaf_counter: 0,
            duration_mask,
            lookahead: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Leaves that will be spent in less than `lookahead` blocks are flagged remember, the
    /// same way a client would cache outputs it knows are about to be spent.
    pub fn with_lookahead(mut self, lookahead: u32) -> Self {
        self.lookahead = lookahead;
        self
    }

    /// The height of the last block returned by [SimChain::next_block], -1 before the first.
    pub fn block_height(&self) -> i32 {
        self.block_height
    }

    /// Returns the leaves created by the next block and the hashes of the leaves it spends.
    /// Spent leaves are always from earlier blocks.
    pub fn next_block(&mut self, num_adds: u32) -> (Vec<Leaf>, Vec<BitcoinNodeHash>) {
        self.block_height += 1;
        let dels = self.ttl_slices.pop_front().unwrap_or_default();

        let mut adds = Vec::with_capacity(num_adds as usize);
        for _ in 0..num_adds {
            let hash: BitcoinNodeHash =
                sha256::Hash::hash(&self.leaf_counter.to_le_bytes()).into();
            self.leaf_counter += 1;

            let duration = self.rng.gen::<u32>() & self.duration_mask;
            adds.push(Leaf::new(hash, duration != 0 && duration < self.lookahead));

            if duration != 0 {
                let slot = duration as usize - 1;
                if self.ttl_slices.len() <= slot {
                    self.ttl_slices.resize_with(slot + 1, Vec::new);
                }
                self.ttl_slices[slot].push(hash);
            }
        }

        (adds, dels)
    }
}

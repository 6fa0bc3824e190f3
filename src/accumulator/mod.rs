//! This module is the core of the library. It contains the two accumulators, the proofs they
//! exchange and the position arithmetic both are built on. The algorithms are the same for
//! both accumulators, what changes is how much of the forest each one keeps.
//!
//! # [Forest](forest::Forest)
//! A Forest keeps every node. It can prove any leaf, so this is what a bridge node, that
//! serves proofs to others, holds. It needs memory for the whole set.
//!
//! # [Pollard](pollard::Pollard)
//! A Pollard only keeps the roots and the leaves it cares about, plus what's needed to prove
//! those. Before deleting a leaf it doesn't know, it ingests a proof for it, which is checked
//! against its roots.
//!
//! ## Example
//! ```
//! use utreexo::accumulator::forest::Forest;
//! use utreexo::accumulator::pollard::Pollard;
//! use utreexo::accumulator::types::Leaf;
//! use utreexo::accumulator::util::hash_from_u8;
//!
//! let mut forest = Forest::new();
//! let mut pollard = Pollard::new();
//!
//! // Add 16 leaves, the pollard only remembers the first one
//! let mut adds: Vec<Leaf> = (0..16).map(|i| Leaf::forgettable(hash_from_u8(i))).collect();
//! adds[0].remember = true;
//! forest.modify(&adds, &[]).unwrap();
//! pollard.modify(&adds, &[]).unwrap();
//!
//! // Spend leaf 2: the forest proves it, the pollard checks the proof and both delete it
//! let proof = forest.prove_block(&[hash_from_u8(2)]).unwrap();
//! pollard.ingest_block_proof(&proof).unwrap();
//! let tops = forest.modify(&[], proof.targets()).unwrap();
//! assert_eq!(pollard.modify(&[], proof.targets()).unwrap(), tops);
//!
//! // Add one more
//! let adds = vec![Leaf::forgettable(hash_from_u8(16))];
//! let tops = forest.modify(&adds, &[]).unwrap();
//! assert_eq!(pollard.modify(&adds, &[]).unwrap(), tops);
//! ```
//!
//! # [BatchProof](proof::BatchProof)
//! A proof for many leaves at once. Its targets are the positions being proven, and its hashes
//! are the leaves themselves followed by whatever can't be computed from them. Paths shared by
//! many targets are only included once.
pub mod error;
pub mod forest;
pub mod node_hash;
pub mod pollard;
pub mod proof;
pub mod transform;
pub mod types;
pub mod util;

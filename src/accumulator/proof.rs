//! A [BatchProof] proves that a set of leaves is in the accumulator, and is what a
//! [Pollard](super::pollard::Pollard) needs to apply the deletion of those leaves.
//!
//! Proofs are generated by a [Forest](super::forest::Forest) with
//! [prove_block](super::forest::Forest::prove_block) and consumed by
//! [ingest_block_proof](super::pollard::Pollard::ingest_block_proof).
//!
//! # Example
//! ```
//! use utreexo::accumulator::forest::Forest;
//! use utreexo::accumulator::pollard::Pollard;
//! use utreexo::accumulator::types::Leaf;
//! use utreexo::accumulator::util::hash_from_u8;
//!
//! let leaves: Vec<Leaf> = (0..8).map(|i| Leaf::forgettable(hash_from_u8(i))).collect();
//! let mut forest = Forest::new();
//! let mut pollard = Pollard::new();
//! forest.modify(&leaves, &[]).unwrap();
//! pollard.modify(&leaves, &[]).unwrap();
//!
//! // Delete leaves 0 and 5
//! let proof = forest.prove_block(&[hash_from_u8(0), hash_from_u8(5)]).unwrap();
//! pollard.ingest_block_proof(&proof).unwrap();
//!
//! let tops = forest.modify(&[], proof.targets()).unwrap();
//! pollard.modify(&[], proof.targets()).unwrap();
//! assert_eq!(pollard.get_tops(), tops);
//! ```
use std::io::Read;
use std::io::Write;

#[cfg(feature = "with-serde")]
use serde::Deserialize;
#[cfg(feature = "with-serde")]
use serde::Serialize;

use super::error::AccumulatorError;
use super::node_hash::AccumulatorHash;
use super::node_hash::BitcoinNodeHash;
use super::util;

/// A proof is a collection of hashes and positions. Each target position
/// points to a leaf to be proven.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
pub struct BatchProof<Hash: AccumulatorHash = BitcoinNodeHash> {
    /// Targets are the leaf positions being proven, always sorted ascending.
    /// With the tree below, the Targets can only consist of one of these: 00 to 03.
    ///```!
    /// // 06
    /// // |-------\
    /// // 04      05
    /// // |---\   |---\
    /// // 00  01  02  03
    /// ```
    targets: Vec<u64>,

    /// First the hashes of the targets themselves, in target order. Then every node in
    /// the tree that is needed to hash up to the roots and can't be computed from the
    /// targets. If Targets are [00, 01], then this would be [00, 01, 05] as you need 04
    /// and 05 to hash to 06, and 04 can be calculated by hashing 00 and 01.
    ///```!
    /// // 06
    /// // |-------\
    /// // 04      05
    /// // |---\   |---\
    /// // 00  01  02  03
    /// ```
    /// Sibling hashes are ordered row by row, left to right, which is the order a verifier
    /// walks the tree in.
    hashes: Vec<Hash>,
}

/// Everything learned while hashing a proof up to the roots.
#[derive(Debug, Clone, Default)]
pub struct ProofWalk<Hash: AccumulatorHash> {
    /// Targets and every node computed from them, roots included.
    pub nodes: Vec<(u64, Hash)>,
    /// Nodes the proof supplied.
    pub siblings: Vec<(u64, Hash)>,
    /// The roots we ended up at, as `(position, hash)`.
    pub roots: Vec<(u64, Hash)>,
}

impl<Hash: AccumulatorHash> BatchProof<Hash> {
    /// Creates a proof from sorted targets, followed by the target hashes and then the
    /// sibling hashes.
    pub fn new(targets: Vec<u64>, hashes: Vec<Hash>) -> Self {
        BatchProof { targets, hashes }
    }

    pub fn targets(&self) -> &[u64] {
        &self.targets
    }

    /// All hashes in this proof, target hashes first.
    pub fn hashes(&self) -> &[Hash] {
        &self.hashes
    }

    /// The hashes of the leaves being proven.
    pub fn target_hashes(&self) -> &[Hash] {
        let n = self.targets.len().min(self.hashes.len());
        &self.hashes[..n]
    }

    /// The sibling hashes, without the targets.
    pub fn proof_hashes(&self) -> &[Hash] {
        let n = self.targets.len().min(self.hashes.len());
        &self.hashes[n..]
    }

    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }

    /// Checks this proof against the roots of an accumulator with `num_leaves` leaves.
    /// `tops` are ordered tallest tree first. On success, returns every node we had to
    /// compute on the way, so the caller can keep them.
    pub fn verify(
        &self,
        num_leaves: u64,
        tops: &[Hash],
    ) -> Result<ProofWalk<Hash>, AccumulatorError> {
        let forest_rows = util::tree_rows(num_leaves);
        let root_positions = util::root_positions(num_leaves, forest_rows);
        if root_positions.len() != tops.len() {
            return Err(AccumulatorError::MalformedProof(format!(
                "{num_leaves} leaves should have {} roots, got {}",
                root_positions.len(),
                tops.len()
            )));
        }

        let walk = self.calculate_hashes(num_leaves)?;
        for (pos, hash) in walk.roots.iter() {
            let row = util::detect_row(*pos, forest_rows);
            let idx = root_positions
                .iter()
                .position(|(_, root_pos)| root_pos == pos)
                .ok_or(AccumulatorError::MalformedProof(format!(
                    "{pos} is not a root"
                )))?;

            if tops[idx] != *hash {
                let target = self
                    .targets
                    .iter()
                    .copied()
                    .find(|t| util::detect_sub_tree_rows(*t, num_leaves, forest_rows) == Some(row))
                    .unwrap_or(*pos);
                return Err(AccumulatorError::ProofVerification {
                    target,
                    reason: format!("computed root {hash} but the root at row {row} is {}", tops[idx]),
                });
            }
        }

        Ok(walk)
    }

    /// Hashes every target up to its root, using the proof hashes for whatever can't be
    /// computed. Proofs that are too short or too long are rejected.
    pub(crate) fn calculate_hashes(
        &self,
        num_leaves: u64,
    ) -> Result<ProofWalk<Hash>, AccumulatorError> {
        let mut walk = ProofWalk {
            nodes: Vec::new(),
            siblings: Vec::new(),
            roots: Vec::new(),
        };
        if self.targets.is_empty() {
            if !self.hashes.is_empty() {
                return Err(AccumulatorError::MalformedProof(
                    "hashes for an empty proof".into(),
                ));
            }
            return Ok(walk);
        }

        util::check_targets(&self.targets, num_leaves)?;
        if self.hashes.len() < self.targets.len() {
            return Err(AccumulatorError::MalformedProof(format!(
                "{} targets but only {} hashes",
                self.targets.len(),
                self.hashes.len()
            )));
        }
        if self.hashes.iter().any(|hash| hash.is_empty()) {
            return Err(AccumulatorError::MalformedProof("empty hash".into()));
        }

        let forest_rows = util::tree_rows(num_leaves);
        let mut proof_hashes = self.proof_hashes().iter();
        let mut row_nodes: Vec<(u64, Hash)> = self
            .targets
            .iter()
            .copied()
            .zip(self.target_hashes().iter().copied())
            .collect();

        for _ in 0..=forest_rows {
            // Parents of sorted nodes come out sorted, so no need to sort `next_row`
            let mut next_row = Vec::with_capacity(row_nodes.len());
            let mut nodes = row_nodes.into_iter().peekable();

            while let Some((pos, hash)) = nodes.next() {
                walk.nodes.push((pos, hash));
                if util::is_root_position(pos, num_leaves, forest_rows) {
                    walk.roots.push((pos, hash));
                    continue;
                }
                let parent_pos = util::parent(pos, forest_rows);

                if let Some(&(next_pos, next_hash)) = nodes.peek() {
                    // Is the next node our sibling? If so, we should be hashed together
                    if util::is_right_sibling(pos, next_pos) {
                        walk.nodes.push((next_pos, next_hash));
                        next_row.push((parent_pos, Hash::parent_hash(&hash, &next_hash)));
                        nodes.next();
                        continue;
                    }
                }

                // If the next node is not my sibling, the hash must be passed inside the proof
                let sibling = *proof_hashes
                    .next()
                    .ok_or(AccumulatorError::MalformedProof("proof too short".into()))?;
                walk.siblings.push((pos ^ 1, sibling));

                let parent_hash = if util::is_left_niece(pos) {
                    Hash::parent_hash(&hash, &sibling)
                } else {
                    Hash::parent_hash(&sibling, &hash)
                };
                next_row.push((parent_pos, parent_hash));
            }

            row_nodes = next_row;
        }

        if proof_hashes.next().is_some() {
            return Err(AccumulatorError::MalformedProof("proof too long".into()));
        }

        Ok(walk)
    }

    /// Writes this proof, returning how many bytes were written.
    ///
    /// Format: target count (u64 LE), each target (u64 LE), hash count (u64 LE), each hash.
    pub fn serialize<W: Write>(&self, mut writer: W) -> std::io::Result<usize> {
        let mut len = 16;
        writer.write_all(&(self.targets.len() as u64).to_le_bytes())?;
        for target in self.targets.iter() {
            len += 8;
            writer.write_all(&target.to_le_bytes())?;
        }
        writer.write_all(&(self.hashes.len() as u64).to_le_bytes())?;
        let mut buf = Vec::with_capacity(33);
        for hash in self.hashes.iter() {
            // Not every hash has the same size on the wire, empty ones are a single byte
            buf.clear();
            hash.write(&mut buf)?;
            len += buf.len();
            writer.write_all(&buf)?;
        }
        Ok(len)
    }

    /// Reads a proof written by [BatchProof::serialize].
    pub fn deserialize<R: Read>(mut reader: R) -> Result<Self, AccumulatorError> {
        let n_targets = read_u64(&mut reader)?;
        // Counts come from the wire, don't trust them for allocations
        let mut targets = Vec::new();
        for _ in 0..n_targets {
            let target = read_u64(&mut reader)?;
            if let Some(last) = targets.last() {
                if *last >= target {
                    return Err(AccumulatorError::DuplicatePosition(target));
                }
            }
            targets.push(target);
        }

        let n_hashes = read_u64(&mut reader)?;
        let mut hashes = Vec::new();
        for _ in 0..n_hashes {
            let hash = Hash::read(&mut reader)?;
            if hash.is_empty() {
                return Err(AccumulatorError::MalformedProof("empty hash".into()));
            }
            hashes.push(hash);
        }

        Ok(BatchProof { targets, hashes })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16 + self.targets.len() * 8 + self.hashes.len() * 33);
        // Writing to a Vec can't fail
        let _ = self.serialize(&mut bytes);
        bytes
    }

    /// Like [BatchProof::deserialize], but the whole slice must be one proof.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, AccumulatorError> {
        let proof = Self::deserialize(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(AccumulatorError::MalformedProof(format!(
                "{} trailing bytes",
                bytes.len()
            )));
        }
        Ok(proof)
    }
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, AccumulatorError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

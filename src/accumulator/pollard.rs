//! A [Pollard] is a forest that only knows some of its nodes: the roots, the leaves it was
//! told to remember, and whatever is needed to prove those leaves. To delete leaves it
//! doesn't know, it first ingests a [BatchProof] for them, checked against its roots.
//!
//! Nodes are kept in a map from position to [PolNode], using the same layout as a
//! [Forest](super::forest::Forest). Both follow the same deletion plan, so as long as the
//! pollard ingests a proof before each deletion their roots are always the same.
//!
//! # Example
//! ```
//! use utreexo::accumulator::forest::Forest;
//! use utreexo::accumulator::pollard::Pollard;
//! use utreexo::accumulator::types::Leaf;
//! use utreexo::accumulator::util::hash_from_u8;
//!
//! let mut leaves: Vec<Leaf> = (0..16).map(|i| Leaf::forgettable(hash_from_u8(i))).collect();
//! leaves[3].remember = true;
//!
//! let mut forest = Forest::new();
//! let mut pollard = Pollard::new();
//! forest.modify(&leaves, &[]).unwrap();
//! pollard.modify(&leaves, &[]).unwrap();
//! assert_eq!(pollard.get_tops(), forest.get_tops());
//!
//! // We remember leaf 3, but not the others
//! assert!(pollard.get_hash(3).is_some());
//! assert!(pollard.get_hash(5).is_none());
//! ```
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::ops::Range;

#[cfg(feature = "with-serde")]
use serde::Deserialize;
#[cfg(feature = "with-serde")]
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use super::error::AccumulatorError;
use super::node_hash::AccumulatorHash;
use super::node_hash::BitcoinNodeHash;
use super::proof::BatchProof;
use super::transform;
use super::transform::NodeStore;
use super::types::Leaf;
use super::util;

/// A node we know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
pub struct PolNode<Hash: AccumulatorHash = BitcoinNodeHash> {
    pub hash: Hash,
    /// Only meaningful for leaves. A remembered leaf is kept, with everything needed to
    /// prove it, until it gets deleted.
    pub remember: bool,
}

impl<Hash: AccumulatorHash> PolNode<Hash> {
    fn forgettable(hash: Hash) -> Self {
        PolNode {
            hash,
            remember: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
pub struct Pollard<Hash: AccumulatorHash = BitcoinNodeHash> {
    nodes: BTreeMap<u64, PolNode<Hash>>,
    num_leaves: u64,
    forest_rows: u8,
}

impl<Hash: AccumulatorHash> Default for Pollard<Hash> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Hash: AccumulatorHash> Pollard<Hash> {
    /// Creates an empty pollard.
    pub fn new() -> Self {
        Pollard {
            nodes: BTreeMap::new(),
            num_leaves: 0,
            forest_rows: 0,
        }
    }

    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    /// How many nodes we are holding, roots included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the roots, tallest tree first. A root we don't hold, which only happens with a
    /// broken snapshot, shows up as an empty hash so no proof will ever verify against it.
    pub fn get_tops(&self) -> Vec<Hash> {
        util::root_positions(self.num_leaves, self.forest_rows)
            .into_iter()
            .map(|(_, pos)| self.get_hash(pos).unwrap_or_else(Hash::empty))
            .collect()
    }

    fn roots(&self) -> Result<Vec<Hash>, AccumulatorError> {
        util::root_positions(self.num_leaves, self.forest_rows)
            .into_iter()
            .map(|(_, pos)| self.get_hash(pos).ok_or(AccumulatorError::MissingNode(pos)))
            .collect()
    }

    /// Returns the hash at `position`, if we know it.
    pub fn get_hash(&self, position: u64) -> Option<Hash> {
        self.nodes.get(&position).map(|node| node.hash)
    }

    /// Returns every leaf we were asked to remember, with its current position.
    pub fn remembered_leaves(&self) -> Vec<(u64, Hash)> {
        self.nodes
            .range(..self.num_leaves)
            .filter(|(_, node)| node.remember)
            .map(|(pos, node)| (*pos, node.hash))
            .collect()
    }

    /// Checks `proof` against our roots and keeps every node it touches, so the deletion that
    /// follows can use them. If the proof is invalid, nothing is kept.
    pub fn ingest_block_proof(&mut self, proof: &BatchProof<Hash>) -> Result<(), AccumulatorError> {
        let walk = proof.verify(self.num_leaves, &self.roots()?)?;
        trace!(
            targets = proof.n_targets(),
            nodes = walk.nodes.len(),
            siblings = walk.siblings.len(),
            "ingesting proof"
        );

        for (pos, hash) in walk.nodes.into_iter().chain(walk.siblings) {
            self.nodes
                .entry(pos)
                .or_insert_with(|| PolNode::forgettable(hash));
        }

        Ok(())
    }

    /// Deletes `dels` then adds `adds`, returning the new tops. The nodes needed to delete
    /// `dels` must be known, usually by ingesting a proof for them first. Nothing changes if
    /// this fails.
    pub fn modify(&mut self, adds: &[Leaf<Hash>], dels: &[u64]) -> Result<Vec<Hash>, AccumulatorError> {
        util::check_targets(dels, self.num_leaves)?;
        util::check_capacity(self.num_leaves - dels.len() as u64, adds.len() as u64)?;
        debug!(
            num_leaves = self.num_leaves,
            adds = adds.len(),
            dels = dels.len(),
            "modifying pollard"
        );

        let mut pollard = self.clone();
        pollard.delete(dels)?;
        pollard.add(adds)?;
        pollard.prune();
        let tops = pollard.roots()?;
        *self = pollard;

        Ok(tops)
    }

    fn delete(&mut self, dels: &[u64]) -> Result<(), AccumulatorError> {
        if dels.is_empty() {
            return Ok(());
        }

        let plan = transform::transform(dels, self.num_leaves, self.forest_rows);
        transform::apply(self, &plan)?;

        self.num_leaves -= dels.len() as u64;
        let (num_leaves, forest_rows) = (self.num_leaves, self.forest_rows);
        self.nodes
            .retain(|pos, _| util::in_forest(*pos, num_leaves, forest_rows));
        self.remap(util::tree_rows(self.num_leaves));

        Ok(())
    }

    fn add(&mut self, adds: &[Leaf<Hash>]) -> Result<(), AccumulatorError> {
        if adds.is_empty() {
            return Ok(());
        }

        self.remap(util::tree_rows(self.num_leaves + adds.len() as u64));
        for leaf in adds {
            self.add_single(leaf)?;
        }
        Ok(())
    }

    /// Same as [Forest](super::forest::Forest), we only need the roots to add.
    fn add_single(&mut self, leaf: &Leaf<Hash>) -> Result<(), AccumulatorError> {
        let mut pos = self.num_leaves;
        let mut hash = leaf.hash;
        self.nodes.insert(
            pos,
            PolNode {
                hash,
                remember: leaf.remember,
            },
        );

        let mut row = 0;
        while (self.num_leaves >> row) & 1 == 1 {
            let root_pos = util::root_position(self.num_leaves, row, self.forest_rows);
            // Roots are never pruned
            let root = self
                .get_hash(root_pos)
                .ok_or(AccumulatorError::MissingNode(root_pos))?;
            hash = Hash::parent_hash(&root, &hash);
            pos = util::parent(pos, self.forest_rows);
            self.nodes.insert(pos, PolNode::forgettable(hash));
            row += 1;
        }

        self.num_leaves += 1;
        Ok(())
    }

    /// Forgets everything that isn't a root, a remembered leaf or needed to prove one.
    fn prune(&mut self) {
        let mut keep: BTreeSet<u64> = util::root_positions(self.num_leaves, self.forest_rows)
            .into_iter()
            .map(|(_, pos)| pos)
            .collect();

        for (leaf, _) in self.remembered_leaves() {
            let mut pos = leaf;
            while !util::is_root_position(pos, self.num_leaves, self.forest_rows) {
                keep.insert(pos);
                keep.insert(pos ^ 1);
                pos = util::parent(pos, self.forest_rows);
            }
        }

        let before = self.nodes.len();
        self.nodes.retain(|pos, _| keep.contains(pos));
        trace!(pruned = before - self.nodes.len(), kept = self.nodes.len(), "pruned pollard");
    }

    /// Moves every node to a layout with `forest_rows` rows.
    fn remap(&mut self, forest_rows: u8) {
        if forest_rows == self.forest_rows {
            return;
        }

        let from_rows = self.forest_rows;
        self.nodes = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(|(pos, node)| (util::remap_position(pos, from_rows, forest_rows), node))
            .collect();
        self.forest_rows = forest_rows;
    }

    fn clear_range(&mut self, range: Range<u64>) {
        let positions: Vec<u64> = self.nodes.range(range).map(|(pos, _)| *pos).collect();
        for pos in positions {
            self.nodes.remove(&pos);
        }
    }
}

/// The nodes of a subtree we know about, row by row, each with its offset inside that row of
/// the subtree.
type SparseSubtree<Hash> = Vec<Vec<(u64, PolNode<Hash>)>>;

impl<Hash: AccumulatorHash> NodeStore for Pollard<Hash> {
    type Subtree = SparseSubtree<Hash>;

    fn rehash(&mut self, position: u64, forest_rows: u8) -> Result<(), AccumulatorError> {
        let left = util::left_child(position, forest_rows);
        let left_hash = self.get_hash(left).ok_or(AccumulatorError::MissingNode(left))?;
        let right_hash = self
            .get_hash(left | 1)
            .ok_or(AccumulatorError::MissingNode(left | 1))?;

        let hash = Hash::parent_hash(&left_hash, &right_hash);
        self.nodes
            .entry(position)
            .and_modify(|node| node.hash = hash)
            .or_insert_with(|| PolNode::forgettable(hash));
        Ok(())
    }

    fn take_subtree(
        &mut self,
        position: u64,
        forest_rows: u8,
    ) -> Result<Self::Subtree, AccumulatorError> {
        if !self.nodes.contains_key(&position) {
            return Err(AccumulatorError::MissingNode(position));
        }

        let mut subtree = Vec::new();
        for range in transform::subtree_ranges(position, forest_rows) {
            let row: Vec<(u64, PolNode<Hash>)> = self
                .nodes
                .range(range.clone())
                .map(|(pos, node)| (pos - range.start, *node))
                .collect();
            self.clear_range(range);
            subtree.push(row);
        }
        Ok(subtree)
    }

    fn put_subtree(
        &mut self,
        subtree: Self::Subtree,
        position: u64,
        forest_rows: u8,
    ) -> Result<(), AccumulatorError> {
        for (range, row) in transform::subtree_ranges(position, forest_rows)
            .into_iter()
            .zip(subtree)
        {
            let start = range.start;
            self.clear_range(range);
            self.nodes
                .extend(row.into_iter().map(|(offset, node)| (start + offset, node)));
        }
        Ok(())
    }
}

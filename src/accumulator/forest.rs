//! A [Forest] holds every node of the accumulator, so it can prove any leaf. This is what a
//! bridge node keeps: it generates [BatchProof]s for the leaves each block deletes, and
//! clients with only a [Pollard](super::pollard::Pollard) use them to follow along.
//!
//! Nodes live in a flat vector, indexed by their position. See [util](super::util) for the
//! layout.
//!
//! # Example
//! ```
//! use utreexo::accumulator::forest::Forest;
//! use utreexo::accumulator::types::Leaf;
//! use utreexo::accumulator::util::hash_from_u8;
//!
//! let leaves: Vec<Leaf> = (0..4).map(|i| Leaf::forgettable(hash_from_u8(i))).collect();
//! let mut forest = Forest::new();
//! let tops = forest.modify(&leaves, &[]).unwrap();
//! assert_eq!(tops.len(), 1);
//!
//! let proof = forest.prove_block(&[hash_from_u8(1)]).unwrap();
//! assert_eq!(proof.targets(), &[1]);
//! ```
use std::collections::HashMap;
use std::collections::HashSet;

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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forest<Hash: AccumulatorHash = BitcoinNodeHash> {
    /// Every node, by position. Slots past the end of each row are leftovers and mean
    /// nothing.
    data: Vec<Hash>,
    num_leaves: u64,
    forest_rows: u8,
    /// Where each leaf is, so we can prove it by its hash.
    positions: HashMap<Hash, u64>,
}

impl<Hash: AccumulatorHash> Default for Forest<Hash> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Hash: AccumulatorHash> Forest<Hash> {
    /// Creates an empty forest.
    pub fn new() -> Self {
        Forest {
            data: vec![Hash::empty()],
            num_leaves: 0,
            forest_rows: 0,
            positions: HashMap::new(),
        }
    }

    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    pub fn forest_rows(&self) -> u8 {
        self.forest_rows
    }

    /// Returns the roots, tallest tree first.
    pub fn get_tops(&self) -> Vec<Hash> {
        util::root_positions(self.num_leaves, self.forest_rows)
            .into_iter()
            .map(|(_, pos)| self.data[pos as usize])
            .collect()
    }

    /// Returns the hash at `position`, if that node exists.
    pub fn get_hash(&self, position: u64) -> Option<Hash> {
        if !util::in_forest(position, self.num_leaves, self.forest_rows) {
            return None;
        }
        self.data.get(position as usize).copied()
    }

    /// Returns the current position of a leaf.
    pub fn leaf_position(&self, hash: &Hash) -> Option<u64> {
        self.positions.get(hash).copied()
    }

    /// Deletes `dels` then adds `adds`, returning the new tops. Nothing changes if this fails.
    pub fn modify(&mut self, adds: &[Leaf<Hash>], dels: &[u64]) -> Result<Vec<Hash>, AccumulatorError> {
        util::check_targets(dels, self.num_leaves)?;
        util::check_capacity(self.num_leaves - dels.len() as u64, adds.len() as u64)?;
        self.check_adds(adds, dels)?;
        debug!(
            num_leaves = self.num_leaves,
            adds = adds.len(),
            dels = dels.len(),
            "modifying forest"
        );

        self.delete(dels)?;
        self.add(adds)?;

        Ok(self.get_tops())
    }

    /// Appends `adds` to the forest.
    pub fn add(&mut self, adds: &[Leaf<Hash>]) -> Result<(), AccumulatorError> {
        util::check_capacity(self.num_leaves, adds.len() as u64)?;
        self.check_adds(adds, &[])?;
        if adds.is_empty() {
            return Ok(());
        }

        self.remap(util::tree_rows(self.num_leaves + adds.len() as u64));
        for leaf in adds {
            self.add_single(leaf.hash);
        }

        Ok(())
    }

    /// Leaves are found by hash, so a hash can only be in the forest once. `dels` are the
    /// sorted positions deleted before `adds` go in, their hashes may come back.
    fn check_adds(&self, adds: &[Leaf<Hash>], dels: &[u64]) -> Result<(), AccumulatorError> {
        let mut seen = HashSet::with_capacity(adds.len());
        for leaf in adds {
            let live = self
                .positions
                .get(&leaf.hash)
                .is_some_and(|pos| dels.binary_search(pos).is_err());
            if live || !seen.insert(leaf.hash) {
                return Err(AccumulatorError::DuplicateLeaf(leaf.hash.to_string()));
            }
        }
        Ok(())
    }

    /// Adds one leaf. This works like adding one to a binary counter: while there's a root
    /// on the current row, we hash with it and carry one row up.
    fn add_single(&mut self, hash: Hash) {
        let mut pos = self.num_leaves;
        let mut hash = hash;
        self.data[pos as usize] = hash;
        self.positions.insert(hash, pos);

        let mut row = 0;
        while (self.num_leaves >> row) & 1 == 1 {
            let root = self.data[util::root_position(self.num_leaves, row, self.forest_rows) as usize];
            hash = Hash::parent_hash(&root, &hash);
            pos = util::parent(pos, self.forest_rows);
            self.data[pos as usize] = hash;
            row += 1;
        }

        self.num_leaves += 1;
    }

    /// Removes the leaves at `dels`, which must be sorted and unique.
    pub fn delete(&mut self, dels: &[u64]) -> Result<(), AccumulatorError> {
        util::check_targets(dels, self.num_leaves)?;
        if dels.is_empty() {
            return Ok(());
        }

        for del in dels {
            let hash = self.data[*del as usize];
            if self.positions.get(&hash) == Some(del) {
                self.positions.remove(&hash);
            }
        }

        let plan = transform::transform(dels, self.num_leaves, self.forest_rows);
        trace!(?plan, "deletion plan");
        transform::apply(self, &plan)?;

        self.num_leaves -= dels.len() as u64;
        self.remap(util::tree_rows(self.num_leaves));

        Ok(())
    }

    /// Builds a proof for the leaves with those hashes. The order of `hashes` doesn't matter,
    /// targets are always sorted.
    pub fn prove_block(&self, hashes: &[Hash]) -> Result<BatchProof<Hash>, AccumulatorError> {
        let mut targets = hashes
            .iter()
            .map(|hash| {
                self.positions
                    .get(hash)
                    .copied()
                    .ok_or_else(|| AccumulatorError::LeafNotFound(hash.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        targets.sort_unstable();
        util::check_targets(&targets, self.num_leaves)?;

        self.prove(targets)
    }

    /// Builds a proof for the leaves at `targets`, that must be sorted and unique.
    pub fn prove(&self, targets: Vec<u64>) -> Result<BatchProof<Hash>, AccumulatorError> {
        util::check_targets(&targets, self.num_leaves)?;

        let mut hashes: Vec<Hash> = targets.iter().map(|pos| self.data[*pos as usize]).collect();
        hashes.extend(
            util::get_proof_positions(&targets, self.num_leaves, self.forest_rows)
                .into_iter()
                .map(|pos| self.data[pos as usize]),
        );

        Ok(BatchProof::new(targets, hashes))
    }

    /// Moves every node to a layout with `forest_rows` rows.
    fn remap(&mut self, forest_rows: u8) {
        if forest_rows == self.forest_rows {
            return;
        }

        let mut data = vec![Hash::empty(); (2usize << forest_rows) - 1];
        for row in 0..=self.forest_rows.min(forest_rows) {
            for offset in 0..(self.num_leaves >> row) {
                let from = util::position_at(row, offset, self.forest_rows);
                let to = util::position_at(row, offset, forest_rows);
                data[to as usize] = self.data[from as usize];
            }
        }

        self.data = data;
        self.forest_rows = forest_rows;
    }

    /// Checks that every node is the hash of its children, and every leaf can be found by hash.
    pub fn is_consistent(&self) -> bool {
        let rows = self.forest_rows;
        for row in 1..=rows {
            for offset in 0..(self.num_leaves >> row) {
                let pos = util::position_at(row, offset, rows);
                let left = util::left_child(pos, rows);
                let expected = Hash::parent_hash(&self.data[left as usize], &self.data[(left | 1) as usize]);
                if self.data[pos as usize] != expected {
                    return false;
                }
            }
        }

        (0..self.num_leaves).all(|pos| self.positions.get(&self.data[pos as usize]) == Some(&pos))
    }
}

impl<Hash: AccumulatorHash> NodeStore for Forest<Hash> {
    type Subtree = Vec<Vec<Hash>>;

    fn rehash(&mut self, position: u64, forest_rows: u8) -> Result<(), AccumulatorError> {
        let left = util::left_child(position, forest_rows);
        self.data[position as usize] =
            Hash::parent_hash(&self.data[left as usize], &self.data[(left | 1) as usize]);
        Ok(())
    }

    fn take_subtree(
        &mut self,
        position: u64,
        forest_rows: u8,
    ) -> Result<Self::Subtree, AccumulatorError> {
        Ok(transform::subtree_ranges(position, forest_rows)
            .into_iter()
            .map(|range| self.data[range.start as usize..range.end as usize].to_vec())
            .collect())
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
            if util::detect_row(range.start, forest_rows) == 0 {
                for (pos, hash) in range.clone().zip(row.iter()) {
                    self.positions.insert(*hash, pos);
                }
            }
            self.data[range.start as usize..range.end as usize].copy_from_slice(&row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::Forest;
    use crate::accumulator::error::AccumulatorError;
    use crate::accumulator::node_hash::BitcoinNodeHash;
    use crate::accumulator::types::Leaf;
    use crate::accumulator::util::hash_from_u8;

    fn leaves(values: impl IntoIterator<Item = u8>) -> Vec<Leaf> {
        values
            .into_iter()
            .map(|i| Leaf::forgettable(hash_from_u8(i)))
            .collect()
    }

    fn hashes_from_str(hashes: &[&str]) -> Vec<BitcoinNodeHash> {
        hashes
            .iter()
            .map(|hash| BitcoinNodeHash::from_str(hash).unwrap())
            .collect()
    }

    #[test]
    fn test_add() {
        let mut forest = Forest::new();
        let tops = forest.modify(&leaves(0..15), &[]).unwrap();

        assert_eq!(
            tops,
            hashes_from_str(&[
                "b151a956139bb821d4effa34ea95c17560e0135d1e4661fc23cedc3af49dac42",
                "9c053db406c1a077112189469a3aca0573d3481bef09fa3d2eda3304d7d44be8",
                "55d0a0ef8f5c25a9da266b36c0c5f4b31008ece82df2512c8966bddcc27a66a0",
                "4d7b3ef7300acf70c892d8327db8272f54434adbc61a4e130a563cb59a0d0f47",
            ])
        );
        assert_eq!(forest.num_leaves(), 15);
        assert_eq!(forest.forest_rows(), 4);
        assert!(forest.is_consistent());
    }

    #[test]
    fn test_add_one_by_one() {
        let mut forest = Forest::new();
        for i in 0..15 {
            forest.modify(&leaves([i]), &[]).unwrap();
            assert!(forest.is_consistent());
        }

        let mut batch = Forest::new();
        batch.modify(&leaves(0..15), &[]).unwrap();
        assert_eq!(forest.get_tops(), batch.get_tops());
    }

    #[test]
    fn test_delete() {
        let mut forest = Forest::new();
        forest.modify(&leaves(0..8), &[]).unwrap();

        let tops = forest.modify(&[], &[0]).unwrap();
        assert_eq!(
            tops,
            hashes_from_str(&[
                "29590a14c1b09384b94a2c0e94bf821ca75b62eacebc47893397ca88e3bbcbd7",
                "9576f4ade6e9bc3a6458b506ce3e4e890df29cb14cb5d3d887672aef55647a2b",
                "4bf5122f344554c53bde2ebb8cd2b7e3d1600ad631c385a5d7cce23c7785459a",
            ])
        );
        // Leaves 4 to 7 are now on the left, and 1 is alone at the end
        assert_eq!(forest.leaf_position(&hash_from_u8(4)), Some(0));
        assert_eq!(forest.leaf_position(&hash_from_u8(1)), Some(6));
        assert_eq!(forest.leaf_position(&hash_from_u8(0)), None);
        assert!(forest.is_consistent());
    }

    #[test]
    fn test_delete_swap() {
        let mut forest = Forest::new();
        forest.modify(&leaves(0..8), &[]).unwrap();

        let tops = forest.modify(&[], &[1, 2]).unwrap();
        assert_eq!(
            tops,
            hashes_from_str(&[
                "29590a14c1b09384b94a2c0e94bf821ca75b62eacebc47893397ca88e3bbcbd7",
                "b12af24c171d30b0e7c7dfba7c3cc18c7f25478c8a5316a1ab2a808e524a7e58",
            ])
        );
        assert!(forest.is_consistent());
    }

    #[test]
    fn test_delete_all() {
        let mut forest = Forest::new();
        forest.modify(&leaves(0..5), &[]).unwrap();
        let tops = forest.modify(&[], &[0, 1, 2, 3, 4]).unwrap();

        assert!(tops.is_empty());
        assert_eq!(forest.num_leaves(), 0);

        // And we can start over
        forest.modify(&leaves(0..15), &[]).unwrap();
        assert_eq!(
            forest.get_tops()[0].to_string(),
            "b151a956139bb821d4effa34ea95c17560e0135d1e4661fc23cedc3af49dac42"
        );
    }

    #[test]
    fn test_modify_shrinks_and_grows() {
        let mut forest = Forest::new();
        forest.modify(&leaves(0..16), &[]).unwrap();
        assert_eq!(forest.forest_rows(), 4);

        // 16 - 1 + 2 = 17 leaves, one more row
        forest.modify(&leaves(16..18), &[2]).unwrap();
        assert_eq!(forest.num_leaves(), 17);
        assert_eq!(forest.forest_rows(), 5);
        assert!(forest.is_consistent());

        forest.modify(&[], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        assert_eq!(forest.num_leaves(), 7);
        assert_eq!(forest.forest_rows(), 3);
        assert!(forest.is_consistent());
    }

    #[test]
    fn test_modify_bad_targets() {
        let mut forest = Forest::new();
        forest.modify(&leaves(0..8), &[]).unwrap();
        let tops = forest.get_tops();

        assert_eq!(
            forest.modify(&leaves([9]), &[8]),
            Err(AccumulatorError::InvalidPosition(8))
        );
        assert_eq!(
            forest.modify(&[], &[3, 3]),
            Err(AccumulatorError::DuplicatePosition(3))
        );
        assert_eq!(
            forest.modify(&[], &[4, 3]),
            Err(AccumulatorError::DuplicatePosition(3))
        );

        // Nothing changed
        assert_eq!(forest.get_tops(), tops);
        assert_eq!(forest.num_leaves(), 8);
    }

    #[test]
    fn test_duplicate_leaf() {
        let mut forest = Forest::new();
        forest.modify(&leaves(0..2), &[]).unwrap();
        let tops = forest.get_tops();

        let duplicate = Err(AccumulatorError::DuplicateLeaf(hash_from_u8(0).to_string()));
        assert_eq!(forest.modify(&leaves([2, 0]), &[]), duplicate);
        assert_eq!(
            forest.modify(&leaves([2, 2]), &[]),
            Err(AccumulatorError::DuplicateLeaf(hash_from_u8(2).to_string()))
        );
        // Rejected before anything was deleted
        assert_eq!(forest.modify(&leaves([0]), &[1]), duplicate);
        assert_eq!(forest.get_tops(), tops);
        assert_eq!(forest.leaf_position(&hash_from_u8(0)), Some(0));

        // Once deleted, the same hash can come back in the same batch
        forest.modify(&leaves([0]), &[0]).unwrap();
        assert_eq!(forest.num_leaves(), 2);
        assert_eq!(forest.prove_block(&[hash_from_u8(0)]).unwrap().targets(), &[1]);
        assert!(forest.is_consistent());
    }

    #[test]
    fn test_prove_block() {
        let mut forest = Forest::new();
        forest.modify(&leaves(0..8), &[]).unwrap();

        // Order doesn't matter
        let proof = forest
            .prove_block(&[hash_from_u8(6), hash_from_u8(0)])
            .unwrap();
        assert_eq!(proof.targets(), &[0, 6]);
        assert_eq!(proof.target_hashes(), &[hash_from_u8(0), hash_from_u8(6)]);
        // 01, 07, 09 and 10
        assert_eq!(proof.proof_hashes().len(), 4);
        assert!(proof.verify(8, &forest.get_tops()).is_ok());

        // Shared paths only show up once
        let proof = forest
            .prove_block(&[hash_from_u8(0), hash_from_u8(1), hash_from_u8(2)])
            .unwrap();
        assert_eq!(proof.proof_hashes().len(), 2);
    }

    #[test]
    fn test_prove_missing_leaf() {
        let mut forest = Forest::new();
        forest.modify(&leaves(0..8), &[]).unwrap();

        assert_eq!(
            forest.prove_block(&[hash_from_u8(9)]),
            Err(AccumulatorError::LeafNotFound(hash_from_u8(9).to_string()))
        );
        assert_eq!(
            forest.prove_block(&[hash_from_u8(1), hash_from_u8(1)]),
            Err(AccumulatorError::DuplicatePosition(1))
        );
    }

    #[test]
    fn test_get_hash() {
        let mut forest = Forest::new();
        forest.modify(&leaves(0..6), &[]).unwrap();

        assert_eq!(forest.get_hash(5), Some(hash_from_u8(5)));
        assert_eq!(forest.get_hash(6), None);
        assert_eq!(
            forest.get_hash(8).unwrap().to_string(),
            "02242b37d8e851f1e86f46790298c7097df06893d6226b7c1453c213e91717de"
        );
        assert_eq!(forest.get_hash(11), None);
    }
}

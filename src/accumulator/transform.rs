//! Deleting leaves from a utreexo forest leaves holes that must be filled, so that every row
//! stays packed to the left. [transform] works out, for a set of targets and the number of
//! leaves, what must move where. It only looks at positions, so the same plan is applied by a
//! [Forest](super::forest::Forest), that knows every hash, and by a
//! [Pollard](super::pollard::Pollard), that only knows the nodes it needs.
//!
//! The plan is walked row by row, from the leaves up:
//!  - twins (both siblings deleted) delete their parent on the next row;
//!  - two lonely deletions `a` and `b` are fixed by moving the sibling of `b` into `a`, then
//!    `parent(b)` is deleted on the next row;
//!  - a last lonely deletion is filled by that row's root, if there's one;
//!  - otherwise its sibling becomes the root of that row, and its parent is deleted;
//!  - a root that nobody touched stays a root, maybe at a new offset.
//!
//! Every node that ends up being a root is a [Collapse], they are put in place after all
//! rows are done.
use std::ops::Range;

use super::error::AccumulatorError;
use super::util;

/// A subtree moving from one position to another in the same row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Arrow {
    pub from: u64,
    pub to: u64,
}

/// A subtree that becomes the root of `row` once every deletion is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collapse {
    pub row: u8,
    pub from: u64,
    pub to: u64,
    /// Whether the subtree must be taken out of the forest right away. Something might be
    /// moved on top of `from` by a later row.
    pub extract: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowPlan {
    /// Nodes whose children changed on the row below. They must be hashed again before
    /// anything in this row moves.
    pub rehash: Vec<u64>,
    pub swaps: Vec<Arrow>,
    pub collapse: Option<Collapse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    /// The layout every position in this plan refers to.
    pub forest_rows: u8,
    pub rows: Vec<RowPlan>,
}

impl DeletionPlan {
    pub fn collapses(&self) -> impl Iterator<Item = &Collapse> {
        self.rows.iter().filter_map(|row| row.collapse.as_ref())
    }
}

/// Builds the plan for deleting `dels` from a forest with `num_leaves` leaves laid out with
/// `forest_rows` rows. `dels` must be sorted, unique and smaller than `num_leaves`, see
/// [util::check_targets].
pub fn transform(dels: &[u64], num_leaves: u64, forest_rows: u8) -> DeletionPlan {
    let next_num_leaves = num_leaves - dels.len() as u64;
    let mut dels = dels.to_vec();
    let mut dirty: Vec<u64> = Vec::new();
    let mut rows = Vec::with_capacity(forest_rows as usize + 1);

    for row in 0..=forest_rows {
        let mut plan = RowPlan {
            rehash: std::mem::take(&mut dirty),
            ..Default::default()
        };

        let mut root_present = num_leaves & (1 << row) != 0;
        let root_pos = util::root_position(num_leaves, row, forest_rows);

        // The root is the rightmost node of its row, if it's being deleted it's the last one
        if root_present && dels.last() == Some(&root_pos) {
            dels.pop();
            root_present = false;
        }

        let (mut next_dels, singles) = util::extract_twins(&dels, forest_rows);
        let mut dests = Vec::new();

        let mut pairs = singles.chunks_exact(2);
        for pair in pairs.by_ref() {
            plan.swaps.push(Arrow {
                from: pair[1] ^ 1,
                to: pair[0],
            });
            dests.push(pair[0]);
            next_dels.push(util::parent(pair[1], forest_rows));
        }

        match (pairs.remainder(), root_present) {
            ([single], true) => {
                plan.swaps.push(Arrow {
                    from: root_pos,
                    to: *single,
                });
                dests.push(*single);
            }
            ([single], false) => {
                plan.collapse = Some(Collapse {
                    row,
                    from: single ^ 1,
                    to: util::root_position(next_num_leaves, row, forest_rows),
                    extract: true,
                });
                next_dels.push(util::parent(*single, forest_rows));
            }
            ([], true) => {
                let to = util::root_position(next_num_leaves, row, forest_rows);
                plan.collapse = Some(Collapse {
                    row,
                    from: root_pos,
                    to,
                    extract: root_pos != to,
                });
            }
            _ => {}
        }
        next_dels.sort_unstable();

        dirty = plan
            .rehash
            .iter()
            .chain(dests.iter())
            .filter(|pos| !util::is_root_position(**pos, num_leaves, forest_rows))
            .map(|pos| util::parent(*pos, forest_rows))
            .filter(|pos| next_dels.binary_search(pos).is_err())
            .collect();
        dirty.sort_unstable();
        dirty.dedup();

        dels = next_dels;
        rows.push(plan);
    }

    DeletionPlan { forest_rows, rows }
}

/// Returns the positions a subtree covers, one range per row, starting with the row of
/// `position` and going down to the leaves.
pub fn subtree_ranges(position: u64, forest_rows: u8) -> Vec<Range<u64>> {
    let (row, offset) = util::row_offset(position, forest_rows);
    (0..=row)
        .rev()
        .map(|r| {
            let depth = row - r;
            let start = util::position_at(r, offset << depth, forest_rows);
            start..start + (1 << depth)
        })
        .collect()
}

/// What an accumulator must know how to do to follow a [DeletionPlan].
pub(crate) trait NodeStore {
    /// A subtree taken out of the store, waiting to be put somewhere else.
    type Subtree;

    /// Recomputes the hash at `position` from its two children.
    fn rehash(&mut self, position: u64, forest_rows: u8) -> Result<(), AccumulatorError>;

    fn take_subtree(
        &mut self,
        position: u64,
        forest_rows: u8,
    ) -> Result<Self::Subtree, AccumulatorError>;

    /// Puts a subtree at `position`, overwriting whatever was there.
    fn put_subtree(
        &mut self,
        subtree: Self::Subtree,
        position: u64,
        forest_rows: u8,
    ) -> Result<(), AccumulatorError>;

    fn move_subtree(&mut self, from: u64, to: u64, forest_rows: u8) -> Result<(), AccumulatorError> {
        let subtree = self.take_subtree(from, forest_rows)?;
        self.put_subtree(subtree, to, forest_rows)
    }
}

/// Runs `plan` against `store`. If this fails, `store` is left half-way and must be thrown away.
pub(crate) fn apply<S: NodeStore>(store: &mut S, plan: &DeletionPlan) -> Result<(), AccumulatorError> {
    let forest_rows = plan.forest_rows;
    let mut extracted = Vec::new();

    for row in plan.rows.iter() {
        for pos in row.rehash.iter() {
            store.rehash(*pos, forest_rows)?;
        }
        for swap in row.swaps.iter() {
            store.move_subtree(swap.from, swap.to, forest_rows)?;
        }
        if let Some(collapse) = row.collapse {
            if collapse.extract {
                extracted.push((store.take_subtree(collapse.from, forest_rows)?, collapse.to));
            }
        }
    }

    for (subtree, to) in extracted {
        store.put_subtree(subtree, to, forest_rows)?;
    }

    Ok(())
}

//! Position arithmetic shared by [Forest](super::forest::Forest),
//! [Pollard](super::pollard::Pollard) and [BatchProof](super::proof::BatchProof).
//!
//! Every node lives at a flat position. Leaves take positions `0..num_leaves`, and each
//! following row starts right after the maximum size of the row below it. For a forest with
//! 3 rows (up to 8 leaves) the layout is:
//! ```!
//! // 14
//! // |---------------\
//! // 12              13
//! // |-------\       |-------\
//! // 08      09      10      11
//! // |---\   |---\   |---\   |---\
//! // 00  01  02  03  04  05  06  07
//! ```
//! The layout depends on `forest_rows`, so whenever the number of rows changes the
//! positions must be remapped, keeping each node's `(row, offset)`.

use super::error::AccumulatorError;

/// The largest number of leaves we can address. Past this, `2 << forest_rows` would
/// overflow a `u64`.
pub const MAX_LEAVES: u64 = 1 << 62;

// is_root_position checks if the current position is a root given the number of
// leaves and the entire rows of the forest.
pub fn is_root_position(position: u64, num_leaves: u64, forest_rows: u8) -> bool {
    let row = detect_row(position, forest_rows);

    let root_present = num_leaves & (1 << row) != 0;
    let root_pos = root_position(num_leaves, row, forest_rows);

    root_present && root_pos == position
}

/// Splits the sorted `dels` into the parents of every twin pair and the positions that are
/// left without their sibling. Both outputs stay sorted.
///
/// ```!
/// // 14
/// // |---------------\
/// // 12              13
/// // |-------\       |-------\
/// // 08      09      10      11
/// // |---\   |---\   |---\   |---\
/// // 00  01  02  03  04  05  06  07
/// ```
/// Deleting `[0, 1, 4, 6]` gives `([8], [4, 6])`.
pub fn extract_twins(dels: &[u64], forest_rows: u8) -> (Vec<u64>, Vec<u64>) {
    let mut parents = vec![];
    let mut singles = vec![];
    let mut i = 0;

    while i < dels.len() {
        if i + 1 < dels.len() && is_right_sibling(dels[i], dels[i + 1]) && is_left_niece(dels[i])
        {
            parents.push(parent(dels[i], forest_rows));
            i += 2;
        } else {
            singles.push(dels[i]);
            i += 1;
        }
    }

    (parents, singles)
}

// start_position_at_row returns the smallest position an accumulator can have for the
// requested row for the given numLeaves.
pub fn start_position_at_row(row: u8, forest_rows: u8) -> u64 {
    // 2 << forest_rows is 2 more than the max position
    // to get the correct offset for a given row,
    // subtract (2 << `row complement of forest_rows`) from (2 << forest_rows)
    (2 << forest_rows) - (2 << (forest_rows - row))
}

/// Returns the flat position of the node at `offset` inside `row`.
pub fn position_at(row: u8, offset: u64, forest_rows: u8) -> u64 {
    start_position_at_row(row, forest_rows) + offset
}

/// Returns the `(row, offset)` pair for a flat position. This is what stays the same
/// when a forest grows or shrinks a row.
pub fn row_offset(position: u64, forest_rows: u8) -> (u8, u64) {
    let row = detect_row(position, forest_rows);
    (row, position - start_position_at_row(row, forest_rows))
}

/// Moves `position` from a layout with `from_rows` rows to one with `to_rows`.
pub fn remap_position(position: u64, from_rows: u8, to_rows: u8) -> u64 {
    let (row, offset) = row_offset(position, from_rows);
    position_at(row, offset, to_rows)
}

fn add_and_sort(vec: &mut Vec<u64>, value: u64) {
    vec.push(value);
    vec.sort();
}

pub fn is_left_niece(position: u64) -> bool {
    position & 1 == 0
}

/// Returns the left child of a node that is not a leaf. The right child is the next position.
pub fn left_child(position: u64, forest_rows: u8) -> u64 {
    let mask = (2 << forest_rows) - 1;
    (position << 1) & mask
}

/// Returns the row of the tree holding the leaf at `position`, i.e. the height of that
/// tree. Trees are laid out tallest first, so we walk the set bits of `num_leaves` from the
/// top until the position falls inside one of them.
pub fn detect_sub_tree_rows(position: u64, num_leaves: u64, forest_rows: u8) -> Option<u8> {
    if position >= num_leaves {
        return None;
    }
    let mut marker = position;
    for row in (0..=forest_rows).rev() {
        let tree_size = (1 << row) & num_leaves;
        if marker < tree_size {
            return Some(row);
        }
        marker -= tree_size;
    }

    None
}

// detectRow finds the current row of a node, given the position
// and the total forest rows.
pub fn detect_row(pos: u64, forest_rows: u8) -> u8 {
    let mut marker: u64 = 1 << forest_rows;
    let mut h: u8 = 0;

    while pos & marker != 0 {
        marker >>= 1;
        h += 1;
    }

    h
}

// parent returns the parent position of the passed in child
pub fn parent(pos: u64, forest_rows: u8) -> u64 {
    (pos >> 1) | (1 << forest_rows)
}

/// Tells whether `pos` is a node that currently exists in a forest with `num_leaves` leaves.
pub fn in_forest(pos: u64, num_leaves: u64, forest_rows: u8) -> bool {
    if pos >= (2 << forest_rows) - 1 {
        return false;
    }
    let (row, offset) = row_offset(pos, forest_rows);

    offset < num_leaves >> row
}

// tree_rows returns the number of rows given n leaves
pub fn tree_rows(n: u64) -> u8 {
    if n == 0 {
        return 0;
    }

    (u64::BITS - (n - 1).leading_zeros()) as u8
}

// root_position returns the position of the root at a given row
// undefined behavior if the given row doesn't have a root
pub fn root_position(num_leaves: u64, row: u8, forest_rows: u8) -> u64 {
    let mask = (2 << forest_rows) - 1;
    let before = num_leaves & (mask << (row + 1));

    let shifted = (before >> row) | (mask << (forest_rows + 1 - row));
    shifted & mask
}

/// Returns the positions of every root, tallest tree first.
pub fn root_positions(num_leaves: u64, forest_rows: u8) -> Vec<(u8, u64)> {
    (0..=forest_rows)
        .rev()
        .filter(|row| num_leaves & (1 << row) != 0)
        .map(|row| (row, root_position(num_leaves, row, forest_rows)))
        .collect()
}

/// Returns whether next is node's sibling or not
pub fn is_right_sibling(node: u64, next: u64) -> bool {
    node | 1 == next
}

/// Returns whether a and b are sibling or not
pub fn is_sibling(a: u64, b: u64) -> bool {
    a ^ 1 == b
}

/// Checks that `targets` are strictly ascending leaf positions inside a forest with
/// `num_leaves` leaves.
pub fn check_targets(targets: &[u64], num_leaves: u64) -> Result<(), AccumulatorError> {
    for (i, target) in targets.iter().enumerate() {
        if *target >= num_leaves {
            return Err(AccumulatorError::InvalidPosition(*target));
        }
        if i > 0 && targets[i - 1] >= *target {
            return Err(AccumulatorError::DuplicatePosition(*target));
        }
    }
    Ok(())
}

/// Fails with [AccumulatorError::Capacity] if adding `adding` leaves would leave the
/// addressable range.
pub fn check_capacity(num_leaves: u64, adding: u64) -> Result<(), AccumulatorError> {
    match num_leaves.checked_add(adding) {
        Some(total) if total <= MAX_LEAVES => Ok(()),
        _ => Err(AccumulatorError::Capacity {
            leaves: num_leaves,
            adding,
        }),
    }
}

/// Returns which node should have its hashes on the proof, along with all nodes
/// whose hashes will be calculated to reach a root. The output is in the order a
/// verifier consumes it: row by row, left to right.
pub fn get_proof_positions(targets: &[u64], num_leaves: u64, forest_rows: u8) -> Vec<u64> {
    let mut proof_positions = vec![];
    let mut computed_positions = targets.to_vec();
    computed_positions.sort();

    for row in 0..=forest_rows {
        let row_targets: Vec<u64> = computed_positions
            .iter()
            .copied()
            .filter(|x| detect_row(*x, forest_rows) == row)
            .collect();
        let mut row_targets = row_targets.into_iter().peekable();

        while let Some(node) = row_targets.next() {
            if is_root_position(node, num_leaves, forest_rows) {
                continue;
            }
            if let Some(next) = row_targets.peek() {
                if !is_sibling(node, *next) {
                    proof_positions.push(node ^ 1);
                } else {
                    row_targets.next();
                }
            } else {
                proof_positions.push(node ^ 1);
            }

            add_and_sort(&mut computed_positions, parent(node, forest_rows));
        }
    }

    proof_positions
}

/// Hashes a single byte with sha256. Handy for building test leaves.
pub fn hash_from_u8(value: u8) -> super::node_hash::BitcoinNodeHash {
    use bitcoin_hashes::sha256;
    use bitcoin_hashes::Hash;

    sha256::Hash::hash(&[value]).into()
}

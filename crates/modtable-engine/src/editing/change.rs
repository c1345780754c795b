//! Change records: one logical mutation with enough information to compute
//! its structural inverse.

use crate::table::TableBlock;

/// A transaction the undo engine can log and invert.
pub trait ChangeRecord {
    fn inverse(&self) -> Self;
}

/// Minimal description of one block's move. Only index pairs are stored, not
/// block content, so inversion is cheap and decoupled from identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMove {
    pub from: usize,
    pub to: usize,
}

/// One logical document mutation, carrying value snapshots of the blocks it
/// touches. Snapshots are independent copies taken at record-build time; the
/// undo engine never aliases live document state.
///
/// The compound variants record a batch add (or its inverse, a delete) that
/// also had to overwrite existing singleton blocks as edits.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangedData {
    Add {
        new_blocks: Vec<TableBlock>,
    },
    Delete {
        old_blocks: Vec<TableBlock>,
    },
    Edit {
        new_blocks: Vec<TableBlock>,
        old_blocks: Vec<TableBlock>,
    },
    Move {
        moves: Vec<BlockMove>,
    },
    AddAndEdit {
        new_blocks: Vec<TableBlock>,
        edited_new: Vec<TableBlock>,
        edited_old: Vec<TableBlock>,
    },
    DeleteAndEdit {
        old_blocks: Vec<TableBlock>,
        edited_new: Vec<TableBlock>,
        edited_old: Vec<TableBlock>,
    },
}

impl ChangeRecord for ChangedData {
    /// Add and Delete invert into each other by swapping the snapshot role;
    /// Edit swaps new/old; Move swaps every (from, to) pair; the compound
    /// variants swap like Add/Delete and flip their tag.
    fn inverse(&self) -> Self {
        match self.clone() {
            ChangedData::Add { new_blocks } => ChangedData::Delete {
                old_blocks: new_blocks,
            },
            ChangedData::Delete { old_blocks } => ChangedData::Add {
                new_blocks: old_blocks,
            },
            ChangedData::Edit {
                new_blocks,
                old_blocks,
            } => ChangedData::Edit {
                new_blocks: old_blocks,
                old_blocks: new_blocks,
            },
            ChangedData::Move { moves } => ChangedData::Move {
                moves: moves
                    .into_iter()
                    .map(|step| BlockMove {
                        from: step.to,
                        to: step.from,
                    })
                    .collect(),
            },
            ChangedData::AddAndEdit {
                new_blocks,
                edited_new,
                edited_old,
            } => ChangedData::DeleteAndEdit {
                old_blocks: new_blocks,
                edited_new: edited_old,
                edited_old: edited_new,
            },
            ChangedData::DeleteAndEdit {
                old_blocks,
                edited_new,
                edited_old,
            } => ChangedData::AddAndEdit {
                new_blocks: old_blocks,
                edited_new: edited_old,
                edited_old: edited_new,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::IniBlock;

    fn snapshot(name: &str) -> TableBlock {
        TableBlock::new(0, 0, IniBlock::new(name))
    }

    #[test]
    fn add_and_delete_invert_into_each_other() {
        let record = ChangedData::Add {
            new_blocks: vec![snapshot("a")],
        };
        let inverse = record.inverse();
        assert_eq!(
            inverse,
            ChangedData::Delete {
                old_blocks: vec![snapshot("a")],
            }
        );
        assert_eq!(inverse.inverse(), record);
    }

    #[test]
    fn edit_inverse_swaps_snapshots() {
        let record = ChangedData::Edit {
            new_blocks: vec![snapshot("new")],
            old_blocks: vec![snapshot("old")],
        };
        assert_eq!(
            record.inverse(),
            ChangedData::Edit {
                new_blocks: vec![snapshot("old")],
                old_blocks: vec![snapshot("new")],
            }
        );
    }

    #[test]
    fn move_inverse_swaps_index_pairs() {
        let record = ChangedData::Move {
            moves: vec![BlockMove { from: 1, to: 4 }, BlockMove { from: 2, to: 5 }],
        };
        assert_eq!(
            record.inverse(),
            ChangedData::Move {
                moves: vec![BlockMove { from: 4, to: 1 }, BlockMove { from: 5, to: 2 }],
            }
        );
    }

    #[test]
    fn compound_inverse_flips_the_tag() {
        let record = ChangedData::AddAndEdit {
            new_blocks: vec![snapshot("added")],
            edited_new: vec![snapshot("after")],
            edited_old: vec![snapshot("before")],
        };
        let inverse = record.inverse();
        assert_eq!(
            inverse,
            ChangedData::DeleteAndEdit {
                old_blocks: vec![snapshot("added")],
                edited_new: vec![snapshot("before")],
                edited_old: vec![snapshot("after")],
            }
        );
        // Double inversion is the identity.
        assert_eq!(inverse.inverse(), record);
    }
}

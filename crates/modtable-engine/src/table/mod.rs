/*!
 * # Document Model
 *
 * The editor-facing collection of blocks. Blocks live in an arena keyed by
 * a stable [`BlockId`] that survives any amount of reordering, with a
 * separate order vector providing the `Index -> Id` lookup. `Index` is
 * recomputed after every structural mutation and always equals true list
 * position; ids come from a monotone counter that never decreases and is
 * never reused within a session.
 *
 * Undo snapshots are independent [`TableBlock`] value copies, never aliases
 * of live state.
 */

use std::collections::HashMap;

use crate::classify::ContentType;
use crate::format::{IniBlock, IniDocument};

/// Stable identity of a block for the lifetime of the editing session.
pub type BlockId = u64;

/// Dirty state of a block, driving row highlighting in a front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableModified {
    #[default]
    Unchanged,
    Changed,
    ChangedAdded,
    ChangedSaved,
}

/// Precondition failure: an operation referenced an id absent from the
/// document or an index outside `[0, len]`. Surfaced to the caller, never
/// swallowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("block id {0} is not part of the document")]
    UnknownId(BlockId),
    #[error("block id {0} is already part of the document")]
    DuplicateId(BlockId),
    #[error("index {index} is out of range for a document of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// One block as the editor sees it: the owned codec-level [`IniBlock`] plus
/// identity, position, classification and dirty state.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub id: BlockId,
    /// Current list position; recomputed after every structural mutation.
    pub index: usize,
    /// Display name, kept in sync with the main option's first entry.
    pub name: String,
    pub block: IniBlock,
    pub content_type: ContentType,
    pub modified: TableModified,
    pub visibility: bool,
    /// Archetype key this block resolved against, when classified in a mode
    /// that cross-references an archetype document.
    pub archetype: Option<String>,
}

impl TableBlock {
    pub fn new(id: BlockId, index: usize, block: IniBlock) -> Self {
        let name = block
            .display_name()
            .unwrap_or(&block.name)
            .to_owned();
        Self {
            id,
            index,
            name,
            block,
            content_type: ContentType::None,
            modified: TableModified::Unchanged,
            visibility: false,
            archetype: None,
        }
    }

    /// Re-derive the display name after the underlying block changed.
    pub fn refresh_name(&mut self) {
        self.name = self
            .block
            .display_name()
            .unwrap_or(&self.block.name)
            .to_owned();
    }

    /// Mark as edited, without downgrading a freshly added block.
    pub fn set_modified_changed(&mut self) {
        if self.modified != TableModified::ChangedAdded {
            self.modified = TableModified::Changed;
        }
    }

    /// Blocks become eligible for visibility toggling only once classified
    /// as something other than the sentinel.
    pub fn set_visible_if_possible(&mut self) {
        if self.content_type != ContentType::None {
            self.visibility = true;
        }
    }
}

/// Ordered, identity-stable collection of [`TableBlock`]s.
#[derive(Debug, Clone, Default)]
pub struct TableData {
    blocks: HashMap<BlockId, TableBlock>,
    order: Vec<BlockId>,
    pub file_index: usize,
    max_id: u64,
}

impl TableData {
    pub fn new(file_index: usize) -> Self {
        Self {
            file_index,
            ..Self::default()
        }
    }

    /// Wrap a freshly parsed document, assigning ids in document order.
    pub fn from_document(document: IniDocument) -> Self {
        let mut data = Self::new(document.file_index);
        for (index, block) in document.blocks.into_iter().enumerate() {
            let id = data.next_id();
            data.order.push(id);
            data.blocks.insert(id, TableBlock::new(id, index, block));
        }
        data
    }

    /// Flatten back to the codec-level document, in order.
    pub fn to_document(&self) -> IniDocument {
        IniDocument {
            blocks: self
                .blocks_ordered()
                .map(|block| block.block.clone())
                .collect(),
            file_index: self.file_index,
        }
    }

    /// Return and consume the next unused id. Never decreases, never reused.
    pub fn next_id(&mut self) -> BlockId {
        let id = self.max_id;
        self.max_id += 1;
        id
    }

    pub fn max_id(&self) -> u64 {
        self.max_id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: BlockId) -> Option<&TableBlock> {
        self.blocks.get(&id)
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut TableBlock> {
        self.blocks.get_mut(&id)
    }

    pub fn get_at(&self, index: usize) -> Option<&TableBlock> {
        self.order.get(index).and_then(|id| self.blocks.get(id))
    }

    pub fn id_at(&self, index: usize) -> Option<BlockId> {
        self.order.get(index).copied()
    }

    /// Blocks in list order.
    pub fn blocks_ordered(&self) -> impl Iterator<Item = &TableBlock> {
        self.order.iter().filter_map(|id| self.blocks.get(id))
    }

    /// Mutable access to every block, order not guaranteed (used for
    /// whole-document reclassification and save-state transitions).
    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut TableBlock> {
        self.blocks.values_mut()
    }

    pub fn position_of(&self, id: BlockId) -> Result<usize, IdentityError> {
        self.order
            .iter()
            .position(|&candidate| candidate == id)
            .ok_or(IdentityError::UnknownId(id))
    }

    /// Insert at `index` (`0..=len`) and renumber everything behind it.
    pub fn insert(&mut self, index: usize, mut block: TableBlock) -> Result<(), IdentityError> {
        if index > self.order.len() {
            return Err(IdentityError::IndexOutOfRange {
                index,
                len: self.order.len(),
            });
        }
        if self.blocks.contains_key(&block.id) {
            return Err(IdentityError::DuplicateId(block.id));
        }

        block.index = index;
        self.max_id = self.max_id.max(block.id + 1);
        self.order.insert(index, block.id);
        self.blocks.insert(block.id, block);
        self.refresh_indices(index);
        Ok(())
    }

    /// Remove by id, renumbering everything behind the removed position.
    pub fn remove(&mut self, id: BlockId) -> Result<TableBlock, IdentityError> {
        let position = self.position_of(id)?;
        self.order.remove(position);
        let block = self
            .blocks
            .remove(&id)
            .ok_or(IdentityError::UnknownId(id))?;
        self.refresh_indices(position);
        Ok(block)
    }

    /// Swap in a new value for an existing block, preserving its id and
    /// index. Returns the displaced block.
    pub fn replace(&mut self, id: BlockId, mut new: TableBlock) -> Result<TableBlock, IdentityError> {
        let old = self.blocks.get(&id).ok_or(IdentityError::UnknownId(id))?;
        new.id = id;
        new.index = old.index;
        self.blocks
            .insert(id, new)
            .ok_or(IdentityError::UnknownId(id))
    }

    /// Recompute `index` for every block at or after `from`.
    pub fn refresh_indices(&mut self, from: usize) {
        for position in from..self.order.len() {
            let id = self.order[position];
            if let Some(block) = self.blocks.get_mut(&id) {
                block.index = position;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(data: &mut TableData, name: &str) -> TableBlock {
        let id = data.next_id();
        TableBlock::new(id, 0, IniBlock::new(name))
    }

    fn sample() -> TableData {
        let mut data = TableData::new(0);
        for name in ["a", "b", "c"] {
            let block = block(&mut data, name);
            let index = data.len();
            data.insert(index, block).unwrap();
        }
        data
    }

    #[test]
    fn next_id_is_monotone_and_never_reused() {
        let mut data = sample();
        let id = data.next_id();
        assert_eq!(id, 3);

        // Removing a block does not free its id.
        let first = data.id_at(0).unwrap();
        data.remove(first).unwrap();
        assert_eq!(data.next_id(), 4);
    }

    #[test]
    fn insert_renumbers_following_blocks() {
        let mut data = sample();
        let new = block(&mut data, "x");
        data.insert(1, new).unwrap();

        let names: Vec<&str> = data
            .blocks_ordered()
            .map(|block| block.block.name.as_str())
            .collect();
        assert_eq!(names, ["a", "x", "b", "c"]);
        let indices: Vec<usize> = data.blocks_ordered().map(|block| block.index).collect();
        assert_eq!(indices, [0, 1, 2, 3]);
    }

    #[test]
    fn insert_rejects_out_of_range_index() {
        let mut data = sample();
        let new = block(&mut data, "x");
        assert_eq!(
            data.insert(9, new),
            Err(IdentityError::IndexOutOfRange { index: 9, len: 3 })
        );
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let mut data = sample();
        let mut new = block(&mut data, "x");
        new.id = data.id_at(0).unwrap();
        assert_eq!(
            data.insert(0, new),
            Err(IdentityError::DuplicateId(0))
        );
    }

    #[test]
    fn remove_keeps_remaining_ids_and_renumbers() {
        let mut data = sample();
        let middle = data.id_at(1).unwrap();
        let removed = data.remove(middle).unwrap();
        assert_eq!(removed.block.name, "b");

        assert_eq!(data.len(), 2);
        assert_eq!(data.get_at(1).unwrap().block.name, "c");
        assert_eq!(data.get_at(1).unwrap().index, 1);
        // The surviving blocks keep their original ids.
        assert_eq!(data.id_at(0), Some(0));
        assert_eq!(data.id_at(1), Some(2));

        assert_eq!(data.remove(middle), Err(IdentityError::UnknownId(middle)));
    }

    #[test]
    fn replace_preserves_id_and_index() {
        let mut data = sample();
        let target = data.id_at(1).unwrap();

        let replacement = TableBlock::new(99, 42, IniBlock::new("replacement"));
        let old = data.replace(target, replacement).unwrap();
        assert_eq!(old.block.name, "b");

        let current = data.get(target).unwrap();
        assert_eq!(current.id, target);
        assert_eq!(current.index, 1);
        assert_eq!(current.block.name, "replacement");
    }

    #[test]
    fn document_round_trip_preserves_order() {
        let data = sample();
        let document = data.to_document();
        let names: Vec<&str> = document
            .blocks
            .iter()
            .map(|block| block.name.as_str())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);

        let rebuilt = TableData::from_document(document);
        assert_eq!(rebuilt.len(), 3);
        assert_eq!(rebuilt.max_id(), 3);
    }

    #[test]
    fn display_name_follows_main_option() {
        let mut ini = IniBlock::new("Object");
        crate::format::push_entry(&mut ini, "nickname", crate::format::IniEntry::new("li01"));
        ini.main_option_index = Some(0);

        let mut block = TableBlock::new(0, 0, ini);
        assert_eq!(block.name, "li01");

        block.block.options[0].entries[0].value = "li02".into();
        block.refresh_name();
        assert_eq!(block.name, "li02");
    }
}

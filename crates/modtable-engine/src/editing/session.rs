//! The editing session: one document, one undo log, one classifier context.
//!
//! Every mutation flows through a [`ChangedData`] record. Executing a record
//! applies its forward effect to the document model, logs it, and publishes
//! a change event -- strictly after the model reflects the mutation, in
//! exact execution/undo/redo order. The session is exclusively owned by one
//! editor and everything here runs synchronously on the caller's thread.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::classify::{ArchetypeManager, ContentType, ViewerType, classify};
use crate::format::{CodecOptions, FormatError, IniBlock, IniDocument, WireFormat, write_bytes};
use crate::schema::{FileTemplate, SchemaError, Template};
use crate::table::{BlockId, IdentityError, TableBlock, TableData, TableModified};

use super::change::{BlockMove, ChangedData};
use super::undo::UndoEngine;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("block template index {0} is out of range for this file type")]
    UnknownBlockTemplate(usize),
    #[error("pasted data targets file type {data} but this session edits file type {session}")]
    FileTypeMismatch { data: usize, session: usize },
}

/// Events published to subscribers, in the order the model changed.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// A change record was applied (forward on execute/redo, inverse on
    /// undo).
    DataChanged(ChangedData),
    VisibilityChanged { id: BlockId, visible: bool },
    SelectionChanged { ids: Vec<BlockId> },
}

pub struct EditorSession {
    data: TableData,
    undo: UndoEngine<ChangedData>,
    template: Arc<Template>,
    file_template: FileTemplate,
    viewer: ViewerType,
    archetype: Option<ArchetypeManager>,
    subscribers: Vec<Sender<EditorEvent>>,
    selection: Vec<BlockId>,
}

impl EditorSession {
    /// Start an empty session for a new file of the given type.
    pub fn new(template: Arc<Template>, file_index: usize) -> Result<Self, EditorError> {
        Self::with_data(template, TableData::new(file_index))
    }

    /// Wrap a document produced by the codec.
    pub fn from_document(
        template: Arc<Template>,
        document: IniDocument,
    ) -> Result<Self, EditorError> {
        Self::with_data(template, TableData::from_document(document))
    }

    fn with_data(template: Arc<Template>, data: TableData) -> Result<Self, EditorError> {
        let file_template = template.file(data.file_index)?.clone();
        let viewer = ViewerType::from_role(file_template.role);

        let mut session = Self {
            data,
            undo: UndoEngine::new(),
            template,
            file_template,
            viewer,
            archetype: None,
            subscribers: Vec::new(),
            selection: Vec::new(),
        };
        session.classify_all();
        Ok(session)
    }

    pub fn data(&self) -> &TableData {
        &self.data
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn viewer_type(&self) -> ViewerType {
        self.viewer
    }

    /// (Re)load the archetype cross-reference document and re-classify
    /// everything against it.
    pub fn load_archetypes(&mut self, archetype_document: &IniDocument) {
        self.archetype = Some(ArchetypeManager::from_document(archetype_document));
        self.classify_all();
    }

    fn classify_all(&mut self) {
        let viewer = self.viewer;
        let archetype = self.archetype.take();
        for block in self.data.blocks_mut() {
            classify(viewer, block, archetype.as_ref());
            block.set_visible_if_possible();
        }
        self.archetype = archetype;
    }

    /// Subscribe to change notifications. Dropped receivers are pruned
    /// lazily on the next publish.
    pub fn subscribe(&mut self) -> Receiver<EditorEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        receiver
    }

    fn notify(&mut self, event: EditorEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    // ---- operations -----------------------------------------------------

    /// Add a schema-default block of the given template at `at` (end of the
    /// document when `None`).
    pub fn add_template_block(
        &mut self,
        block_template_index: usize,
        name: &str,
        at: Option<usize>,
    ) -> Result<(), EditorError> {
        let ini = self
            .file_template
            .default_block(block_template_index, name)
            .ok_or(EditorError::UnknownBlockTemplate(block_template_index))?;

        let index = at.unwrap_or(self.data.len()).min(self.data.len());
        let id = self.data.next_id();
        self.add_blocks(vec![TableBlock::new(id, index, ini)])
    }

    /// Paste codec-level blocks (clipboard shape) at the end of the
    /// document, assigning fresh ids.
    pub fn paste_blocks(&mut self, document: IniDocument) -> Result<(), EditorError> {
        if document.file_index != self.data.file_index {
            return Err(EditorError::FileTypeMismatch {
                data: document.file_index,
                session: self.data.file_index,
            });
        }

        let base_index = self.data.len();
        let blocks = document
            .blocks
            .into_iter()
            .enumerate()
            .map(|(offset, block)| {
                let id = self.data.next_id();
                TableBlock::new(id, base_index + offset, block)
            })
            .collect();
        self.add_blocks(blocks)
    }

    /// Add a batch of blocks as one compound transaction. Blocks whose
    /// template forbids multiple instances overwrite the existing instance
    /// instead (an edit preserving the existing id and index); the split
    /// holds even when the batch mixes singleton and ordinary blocks.
    pub fn add_blocks(&mut self, blocks: Vec<TableBlock>) -> Result<(), EditorError> {
        let mut added = Vec::new();
        let mut edited_new = Vec::new();
        let mut edited_old = Vec::new();

        for mut block in blocks {
            block.modified = TableModified::ChangedAdded;
            if block.archetype.is_none() {
                classify(self.viewer, &mut block, self.archetype.as_ref());
                block.set_visible_if_possible();
            }

            let existing = block
                .block
                .template_index
                .filter(|&template_index| {
                    self.file_template
                        .block(template_index)
                        .is_some_and(|template| !template.multiple)
                })
                .and_then(|template_index| {
                    self.data
                        .blocks_ordered()
                        .find(|candidate| candidate.block.template_index == Some(template_index))
                        .cloned()
                });

            match existing {
                Some(existing) => {
                    // Overwrite the singleton in place.
                    block.id = existing.id;
                    block.index = existing.index;
                    edited_new.push(block);
                    edited_old.push(existing);
                }
                None => added.push(block),
            }
        }

        let record = match (added.is_empty(), edited_new.is_empty()) {
            (false, true) => ChangedData::Add { new_blocks: added },
            (true, false) => ChangedData::Edit {
                new_blocks: edited_new,
                old_blocks: edited_old,
            },
            (false, false) => ChangedData::AddAndEdit {
                new_blocks: added,
                edited_new,
                edited_old,
            },
            (true, true) => return Ok(()),
        };
        self.execute(record)
    }

    /// Replace the codec-level content of existing blocks, as one
    /// transaction. Re-classifies every edited block and refreshes its
    /// display name.
    pub fn edit_blocks(
        &mut self,
        edits: Vec<(BlockId, IniBlock)>,
    ) -> Result<(), EditorError> {
        let mut new_blocks = Vec::with_capacity(edits.len());
        let mut old_blocks = Vec::with_capacity(edits.len());

        for (id, ini) in edits {
            let old = self
                .data
                .get(id)
                .ok_or(IdentityError::UnknownId(id))?
                .clone();

            let mut new = old.clone();
            new.block = ini;
            new.refresh_name();
            classify(self.viewer, &mut new, self.archetype.as_ref());
            if old.content_type == ContentType::None {
                new.set_visible_if_possible();
            }
            new.set_modified_changed();

            new_blocks.push(new);
            old_blocks.push(old);
        }

        self.execute(ChangedData::Edit {
            new_blocks,
            old_blocks,
        })
    }

    /// Delete blocks by id, as one transaction.
    pub fn delete_blocks(&mut self, ids: &[BlockId]) -> Result<(), EditorError> {
        let mut old_blocks = Vec::with_capacity(ids.len());
        for &id in ids {
            old_blocks.push(
                self.data
                    .get(id)
                    .ok_or(IdentityError::UnknownId(id))?
                    .clone(),
            );
        }
        // Ascending snapshot order so the inverse add restores positions
        // front to back.
        old_blocks.sort_by_key(|block| block.index);

        self.execute(ChangedData::Delete { old_blocks })
    }

    /// Move blocks so they end up contiguous in front of `target_index`
    /// (a position in the pre-move document, `0..=len`).
    pub fn move_blocks(&mut self, ids: &[BlockId], target_index: usize) -> Result<(), EditorError> {
        if target_index > self.data.len() {
            return Err(IdentityError::IndexOutOfRange {
                index: target_index,
                len: self.data.len(),
            }
            .into());
        }

        let mut sources = Vec::with_capacity(ids.len());
        for &id in ids {
            sources.push(self.data.position_of(id)?);
        }
        sources.sort_unstable();

        // Sources in front of the target slide everything after them one
        // step left once removed.
        let shift = sources
            .iter()
            .filter(|&&source| source < target_index)
            .count();
        let base = target_index - shift;

        let moves: Vec<BlockMove> = sources
            .iter()
            .enumerate()
            .map(|(offset, &source)| BlockMove {
                from: source,
                to: base + offset,
            })
            .collect();

        if moves.iter().all(|step| step.from == step.to) {
            return Ok(());
        }
        self.execute(ChangedData::Move { moves })
    }

    pub fn set_visibility(&mut self, id: BlockId, visible: bool) -> Result<bool, EditorError> {
        let block = self
            .data
            .get_mut(id)
            .ok_or(IdentityError::UnknownId(id))?;
        if block.content_type == ContentType::None || block.visibility == visible {
            return Ok(false);
        }

        block.visibility = visible;
        self.notify(EditorEvent::VisibilityChanged { id, visible });
        Ok(true)
    }

    pub fn select(&mut self, ids: Vec<BlockId>) -> Result<(), EditorError> {
        for &id in &ids {
            if self.data.get(id).is_none() {
                return Err(IdentityError::UnknownId(id).into());
            }
        }
        self.selection = ids.clone();
        self.notify(EditorEvent::SelectionChanged { ids });
        Ok(())
    }

    pub fn selection(&self) -> &[BlockId] {
        &self.selection
    }

    // ---- transaction log ------------------------------------------------

    /// Apply a record's forward effect, log it and notify. Clears any
    /// pending redo history.
    pub fn execute(&mut self, record: ChangedData) -> Result<(), EditorError> {
        self.apply(&record)?;
        self.undo.record(record.clone());
        self.notify(EditorEvent::DataChanged(record));
        Ok(())
    }

    /// Apply the inverse of the most recent record. No-op (returns `false`)
    /// when nothing is pending.
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let Some(inverse) = self.undo.undo() else {
            return Ok(false);
        };
        self.apply(&inverse)?;
        self.notify(EditorEvent::DataChanged(inverse));
        Ok(true)
    }

    /// Re-apply the most recently undone record. No-op when nothing is
    /// pending.
    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let Some(record) = self.undo.redo() else {
            return Ok(false);
        };
        self.apply(&record)?;
        self.notify(EditorEvent::DataChanged(record));
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// True iff the current undo position differs from the last-saved
    /// marker.
    pub fn is_modified(&self) -> bool {
        self.undo.is_modified()
    }

    /// Mark the current state as saved and settle every pending block's
    /// dirty marker.
    pub fn set_as_saved(&mut self) {
        if !self.undo.is_modified() {
            return;
        }
        self.undo.set_as_saved();
        for block in self.data.blocks_mut() {
            if matches!(
                block.modified,
                TableModified::Changed | TableModified::ChangedAdded
            ) {
                block.modified = TableModified::ChangedSaved;
            }
        }
    }

    /// Serialize the current document, fully buffered; the caller owns the
    /// persistence boundary and should call [`Self::set_as_saved`] once the
    /// bytes are safely written.
    pub fn to_bytes(
        &self,
        options: &CodecOptions,
        format: WireFormat,
    ) -> Result<Vec<u8>, FormatError> {
        write_bytes(&self.data.to_document(), options, format)
    }

    // ---- record application ---------------------------------------------

    fn apply(&mut self, record: &ChangedData) -> Result<(), EditorError> {
        match record {
            ChangedData::Add { new_blocks } => self.apply_add(new_blocks),
            ChangedData::Delete { old_blocks } => self.apply_delete(old_blocks),
            ChangedData::Edit {
                new_blocks,
                old_blocks,
            } => self.apply_edit(new_blocks, old_blocks),
            ChangedData::Move { moves } => self.apply_move(moves),
            ChangedData::AddAndEdit {
                new_blocks,
                edited_new,
                edited_old,
            } => {
                self.apply_add(new_blocks)?;
                self.apply_edit(edited_new, edited_old)
            }
            ChangedData::DeleteAndEdit {
                old_blocks,
                edited_new,
                edited_old,
            } => {
                self.apply_delete(old_blocks)?;
                self.apply_edit(edited_new, edited_old)
            }
        }
    }

    fn apply_add(&mut self, blocks: &[TableBlock]) -> Result<(), EditorError> {
        for block in blocks {
            let index = block.index.min(self.data.len());
            self.data.insert(index, block.clone())?;
        }
        Ok(())
    }

    fn apply_delete(&mut self, blocks: &[TableBlock]) -> Result<(), EditorError> {
        for block in blocks {
            self.data.remove(block.id)?;
        }
        Ok(())
    }

    fn apply_edit(
        &mut self,
        new_blocks: &[TableBlock],
        old_blocks: &[TableBlock],
    ) -> Result<(), EditorError> {
        for (new, old) in new_blocks.iter().zip(old_blocks) {
            self.data.replace(old.id, new.clone())?;
        }
        Ok(())
    }

    /// Source blocks come out first (descending, so positions stay valid),
    /// then go back in at their destinations (ascending).
    fn apply_move(&mut self, moves: &[BlockMove]) -> Result<(), EditorError> {
        let mut steps = moves.to_vec();
        steps.sort_unstable_by_key(|step| step.from);

        let mut in_flight = Vec::with_capacity(steps.len());
        for step in steps.iter().rev() {
            let id = self
                .data
                .id_at(step.from)
                .ok_or(IdentityError::IndexOutOfRange {
                    index: step.from,
                    len: self.data.len(),
                })?;
            in_flight.push((*step, self.data.remove(id)?));
        }

        in_flight.sort_unstable_by_key(|(step, _)| step.to);
        for (step, block) in in_flight {
            let index = step.to.min(self.data.len());
            self.data.insert(index, block)?;
        }
        Ok(())
    }
}

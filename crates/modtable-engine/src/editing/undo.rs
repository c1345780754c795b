//! Generic transactional log with inverse computation.
//!
//! The engine tracks an undo stack, a redo stack and a *position marker* for
//! the last-saved state (not a boolean): undoing back to exactly the saved
//! position reports unmodified, while a fresh execution that makes the saved
//! state unreachable drops the marker for good.

use super::change::ChangeRecord;

#[derive(Debug)]
pub struct UndoEngine<T> {
    undo: Vec<T>,
    redo: Vec<T>,
    /// Undo-stack depth at the last save; `None` once the saved state became
    /// unreachable.
    saved_at: Option<usize>,
}

impl<T> Default for UndoEngine<T> {
    fn default() -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            saved_at: Some(0),
        }
    }
}

impl<T: ChangeRecord + Clone> UndoEngine<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log an executed record. Clears the redo stack; if the saved state
    /// lived in the cleared region it is gone for the rest of the session.
    pub fn record(&mut self, record: T) {
        if let Some(saved) = self.saved_at
            && saved > self.undo.len()
        {
            self.saved_at = None;
        }
        self.undo.push(record);
        self.redo.clear();
    }

    /// Pop the most recent record, park the original on the redo stack and
    /// hand back its inverse for the caller to apply. `None` when nothing is
    /// pending (a no-op, not an error).
    pub fn undo(&mut self) -> Option<T> {
        let record = self.undo.pop()?;
        let inverse = record.inverse();
        self.redo.push(record);
        Some(inverse)
    }

    /// Pop from the redo stack and hand back the forward record to re-apply,
    /// restoring it onto the undo stack.
    pub fn redo(&mut self) -> Option<T> {
        let record = self.redo.pop()?;
        self.undo.push(record.clone());
        Some(record)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// True iff the current position differs from the last-saved marker.
    pub fn is_modified(&self) -> bool {
        self.saved_at != Some(self.undo.len())
    }

    /// Move the last-saved marker to the current position.
    pub fn set_as_saved(&mut self) {
        self.saved_at = Some(self.undo.len());
    }
}

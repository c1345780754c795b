/*!
 * # Transactional Editing
 *
 * Every mutation is a [`ChangedData`] record carrying value snapshots of the
 * blocks it touches, executed through an [`EditorSession`] and logged in a
 * generic [`UndoEngine`]. Undo applies the structural inverse of a record;
 * the engine tracks the last-saved position so "modified" survives undoing
 * past and back to the save point correctly.
 */

pub mod change;
pub mod session;
pub mod undo;

pub use change::{BlockMove, ChangeRecord, ChangedData};
pub use session::{EditorError, EditorEvent, EditorSession};
pub use undo::UndoEngine;

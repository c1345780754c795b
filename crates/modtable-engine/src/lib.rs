pub mod classify;
pub mod editing;
pub mod format;
pub mod io;
pub mod schema;
pub mod table;

// Re-export key types for easier usage
pub use classify::{ArchetypeManager, ContentType, ViewerType};
pub use editing::{ChangedData, EditorError, EditorEvent, EditorSession, UndoEngine};
pub use format::{
    CodecOptions, FileEncoding, FormatError, IniBlock, IniDocument, IniEntry, IniOption,
    ParsedFile, WireFormat, read_bytes, read_bytes_as, write_bytes,
};
pub use schema::{FileRole, FileTemplate, SchemaError, Template};
pub use table::{BlockId, IdentityError, TableBlock, TableData, TableModified};

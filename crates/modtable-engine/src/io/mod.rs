//! Persistence boundary: whole files in, whole files out. Reads and writes
//! are fully buffered byte vectors so the codec never observes a partially
//! written file; format and encoding concerns live in [`crate::format`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::{SchemaError, Template};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid template schema: {0}")]
    Template(#[from] SchemaError),
}

/// Read a whole file into memory.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_path_buf()));
    }
    fs::read(path).map_err(IoError::Io)
}

/// Write a fully serialized document, creating parent directories as needed.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(IoError::Io)?;
    }
    fs::write(path, bytes).map_err(IoError::Io)
}

/// Load and parse a TOML template schema.
pub fn load_template(path: &Path) -> Result<Template, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_path_buf()));
    }
    let source = fs::read_to_string(path).map_err(IoError::Io)?;
    Ok(Template::from_toml_str(&source)?)
}

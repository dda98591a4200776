//! File handling for shard files.
//!
//! Every write goes through a temporary file in the destination directory
//! that is renamed over the target, so a reader (or a crash) only ever sees
//! the previous or the new content of a shard.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::errors::DbResult;

/// Replace `dir/file_name` with `bytes` in one rename.
pub fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> DbResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(file_name))?;
    Ok(())
}

/// Read a whole file, mapping a missing file to `None`.
pub fn read_optional<P: AsRef<Path>>(path: P) -> DbResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Remove a file, ignoring one that is already gone.
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> DbResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Names of the regular files in `dir`. Hidden files (temporaries left by
/// an interrupted write) are skipped; a missing directory is empty.
pub fn list_file_names(dir: &Path) -> DbResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

pub fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Decode bytes, returning the error message so callers can name the file
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, String> {
    bincode::deserialize(bytes).map_err(|e| e.to_string())
}

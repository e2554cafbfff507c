//! Atomic file replacement.
//!
//! A write goes to a temporary file in the destination's directory, is
//! flushed with `sync_all`, and is then renamed over the destination. Readers
//! see either the previous contents or the new ones, never a torn file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{PersistError, PersistResult};

/// Temporary sibling used while replacing `path`.
fn temp_path(path: &Path) -> PersistResult<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| PersistError::InvalidDocumentPath(path.to_path_buf()))?;
    let mut tmp = name.to_os_string();
    tmp.push(".tmp");
    Ok(path.with_file_name(tmp))
}

/// Replaces the contents of `path` with `bytes` atomically.
///
/// The parent directory must already exist; a missing directory is reported
/// as an error rather than created.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> PersistResult<()> {
    let tmp = temp_path(path)?;

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)
    })();

    if let Err(source) = result {
        // best effort; the temp file may not exist
        let _ = fs::remove_file(&tmp);
        return Err(PersistError::io(path, source));
    }
    Ok(())
}

/// Reads `path` to a string. A missing file is `Ok(None)`.
pub fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

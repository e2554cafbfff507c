//! The tracked document on disk and where its session data lives.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use wtt_core::FileIdentity;

use crate::error::{PersistError, PersistResult};

/// Suffix of the hidden sidecar file holding a document's sessions.
pub const STORE_SUFFIX: &str = ".wtt.json";

/// A document whose working time is tracked.
///
/// Session data is kept in a hidden sidecar next to the document, so it
/// travels with the file's directory and never touches the file itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    path: PathBuf,
}

impl DocumentRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The document's file name, lossily decoded.
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Identity minted for stores of this document: its file name.
    ///
    /// A renamed or saved-as document gets a different identity, so a copied
    /// sidecar never silently merges two documents' histories.
    pub fn identity(&self) -> PersistResult<FileIdentity> {
        self.file_name()
            .map(FileIdentity::new)
            .ok_or_else(|| PersistError::InvalidDocumentPath(self.path.clone()))
    }

    /// Location of the sidecar: `.<file name>.wtt.json` in the same directory.
    pub fn store_path(&self) -> PersistResult<PathBuf> {
        let name = self
            .file_name()
            .ok_or_else(|| PersistError::InvalidDocumentPath(self.path.clone()))?;
        let sidecar = format!(".{name}{STORE_SUFFIX}");
        Ok(match self.path.parent() {
            Some(parent) => parent.join(sidecar),
            None => PathBuf::from(sidecar),
        })
    }

    /// Last-modified time of the document, if it exists and is readable.
    pub fn modified_time(&self) -> Option<DateTime<Utc>> {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

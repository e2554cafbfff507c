//! Persistence errors and load outcomes.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to write the durable store.
///
/// Writes are the only fallible persistence operation. Callers log the error,
/// keep their in-memory state and retry later.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize session store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Document path has no file name: {0}")]
    InvalidDocumentPath(PathBuf),
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for persistence writes.
pub type PersistResult<T> = Result<T, PersistError>;

/// Why a load fell back to an empty store.
///
/// None of these are errors to the caller: every issue resolves to a fresh
/// store and is only reported for logging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadIssue {
    #[error("no stored session data")]
    Missing,

    #[error("stored session data could not be read: {reason}")]
    Unreadable { reason: String },

    #[error("stored session data is malformed: {reason}")]
    Malformed { reason: String },

    #[error("unsupported schema version {found} (supported: {supported})")]
    UnsupportedVersion { found: u64, supported: u32 },

    #[error("stored data belongs to '{stored}', not '{expected}'")]
    IdentityMismatch { stored: String, expected: String },
}

impl LoadIssue {
    /// True for the ordinary first-run case that needs no warning.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

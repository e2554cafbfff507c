//! Loading, reconciling and saving a document's session store.
//!
//! # Load
//!
//! Loading never fails. Anything that prevents the stored data from being
//! trusted (no file, bad JSON, another schema version, structural damage, or
//! data that belongs to another document) yields an empty store together with
//! a [`LoadIssue`] describing why.
//!
//! A successfully decoded store is then reconciled: sessions left open by a
//! process that never closed them are ended at the last moment work
//! demonstrably happened, the later of the document's last-modified time and
//! the store's own last save.
//!
//! # Save
//!
//! Saving snapshots the store, refreshes its totals and save time, and writes
//! it atomically. The caller's store is only updated once the write has
//! succeeded, so a failed save leaves memory exactly as it was.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use wtt_core::SessionStore;

use crate::document::DocumentRef;
use crate::error::{LoadIssue, PersistResult};
use crate::file::{read_optional, write_atomic};
use crate::version::SchemaVersion;

/// Outcome of [`load`].
#[derive(Debug, Clone)]
pub struct Loaded {
    pub store: SessionStore,
    /// Why the stored data was discarded, if it was.
    pub issue: Option<LoadIssue>,
    /// Number of open sessions closed during reconciliation.
    pub reconciled: usize,
}

impl Loaded {
    fn fresh(now: DateTime<Utc>, issue: LoadIssue) -> Self {
        Self {
            store: SessionStore::new(now),
            issue: Some(issue),
            reconciled: 0,
        }
    }
}

/// Loads and reconciles the store for `doc`.
///
/// `now` stamps the empty store created on the reset path.
pub fn load(doc: &DocumentRef, now: DateTime<Utc>) -> Loaded {
    let loaded = match decode(doc) {
        Ok(mut store) => {
            // the sidecar is saved without touching the document, so a later
            // save is as good evidence of work as the document's mtime
            let bound = doc
                .modified_time()
                .map_or(store.last_save_time(), |mtime| mtime.max(store.last_save_time()));
            let reconciled = reconcile(&mut store, bound);
            Loaded {
                store,
                issue: None,
                reconciled,
            }
        }
        Err(issue) => Loaded::fresh(now, issue),
    };

    match &loaded.issue {
        None => info!(
            document = %doc,
            sessions = loaded.store.sessions().len(),
            total_secs = loaded.store.total_time(),
            reconciled = loaded.reconciled,
            "Loaded session store"
        ),
        Some(issue) if issue.is_expected() => {
            info!(document = %doc, "No stored sessions, starting fresh")
        }
        Some(issue) => warn!(document = %doc, %issue, "Discarding stored sessions"),
    }
    loaded
}

/// Reads and validates the stored data without reconciling it.
fn decode(doc: &DocumentRef) -> Result<SessionStore, LoadIssue> {
    let path = doc.store_path().map_err(|e| LoadIssue::Unreadable {
        reason: e.to_string(),
    })?;

    let content = read_optional(&path)
        .map_err(|e| LoadIssue::Unreadable {
            reason: e.to_string(),
        })?
        .ok_or(LoadIssue::Missing)?;

    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| LoadIssue::Malformed {
            reason: e.to_string(),
        })?;

    let version = SchemaVersion::probe(&value).ok_or_else(|| LoadIssue::Malformed {
        reason: "missing schema_version".to_string(),
    })?;
    if !version.is_current() {
        return Err(LoadIssue::UnsupportedVersion {
            found: version.get(),
            supported: wtt_core::SCHEMA_VERSION,
        });
    }

    let store: SessionStore =
        serde_json::from_value(value).map_err(|e| LoadIssue::Malformed {
            reason: e.to_string(),
        })?;
    store.validate().map_err(|e| LoadIssue::Malformed {
        reason: e.to_string(),
    })?;

    if let (Some(stored), Ok(expected)) = (store.file_identity(), doc.identity()) {
        if *stored != expected {
            return Err(LoadIssue::IdentityMismatch {
                stored: stored.to_string(),
                expected: expected.to_string(),
            });
        }
    }

    Ok(store)
}

/// Closes sessions left open by a previous process at `bound`.
///
/// A bound earlier than a session's start clamps that session to zero.
/// Returns the number of sessions closed.
pub fn reconcile(store: &mut SessionStore, bound: DateTime<Utc>) -> usize {
    let closed = store.close_active_sessions(bound);
    if closed > 0 {
        info!(
            closed,
            bound = %bound,
            total_secs = store.total_time(),
            "Closed sessions left open by a previous run"
        );
    }
    closed
}

/// Persists `store` for `doc`, returning the path written.
///
/// Mints the store's identity from the document on first save. The active
/// session stays open; only `total_time` and `last_save_time` are refreshed.
pub fn save(store: &mut SessionStore, doc: &DocumentRef, now: DateTime<Utc>) -> PersistResult<PathBuf> {
    let path = doc.store_path()?;

    let mut snapshot = store.clone();
    if snapshot.file_identity().is_none() {
        let identity = doc.identity()?;
        info!(identity = %identity, "Assigned file identity");
        snapshot.assign_identity(identity);
    }
    snapshot.mark_saved(now);

    let json = serde_json::to_string_pretty(&snapshot)?;
    write_atomic(&path, json.as_bytes())?;

    *store = snapshot;
    debug!(
        path = %path.display(),
        total_secs = store.total_time(),
        "Saved session store"
    );
    Ok(path)
}

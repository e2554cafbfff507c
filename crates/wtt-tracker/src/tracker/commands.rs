//! Tracker actor commands, errors, and events.
//!
//! - `TrackerCommand`: messages processed one at a time by the actor
//! - `TrackerError`: failures surfaced to handle callers
//! - `TrackerEvent`: notifications broadcast to subscribers

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

use wtt_core::{SessionId, SessionStore, StatusView};
use wtt_store::PersistError;

// ============================================================================
// Tracker Commands
// ============================================================================

/// Commands sent to the tracker actor.
///
/// Request/response commands carry a oneshot `respond_to`. `Tick`,
/// `Activity` and `DocumentSaved` are fire-and-forget so that synchronous
/// callers (the scheduler, host hooks) can send them with `try_send`.
#[derive(Debug)]
pub enum TrackerCommand {
    /// Periodic evaluation: idle detection, recompute, save-as check, autosave.
    Tick,

    /// The user interacted with the document.
    Activity,

    /// The host saved the document, possibly under a new path.
    DocumentSaved { path: Option<PathBuf> },

    /// End the active session and start a new one, then save.
    NewSession {
        respond_to: oneshot::Sender<SessionId>,
    },

    /// Restart the active session's clock, then save.
    ResetCurrentSession { respond_to: oneshot::Sender<bool> },

    /// Discard all sessions and breaks and start over, then save.
    ResetAllSessions {
        respond_to: oneshot::Sender<SessionId>,
    },

    /// Empty the break history, then save.
    ClearBreaks { respond_to: oneshot::Sender<usize> },

    /// Set the active session's comment, then save.
    SetComment {
        comment: String,
        respond_to: oneshot::Sender<bool>,
    },

    /// Persist now.
    Save {
        respond_to: oneshot::Sender<Result<PathBuf, TrackerError>>,
    },

    /// Read-only status projection.
    Status {
        respond_to: oneshot::Sender<StatusView>,
    },

    /// Markdown report of the whole store.
    Report { respond_to: oneshot::Sender<String> },

    /// Copy of the current store.
    Snapshot {
        respond_to: oneshot::Sender<SessionStore>,
    },

    /// End the active session, attempt a final save, and stop the actor.
    ///
    /// The responder is optional so hooks can request a close without waiting.
    Close {
        respond_to: Option<oneshot::Sender<Result<(), TrackerError>>>,
    },
}

// ============================================================================
// Tracker Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum TrackerError {
    /// The actor has stopped (closed, or its task ended).
    #[error("Tracker is not running")]
    ChannelClosed,

    #[error("Failed to persist sessions: {0}")]
    Persist(#[from] PersistError),
}

// ============================================================================
// Tracker Events
// ============================================================================

/// Notifications published by the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    SessionStarted {
        session_id: SessionId,
        start: DateTime<Utc>,
    },
    BreakStarted {
        start: DateTime<Utc>,
    },
    BreakEnded {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        duration_secs: u64,
    },
    /// The document is now tracked under a different identity.
    SavedAs {
        from: PathBuf,
        to: PathBuf,
    },
    Saved {
        total_secs: u64,
    },
    SaveFailed {
        reason: String,
    },
    /// The document has gone unsaved past the warning threshold.
    UnsavedWarning {
        unsaved_secs: u64,
    },
    Closed {
        total_secs: u64,
    },
}

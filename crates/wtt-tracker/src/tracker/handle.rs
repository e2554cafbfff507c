//! Client interface for interacting with the TrackerActor.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `TrackerError::ChannelClosed`, or to a
//!   `false` return for the fire-and-forget `notify_*` methods

use std::path::PathBuf;

use tokio::sync::{broadcast, mpsc, oneshot};

use wtt_core::{SessionId, SessionStore, StatusView};

use super::commands::{TrackerCommand, TrackerError, TrackerEvent};

/// Cheap-to-clone handle to a running tracker.
#[derive(Clone)]
pub struct TrackerHandle {
    sender: mpsc::Sender<TrackerCommand>,
    event_sender: broadcast::Sender<TrackerEvent>,
}

impl TrackerHandle {
    pub fn new(
        sender: mpsc::Sender<TrackerCommand>,
        event_sender: broadcast::Sender<TrackerEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Sends a request and waits for the actor's reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> TrackerCommand,
    ) -> Result<T, TrackerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| TrackerError::ChannelClosed)?;
        rx.await.map_err(|_| TrackerError::ChannelClosed)
    }

    // ------------------------------------------------------------------------
    // Fire-and-forget signals (usable from synchronous callbacks)
    // ------------------------------------------------------------------------

    /// Records user activity. Returns false if the signal was not queued.
    pub fn notify_activity(&self) -> bool {
        self.sender.try_send(TrackerCommand::Activity).is_ok()
    }

    /// Records a document save, with the document's path if the host knows it.
    pub fn notify_document_saved(&self, path: Option<PathBuf>) -> bool {
        self.sender
            .try_send(TrackerCommand::DocumentSaved { path })
            .is_ok()
    }

    /// Asks the tracker to close without waiting for the final save.
    pub fn request_close(&self) -> bool {
        self.sender
            .try_send(TrackerCommand::Close { respond_to: None })
            .is_ok()
    }

    /// Queues a close, waiting for room in the command queue.
    ///
    /// Returns false if the tracker stopped first.
    pub async fn send_close(&self) -> bool {
        self.sender
            .send(TrackerCommand::Close { respond_to: None })
            .await
            .is_ok()
    }

    /// Queues a tick for the scheduler.
    pub(crate) fn try_tick(&self) -> Result<(), mpsc::error::TrySendError<TrackerCommand>> {
        self.sender.try_send(TrackerCommand::Tick)
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Runs one tick and returns the status right after it.
    ///
    /// Commands are processed in order, so the status reply is only sent
    /// once the tick has completed.
    pub async fn tick(&self) -> Result<StatusView, TrackerError> {
        self.sender
            .send(TrackerCommand::Tick)
            .await
            .map_err(|_| TrackerError::ChannelClosed)?;
        self.status().await
    }

    /// Records activity and waits until the actor has applied it.
    pub async fn activity(&self) -> Result<(), TrackerError> {
        self.sender
            .send(TrackerCommand::Activity)
            .await
            .map_err(|_| TrackerError::ChannelClosed)?;
        self.status().await.map(|_| ())
    }

    /// Records a document save and waits until the actor has applied it.
    pub async fn document_saved(&self, path: Option<PathBuf>) -> Result<(), TrackerError> {
        self.sender
            .send(TrackerCommand::DocumentSaved { path })
            .await
            .map_err(|_| TrackerError::ChannelClosed)?;
        self.status().await.map(|_| ())
    }

    pub async fn new_session(&self) -> Result<SessionId, TrackerError> {
        self.request(|respond_to| TrackerCommand::NewSession { respond_to })
            .await
    }

    /// Returns false when there was no active session to reset.
    pub async fn reset_current_session(&self) -> Result<bool, TrackerError> {
        self.request(|respond_to| TrackerCommand::ResetCurrentSession { respond_to })
            .await
    }

    /// Irreversible; callers confirm with the user first.
    pub async fn reset_all_sessions(&self) -> Result<SessionId, TrackerError> {
        self.request(|respond_to| TrackerCommand::ResetAllSessions { respond_to })
            .await
    }

    /// Returns the number of breaks removed.
    pub async fn clear_breaks(&self) -> Result<usize, TrackerError> {
        self.request(|respond_to| TrackerCommand::ClearBreaks { respond_to })
            .await
    }

    /// Returns false when there is no active session to annotate.
    pub async fn set_comment(&self, comment: impl Into<String>) -> Result<bool, TrackerError> {
        let comment = comment.into();
        self.request(|respond_to| TrackerCommand::SetComment {
            comment,
            respond_to,
        })
        .await
    }

    pub async fn save(&self) -> Result<PathBuf, TrackerError> {
        self.request(|respond_to| TrackerCommand::Save { respond_to })
            .await?
    }

    pub async fn status(&self) -> Result<StatusView, TrackerError> {
        self.request(|respond_to| TrackerCommand::Status { respond_to })
            .await
    }

    pub async fn report(&self) -> Result<String, TrackerError> {
        self.request(|respond_to| TrackerCommand::Report { respond_to })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionStore, TrackerError> {
        self.request(|respond_to| TrackerCommand::Snapshot { respond_to })
            .await
    }

    /// Ends the active session and performs the final save.
    ///
    /// The actor stops afterwards even if the save failed; the error is
    /// returned so the caller can report it.
    pub async fn close(&self) -> Result<(), TrackerError> {
        self.request(|tx| TrackerCommand::Close {
            respond_to: Some(tx),
        })
        .await?
    }

    /// Subscribes to tracker events.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.event_sender.subscribe()
    }

    /// True while the actor is accepting commands.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}

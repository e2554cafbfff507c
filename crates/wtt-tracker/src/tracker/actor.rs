//! Tracker actor - the single writer of one document's session store.
//!
//! The actor owns the store, the session manager, the idle detector and the
//! document binding. Commands are handled sequentially, so every tick and
//! every user action is atomic with respect to the others.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Persistence failures are logged, published, and retried on the next tick
//! - Responder send failures are ignored (the caller stopped waiting)

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use wtt_core::{
    clamp_secs, report, Clock, IdleDetector, IdleTransition, SessionId, SessionManager,
    SessionStore, StatusView, Thresholds,
};
use wtt_store::{persistence, DocumentRef, LoadIssue};

use super::commands::{TrackerCommand, TrackerError, TrackerEvent};
use crate::config::TrackerConfig;

/// The tracker actor.
pub struct TrackerActor {
    receiver: mpsc::Receiver<TrackerCommand>,
    event_publisher: broadcast::Sender<TrackerEvent>,

    store: SessionStore,
    manager: SessionManager,
    detector: IdleDetector,
    clock: Arc<dyn Clock>,

    /// Document the store is currently bound to.
    document: DocumentRef,
    /// Path most recently reported by the host; differs from `document`
    /// after a save-as until the next tick handles it.
    host_path: PathBuf,

    thresholds: Thresholds,
    autosave_ticks: u64,
    ticks_since_save: u64,
    /// Set after a failed write; the next tick saves regardless of cadence.
    save_pending: bool,
    /// Wall time of the last save of the document itself.
    last_document_save: DateTime<Utc>,
    unsaved_warned: bool,
}

impl TrackerActor {
    /// Loads the document's store and opens a new session.
    ///
    /// Returns the actor ready to run and the reason stored data was
    /// discarded, if it was. The initial save is attempted here; failing it
    /// only marks the save as pending.
    pub fn open(
        receiver: mpsc::Receiver<TrackerCommand>,
        event_publisher: broadcast::Sender<TrackerEvent>,
        document: DocumentRef,
        config: &TrackerConfig,
        clock: Arc<dyn Clock>,
    ) -> (Self, Option<LoadIssue>) {
        let now = clock.now();
        let loaded = persistence::load(&document, now);
        let thresholds = config.thresholds();

        let mut actor = Self {
            receiver,
            event_publisher,
            store: loaded.store,
            manager: SessionManager::new(Arc::clone(&clock)),
            detector: IdleDetector::new(
                Arc::clone(&clock),
                thresholds.break_threshold_secs,
                thresholds.startup_grace_secs,
            ),
            host_path: document.path().to_path_buf(),
            last_document_save: document.modified_time().unwrap_or(now),
            document,
            clock,
            thresholds,
            autosave_ticks: config.autosave_ticks.max(1),
            ticks_since_save: 0,
            save_pending: false,
            unsaved_warned: false,
        };

        let session_id = actor.manager.start_session(&mut actor.store);
        actor.detector.arm();
        actor.publish(TrackerEvent::SessionStarted {
            session_id,
            start: now,
        });
        actor.persist();

        (actor, loaded.issue)
    }

    /// Processes commands until closed or until every handle is dropped.
    ///
    /// Dropping all handles without a `Close` still ends the active session
    /// and attempts a final save.
    pub async fn run(mut self) {
        info!(document = %self.document, "Tracker actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            if self.handle_command(cmd).is_break() {
                info!(document = %self.document, "Tracker actor stopped");
                return;
            }
        }

        debug!("All tracker handles dropped, closing");
        if let Err(e) = self.close() {
            warn!(error = %e, "Final save failed");
        }
        info!(document = %self.document, "Tracker actor stopped");
    }

    /// Dispatches a command. `Break` means the tracker has closed.
    fn handle_command(&mut self, cmd: TrackerCommand) -> ControlFlow<()> {
        match cmd {
            TrackerCommand::Tick => self.handle_tick(),
            TrackerCommand::Activity => self.handle_activity(),
            TrackerCommand::DocumentSaved { path } => self.handle_document_saved(path),
            TrackerCommand::NewSession { respond_to } => {
                self.handle_activity();
                let id = self.manager.switch_session(&mut self.store);
                self.session_started(id);
                self.persist();
                let _ = respond_to.send(id);
            }
            TrackerCommand::ResetCurrentSession { respond_to } => {
                self.handle_activity();
                let reset = self.manager.reset_current_session(&mut self.store);
                if reset {
                    self.persist();
                }
                let _ = respond_to.send(reset);
            }
            TrackerCommand::ResetAllSessions { respond_to } => {
                self.handle_activity();
                let id = self.manager.reset_all_sessions(&mut self.store);
                self.session_started(id);
                self.persist();
                let _ = respond_to.send(id);
            }
            TrackerCommand::ClearBreaks { respond_to } => {
                self.handle_activity();
                let cleared = self.manager.clear_breaks(&mut self.store);
                self.persist();
                let _ = respond_to.send(cleared);
            }
            TrackerCommand::SetComment {
                comment,
                respond_to,
            } => {
                self.handle_activity();
                let set = self.manager.set_session_comment(&mut self.store, comment);
                if set {
                    self.persist();
                }
                let _ = respond_to.send(set);
            }
            TrackerCommand::Save { respond_to } => {
                let _ = respond_to.send(self.try_persist());
            }
            TrackerCommand::Status { respond_to } => {
                let _ = respond_to.send(self.status());
            }
            TrackerCommand::Report { respond_to } => {
                let name = self
                    .document
                    .file_name()
                    .unwrap_or_else(|| self.document.to_string());
                let _ = respond_to.send(report::render(&self.store, &name, self.clock.now()));
            }
            TrackerCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.store.clone());
            }
            TrackerCommand::Close { respond_to } => {
                let result = self.close();
                if let Some(tx) = respond_to {
                    let _ = tx.send(result);
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // ========================================================================
    // Tick
    // ========================================================================

    fn handle_tick(&mut self) {
        if let Some(transition) = self.detector.poll(&mut self.store) {
            self.publish_transition(transition);
        }

        let total = self.manager.recompute(&mut self.store);
        let now = self.clock.now();

        self.check_save_as(now);
        self.check_unsaved(now);

        self.ticks_since_save = self.ticks_since_save.saturating_add(1);
        if self.save_pending || self.ticks_since_save >= self.autosave_ticks {
            self.persist();
        }

        debug!(
            total_secs = total,
            idle_secs = self.detector.idle_for(),
            ticks_since_save = self.ticks_since_save,
            "Tick"
        );
    }

    /// Rebinds the store when the host reports a different path.
    ///
    /// A new file name means a new document lineage: the current session is
    /// ended, the identity re-minted, and a new session opened at the same
    /// instant. The same file name in another directory is a plain move.
    fn check_save_as(&mut self, now: DateTime<Utc>) {
        if self.host_path.as_path() == self.document.path() {
            return;
        }

        let target = DocumentRef::new(self.host_path.clone());
        let identity = match target.identity() {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Ignoring unusable document path");
                self.host_path = self.document.path().to_path_buf();
                return;
            }
        };

        let from = std::mem::replace(&mut self.document, target);
        // a store that was never saved has not minted its identity yet
        let current = self
            .store
            .file_identity()
            .cloned()
            .or_else(|| from.identity().ok());
        let new_lineage = current.is_some_and(|current| current != identity);

        if new_lineage {
            self.manager.end_active_sessions_at(&mut self.store, now);
            self.store.assign_identity(identity);
            let id = self.manager.start_session_at(&mut self.store, now);
            self.session_started(id);
            info!(
                from = %from,
                to = %self.document,
                session_id = %id,
                "Document saved under a new name"
            );
            self.publish(TrackerEvent::SavedAs {
                from: from.path().to_path_buf(),
                to: self.document.path().to_path_buf(),
            });
        } else {
            info!(from = %from, to = %self.document, "Document moved");
        }
        self.save_pending = true;
    }

    fn check_unsaved(&mut self, now: DateTime<Utc>) {
        let unsaved_secs = clamp_secs(now - self.last_document_save);
        if unsaved_secs > self.thresholds.unsaved_warning_threshold_secs {
            if !self.unsaved_warned {
                self.unsaved_warned = true;
                info!(unsaved_secs, "Document has unsaved work");
                self.publish(TrackerEvent::UnsavedWarning { unsaved_secs });
            }
        } else {
            self.unsaved_warned = false;
        }
    }

    // ========================================================================
    // Signals
    // ========================================================================

    fn handle_activity(&mut self) {
        if let Some(transition) = self.detector.record_activity(&mut self.store) {
            self.publish_transition(transition);
        }
    }

    fn handle_document_saved(&mut self, path: Option<PathBuf>) {
        self.handle_activity();
        self.last_document_save = self.clock.now();
        self.unsaved_warned = false;
        if let Some(path) = path {
            if path != self.host_path {
                debug!(path = %path.display(), "Host reported a new document path");
                self.host_path = path;
            }
        }
    }

    fn session_started(&mut self, session_id: SessionId) {
        self.detector.arm();
        let start = self
            .store
            .active_session()
            .map(|s| s.start)
            .unwrap_or_else(|| self.clock.now());
        self.publish(TrackerEvent::SessionStarted { session_id, start });
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    fn try_persist(&mut self) -> Result<PathBuf, TrackerError> {
        let now = self.clock.now();
        match persistence::save(&mut self.store, &self.document, now) {
            Ok(path) => {
                self.ticks_since_save = 0;
                self.save_pending = false;
                self.publish(TrackerEvent::Saved {
                    total_secs: self.store.total_time(),
                });
                Ok(path)
            }
            Err(e) => {
                warn!(document = %self.document, error = %e, "Save failed, will retry");
                self.save_pending = true;
                self.publish(TrackerEvent::SaveFailed {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Saves, leaving any failure to the retry on the next tick.
    fn persist(&mut self) {
        let _ = self.try_persist();
    }

    fn close(&mut self) -> Result<(), TrackerError> {
        self.manager.end_active_sessions(&mut self.store);
        let result = self.try_persist().map(|_| ());
        let total_secs = self.store.total_time();
        info!(document = %self.document, total_secs, "Tracking closed");
        self.publish(TrackerEvent::Closed { total_secs });
        result
    }

    // ========================================================================
    // Projections and events
    // ========================================================================

    fn status(&self) -> StatusView {
        let now = self.clock.now();
        StatusView::project(
            &self.store,
            now,
            self.detector.idle_for(),
            clamp_secs(now - self.last_document_save),
            &self.thresholds,
        )
    }

    fn publish_transition(&self, transition: IdleTransition) {
        let event = match transition {
            IdleTransition::BreakStarted { start } => TrackerEvent::BreakStarted { start },
            IdleTransition::BreakEnded {
                start,
                end,
                duration,
            } => TrackerEvent::BreakEnded {
                start,
                end,
                duration_secs: duration,
            },
        };
        self.publish(event);
    }

    fn publish(&self, event: TrackerEvent) {
        // No subscribers is fine
        let _ = self.event_publisher.send(event);
    }
}

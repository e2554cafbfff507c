//! Document tracker using the actor pattern.
//!
//! ```text
//! ┌──────────────┐  Tick   ┌──────────────────┐  save   ┌──────────────┐
//! │  Scheduler   │────────▶│   TrackerActor   │────────▶│   sidecar    │
//! └──────────────┘         │  (SessionStore)  │         │  .x.wtt.json │
//! ┌──────────────┐ Activity└────────┬─────────┘         └──────────────┘
//! │ Host / hooks │────────▶         │ TrackerEvent
//! └──────────────┘                  ▼ (broadcast)
//! ```
//!
//! The actor is the only writer of the store and of its durable file. Ticks
//! are ordinary commands, so they never interleave with user actions.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Channel operations handle closure gracefully

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use wtt_core::Clock;
use wtt_store::{DocumentRef, LoadIssue};

use crate::config::TrackerConfig;
use crate::scheduler::{ScheduledTask, Scheduler};

mod actor;
mod commands;
mod handle;

pub use actor::TrackerActor;
pub use commands::{TrackerCommand, TrackerError, TrackerEvent};
pub use handle::TrackerHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 64;

/// Opens `document` and spawns its tracker actor.
///
/// Loading, reconciliation, the new session and the initial save happen
/// before this returns. Ticks are not scheduled; see [`schedule_ticks`].
pub fn spawn_tracker(
    document: impl Into<PathBuf>,
    config: &TrackerConfig,
    clock: Arc<dyn Clock>,
) -> (TrackerHandle, Option<LoadIssue>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let (actor, issue) = TrackerActor::open(
        cmd_rx,
        event_tx.clone(),
        DocumentRef::new(document),
        config,
        clock,
    );
    tokio::spawn(actor.run());

    (TrackerHandle::new(cmd_tx, event_tx), issue)
}

/// Sends a `Tick` to the tracker every `period`.
///
/// A tick is skipped when the command queue is full, and the schedule ends
/// once the tracker has stopped.
pub fn schedule_ticks<S: Scheduler>(
    scheduler: &S,
    handle: &TrackerHandle,
    period: Duration,
) -> ScheduledTask {
    let handle = handle.clone();
    scheduler.schedule_every(period, move || match handle.try_tick() {
        Ok(()) => ControlFlow::Continue(()),
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("Tracker busy, skipping tick");
            ControlFlow::Continue(())
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Tick schedule stopping: tracker closed");
            ControlFlow::Break(())
        }
    })
}

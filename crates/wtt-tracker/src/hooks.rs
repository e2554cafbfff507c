//! Host lifecycle hooks.
//!
//! A host (editor plugin, the CLI's file watcher) reports document events
//! through [`HostHooks`]. Subscribers register per event kind and get a
//! [`SubscriptionId`] they can later pass to `unsubscribe`.
//!
//! Callbacks run without the registry locked, so they may subscribe,
//! unsubscribe or emit themselves.

use std::collections::BTreeMap;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::scheduler::{ScheduledTask, Scheduler};
use crate::tracker::TrackerHandle;

/// A document lifecycle event reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Opened(PathBuf),
    /// The document was written, possibly under a new path.
    Saved(PathBuf),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookKind {
    Open,
    Save,
    Close,
}

impl HookKind {
    fn matches(self, event: &HostEvent) -> bool {
        matches!(
            (self, event),
            (HookKind::Open, HostEvent::Opened(_))
                | (HookKind::Save, HostEvent::Saved(_))
                | (HookKind::Close, HostEvent::Closed)
        )
    }
}

/// Token returned by a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&HostEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: BTreeMap<SubscriptionId, (HookKind, Callback)>,
}

/// Shared subscription registry. Clones refer to the same subscribers.
#[derive(Clone, Default)]
pub struct HostHooks {
    inner: Arc<Mutex<Registry>>,
}

impl HostHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // A panicking subscriber must not disable every later event
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(&self, kind: HookKind, callback: Callback) -> SubscriptionId {
        let mut registry = self.registry();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.subscribers.insert(id, (kind, callback));
        id
    }

    pub fn on_open(
        &self,
        callback: impl Fn(&HostEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribe(HookKind::Open, Arc::new(callback))
    }

    pub fn on_save(
        &self,
        callback: impl Fn(&HostEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribe(HookKind::Save, Arc::new(callback))
    }

    pub fn on_close(
        &self,
        callback: impl Fn(&HostEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribe(HookKind::Close, Arc::new(callback))
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry().subscribers.remove(&id).is_some()
    }

    /// Delivers `event` to matching subscribers in subscription order.
    ///
    /// Returns how many subscribers received it. Subscriptions made or
    /// removed by a callback take effect from the next event.
    pub fn emit(&self, event: &HostEvent) -> usize {
        let matching: Vec<Callback> = self
            .registry()
            .subscribers
            .values()
            .filter(|(kind, _)| kind.matches(event))
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in &matching {
            callback(event);
        }
        matching.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().subscribers.len()
    }
}

/// Routes host events to a tracker.
///
/// Open is an activity signal, save records a document save with its path,
/// close asks the tracker to end the session and save. A close that finds the
/// command queue full is handed to a task that waits for room.
pub fn connect_tracker(hooks: &HostHooks, tracker: &TrackerHandle) -> [SubscriptionId; 3] {
    let on_open = tracker.clone();
    let on_save = tracker.clone();
    let on_close = tracker.clone();
    [
        hooks.on_open(move |_| {
            on_open.notify_activity();
        }),
        hooks.on_save(move |event| {
            if let HostEvent::Saved(path) = event {
                on_save.notify_document_saved(Some(path.clone()));
            }
        }),
        hooks.on_close(move |_| {
            if !on_close.request_close() {
                queue_close(&on_close);
            }
        }),
    ]
}

fn queue_close(tracker: &TrackerHandle) {
    if !tracker.is_running() {
        debug!("Close ignored: tracker already stopped");
        return;
    }
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            warn!("Tracker queue full, close deferred until there is room");
            let tracker = tracker.clone();
            runtime.spawn(async move {
                if !tracker.send_close().await {
                    debug!("Tracker stopped before the deferred close");
                }
            });
        }
        Err(_) => warn!("Tracker queue full and no runtime to defer close; close dropped"),
    }
}

// ============================================================================
// File Watcher
// ============================================================================

/// Detects writes to a document by polling its modification time.
#[derive(Debug)]
pub struct FileWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl FileWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified(&path);
        Self {
            path,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Switches to another file without reporting its current state as a save.
    pub fn retarget(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
        self.last_modified = modified(&self.path);
        debug!(path = %self.path.display(), "File watcher retargeted");
    }

    /// Returns a `Saved` event if the file changed since the last poll.
    pub fn poll(&mut self) -> Option<HostEvent> {
        let current = modified(&self.path);
        if current.is_some() && current != self.last_modified {
            self.last_modified = current;
            debug!(path = %self.path.display(), "Document written");
            return Some(HostEvent::Saved(self.path.clone()));
        }
        None
    }
}

/// Polls the document every `period`, emitting `Saved` through `hooks`.
///
/// Sending a new path on `path_rx` retargets the watcher; the schedule ends
/// when the sender is dropped.
pub fn watch_document<S: Scheduler>(
    scheduler: &S,
    period: Duration,
    hooks: HostHooks,
    mut path_rx: watch::Receiver<PathBuf>,
) -> ScheduledTask {
    let mut watcher = FileWatcher::new(path_rx.borrow_and_update().clone());
    scheduler.schedule_every(period, move || {
        match path_rx.has_changed() {
            Ok(true) => {
                let path = path_rx.borrow_and_update().clone();
                watcher.retarget(path);
            }
            Ok(false) => {}
            Err(_) => return ControlFlow::Break(()),
        }
        if let Some(event) = watcher.poll() {
            hooks.emit(&event);
        }
        ControlFlow::Continue(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackerCommand;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::{broadcast, mpsc};

    fn counter(hits: &Arc<AtomicUsize>) -> impl Fn(&HostEvent) + Send + Sync + 'static {
        let hits = Arc::clone(hits);
        move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_events_reach_matching_subscribers_only() {
        let hooks = HostHooks::new();
        let saves = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        hooks.on_save(counter(&saves));
        hooks.on_close(counter(&closes));

        assert_eq!(hooks.emit(&HostEvent::Saved(PathBuf::from("a"))), 1);
        assert_eq!(hooks.emit(&HostEvent::Opened(PathBuf::from("a"))), 0);
        assert_eq!(saves.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hooks = HostHooks::new();
        let saves = Arc::new(AtomicUsize::new(0));
        let id = hooks.on_save(counter(&saves));

        assert!(hooks.unsubscribe(id));
        assert!(!hooks.unsubscribe(id));
        hooks.emit(&HostEvent::Saved(PathBuf::from("a")));
        assert_eq!(saves.load(Ordering::SeqCst), 0);
        assert_eq!(hooks.subscriber_count(), 0);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let hooks = HostHooks::new();
        let other = hooks.clone();
        let opens = Arc::new(AtomicUsize::new(0));
        other.on_open(counter(&opens));
        hooks.emit(&HostEvent::Opened(PathBuf::from("a")));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_reenter_registry() {
        let hooks = HostHooks::new();
        let closes = Arc::new(AtomicUsize::new(0));
        hooks.on_close(counter(&closes));

        let inner = hooks.clone();
        let late = Arc::clone(&closes);
        hooks.on_save(move |_| {
            inner.on_open(counter(&late));
            inner.emit(&HostEvent::Closed);
        });

        assert_eq!(hooks.emit(&HostEvent::Saved(PathBuf::from("a"))), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.subscriber_count(), 3);
    }

    #[tokio::test]
    async fn test_close_is_deferred_when_queue_is_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let (event_tx, _) = broadcast::channel(1);
        let tracker = TrackerHandle::new(tx, event_tx);
        let hooks = HostHooks::new();
        connect_tracker(&hooks, &tracker);

        assert!(tracker.notify_activity());
        assert!(!tracker.request_close());
        hooks.emit(&HostEvent::Closed);

        assert!(matches!(rx.recv().await, Some(TrackerCommand::Activity)));
        assert!(matches!(
            rx.recv().await,
            Some(TrackerCommand::Close { respond_to: None })
        ));
    }

    #[test]
    fn test_file_watcher_reports_mtime_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        fs::write(&path, "v1").unwrap();

        let mut watcher = FileWatcher::new(&path);
        assert_eq!(watcher.poll(), None);

        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000))
            .unwrap();
        assert_eq!(watcher.poll(), Some(HostEvent::Saved(path.clone())));
        assert_eq!(watcher.poll(), None);
    }

    #[test]
    fn test_retarget_does_not_report_existing_file() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let mut watcher = FileWatcher::new(&a);
        watcher.retarget(&b);
        assert_eq!(watcher.path(), b.as_path());
        assert_eq!(watcher.poll(), None);
    }
}

//! Session lifecycle transitions.
//!
//! The manager holds no session state of its own: every operation takes the
//! store by `&mut` and reads the wall clock once, so a whole transition is
//! stamped with a single instant. None of these operations fail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::session::{Session, SessionId, SessionStore};

/// Applies start/switch/reset/close transitions to a [`SessionStore`].
#[derive(Debug, Clone)]
pub struct SessionManager {
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Current wall-clock time as seen by this manager.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Closes any active session and opens a new one starting now.
    ///
    /// Any break left open without a session is dropped.
    pub fn start_session(&self, store: &mut SessionStore) -> SessionId {
        self.start_session_at(store, self.now())
    }

    /// [`start_session`](Self::start_session) at an explicit instant.
    pub fn start_session_at(&self, store: &mut SessionStore, at: DateTime<Utc>) -> SessionId {
        let ended = store.close_active_sessions(at);
        if ended > 0 {
            debug!(ended, "Closed active sessions before starting a new one");
        }
        store.breaks.retain(|b| !b.is_open());

        let id = store.next_session_id();
        store.sessions.push(Session::new(id, at));
        store.current_session_id = Some(id);

        info!(session_id = %id, start = %at, "Session started");
        id
    }

    /// Ends the active session and starts a new one at the same instant.
    ///
    /// Callers persist the store afterwards; the tracker does this for the
    /// "New Session" action.
    pub fn switch_session(&self, store: &mut SessionStore) -> SessionId {
        let now = self.now();
        let ended = self.end_active_sessions_at(store, now);
        if ended == 0 {
            debug!("No active session to end before switching");
        }
        self.start_session_at(store, now)
    }

    /// Restarts the active session's clock at now.
    ///
    /// The time it had accrued is taken out of `total_time`. Returns false
    /// when there is no active session.
    pub fn reset_current_session(&self, store: &mut SessionStore) -> bool {
        let now = self.now();
        let accrued = store.current_session_time(now);
        let Some(session) = store.active_session_mut() else {
            return false;
        };
        session.start = now;
        session.duration = 0;
        let id = session.id;

        store.total_time = store.total_time.saturating_sub(accrued);
        info!(session_id = %id, discarded_secs = accrued, "Current session reset");
        true
    }

    /// Discards all sessions and breaks, then starts a fresh session.
    ///
    /// Irreversible. Confirmation is the caller's responsibility.
    pub fn reset_all_sessions(&self, store: &mut SessionStore) -> SessionId {
        let discarded = store.sessions.len();
        store.sessions.clear();
        store.breaks.clear();
        store.total_time = 0;
        store.current_session_id = None;
        info!(discarded, "All sessions reset");
        self.start_session(store)
    }

    /// Closes every active session now. See [`SessionStore::close_active_sessions`].
    pub fn end_active_sessions(&self, store: &mut SessionStore) -> usize {
        self.end_active_sessions_at(store, self.now())
    }

    /// Closes every active session at `at`.
    pub fn end_active_sessions_at(&self, store: &mut SessionStore, at: DateTime<Utc>) -> usize {
        let ended = store.close_active_sessions(at);
        if ended > 0 {
            info!(ended, total_secs = store.total_time, "Ended active sessions");
        }
        ended
    }

    /// Recomputes `total_time` without closing the active session.
    pub fn recompute(&self, store: &mut SessionStore) -> u64 {
        store.refresh_totals(self.now())
    }

    /// Empties the break history. Sessions and `total_time` are untouched.
    ///
    /// Returns the number of breaks removed.
    pub fn clear_breaks(&self, store: &mut SessionStore) -> usize {
        let cleared = store.breaks.len();
        store.breaks.clear();
        info!(cleared, "Break history cleared");
        cleared
    }

    /// Sets the comment of the active session. Returns false if none is active.
    pub fn set_session_comment(&self, store: &mut SessionStore, comment: impl Into<String>) -> bool {
        match store.active_session_mut() {
            Some(session) => {
                session.comment = comment.into();
                true
            }
            None => false,
        }
    }

    /// Comment of the active session, empty when none is active.
    pub fn session_comment<'a>(&self, store: &'a SessionStore) -> &'a str {
        store
            .active_session()
            .map(|s| s.comment.as_str())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{from_epoch_secs as t, ManualClock};
    use crate::session::Break;

    fn setup(start: i64) -> (ManualClock, SessionManager, SessionStore) {
        let clock = ManualClock::at(start);
        let manager = SessionManager::new(Arc::new(clock.clone()));
        let store = SessionStore::new(clock.now());
        (clock, manager, store)
    }

    fn open_counts(store: &SessionStore) -> (usize, usize) {
        (
            store.sessions().iter().filter(|s| s.is_active()).count(),
            store.breaks().iter().filter(|b| b.is_open()).count(),
        )
    }

    #[test]
    fn test_start_session_appends_active_session() {
        let (_clock, manager, mut store) = setup(1_000);
        let id = manager.start_session(&mut store);

        assert_eq!(id, SessionId::new(1));
        assert_eq!(store.current_session_id(), Some(id));
        let active = store.active_session().unwrap();
        assert_eq!(active.start, t(1_000));
        assert!(active.end.is_none());
    }

    #[test]
    fn test_start_session_closes_previous() {
        let (clock, manager, mut store) = setup(0);
        manager.start_session(&mut store);
        clock.advance(120);
        let second = manager.start_session(&mut store);

        assert_eq!(second, SessionId::new(2));
        assert_eq!(store.sessions()[0].end, Some(t(120)));
        assert_eq!(store.sessions()[0].duration, 120);
        assert_eq!(open_counts(&store), (1, 0));
    }

    #[test]
    fn test_start_session_drops_dangling_open_break() {
        let (_clock, manager, mut store) = setup(0);
        store.breaks.push(Break::open(t(0)));
        manager.start_session(&mut store);
        assert!(store.breaks().is_empty());
    }

    #[test]
    fn test_switch_session_closes_at_same_instant() {
        let (clock, manager, mut store) = setup(0);
        manager.start_session(&mut store);
        clock.advance(45);
        let id = manager.switch_session(&mut store);

        let sessions = store.sessions();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].end, Some(sessions[1].start));
        assert_eq!(store.current_session_id(), Some(id));
        assert_eq!(store.total_time(), 45);
    }

    #[test]
    fn test_end_active_sessions_twice_is_stable() {
        let (clock, manager, mut store) = setup(0);
        manager.start_session(&mut store);
        clock.advance(300);
        assert_eq!(manager.end_active_sessions(&mut store), 1);
        let first = store.total_time();
        assert_eq!(manager.end_active_sessions(&mut store), 0);
        assert_eq!(store.total_time(), first);
        assert_eq!(first, 300);
    }

    #[test]
    fn test_total_equals_sum_of_closed_durations() {
        let (clock, manager, mut store) = setup(0);
        for secs in [30, 60, 90] {
            manager.start_session(&mut store);
            clock.advance(secs);
        }
        manager.end_active_sessions(&mut store);
        let sum: u64 = store.sessions().iter().map(|s| s.duration).sum();
        assert_eq!(store.total_time(), sum);
        assert_eq!(sum, 180);
    }

    #[test]
    fn test_reset_current_session_then_close() {
        let (clock, manager, mut store) = setup(0);
        manager.start_session(&mut store);
        clock.advance(100);
        manager.switch_session(&mut store);
        clock.advance(50);
        manager.recompute(&mut store);
        assert_eq!(store.total_time(), 150);

        assert!(manager.reset_current_session(&mut store));
        assert_eq!(store.total_time(), 100);
        assert_eq!(store.current_session_time(clock.now()), 0);

        clock.advance(20);
        manager.end_active_sessions(&mut store);
        assert_eq!(store.sessions()[1].duration, 20);
        assert_eq!(store.total_time(), 120);
    }

    #[test]
    fn test_reset_current_session_without_active() {
        let (_clock, manager, mut store) = setup(0);
        assert!(!manager.reset_current_session(&mut store));
    }

    #[test]
    fn test_reset_all_sessions() {
        let (clock, manager, mut store) = setup(0);
        manager.start_session(&mut store);
        store.breaks.push(Break {
            start: t(10),
            end: Some(t(20)),
            duration: 10,
        });
        clock.advance(500);
        manager.switch_session(&mut store);
        clock.advance(10);

        manager.reset_all_sessions(&mut store);
        assert_eq!(store.sessions().len(), 1);
        assert!(store.breaks().is_empty());
        assert_eq!(store.total_time(), 0);
        assert!(store.active_session().is_some());
    }

    #[test]
    fn test_clear_breaks_leaves_sessions() {
        let (clock, manager, mut store) = setup(0);
        manager.start_session(&mut store);
        store.breaks.push(Break {
            start: t(10),
            end: Some(t(20)),
            duration: 10,
        });
        clock.advance(60);
        manager.recompute(&mut store);
        let total = store.total_time();

        assert_eq!(manager.clear_breaks(&mut store), 1);
        assert!(store.breaks().is_empty());
        assert_eq!(store.total_time(), total);
        assert_eq!(store.sessions().len(), 1);
    }

    #[test]
    fn test_session_comment_round_trip() {
        let (_clock, manager, mut store) = setup(0);
        assert!(!manager.set_session_comment(&mut store, "lighting"));
        manager.start_session(&mut store);
        assert!(manager.set_session_comment(&mut store, "lighting"));
        assert_eq!(manager.session_comment(&store), "lighting");
    }

    #[test]
    fn test_never_more_than_one_open_session_or_break() {
        let (clock, manager, mut store) = setup(0);
        let steps: [fn(&SessionManager, &mut SessionStore); 5] = [
            |m, s| {
                m.start_session(s);
            },
            |m, s| {
                m.switch_session(s);
            },
            |m, s| {
                m.reset_current_session(s);
            },
            |m, s| {
                m.end_active_sessions(s);
            },
            |m, s| {
                m.reset_all_sessions(s);
            },
        ];
        for round in 0..25usize {
            let step = steps[round % steps.len()];
            step(&manager, &mut store);
            clock.advance(7);
            let (sessions, breaks) = open_counts(&store);
            assert!(sessions <= 1);
            assert!(breaks <= 1);
            assert!(store.validate().is_ok());
        }
    }
}

//! Session store entities and the totals derived from them.
//!
//! The store keeps closed sessions with an authoritative `duration`, at most
//! one active session whose elapsed time is always computed on demand, and a
//! flat list of breaks that is subtracted from whichever session they overlap.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Current on-disk schema version of [`SessionStore`].
pub const SCHEMA_VERSION: u32 = 1;

/// Converts a signed time delta to whole seconds, clamping negatives to 0.
///
/// Every derived duration goes through here so that a wall-clock jump
/// backwards can never produce negative time.
pub fn clamp_secs(delta: TimeDelta) -> u64 {
    u64::try_from(delta.num_seconds()).unwrap_or(0)
}

/// Seconds shared by the half-open ranges `[a_start, a_end)` and `[b_start, b_end)`.
fn overlap_secs(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> u64 {
    clamp_secs(a_end.min(b_end) - a_start.max(b_start))
}

/// Total break time falling inside `[from, to]`, treating open breaks as
/// running until `now`.
pub fn break_secs_within(
    breaks: &[Break],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u64 {
    breaks.iter().map(|b| b.overlap(from, to, now)).sum()
}

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identifier of a session, unique and increasing within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// The id following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque token binding a durable store to one document lineage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileIdentity(String);

impl FileIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// A span of inactivity excluded from counted work time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Break {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Seconds; authoritative once `end` is set.
    #[serde(default)]
    pub duration: u64,
}

impl Break {
    /// Opens a break at `start`.
    pub fn open(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: None,
            duration: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// End of the break, or `now` while it is still open. Never precedes `start`.
    pub fn effective_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end.unwrap_or(now).max(self.start)
    }

    /// Length of the break in seconds as of `now`.
    pub fn elapsed(&self, now: DateTime<Utc>) -> u64 {
        match self.end {
            Some(_) => self.duration,
            None => clamp_secs(now - self.start),
        }
    }

    /// Seconds of this break inside `[from, to]`.
    pub fn overlap(&self, from: DateTime<Utc>, to: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        overlap_secs(self.start, self.effective_end(now), from, to)
    }

    /// Closes the break at `at`.
    ///
    /// Duration is clamped to `[0, at - session_start]` so a break can never
    /// account for more time than its enclosing session has run.
    pub(crate) fn close(&mut self, at: DateTime<Utc>, session_start: Option<DateTime<Utc>>) {
        let end = at.max(self.start);
        let mut duration = clamp_secs(end - self.start);
        if let Some(session_start) = session_start {
            duration = duration.min(clamp_secs(end - session_start));
        }
        self.end = Some(end);
        self.duration = duration;
    }
}

/// A contiguous, possibly break-interrupted span of tracked work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Seconds of work; authoritative once `end` is set, 0 while active.
    pub duration: u64,
    #[serde(default)]
    pub comment: String,
}

impl Session {
    pub fn new(id: SessionId, start: DateTime<Utc>) -> Self {
        Self {
            id,
            start,
            end: None,
            duration: 0,
            comment: String::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.end.is_none()
    }

    /// Work seconds of this session as of `now`.
    ///
    /// Closed sessions report their stored duration. Active sessions derive it
    /// from the span since `start` minus overlapping break time.
    pub fn elapsed(&self, breaks: &[Break], now: DateTime<Utc>) -> u64 {
        match self.end {
            Some(_) => self.duration,
            None => {
                let span = clamp_secs(now - self.start);
                span.saturating_sub(break_secs_within(breaks, self.start, now, now))
            }
        }
    }

    /// Closes the session at `at`, fixing its duration.
    pub(crate) fn close(&mut self, at: DateTime<Utc>, breaks: &[Break]) {
        let end = at.max(self.start);
        let span = clamp_secs(end - self.start);
        self.duration = span.saturating_sub(break_secs_within(breaks, self.start, end, end));
        self.end = Some(end);
    }
}

// ============================================================================
// Session Store
// ============================================================================

/// All tracked time for one document.
///
/// Mutated only through [`SessionManager`](crate::SessionManager) (sessions
/// and breaks) and the persistence layer (identity and save time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStore {
    pub(crate) schema_version: u32,
    pub(crate) total_time: u64,
    pub(crate) last_save_time: DateTime<Utc>,
    pub(crate) sessions: Vec<Session>,
    pub(crate) breaks: Vec<Break>,
    #[serde(default)]
    pub(crate) file_identity: Option<FileIdentity>,
    pub(crate) file_creation_time: DateTime<Utc>,
    #[serde(default)]
    pub(crate) current_session_id: Option<SessionId>,
}

impl SessionStore {
    /// Creates an empty, unidentified store.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            total_time: 0,
            last_save_time: now,
            sessions: Vec::new(),
            breaks: Vec::new(),
            file_identity: None,
            file_creation_time: now,
            current_session_id: None,
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Total work seconds as of the last recompute.
    pub fn total_time(&self) -> u64 {
        self.total_time
    }

    pub fn last_save_time(&self) -> DateTime<Utc> {
        self.last_save_time
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn breaks(&self) -> &[Break] {
        &self.breaks
    }

    pub fn file_identity(&self) -> Option<&FileIdentity> {
        self.file_identity.as_ref()
    }

    pub fn file_creation_time(&self) -> DateTime<Utc> {
        self.file_creation_time
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.current_session_id
    }

    /// True when nothing has ever been tracked.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.breaks.is_empty()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.sessions.iter().rev().find(|s| s.is_active())
    }

    pub(crate) fn active_session_mut(&mut self) -> Option<&mut Session> {
        self.sessions.iter_mut().rev().find(|s| s.is_active())
    }

    pub fn open_break(&self) -> Option<&Break> {
        self.breaks.iter().rev().find(|b| b.is_open())
    }

    pub fn is_on_break(&self) -> bool {
        self.open_break().is_some()
    }

    /// Id for the next session: one past the largest id ever used here.
    pub fn next_session_id(&self) -> SessionId {
        self.sessions
            .iter()
            .map(|s| s.id)
            .max()
            .map(SessionId::next)
            .unwrap_or(SessionId::new(1))
    }

    // ========================================================================
    // Derived Totals
    // ========================================================================

    /// Total work seconds as of `now`, without mutating anything.
    pub fn derive_total(&self, now: DateTime<Utc>) -> u64 {
        self.sessions
            .iter()
            .map(|s| s.elapsed(&self.breaks, now))
            .sum()
    }

    /// Work seconds of the active session, or 0.
    pub fn current_session_time(&self, now: DateTime<Utc>) -> u64 {
        self.active_session()
            .map(|s| s.elapsed(&self.breaks, now))
            .unwrap_or(0)
    }

    /// Seconds since the store was last persisted.
    pub fn time_since_save(&self, now: DateTime<Utc>) -> u64 {
        clamp_secs(now - self.last_save_time)
    }

    /// Sum of all break lengths as of `now`.
    pub fn total_break_time(&self, now: DateTime<Utc>) -> u64 {
        self.breaks.iter().map(|b| b.elapsed(now)).sum()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Recomputes `total_time` from current state without closing anything.
    pub fn refresh_totals(&mut self, now: DateTime<Utc>) -> u64 {
        self.total_time = self.derive_total(now);
        self.total_time
    }

    /// Refreshes totals and stamps `last_save_time`; called right before a write.
    pub fn mark_saved(&mut self, now: DateTime<Utc>) {
        self.refresh_totals(now);
        self.last_save_time = now;
    }

    /// Binds the store to a document lineage, returning the previous identity.
    pub fn assign_identity(&mut self, identity: FileIdentity) -> Option<FileIdentity> {
        self.file_identity.replace(identity)
    }

    /// Closes every active session (and any open break) at `at`.
    ///
    /// Returns the number of sessions closed. With nothing active this is a
    /// no-op, so repeated calls leave `total_time` unchanged, and a dangling
    /// open break is left for [`SessionManager`](crate::SessionManager) to drop.
    pub fn close_active_sessions(&mut self, at: DateTime<Utc>) -> usize {
        let Some(session_start) = self.active_session().map(|s| s.start) else {
            return 0;
        };
        for open in self.breaks.iter_mut().filter(|b| b.is_open()) {
            open.close(at, Some(session_start));
        }

        let mut closed = 0;
        for session in self.sessions.iter_mut().filter(|s| s.is_active()) {
            session.close(at, &self.breaks);
            closed += 1;
        }

        if closed > 0 {
            self.total_time = self.sessions.iter().map(|s| s.duration).sum();
            self.current_session_id = None;
        }
        closed
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks the structural invariants a loaded store must satisfy.
    pub fn validate(&self) -> DomainResult<()> {
        let open_sessions = self.sessions.iter().filter(|s| s.is_active()).count();
        if open_sessions > 1 {
            return Err(DomainError::invariant(format!(
                "{open_sessions} sessions are active"
            )));
        }
        if open_sessions == 1 && !self.sessions.last().is_some_and(Session::is_active) {
            return Err(DomainError::invariant("active session is not the last one"));
        }

        let mut seen = HashSet::new();
        for session in &self.sessions {
            if !seen.insert(session.id) {
                return Err(DomainError::invariant(format!(
                    "duplicate session id {}",
                    session.id
                )));
            }
            if session.end.is_some_and(|end| end < session.start) {
                return Err(DomainError::invariant(format!(
                    "session {} ends before it starts",
                    session.id
                )));
            }
        }

        for pair in self.sessions.windows(2) {
            if let [prev, next] = pair {
                if prev.start > next.start {
                    return Err(DomainError::invariant("sessions are not ordered by start"));
                }
                if prev.end.is_some_and(|end| end > next.start) {
                    return Err(DomainError::invariant(format!(
                        "session {} overlaps session {}",
                        prev.id, next.id
                    )));
                }
            }
        }

        let open_breaks = self.breaks.iter().filter(|b| b.is_open()).count();
        if open_breaks > 1 {
            return Err(DomainError::invariant(format!("{open_breaks} breaks are open")));
        }
        if open_breaks == 1 && open_sessions == 0 {
            return Err(DomainError::invariant("open break without an active session"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::from_epoch_secs as t;

    fn closed(id: u64, start: i64, end: i64, duration: u64) -> Session {
        Session {
            id: SessionId::new(id),
            start: t(start),
            end: Some(t(end)),
            duration,
            comment: String::new(),
        }
    }

    #[test]
    fn test_clamp_secs_negative_is_zero() {
        assert_eq!(clamp_secs(t(100) - t(200)), 0);
        assert_eq!(clamp_secs(t(200) - t(100)), 100);
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId::new(3).to_string(), "#3");
    }

    #[test]
    fn test_active_elapsed_subtracts_closed_break() {
        let session = Session::new(SessionId::new(1), t(0));
        let breaks = vec![Break {
            start: t(300),
            end: Some(t(400)),
            duration: 100,
        }];
        assert_eq!(session.elapsed(&breaks, t(400)), 300);
        assert_eq!(session.elapsed(&breaks, t(500)), 400);
    }

    #[test]
    fn test_active_elapsed_subtracts_open_break_up_to_now() {
        let session = Session::new(SessionId::new(1), t(0));
        let breaks = vec![Break::open(t(300))];
        assert_eq!(session.elapsed(&breaks, t(350)), 300);
        assert_eq!(session.elapsed(&breaks, t(900)), 300);
    }

    #[test]
    fn test_elapsed_clamps_when_clock_goes_backwards() {
        let session = Session::new(SessionId::new(1), t(1_000));
        assert_eq!(session.elapsed(&[], t(10)), 0);
    }

    #[test]
    fn test_break_outside_session_is_ignored() {
        let session = Session::new(SessionId::new(2), t(1_000));
        let breaks = vec![Break {
            start: t(100),
            end: Some(t(200)),
            duration: 100,
        }];
        assert_eq!(session.elapsed(&breaks, t(1_060)), 60);
    }

    #[test]
    fn test_break_close_clamped_to_session_span() {
        let mut br = Break::open(t(50));
        br.close(t(200), Some(t(100)));
        assert_eq!(br.end, Some(t(200)));
        assert_eq!(br.duration, 100);
    }

    #[test]
    fn test_break_close_before_start_is_zero() {
        let mut br = Break::open(t(500));
        br.close(t(400), None);
        assert_eq!(br.end, Some(t(500)));
        assert_eq!(br.duration, 0);
    }

    #[test]
    fn test_derive_total_sums_closed_and_active() {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(closed(1, 0, 100, 100));
        store.sessions.push(Session::new(SessionId::new(2), t(200)));
        assert_eq!(store.derive_total(t(260)), 160);
        // derivation alone never touches the stored field
        assert_eq!(store.total_time(), 0);
        assert_eq!(store.refresh_totals(t(260)), 160);
        assert_eq!(store.total_time(), 160);
    }

    #[test]
    fn test_close_active_sessions_closes_open_break() {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(Session::new(SessionId::new(1), t(0)));
        store.breaks.push(Break::open(t(300)));

        assert_eq!(store.close_active_sessions(t(500)), 1);
        assert!(store.open_break().is_none());
        assert_eq!(store.breaks[0].duration, 200);
        assert_eq!(store.sessions[0].duration, 300);
        assert_eq!(store.total_time(), 300);
        assert_eq!(store.current_session_id(), None);
    }

    #[test]
    fn test_close_active_sessions_is_idempotent() {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(Session::new(SessionId::new(1), t(0)));
        store.close_active_sessions(t(90));
        let first = store.total_time();
        assert_eq!(store.close_active_sessions(t(500)), 0);
        assert_eq!(store.total_time(), first);
    }

    #[test]
    fn test_close_without_active_session_leaves_dangling_break_open() {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(closed(1, 0, 100, 100));
        store.breaks.push(Break::open(t(50)));

        assert_eq!(store.close_active_sessions(t(900)), 0);
        assert!(store.breaks[0].is_open());
        assert_eq!(store.breaks[0].duration, 0);
    }

    #[test]
    fn test_close_before_start_clamps_to_zero() {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(Session::new(SessionId::new(1), t(1_000)));
        store.close_active_sessions(t(900));
        assert_eq!(store.sessions[0].end, Some(t(1_000)));
        assert_eq!(store.sessions[0].duration, 0);
    }

    #[test]
    fn test_next_session_id_uses_max() {
        let mut store = SessionStore::new(t(0));
        assert_eq!(store.next_session_id(), SessionId::new(1));
        store.sessions.push(closed(7, 0, 10, 10));
        assert_eq!(store.next_session_id(), SessionId::new(8));
    }

    #[test]
    fn test_validate_accepts_well_formed_store() {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(closed(1, 0, 100, 100));
        store.sessions.push(Session::new(SessionId::new(2), t(100)));
        store.breaks.push(Break::open(t(150)));
        assert!(store.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_two_active_sessions() {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(Session::new(SessionId::new(1), t(0)));
        store.sessions.push(Session::new(SessionId::new(2), t(10)));
        assert!(store.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overlap_and_duplicates() {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(closed(1, 0, 100, 100));
        store.sessions.push(closed(2, 50, 120, 70));
        assert!(store.validate().is_err());

        let mut store = SessionStore::new(t(0));
        store.sessions.push(closed(1, 0, 10, 10));
        store.sessions.push(closed(1, 20, 30, 10));
        assert!(store.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_orphan_open_break() {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(closed(1, 0, 100, 100));
        store.breaks.push(Break::open(t(50)));
        assert!(store.validate().is_err());
    }

    #[test]
    fn test_store_serde_shape() {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(Session::new(SessionId::new(1), t(60)));
        store.assign_identity(FileIdentity::new("scene.blend"));

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["file_identity"], "scene.blend");
        assert_eq!(json["sessions"][0]["id"], 1);
        assert!(json["sessions"][0]["end"].is_null());
    }
}

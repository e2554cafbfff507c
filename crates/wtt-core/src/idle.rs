//! Idle/break detection.
//!
//! Two states, `Active` and `OnBreak`. The state is read from the store (an
//! open break means `OnBreak`), so the detector only remembers when activity
//! was last seen and whether the startup grace window is still running.
//!
//! Idleness is measured on the monotonic clock; the break record itself is
//! stamped with wall-clock times. A detected break is backdated to
//! `last_activity + threshold`, the moment idleness actually began.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::session::{Break, SessionStore};

/// Whether the user is currently working or on a break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    Active,
    OnBreak,
}

/// A state change produced by the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleTransition {
    /// A break was opened, backdated to `start`.
    BreakStarted { start: DateTime<Utc> },
    /// The open break was closed by new activity.
    BreakEnded {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        duration: u64,
    },
}

/// Turns activity signals and elapsed time into break records.
#[derive(Debug)]
pub struct IdleDetector {
    clock: Arc<dyn Clock>,
    threshold: Duration,
    grace: Duration,
    last_activity_mono: Duration,
    last_activity_wall: DateTime<Utc>,
    grace_until: Option<Duration>,
}

impl IdleDetector {
    pub fn new(clock: Arc<dyn Clock>, threshold_secs: u64, grace_secs: u64) -> Self {
        let last_activity_mono = clock.monotonic();
        let last_activity_wall = clock.now();
        Self {
            clock,
            threshold: Duration::from_secs(threshold_secs),
            grace: Duration::from_secs(grace_secs),
            last_activity_mono,
            last_activity_wall,
            grace_until: None,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Restarts idle measurement and suppresses evaluation for the grace window.
    ///
    /// Called after a session starts or a document is loaded, so the gap
    /// since the previous process last saw activity is never read as a break.
    pub fn arm(&mut self) {
        let now = self.clock.monotonic();
        self.last_activity_mono = now;
        self.last_activity_wall = self.clock.now();
        self.grace_until = Some(now + self.grace);
        debug!(grace_secs = self.grace.as_secs(), "Idle detection armed");
    }

    /// Current state as recorded in the store.
    pub fn state(&self, store: &SessionStore) -> IdleState {
        if store.is_on_break() {
            IdleState::OnBreak
        } else {
            IdleState::Active
        }
    }

    /// Seconds since the last activity signal.
    pub fn idle_for(&self) -> u64 {
        self.clock
            .monotonic()
            .saturating_sub(self.last_activity_mono)
            .as_secs()
    }

    /// Records a user interaction. Ends the open break, if any.
    pub fn record_activity(&mut self, store: &mut SessionStore) -> Option<IdleTransition> {
        let now_wall = self.clock.now();
        self.last_activity_mono = self.clock.monotonic();
        self.last_activity_wall = now_wall;

        let session_start = store.active_session().map(|s| s.start);
        let open = store.breaks.iter_mut().rev().find(|b| b.is_open())?;
        open.close(now_wall, session_start);

        let (start, duration) = (open.start, open.duration);
        let end = open.effective_end(now_wall);
        info!(start = %start, end = %end, duration_secs = duration, "Break ended");
        Some(IdleTransition::BreakEnded {
            start,
            end,
            duration,
        })
    }

    /// Evaluates idleness; opens a break once the threshold has passed.
    ///
    /// Does nothing while on break, without an active session, or inside the
    /// grace window.
    pub fn poll(&mut self, store: &mut SessionStore) -> Option<IdleTransition> {
        if store.is_on_break() {
            return None;
        }
        let session_start = store.active_session()?.start;

        let now_mono = self.clock.monotonic();
        if let Some(until) = self.grace_until {
            if now_mono < until {
                return None;
            }
            self.grace_until = None;
        }

        let idle = now_mono.saturating_sub(self.last_activity_mono);
        if idle < self.threshold {
            return None;
        }

        let threshold = TimeDelta::from_std(self.threshold).unwrap_or(TimeDelta::zero());
        let start = (self.last_activity_wall + threshold)
            .max(session_start)
            .min(self.clock.now().max(session_start));
        store.breaks.push(Break::open(start));

        info!(
            start = %start,
            idle_secs = idle.as_secs(),
            "Break started"
        );
        Some(IdleTransition::BreakStarted { start })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{from_epoch_secs as t, ManualClock};
    use crate::manager::SessionManager;

    fn setup(threshold: u64, grace: u64) -> (ManualClock, SessionManager, IdleDetector, SessionStore) {
        let clock = ManualClock::at(0);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let manager = SessionManager::new(shared.clone());
        let detector = IdleDetector::new(shared, threshold, grace);
        let store = SessionStore::new(clock.now());
        (clock, manager, detector, store)
    }

    #[test]
    fn test_idle_round_trip_backdates_break() {
        let (clock, manager, mut detector, mut store) = setup(300, 0);
        manager.start_session(&mut store);
        detector.record_activity(&mut store);

        let mut started = None;
        for _ in 0..400 {
            clock.advance(1);
            if let Some(transition) = detector.poll(&mut store) {
                started = Some(transition);
            }
        }
        assert_eq!(started, Some(IdleTransition::BreakStarted { start: t(300) }));
        assert_eq!(detector.state(&store), IdleState::OnBreak);

        let ended = detector.record_activity(&mut store);
        assert_eq!(
            ended,
            Some(IdleTransition::BreakEnded {
                start: t(300),
                end: t(400),
                duration: 100,
            })
        );
        assert_eq!(store.breaks().len(), 1);
        assert_eq!(store.current_session_time(clock.now()), 300);
        assert_eq!(detector.state(&store), IdleState::Active);
    }

    #[test]
    fn test_late_detection_still_backdates() {
        let (clock, manager, mut detector, mut store) = setup(300, 0);
        manager.start_session(&mut store);
        clock.advance(400);
        assert_eq!(
            detector.poll(&mut store),
            Some(IdleTransition::BreakStarted { start: t(300) })
        );
        assert_eq!(store.current_session_time(clock.now()), 300);
    }

    #[test]
    fn test_no_break_below_threshold() {
        let (clock, manager, mut detector, mut store) = setup(300, 0);
        manager.start_session(&mut store);
        clock.advance(299);
        assert!(detector.poll(&mut store).is_none());
        assert_eq!(detector.idle_for(), 299);
    }

    #[test]
    fn test_no_break_without_active_session() {
        let (clock, _manager, mut detector, mut store) = setup(300, 0);
        clock.advance(1_000);
        assert!(detector.poll(&mut store).is_none());
        assert!(store.breaks().is_empty());
    }

    #[test]
    fn test_only_one_break_opens() {
        let (clock, manager, mut detector, mut store) = setup(300, 0);
        manager.start_session(&mut store);
        clock.advance(301);
        assert!(detector.poll(&mut store).is_some());
        clock.advance(301);
        assert!(detector.poll(&mut store).is_none());
        assert_eq!(store.breaks().len(), 1);
    }

    #[test]
    fn test_grace_window_suppresses_detection() {
        let (clock, manager, mut detector, mut store) = setup(60, 30);
        manager.start_session(&mut store);
        detector.arm();
        clock.advance(20);
        assert!(detector.poll(&mut store).is_none());
        clock.advance(20);
        // grace over, but idle measured from arm: 40s < 60s
        assert!(detector.poll(&mut store).is_none());
        clock.advance(30);
        assert_eq!(
            detector.poll(&mut store),
            Some(IdleTransition::BreakStarted { start: t(60) })
        );
    }

    #[test]
    fn test_arm_forgets_stale_activity() {
        let (clock, manager, mut detector, mut store) = setup(300, 5);
        clock.advance(10_000);
        manager.start_session(&mut store);
        detector.arm();
        clock.advance(10);
        assert!(detector.poll(&mut store).is_none());
        assert!(store.breaks().is_empty());
    }

    #[test]
    fn test_break_start_never_precedes_session_start() {
        let (clock, manager, mut detector, mut store) = setup(300, 0);
        clock.advance(200);
        manager.start_session(&mut store);
        clock.advance(150);
        detector.poll(&mut store);
        assert_eq!(store.open_break().map(|b| b.start), Some(t(300)));

        // idle since t=0, but the session only began at t=350
        let (clock, manager, mut detector, mut store) = setup(300, 0);
        clock.advance(350);
        manager.start_session(&mut store);
        clock.advance(10);
        detector.poll(&mut store);
        assert_eq!(store.open_break().map(|b| b.start), Some(t(350)));
    }

    #[test]
    fn test_wall_clock_jump_back_clamps_break() {
        let (clock, manager, mut detector, mut store) = setup(300, 0);
        clock.set_wall(1_000);
        manager.start_session(&mut store);
        detector.record_activity(&mut store);
        clock.advance(400);
        detector.poll(&mut store);
        clock.set_wall(900);
        match detector.record_activity(&mut store) {
            Some(IdleTransition::BreakEnded { duration, .. }) => assert_eq!(duration, 0),
            other => panic!("unexpected transition: {other:?}"),
        }
    }
}

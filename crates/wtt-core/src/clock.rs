//! Clock sources for duration math and persisted timestamps.
//!
//! Two notions of time are kept apart:
//! - **wall clock** (`DateTime<Utc>`): stored in records that must be
//!   comparable across process restarts (session bounds, save time, mtime).
//! - **monotonic** (`Duration` since an arbitrary origin): used for idle
//!   measurement, immune to system clock changes.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Source of wall-clock and monotonic time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic time elapsed since the clock's origin.
    fn monotonic(&self) -> Duration;
}

/// Converts whole seconds since the Unix epoch to a UTC timestamp.
///
/// Out-of-range values collapse to the epoch rather than failing.
pub fn from_epoch_secs(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

// ============================================================================
// System Clock
// ============================================================================

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

// ============================================================================
// Manual Clock
// ============================================================================

/// Hand-driven clock for deterministic tests and replays.
///
/// Clones share the same underlying time, so a test can keep one copy and
/// hand another to the component under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<ManualInner>,
}

#[derive(Debug, Default)]
struct ManualInner {
    wall_secs: AtomicI64,
    mono_ms: AtomicU64,
}

impl ManualClock {
    /// Creates a clock whose wall time starts at `epoch_secs`.
    pub fn at(epoch_secs: i64) -> Self {
        let clock = Self::default();
        clock.inner.wall_secs.store(epoch_secs, Ordering::SeqCst);
        clock
    }

    /// Advances both wall and monotonic time.
    pub fn advance(&self, secs: u64) {
        let delta = i64::try_from(secs).unwrap_or(i64::MAX);
        self.inner.wall_secs.fetch_add(delta, Ordering::SeqCst);
        self.inner
            .mono_ms
            .fetch_add(secs.saturating_mul(1000), Ordering::SeqCst);
    }

    /// Moves the wall clock only, simulating a system clock change.
    pub fn set_wall(&self, epoch_secs: i64) {
        self.inner.wall_secs.store(epoch_secs, Ordering::SeqCst);
    }

    /// Current wall time as epoch seconds.
    pub fn wall_secs(&self) -> i64 {
        self.inner.wall_secs.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        from_epoch_secs(self.wall_secs())
    }

    fn monotonic(&self) -> Duration {
        Duration::from_millis(self.inner.mono_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance_moves_both_clocks() {
        let clock = ManualClock::at(1_000);
        clock.advance(25);
        assert_eq!(clock.now().timestamp(), 1_025);
        assert_eq!(clock.monotonic(), Duration::from_secs(25));
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::at(0);
        let other = clock.clone();
        clock.advance(10);
        assert_eq!(other.now().timestamp(), 10);
    }

    #[test]
    fn test_set_wall_leaves_monotonic_alone() {
        let clock = ManualClock::at(500);
        clock.advance(5);
        clock.set_wall(100);
        assert_eq!(clock.now().timestamp(), 100);
        assert_eq!(clock.monotonic(), Duration::from_secs(5));
    }

    #[test]
    fn test_system_clock_monotonic_is_nondecreasing() {
        let clock = SystemClock::new();
        let a = clock.monotonic();
        let b = clock.monotonic();
        assert!(b >= a);
    }
}

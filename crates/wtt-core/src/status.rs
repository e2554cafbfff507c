//! Read-only status projection for indicators and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::format::{format_hours_minutes, format_time};
use crate::session::{SessionId, SessionStore};

/// Everything an indicator needs, derived from the store without mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub total_secs: u64,
    pub session_secs: u64,
    pub session_id: Option<SessionId>,
    pub on_break: bool,
    pub idle_secs: u64,
    /// Time since the document itself was last saved.
    pub unsaved_secs: u64,
    /// `unsaved_secs` is over the configured warning threshold.
    pub unsaved_warning: bool,
}

impl StatusView {
    pub fn project(
        store: &SessionStore,
        now: DateTime<Utc>,
        idle_secs: u64,
        unsaved_secs: u64,
        thresholds: &Thresholds,
    ) -> Self {
        Self {
            total_secs: store.derive_total(now),
            session_secs: store.current_session_time(now),
            session_id: store.active_session().map(|s| s.id),
            on_break: store.is_on_break(),
            idle_secs,
            unsaved_secs,
            unsaved_warning: unsaved_secs > thresholds.unsaved_warning_threshold_secs,
        }
    }

    /// Compact one-line form, e.g. `01:20 | 00:15  #3  On Break`.
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "{} | {}  {}",
            format_hours_minutes(self.total_secs),
            format_hours_minutes(self.session_secs),
            self.session_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "#-".to_string()),
        );
        if self.on_break {
            line.push_str("  On Break");
        }
        if self.unsaved_warning {
            line.push_str("  Save Pending");
        }
        line
    }

    /// Multi-line form with full `HH:MM:SS` precision.
    pub fn format_detail(&self) -> String {
        format!(
            "total:    {}\nsession:  {}\nidle:     {}{}\nunsaved:  {}{}",
            format_time(self.total_secs),
            format_time(self.session_secs),
            format_time(self.idle_secs),
            if self.on_break { " (on break)" } else { " (working)" },
            format_time(self.unsaved_secs),
            if self.unsaved_warning { " (save pending)" } else { "" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::from_epoch_secs as t;
    use crate::session::{Break, Session};

    fn store_with_active(start: i64) -> SessionStore {
        let mut store = SessionStore::new(t(0));
        store.sessions.push(Session::new(SessionId::new(4), t(start)));
        store
    }

    #[test]
    fn test_project_does_not_mutate() {
        let store = store_with_active(0);
        let before = store.clone();
        let view = StatusView::project(&store, t(3_600), 0, 0, &Thresholds::default());
        assert_eq!(view.total_secs, 3_600);
        assert_eq!(view.session_secs, 3_600);
        assert_eq!(view.session_id, Some(SessionId::new(4)));
        assert_eq!(store, before);
    }

    #[test]
    fn test_format_line_flags() {
        let mut store = store_with_active(0);
        store.breaks.push(Break::open(t(1_000)));
        let view = StatusView::project(&store, t(1_200), 500, 700, &Thresholds::default());
        assert!(view.on_break);
        assert!(view.unsaved_warning);
        assert_eq!(view.format_line(), "00:16 | 00:16  #4  On Break  Save Pending");
    }

    #[test]
    fn test_no_session_shows_placeholder() {
        let store = SessionStore::new(t(0));
        let view = StatusView::project(&store, t(10), 0, 0, &Thresholds::default());
        assert_eq!(view.format_line(), "00:00 | 00:00  #-");
    }
}

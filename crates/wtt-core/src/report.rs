//! Markdown time report.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::format::format_time;
use crate::session::SessionStore;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn stamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Renders the store as a Markdown report.
///
/// Pure: durations of the active session and any open break are computed as
/// of `now` without touching the store.
pub fn render(store: &SessionStore, document_name: &str, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    // `write!` into a String cannot fail
    let _ = writeln!(out, "# Time Report: {document_name}");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Generated: {} UTC", stamp(now));
    let _ = writeln!(out, "- Tracking since: {} UTC", stamp(store.file_creation_time()));
    if let Some(identity) = store.file_identity() {
        let _ = writeln!(out, "- File identity: `{identity}`");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Total work time | {} |", format_time(store.derive_total(now)));
    let _ = writeln!(
        out,
        "| Current session | {} |",
        format_time(store.current_session_time(now))
    );
    let _ = writeln!(out, "| Sessions | {} |", store.sessions().len());
    let _ = writeln!(
        out,
        "| Breaks | {} ({}) |",
        store.breaks().len(),
        format_time(store.total_break_time(now))
    );
    let _ = writeln!(
        out,
        "| Since last save | {} |",
        format_time(store.time_since_save(now))
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "## Sessions");
    let _ = writeln!(out);
    if store.sessions().is_empty() {
        let _ = writeln!(out, "_No sessions recorded._");
    } else {
        let _ = writeln!(out, "| Session | Start | End | Duration | Comment |");
        let _ = writeln!(out, "|---|---|---|---|---|");
        for session in store.sessions() {
            let end = session.end.map(stamp).unwrap_or_else(|| "Active".to_string());
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                session.id,
                stamp(session.start),
                end,
                format_time(session.elapsed(store.breaks(), now)),
                escape_cell(&session.comment),
            );
        }
    }

    if !store.breaks().is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Breaks");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Start | End | Duration |");
        let _ = writeln!(out, "|---|---|---|");
        for br in store.breaks() {
            let end = br.end.map(stamp).unwrap_or_else(|| "Ongoing".to_string());
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                stamp(br.start),
                end,
                format_time(br.elapsed(now)),
            );
        }
    }

    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

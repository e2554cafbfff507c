//! Human-readable duration formatting.

/// Formats seconds as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_time(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Formats seconds as `HH:MM`, dropping the seconds.
pub fn format_hours_minutes(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    format!("{hours:02}:{minutes:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00:00");
        assert_eq!(format_time(3_725), "01:02:05");
        assert_eq!(format_time(100 * 3_600), "100:00:00");
    }

    #[test]
    fn test_format_hours_minutes() {
        assert_eq!(format_hours_minutes(59), "00:00");
        assert_eq!(format_hours_minutes(3_725), "01:02");
    }
}

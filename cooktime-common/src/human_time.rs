//! Human-readable time formatting
//!
//! Duration and countdown text for the timeline view (HTTP and CLI).

/// Countdown format selection thresholds (seconds)
const MINUTES_FORMAT_MAX: i64 = 3600;   // < 1h → M:SS
const HOURS_FORMAT_MAX: i64 = 86400;    // < 24h → H:MM:SS
                                        // >= 24h → Dd HH:MM

/// Format a stage or dish duration given in whole minutes.
///
/// # Examples
///
/// ```
/// use cooktime_common::human_time::format_minutes;
///
/// assert_eq!(format_minutes(0), "0 min");
/// assert_eq!(format_minutes(45), "45 min");
/// assert_eq!(format_minutes(60), "1 h");
/// assert_eq!(format_minutes(85), "1 h 25 min");
/// ```
pub fn format_minutes(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    match (hours, mins) {
        (0, m) => format!("{} min", m),
        (h, 0) => format!("{} h", h),
        (h, m) => format!("{} h {} min", h, m),
    }
}

/// Format a signed offset from "now" as a countdown.
///
/// Positive values are in the future ("in ..."), negative values in the past
/// ("... ago"). Offsets under one second read as "now".
///
/// Format selection by magnitude:
/// - `M:SS` below one hour
/// - `H:MM:SS` below one day
/// - `Dd HH:MM` from one day upward
///
/// # Examples
///
/// ```
/// use cooktime_common::human_time::format_countdown;
///
/// assert_eq!(format_countdown(0), "now");
/// assert_eq!(format_countdown(90), "in 1:30");
/// assert_eq!(format_countdown(3_900), "in 1:05:00");
/// assert_eq!(format_countdown(-600), "10:00 ago");
/// assert_eq!(format_countdown(90_000), "in 1d 01:00");
/// ```
pub fn format_countdown(seconds: i64) -> String {
    if seconds == 0 {
        return "now".to_string();
    }

    let is_past = seconds < 0;
    let abs_seconds = seconds.abs();

    let formatted = if abs_seconds < MINUTES_FORMAT_MAX {
        let minutes = abs_seconds / 60;
        let secs = abs_seconds % 60;
        format!("{}:{:02}", minutes, secs)
    } else if abs_seconds < HOURS_FORMAT_MAX {
        let hours = abs_seconds / 3600;
        let mins = (abs_seconds % 3600) / 60;
        let secs = abs_seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        let days = abs_seconds / 86400;
        let hours = (abs_seconds % 86400) / 3600;
        let mins = (abs_seconds % 3600) / 60;
        format!("{}d {:02}:{:02}", days, hours, mins)
    };

    if is_past {
        format!("{} ago", formatted)
    } else {
        format!("in {}", formatted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0), "0 min");
        assert_eq!(format_minutes(1), "1 min");
        assert_eq!(format_minutes(59), "59 min");
        assert_eq!(format_minutes(120), "2 h");
        assert_eq!(format_minutes(2000), "33 h 20 min");
    }

    #[test]
    fn test_minutes_format() {
        assert_eq!(format_countdown(5), "in 0:05");
        assert_eq!(format_countdown(59), "in 0:59");
        assert_eq!(format_countdown(3599), "in 59:59");
    }

    #[test]
    fn test_hours_format() {
        assert_eq!(format_countdown(3600), "in 1:00:00");
        assert_eq!(format_countdown(5 * 3600 + 61), "in 5:01:01");
        assert_eq!(format_countdown(86399), "in 23:59:59");
    }

    #[test]
    fn test_days_format() {
        assert_eq!(format_countdown(86400), "in 1d 00:00");
        assert_eq!(format_countdown(2 * 86400 + 3 * 3600 + 4 * 60), "in 2d 03:04");
    }

    #[test]
    fn test_past_values() {
        assert_eq!(format_countdown(-5), "0:05 ago");
        assert_eq!(format_countdown(-7200), "2:00:00 ago");
    }
}

//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Signed milliseconds from `now` until `deadline` (negative once passed)
pub fn millis_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (deadline - now).num_milliseconds()
}

/// Format a remaining time as `M:SS`, rounding partial seconds up
///
/// Negative values display as `0:00`.
///
/// # Examples
///
/// ```
/// use lms_common::time::format_countdown;
///
/// assert_eq!(format_countdown(0), "0:00");
/// assert_eq!(format_countdown(4_001), "0:05");
/// assert_eq!(format_countdown(600_000), "10:00");
/// ```
pub fn format_countdown(left_ms: i64) -> String {
    let total_secs = (left_ms.max(0) + 999) / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_millis_until_signed() {
        let base = now();
        assert_eq!(millis_until(base + ChronoDuration::milliseconds(5000), base), 5000);
        assert_eq!(millis_until(base - ChronoDuration::milliseconds(250), base), -250);
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(-1500), "0:00");
        assert_eq!(format_countdown(1), "0:01");
        assert_eq!(format_countdown(59_000), "0:59");
        assert_eq!(format_countdown(61_000), "1:01");
        assert_eq!(format_countdown(3_599_000), "59:59");
    }
}

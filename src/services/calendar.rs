use chrono::{Datelike, NaiveDate};

use crate::naming::UNKNOWN_NAME;

/// Sunday-first weekday labels, matching the upstream display convention.
pub const DEFAULT_WEEKDAY_LABELS: [&str; 7] =
    ["週日", "週一", "週二", "週三", "週四", "週五", "週六"];

/// Maps a `YYYY-MM-DD` date string to a localized weekday label.
///
/// The label table is passed in so a different locale can be substituted
/// without touching the logic. An unparseable date yields the sentinel.
pub fn day_of_week_label(work_date: &str, labels: &[&str; 7]) -> String {
    match NaiveDate::parse_from_str(work_date, "%Y-%m-%d") {
        Ok(date) => labels[date.weekday().num_days_from_sunday() as usize].to_string(),
        Err(_) => UNKNOWN_NAME.to_string(),
    }
}

/// Whether a string is a valid `YYYY-MM-DD` calendar date.
pub fn is_valid_work_date(work_date: &str) -> bool {
    NaiveDate::parse_from_str(work_date, "%Y-%m-%d").is_ok()
}

//! Date parsing and range utilities.
//!
//! Source formats disagree wildly about date syntax (day-first, month-first,
//! ISO, GnuCash timestamps with timezone, Microsoft Money timestamps).
//! [`parse_date`] tries an ordered pattern list and returns `None` instead of
//! failing; callers decide whether an unknown date is fatal.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

/// A single date pattern, distinguishing how much of a timestamp it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePattern {
    /// Plain calendar date
    Date(&'static str),
    /// Date with a time of day, no timezone
    DateTime(&'static str),
    /// Date with time of day and numeric timezone offset
    DateTimeTz(&'static str),
}

/// The default pattern list, tried in order.
///
/// Order matters: the month-first two-digit-year variants come before the
/// day-first ones, mirroring the dialects the converters have encountered.
pub const DEFAULT_PATTERNS: &[DatePattern] = &[
    DatePattern::Date("%m.%d.%y"),
    DatePattern::Date("%d.%m.%y"),
    DatePattern::Date("%m/%d/%y"),
    DatePattern::Date("%d/%m/%y"),
    DatePattern::Date("%Y-%m-%d"),
    DatePattern::Date("%Y/%m/%d"),
    // GnuCash XML timestamp
    DatePattern::DateTimeTz("%Y-%m-%d %H:%M:%S %z"),
    // Microsoft Money timestamp
    DatePattern::DateTime("%m/%d/%y %H:%M:%S"),
];

/// Errors from [`split_date_range`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateRangeError {
    /// A bound was not a `YYYY-MM-DD` date
    #[error("invalid date: {0}")]
    InvalidDate(String),
    /// Zero sub-ranges were requested
    #[error("number of ranges must be positive")]
    ZeroRanges,
}

/// Format a date as `YYYY-MM-DD`.
#[must_use]
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a heterogeneous date string into canonical `YYYY-MM-DD` form.
///
/// Tries [`DEFAULT_PATTERNS`] in order and returns the first successful
/// conversion, or `None` if no pattern matches. Never panics or errors.
#[must_use]
pub fn parse_date(date_str: &str) -> Option<String> {
    parse_date_with(date_str, DEFAULT_PATTERNS)
}

/// Parse a date string against an explicit pattern list.
#[must_use]
pub fn parse_date_with(date_str: &str, patterns: &[DatePattern]) -> Option<String> {
    let date_str = date_str.trim();
    for pattern in patterns {
        let parsed = match pattern {
            DatePattern::Date(fmt) => NaiveDate::parse_from_str(date_str, fmt).ok(),
            DatePattern::DateTime(fmt) => NaiveDateTime::parse_from_str(date_str, fmt)
                .ok()
                .map(|dt| dt.date()),
            DatePattern::DateTimeTz(fmt) => DateTime::parse_from_str(date_str, fmt)
                .ok()
                .map(|dt| dt.date_naive()),
        };
        if let Some(date) = parsed {
            return Some(iso_date(date));
        }
    }
    None
}

/// Split an inclusive day-range into `num_ranges` contiguous sub-ranges.
///
/// The sub-range lengths differ by at most one day; the first
/// `total_days % num_ranges` ranges get the extra day. The last sub-range's
/// end is forced to equal `end_date` exactly, guarding against off-by-one
/// drift from the integer division.
pub fn split_date_range(
    start_date: &str,
    end_date: &str,
    num_ranges: usize,
) -> Result<Vec<(String, String)>, DateRangeError> {
    if num_ranges == 0 {
        return Err(DateRangeError::ZeroRanges);
    }
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .map_err(|_| DateRangeError::InvalidDate(start_date.to_string()))?;
    let end = NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
        .map_err(|_| DateRangeError::InvalidDate(end_date.to_string()))?;

    let total_days = (end - start).num_days();
    let base_length = total_days / num_ranges as i64;
    let extra_days = total_days % num_ranges as i64;

    let mut ranges = Vec::with_capacity(num_ranges);
    let mut current_start = start;
    for i in 0..num_ranges as i64 {
        let range_length = base_length + i64::from(i < extra_days);
        let current_end = current_start + Duration::days(range_length - 1);
        ranges.push((iso_date(current_start), iso_date(current_end)));
        current_start = current_end + Duration::days(1);
    }

    // the division may leave the final range short or long by a day
    if let Some(last) = ranges.last_mut() {
        last.1 = end_date.to_string();
    }

    Ok(ranges)
}

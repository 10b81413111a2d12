use crate::models::SkipRange;
use chrono::{Datelike, Local, NaiveDateTime, Timelike};

/// Source of local wall-clock time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// True when `now` falls inside any of the quiet windows.
///
/// Non-wrapping windows are half-open `[start, end)`. A window whose end is
/// before its start covers `[start, midnight)` and `[midnight, end)`.
pub fn is_skipping(ranges: &[SkipRange], now: NaiveDateTime) -> bool {
    let now_minutes = now.hour() * 60 + now.minute();
    let today = now.weekday().num_days_from_monday() as u8;

    ranges.iter().any(|range| {
        if let Some(days) = &range.days {
            if !days.contains(&today) {
                return false;
            }
        }

        let start = range.start_minutes();
        let end = range.end_minutes();

        if range.wraps_midnight() {
            now_minutes >= start || now_minutes < end
        } else {
            start <= now_minutes && now_minutes < end
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_skip_hours;
    use chrono::NaiveDate;

    // 2024-01-01 is a Monday.
    fn at(day_of_month: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day_of_month)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_no_ranges_never_skips() {
        assert!(!is_skipping(&[], at(1, 3, 0)));
    }

    #[test]
    fn test_non_wrapping_boundaries() {
        let ranges = parse_skip_hours("02:00-06:00").unwrap();
        assert!(!is_skipping(&ranges, at(1, 1, 59)));
        assert!(is_skipping(&ranges, at(1, 2, 0)));
        assert!(is_skipping(&ranges, at(1, 5, 59)));
        assert!(!is_skipping(&ranges, at(1, 6, 0)));
    }

    #[test]
    fn test_wrapping_range() {
        let ranges = parse_skip_hours("23:00-06:00").unwrap();
        assert!(!is_skipping(&ranges, at(1, 22, 59)));
        assert!(is_skipping(&ranges, at(1, 23, 0)));
        assert!(is_skipping(&ranges, at(1, 23, 30)));
        assert!(is_skipping(&ranges, at(2, 2, 0)));
        assert!(!is_skipping(&ranges, at(2, 6, 0)));
        assert!(!is_skipping(&ranges, at(2, 12, 0)));
    }

    #[test]
    fn test_day_restricted_wrapping_range() {
        let ranges = parse_skip_hours("fri-mon 22:00-08:00").unwrap();
        // Tuesday 2024-01-02
        assert!(!is_skipping(&ranges, at(2, 23, 0)));
        // Friday 2024-01-05
        assert!(is_skipping(&ranges, at(5, 23, 0)));
        // Monday morning is inside the Monday entry
        assert!(is_skipping(&ranges, at(8, 7, 0)));
    }

    #[test]
    fn test_any_range_matches() {
        let ranges = parse_skip_hours("sat 10:00-14:00, 03:00-04:00").unwrap();
        // Saturday 2024-01-06
        assert!(is_skipping(&ranges, at(6, 11, 0)));
        assert!(!is_skipping(&ranges, at(4, 11, 0)));
        assert!(is_skipping(&ranges, at(4, 3, 15)));
    }

    #[test]
    fn test_empty_window_never_matches() {
        let ranges = parse_skip_hours("05:00-05:00").unwrap();
        assert!(!is_skipping(&ranges, at(1, 5, 0)));
    }
}

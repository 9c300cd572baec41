//! Temporal features derived from a timestamp.

use chrono::{Datelike, NaiveDateTime, Timelike};

/// Hour of day, `0..=23`.
#[inline]
pub fn hour_of_day(ts: &NaiveDateTime) -> u32 {
    ts.hour()
}

/// Day of week, `0..=6` with Monday = 0.
#[inline]
pub fn day_of_week(ts: &NaiveDateTime) -> u32 {
    ts.weekday().num_days_from_monday()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_monday_is_zero() {
        // 2024-03-04 was a Monday.
        let ts = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        assert_eq!(day_of_week(&ts), 0);
        assert_eq!(hour_of_day(&ts), 23);
    }

    #[test]
    fn test_sunday_is_six() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(day_of_week(&ts), 6);
        assert_eq!(hour_of_day(&ts), 0);
    }
}

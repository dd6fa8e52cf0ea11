//! Calendar-date and hour-of-day filters.
//!
//! Both filters read the interval's start time in the reference timezone,
//! never in UTC, so records near midnight land on the correct local day.

use crate::Interval;
use chrono::{FixedOffset, NaiveDate};
use log::debug;

/// Keep intervals whose local start date equals `date`. `None` keeps everything.
///
/// # Example
/// ```
/// use chrono::{NaiveDate, Offset, TimeZone, Utc};
/// use sentiment_mapper::{filter_by_date, Interval};
///
/// let start = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2025, 11, 3, 10, 0, 0).unwrap();
/// let intervals = vec![Interval::new(34.02, -118.28, start, end, 0.5, "Library", "library")];
///
/// let day = NaiveDate::from_ymd_opt(2025, 11, 3);
/// assert_eq!(filter_by_date(&intervals, day, &Utc.fix()).len(), 1);
/// assert_eq!(filter_by_date(&intervals, None, &Utc.fix()).len(), 1);
/// ```
pub fn filter_by_date(
    intervals: &[Interval],
    date: Option<NaiveDate>,
    tz: &FixedOffset,
) -> Vec<Interval> {
    let Some(date) = date else {
        return intervals.to_vec();
    };

    let kept: Vec<Interval> = intervals
        .iter()
        .filter(|i| i.local_start(tz).date_naive() == date)
        .cloned()
        .collect();

    debug!(
        "[Filters] {} of {} intervals on {}",
        kept.len(),
        intervals.len(),
        date
    );
    kept
}

/// Keep intervals whose local start hour (`hour + minute / 60`) is in `[start_hour, end_hour)`.
pub fn filter_by_time(
    intervals: &[Interval],
    start_hour: f64,
    end_hour: f64,
    tz: &FixedOffset,
) -> Vec<Interval> {
    let kept: Vec<Interval> = intervals
        .iter()
        .filter(|i| {
            let hour = i.local_fractional_hour(tz);
            hour >= start_hour && hour < end_hour
        })
        .cloned()
        .collect();

    debug!(
        "[Filters] {} of {} intervals in [{}, {})",
        kept.len(),
        intervals.len(),
        start_hour,
        end_hour
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::interval_at;
    use chrono::{Offset, TimeZone, Utc};

    fn utc() -> FixedOffset {
        Utc.fix()
    }

    #[test]
    fn test_filter_by_time_half_open() {
        let intervals = vec![
            interval_at(34.0, -118.0, 8, 59, 10, 0.1, "Early"),
            interval_at(34.0, -118.0, 9, 0, 10, 0.1, "Start"),
            interval_at(34.0, -118.0, 16, 59, 10, 0.1, "Late"),
            interval_at(34.0, -118.0, 17, 0, 10, 0.1, "End"),
        ];

        let kept = filter_by_time(&intervals, 9.0, 17.0, &utc());
        let names: Vec<&str> = kept.iter().map(|i| i.location_name.as_str()).collect();
        assert_eq!(names, vec!["Start", "Late"]);
    }

    #[test]
    fn test_filter_by_time_uses_local_hour() {
        // 02:00 UTC is 18:00 the previous evening at UTC-8
        let intervals = vec![interval_at(34.0, -118.0, 2, 0, 10, 0.1, "Night")];
        let pst = FixedOffset::west_opt(8 * 3600).unwrap();

        assert_eq!(filter_by_time(&intervals, 17.0, 20.0, &pst).len(), 1);
        assert!(filter_by_time(&intervals, 0.0, 6.0, &pst).is_empty());
    }

    #[test]
    fn test_filter_by_date() {
        let start = Utc.with_ymd_and_hms(2025, 11, 4, 6, 30, 0).unwrap();
        let end = start + chrono::Duration::minutes(30);
        let intervals = vec![
            interval_at(34.0, -118.0, 12, 0, 10, 0.1, "Monday"),
            Interval::new(34.0, -118.0, start, end, 0.2, "Tuesday", "place"),
        ];

        let monday = NaiveDate::from_ymd_opt(2025, 11, 3);
        let kept = filter_by_date(&intervals, monday, &utc());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].location_name, "Monday");

        // 06:30 UTC on the 4th is still the 3rd at UTC-8
        let pst = FixedOffset::west_opt(8 * 3600).unwrap();
        assert_eq!(filter_by_date(&intervals, monday, &pst).len(), 2);
    }

    #[test]
    fn test_filter_by_date_none_is_identity() {
        let intervals = vec![
            interval_at(34.0, -118.0, 12, 0, 10, 0.1, "A"),
            interval_at(34.1, -118.1, 13, 0, 10, 0.2, "B"),
        ];
        assert_eq!(filter_by_date(&intervals, None, &utc()), intervals);
    }
}

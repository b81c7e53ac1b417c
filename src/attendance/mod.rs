//! Attendance module - check-in calendar aggregation and streaks
//!
//! Pure date arithmetic over a student's check-in history: month calendar
//! view, consecutive-day streak, weekly completion. No I/O; callers fetch
//! the raw dates and inject "now" so everything here stays deterministic.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Deduplicated set of calendar days with at least one check-in.
///
/// A student gets at most one meaningful check-in per day; duplicate
/// records for the same day collapse on construction.
#[derive(Debug, Clone, Default)]
pub struct AttendanceLog {
    days: BTreeSet<NaiveDate>,
}

/// Check-in days for one month, for rendering a calendar grid.
///
/// `month` is 1-based (January = 1), matching chrono.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub days_with_attendance: BTreeSet<u32>,
}

impl MonthView {
    /// Number of distinct days with a check-in this month.
    pub fn total_count(&self) -> usize {
        self.days_with_attendance.len()
    }
}

impl AttendanceLog {
    /// Build a log from date-only records, collapsing duplicates.
    pub fn from_days(records: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            days: records.into_iter().collect(),
        }
    }

    /// Build a log from stored instants, recovering each local calendar
    /// day for the given UTC offset before collapsing duplicates.
    ///
    /// This is the one place timezone correction happens; every view
    /// derived from the log sees already-normalized days.
    pub fn from_timestamps(records: &[DateTime<Utc>], offset: FixedOffset) -> Self {
        Self::from_days(
            records
                .iter()
                .map(|instant| instant.with_timezone(&offset).date_naive()),
        )
    }

    /// Total distinct check-in days across the whole log.
    pub fn total_days(&self) -> usize {
        self.days.len()
    }

    /// Unique check-in days in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.iter().copied()
    }

    /// Check-in days falling in the given year/month (1-based month).
    ///
    /// Records outside the month are filtered out; an out-of-range month
    /// simply matches nothing.
    pub fn month_view(&self, year: i32, month: u32) -> MonthView {
        let days_with_attendance = self
            .days
            .iter()
            .filter(|d| d.year() == year && d.month() == month)
            .map(|d| d.day())
            .collect();

        MonthView {
            year,
            month,
            days_with_attendance,
        }
    }

    /// Consecutive-day streak ending at the day of `reference_now`.
    ///
    /// Walks unique days from most recent backward. The first counted day
    /// may be today or yesterday (a missing check-in today does not break
    /// an otherwise live streak); after that every step must be exactly
    /// one day. A gap of two or more days ends the walk.
    pub fn current_streak(&self, reference_now: NaiveDateTime) -> u32 {
        let mut reference_date = reference_now.date();
        let mut streak = 0;

        for day in self.days.iter().rev() {
            let diff = (reference_date - *day).num_days();

            if diff == 0 || diff == 1 {
                streak += 1;
                reference_date = *day;
            } else if diff > 1 {
                break;
            }
            // diff < 0: day is ahead of the reference, skip without counting
        }

        streak
    }

    /// Weekdays of the week containing `reference_now` that have a
    /// check-in, as Sunday=0 .. Saturday=6 indices.
    ///
    /// Plain membership for the weekly chips on the home screen; gaps
    /// inside the week carry no streak meaning.
    pub fn week_completion(&self, reference_now: NaiveDateTime) -> BTreeSet<u32> {
        let today = reference_now.date();
        let week_start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
        let week_end = week_start + Duration::days(6);

        self.days
            .iter()
            .filter(|d| **d >= week_start && **d <= week_end)
            .map(|d| d.weekday().num_days_from_sunday())
            .collect()
    }
}

/// Number of days in the given month (1-based month).
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .unwrap_or_default();

    (next_month - first).num_days() as u32
}

/// Weekday index (Sunday=0) of the first day of the month, for laying out
/// the leading blanks of a calendar grid.
pub fn first_weekday_of_month(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_default()
        .weekday()
        .num_days_from_sunday()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn noon(s: &str) -> NaiveDateTime {
        day(s).and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_month_view_collapses_duplicates() {
        let log = AttendanceLog::from_days([
            day("2024-03-05"),
            day("2024-03-05"),
            day("2024-03-06"),
        ]);
        let view = log.month_view(2024, 3);
        assert_eq!(view.total_count(), 2);
        assert_eq!(view.days_with_attendance, BTreeSet::from([5, 6]));
    }

    #[test]
    fn test_month_view_filters_other_months() {
        let log = AttendanceLog::from_days([day("2024-02-28"), day("2024-03-01")]);
        let view = log.month_view(2024, 3);
        assert_eq!(view.days_with_attendance, BTreeSet::from([1]));
        assert_eq!(view.total_count(), 1);
    }

    #[test]
    fn test_month_view_empty() {
        let log = AttendanceLog::from_days([]);
        assert_eq!(log.month_view(2024, 3).total_count(), 0);
    }

    #[test]
    fn test_month_view_out_of_range_month_matches_nothing() {
        let log = AttendanceLog::from_days([day("2024-03-05")]);
        assert_eq!(log.month_view(2024, 13).total_count(), 0);
    }

    #[test]
    fn test_streak_consecutive_days() {
        let log = AttendanceLog::from_days([day("2024-03-10"), day("2024-03-09")]);
        assert_eq!(log.current_streak(noon("2024-03-10")), 2);
    }

    #[test]
    fn test_streak_counts_from_yesterday() {
        // No check-in today yet; the streak survives until tomorrow.
        let log = AttendanceLog::from_days([day("2024-03-09"), day("2024-03-08")]);
        assert_eq!(log.current_streak(noon("2024-03-10")), 2);
    }

    #[test]
    fn test_streak_breaks_on_two_day_gap() {
        let log = AttendanceLog::from_days([day("2024-03-10"), day("2024-03-07")]);
        assert_eq!(log.current_streak(noon("2024-03-10")), 1);
    }

    #[test]
    fn test_streak_two_day_gap_to_today_is_zero() {
        let log = AttendanceLog::from_days([day("2024-03-07")]);
        assert_eq!(log.current_streak(noon("2024-03-10")), 0);
    }

    #[test]
    fn test_streak_ignores_duplicates() {
        let log = AttendanceLog::from_days([
            day("2024-03-10"),
            day("2024-03-10"),
            day("2024-03-09"),
        ]);
        assert_eq!(log.current_streak(noon("2024-03-10")), 2);
    }

    #[test]
    fn test_streak_empty() {
        let log = AttendanceLog::from_days([]);
        assert_eq!(log.current_streak(noon("2024-03-10")), 0);
    }

    #[test]
    fn test_streak_skips_future_days() {
        // A stray future-dated record must not count or break the chain.
        let log = AttendanceLog::from_days([
            day("2024-03-15"),
            day("2024-03-10"),
            day("2024-03-09"),
        ]);
        assert_eq!(log.current_streak(noon("2024-03-10")), 2);
    }

    #[test]
    fn test_streak_across_month_boundary() {
        let log = AttendanceLog::from_days([
            day("2024-03-01"),
            day("2024-02-29"),
            day("2024-02-28"),
        ]);
        assert_eq!(log.current_streak(noon("2024-03-01")), 3);
    }

    #[test]
    fn test_week_completion_membership() {
        // 2024-03-13 is a Wednesday; week runs Sun 03-10 .. Sat 03-16.
        let log = AttendanceLog::from_days([day("2024-03-11"), day("2024-03-13")]);
        let completed = log.week_completion(noon("2024-03-13"));
        assert_eq!(completed, BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_week_completion_excludes_previous_week() {
        let log = AttendanceLog::from_days([day("2024-03-09"), day("2024-03-11")]);
        let completed = log.week_completion(noon("2024-03-13"));
        assert_eq!(completed, BTreeSet::from([1]));
    }

    #[test]
    fn test_from_timestamps_recovers_local_day() {
        // 01:30 UTC on the 10th is still the evening of the 9th at UTC-3.
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let instant = Utc.with_ymd_and_hms(2024, 3, 10, 1, 30, 0).unwrap();
        let log = AttendanceLog::from_timestamps(&[instant], offset);
        let view = log.month_view(2024, 3);
        assert_eq!(view.days_with_attendance, BTreeSet::from([9]));
    }

    #[test]
    fn test_from_timestamps_collapses_same_local_day() {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let morning = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2024, 3, 10, 1, 30, 0).unwrap();
        let log = AttendanceLog::from_timestamps(&[morning, night], offset);
        assert_eq!(log.total_days(), 1);
    }

    #[test]
    fn test_days_iterates_unique_ascending() {
        let log = AttendanceLog::from_days([
            day("2024-03-10"),
            day("2024-03-08"),
            day("2024-03-10"),
        ]);
        let days: Vec<NaiveDate> = log.days().collect();
        assert_eq!(days, vec![day("2024-03-08"), day("2024-03-10")]);
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(days_in_month(2024, 4), 30);
    }

    #[test]
    fn test_first_weekday_of_month() {
        // 2024-03-01 was a Friday.
        assert_eq!(first_weekday_of_month(2024, 3), 5);
        // 2024-09-01 was a Sunday.
        assert_eq!(first_weekday_of_month(2024, 9), 0);
    }
}

//! Weekly instructor workload.
//!
//! An entry contributes, to each calendar week, its minutes per meeting
//! times the number of its meeting days that fall inside both the week and
//! the entry's own date range. A candidate is checked only in the weeks it
//! actually contributes to; existing entries' contributions are summed on
//! top for each of its instructors that carries a cap.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::references::Booking;
use crate::error::{RegistryError, Result};
use crate::models::{Collaborator, DateRange};
use crate::store::EntityId;

/// Which day begins a calendar week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    /// ISO 8601 weeks.
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    /// First day of the week containing `date`.
    pub fn week_of(self, date: NaiveDate) -> NaiveDate {
        let offset = match self {
            WeekStart::Monday => date.weekday().num_days_from_monday(),
            WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        };
        date - Duration::days(i64::from(offset))
    }

    /// The seven days of the week starting at `week`.
    pub fn week_range(self, week: NaiveDate) -> DateRange {
        DateRange::new(week, week + Duration::days(6))
    }
}

/// A week in which an instructor would exceed their cap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overload {
    pub instructor_id: EntityId,
    /// First day of the offending week.
    pub week: NaiveDate,
    /// Committed hours including the candidate.
    pub total_hours: f64,
    pub cap: f64,
}

impl From<Overload> for RegistryError {
    fn from(overload: Overload) -> Self {
        RegistryError::WeeklyHourLimitExceeded {
            instructor_id: overload.instructor_id,
            week: overload.week,
            total: overload.total_hours,
            cap: overload.cap,
        }
    }
}

/// Sums instructor hours per calendar week.
///
/// A week that is already over an instructor's cap is not reported when the
/// candidate has no meeting in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeeklyHourAggregator {
    week_start: WeekStart,
}

impl WeeklyHourAggregator {
    /// Creates an aggregator with the given week convention.
    pub fn new(week_start: WeekStart) -> Self {
        Self { week_start }
    }

    /// Minutes `booking` contributes to the week starting at `week`.
    pub fn weekly_minutes(&self, booking: &Booking<'_>, week: NaiveDate) -> i64 {
        let days = booking
            .window
            .occurrences_in(&self.week_start.week_range(week));
        days as i64 * booking.window.minutes_per_occurrence()
    }

    /// Week starts in which `booking` has at least one meeting.
    pub fn active_weeks(&self, booking: &Booking<'_>) -> Vec<NaiveDate> {
        let dates = booking.window.dates;
        let mut weeks = Vec::new();
        let mut week = self.week_start.week_of(dates.start);
        while week <= dates.end {
            if self.weekly_minutes(booking, week) > 0 {
                weeks.push(week);
            }
            week += Duration::days(7);
        }
        weeks
    }

    /// Hours committed by `instructor_id` in `week` across `bookings`.
    ///
    /// Cancelled entries are ignored.
    pub fn committed_hours(
        &self,
        instructor_id: EntityId,
        week: NaiveDate,
        bookings: &[Booking<'_>],
    ) -> f64 {
        let minutes: i64 = bookings
            .iter()
            .filter(|b| !b.entry.is_cancelled() && b.entry.has_instructor(instructor_id))
            .map(|b| self.weekly_minutes(b, week))
            .sum();
        minutes as f64 / 60.0
    }

    /// Over-cap weeks for one instructor of `candidate`.
    ///
    /// `cap` of `None` means unlimited and never overloads. Existing
    /// bookings with the candidate's identity are replaced by the candidate.
    pub fn instructor_overloads(
        &self,
        instructor_id: EntityId,
        cap: Option<f64>,
        candidate: &Booking<'_>,
        existing: &[Booking<'_>],
    ) -> Vec<Overload> {
        let Some(cap) = cap else {
            return Vec::new();
        };
        let others: Vec<Booking<'_>> = existing
            .iter()
            .filter(|b| b.id() != candidate.id())
            .cloned()
            .collect();

        self.active_weeks(candidate)
            .into_iter()
            .filter_map(|week| {
                let total_hours = self.weekly_minutes(candidate, week) as f64 / 60.0
                    + self.committed_hours(instructor_id, week, &others);
                (total_hours > cap).then_some(Overload {
                    instructor_id,
                    week,
                    total_hours,
                    cap,
                })
            })
            .collect()
    }

    /// Over-cap weeks for every instructor of `candidate`, in instructor
    /// order then week order. Caps are read from `collaborators`.
    pub fn find_overloads(
        &self,
        candidate: &Booking<'_>,
        existing: &[Booking<'_>],
        collaborators: &[Collaborator],
    ) -> Vec<Overload> {
        candidate
            .entry
            .instructor_ids
            .iter()
            .flat_map(|instructor_id| {
                let cap = collaborators
                    .iter()
                    .find(|c| c.id == *instructor_id)
                    .and_then(|c| c.max_weekly_hours);
                self.instructor_overloads(*instructor_id, cap, candidate, existing)
            })
            .collect()
    }

    /// Fails with the first over-cap week, if any.
    pub fn check(
        &self,
        candidate: &Booking<'_>,
        existing: &[Booking<'_>],
        collaborators: &[Collaborator],
    ) -> Result<()> {
        match self
            .find_overloads(candidate, existing, collaborators)
            .into_iter()
            .next()
        {
            Some(overload) => Err(overload.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CollaboratorPatch, ScheduleEntry, ScheduleEntryPatch, TimeWindow, Weekday, WeekdaySet,
    };
    use crate::store::Record;
    use crate::validation::ScheduleWindow;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn entry(id: EntityId, instructor: EntityId, dates: DateRange) -> ScheduleEntry {
        ScheduleEntry::from_patch(id, ScheduleEntryPatch::new(1, 1, instructor, id, 1, dates))
            .unwrap()
    }

    fn booking<'e>(entry: &'e ScheduleEntry, days: &[Weekday], times: (&str, &str)) -> Booking<'e> {
        Booking {
            entry,
            window: ScheduleWindow::new(
                entry.date_range(),
                days.iter().copied().collect::<WeekdaySet>(),
                TimeWindow::parse(times.0, times.1).unwrap(),
            ),
        }
    }

    fn one_week() -> DateRange {
        DateRange::new(d(2025, 3, 3), d(2025, 3, 9))
    }

    fn capped(cap: f64) -> Vec<Collaborator> {
        vec![Collaborator::from_patch(7, CollaboratorPatch::new("Ana Souza").with_max_weekly_hours(cap))
            .unwrap()]
    }

    #[test]
    fn test_week_of() {
        // 2025-03-05 is a Wednesday
        assert_eq!(WeekStart::Monday.week_of(d(2025, 3, 5)), d(2025, 3, 3));
        assert_eq!(WeekStart::Sunday.week_of(d(2025, 3, 5)), d(2025, 3, 2));
        assert_eq!(WeekStart::Monday.week_of(d(2025, 3, 9)), d(2025, 3, 3));
        assert_eq!(WeekStart::Sunday.week_of(d(2025, 3, 9)), d(2025, 3, 9));
    }

    #[test]
    fn test_cap_rejects_four_accepts_two() {
        let agg = WeeklyHourAggregator::default();
        let collaborators = capped(10.0);

        // 8h already committed: Mon + Wed, 4h each.
        let existing = entry(1, 7, one_week());
        let existing = [booking(&existing, &[Weekday::Mon, Weekday::Wed], ("08:00", "12:00"))];
        assert_eq!(agg.committed_hours(7, d(2025, 3, 3), &existing), 8.0);

        let four = entry(2, 7, one_week());
        let four = booking(&four, &[Weekday::Fri], ("08:00", "12:00"));
        let err = agg.check(&four, &existing, &collaborators).unwrap_err();
        match err {
            RegistryError::WeeklyHourLimitExceeded {
                instructor_id,
                week,
                total,
                cap,
            } => {
                assert_eq!(instructor_id, 7);
                assert_eq!(week, d(2025, 3, 3));
                assert_eq!(total, 12.0);
                assert_eq!(cap, 10.0);
            }
            other => panic!("unexpected {other:?}"),
        }

        let two = entry(3, 7, one_week());
        let two = booking(&two, &[Weekday::Fri], ("08:00", "10:00"));
        assert!(agg.check(&two, &existing, &collaborators).is_ok());
    }

    #[test]
    fn test_no_cap_never_rejects() {
        let agg = WeeklyHourAggregator::default();
        let uncapped = vec![Collaborator::from_patch(7, CollaboratorPatch::new("Ana Souza")).unwrap()];
        let existing = entry(1, 7, one_week());
        let existing = [booking(&existing, &Weekday::ALL, ("06:00", "22:00"))];
        let candidate = entry(2, 7, one_week());
        let candidate = booking(&candidate, &Weekday::ALL, ("06:00", "22:00"));
        assert!(agg.check(&candidate, &existing, &uncapped).is_ok());
    }

    #[test]
    fn test_partial_weeks_count_only_days_in_range() {
        let agg = WeeklyHourAggregator::default();
        // Entry runs Thu 2025-03-06 .. Tue 2025-03-11, every day, 2h.
        let e = entry(1, 7, DateRange::new(d(2025, 3, 6), d(2025, 3, 11)));
        let b = booking(&e, &Weekday::ALL, ("08:00", "10:00"));

        assert_eq!(agg.active_weeks(&b), vec![d(2025, 3, 3), d(2025, 3, 10)]);
        assert_eq!(agg.weekly_minutes(&b, d(2025, 3, 3)), 4 * 120);
        assert_eq!(agg.weekly_minutes(&b, d(2025, 3, 10)), 2 * 120);
    }

    #[test]
    fn test_weeks_without_candidate_meetings_are_not_checked() {
        let agg = WeeklyHourAggregator::default();
        let collaborators = capped(10.0);

        // Already over cap in the week of 03-10 only.
        let heavy = entry(1, 7, DateRange::new(d(2025, 3, 10), d(2025, 3, 16)));
        let existing = [booking(&heavy, &Weekday::ALL, ("08:00", "10:00"))];

        // Candidate's range touches that week but meets only on Saturday 03-08.
        let light = entry(2, 7, DateRange::new(d(2025, 3, 3), d(2025, 3, 12)));
        let light = booking(&light, &[Weekday::Sat], ("08:00", "09:00"));
        assert_eq!(agg.active_weeks(&light), vec![d(2025, 3, 3)]);
        assert!(agg.check(&light, &existing, &collaborators).is_ok());
    }

    #[test]
    fn test_update_replaces_own_contribution() {
        let agg = WeeklyHourAggregator::default();
        let collaborators = capped(10.0);
        let old = entry(1, 7, one_week());
        let existing = [booking(&old, &[Weekday::Mon, Weekday::Wed], ("08:00", "12:00"))];

        // Same identity, now 10h: Mon/Wed 08:00-13:00.
        let updated = entry(1, 7, one_week());
        let updated = booking(&updated, &[Weekday::Mon, Weekday::Wed], ("08:00", "13:00"));
        assert!(agg.check(&updated, &existing, &collaborators).is_ok());
    }

    #[test]
    fn test_cancelled_entries_do_not_count() {
        let agg = WeeklyHourAggregator::default();
        let mut cancelled = entry(1, 7, one_week());
        cancelled.status = crate::models::ScheduleStatus::Cancelled;
        assert!(!cancelled.is_active());
        let bookings = [booking(&cancelled, &Weekday::ALL, ("08:00", "12:00"))];
        assert_eq!(agg.committed_hours(7, d(2025, 3, 3), &bookings), 0.0);
    }
}

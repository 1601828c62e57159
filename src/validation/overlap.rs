//! Temporal overlap detection.
//!
//! Two schedule windows overlap iff their date ranges intersect, their
//! weekday sets intersect, and their daily time windows intersect.
//!
//! # Boundaries
//! Dates are always compared with inclusive day semantics. Time-of-day
//! boundaries follow the detector's [`BoundaryPolicy`]: under `Inclusive`
//! (the default) a window ending at 12:00 overlaps one starting at 12:00,
//! under `HalfOpen` the two are adjacent.

use serde::{Deserialize, Serialize};

use crate::models::{DateRange, TimeWindow, Weekday, WeekdaySet};

/// How shared time-of-day boundary instants are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// `[start, end]`: a shared instant is a conflict.
    #[default]
    Inclusive,
    /// `[start, end)`: back-to-back windows are compatible.
    HalfOpen,
}

/// The weekly occupancy pattern of one schedule entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleWindow {
    /// Inclusive date range.
    pub dates: DateRange,
    /// Weekdays the entry meets on.
    pub weekdays: WeekdaySet,
    /// Daily time window.
    pub times: TimeWindow,
}

impl ScheduleWindow {
    /// Creates a new schedule window.
    pub fn new(dates: DateRange, weekdays: WeekdaySet, times: TimeWindow) -> Self {
        Self {
            dates,
            weekdays,
            times,
        }
    }

    /// Number of meeting days inside `range` (inclusive).
    pub fn occurrences_in(&self, range: &DateRange) -> usize {
        let start = self.dates.start.max(range.start);
        let end = self.dates.end.min(range.end);
        if start > end {
            return 0;
        }
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| self.weekdays.contains(Weekday::of(*day)))
            .count()
    }

    /// Minutes per meeting.
    #[inline]
    pub fn minutes_per_occurrence(&self) -> i64 {
        self.times.duration_minutes()
    }
}

/// Pairwise overlap test over [`ScheduleWindow`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlapDetector {
    boundary: BoundaryPolicy,
}

impl OverlapDetector {
    /// Creates a detector with the given boundary policy.
    pub fn new(boundary: BoundaryPolicy) -> Self {
        Self { boundary }
    }

    /// The configured boundary policy.
    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    /// Whether two daily time windows intersect under the boundary policy.
    pub fn times_overlap(&self, a: &TimeWindow, b: &TimeWindow) -> bool {
        let latest_start = a.start.max(b.start);
        let earliest_end = a.end.min(b.end);
        match self.boundary {
            BoundaryPolicy::Inclusive => latest_start <= earliest_end,
            BoundaryPolicy::HalfOpen => latest_start < earliest_end,
        }
    }

    /// Whether two schedule windows occupy a common slot.
    pub fn overlaps(&self, a: &ScheduleWindow, b: &ScheduleWindow) -> bool {
        a.dates.intersects(&b.dates)
            && a.weekdays.intersects(&b.weekdays)
            && self.times_overlap(&a.times, &b.times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_date, parse_time};
    use chrono::NaiveTime;
    use proptest::prelude::*;

    fn window(dates: (&str, &str), days: &[Weekday], times: (&str, &str)) -> ScheduleWindow {
        ScheduleWindow::new(
            DateRange::new(
                parse_date(dates.0, "start").unwrap(),
                parse_date(dates.1, "end").unwrap(),
            ),
            days.iter().copied().collect(),
            TimeWindow::parse(times.0, times.1).unwrap(),
        )
    }

    const MON_WED: &[Weekday] = &[Weekday::Mon, Weekday::Wed];
    const TUE_THU: &[Weekday] = &[Weekday::Tue, Weekday::Thu];

    #[test]
    fn test_full_overlap() {
        let a = window(("2025-03-03", "2025-03-28"), MON_WED, ("08:00", "12:00"));
        let b = window(("2025-03-10", "2025-04-10"), &[Weekday::Wed], ("10:00", "11:00"));
        assert!(OverlapDetector::default().overlaps(&a, &b));
    }

    #[test]
    fn test_disjoint_weekdays_do_not_overlap() {
        let a = window(("2025-03-03", "2025-03-28"), MON_WED, ("08:00", "12:00"));
        let b = window(("2025-03-03", "2025-03-28"), TUE_THU, ("08:00", "12:00"));
        assert!(!OverlapDetector::default().overlaps(&a, &b));
    }

    #[test]
    fn test_disjoint_dates_do_not_overlap() {
        let a = window(("2025-03-03", "2025-03-14"), MON_WED, ("08:00", "12:00"));
        let b = window(("2025-03-15", "2025-03-28"), MON_WED, ("08:00", "12:00"));
        assert!(!OverlapDetector::default().overlaps(&a, &b));
    }

    #[test]
    fn test_shared_end_date_overlaps() {
        let a = window(("2025-03-03", "2025-03-14"), MON_WED, ("08:00", "12:00"));
        let b = window(("2025-03-14", "2025-03-28"), MON_WED, ("08:00", "12:00"));
        assert!(OverlapDetector::new(BoundaryPolicy::HalfOpen).overlaps(&a, &b));
    }

    #[test]
    fn test_boundary_instant() {
        let morning = window(("2025-03-03", "2025-03-28"), MON_WED, ("08:00", "12:00"));
        let afternoon = window(("2025-03-03", "2025-03-28"), MON_WED, ("12:00", "16:00"));

        assert!(OverlapDetector::new(BoundaryPolicy::Inclusive).overlaps(&morning, &afternoon));
        assert!(!OverlapDetector::new(BoundaryPolicy::HalfOpen).overlaps(&morning, &afternoon));
    }

    #[test]
    fn test_occurrences_in_range() {
        let w = window(("2025-03-05", "2025-03-28"), MON_WED, ("08:00", "10:00"));
        // Week of Mon 2025-03-03: only Wed 05 is inside the entry's dates.
        let week = DateRange::new(
            parse_date("2025-03-03", "s").unwrap(),
            parse_date("2025-03-09", "e").unwrap(),
        );
        assert_eq!(w.occurrences_in(&week), 1);

        let whole = DateRange::new(
            parse_date("2025-03-01", "s").unwrap(),
            parse_date("2025-03-31", "e").unwrap(),
        );
        // Wed 5, Mon 10, Wed 12, Mon 17, Wed 19, Mon 24, Wed 26
        assert_eq!(w.occurrences_in(&whole), 7);
        assert_eq!(w.minutes_per_occurrence(), 120);
    }

    fn time_strategy() -> impl Strategy<Value = TimeWindow> {
        (0u32..22 * 60, 1u32..240).prop_map(|(start, len)| {
            let end = (start + len).min(23 * 60 + 59);
            let at = |m: u32| NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap();
            TimeWindow::new(at(start), at(end))
        })
    }

    fn window_strategy() -> impl Strategy<Value = ScheduleWindow> {
        let base = parse_date("2025-01-06", "base").unwrap();
        (
            0i64..60,
            0i64..30,
            proptest::collection::btree_set(0usize..7, 1..4),
            time_strategy(),
        )
            .prop_map(move |(offset, len, days, times)| {
                let start = base + chrono::Duration::days(offset);
                let end = start + chrono::Duration::days(len);
                ScheduleWindow::new(
                    DateRange::new(start, end),
                    days.into_iter().map(|d| Weekday::ALL[d]).collect(),
                    times,
                )
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        #[test]
        fn overlap_is_symmetric(a in window_strategy(), b in window_strategy()) {
            for boundary in [BoundaryPolicy::Inclusive, BoundaryPolicy::HalfOpen] {
                let detector = OverlapDetector::new(boundary);
                prop_assert_eq!(detector.overlaps(&a, &b), detector.overlaps(&b, &a));
            }
        }

        #[test]
        fn window_overlaps_itself(a in window_strategy()) {
            prop_assert!(OverlapDetector::new(BoundaryPolicy::HalfOpen).overlaps(&a, &a));
        }

        #[test]
        fn half_open_overlap_implies_inclusive(a in window_strategy(), b in window_strategy()) {
            if OverlapDetector::new(BoundaryPolicy::HalfOpen).overlaps(&a, &b) {
                prop_assert!(OverlapDetector::new(BoundaryPolicy::Inclusive).overlaps(&a, &b));
            }
        }

        #[test]
        fn disjoint_weekdays_never_overlap(a in window_strategy(), b in window_strategy()) {
            let mut b = b;
            b.weekdays = Weekday::ALL
                .iter()
                .copied()
                .filter(|d| !a.weekdays.contains(*d))
                .collect();
            prop_assert!(!OverlapDetector::default().overlaps(&a, &b));
        }
    }
}

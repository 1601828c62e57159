//! Time primitives: weekdays, time-of-day windows and date ranges.
//!
//! # Time Model
//! Schedule entries repeat on a set of weekdays, between two calendar dates,
//! inside a time-of-day window. Dates are inclusive on both ends. Times are
//! wall-clock minutes without timezone; the consumer defines the locale.
//!
//! # Wire format
//! - Times: `"HH:MM"`. `"HH:MM:SS"` is accepted on input and truncated to
//!   the minute.
//! - Dates: ISO `"YYYY-MM-DD"` (`"DD/MM/YYYY"` accepted on input).
//! - Weekdays: `"mon"`..`"sun"`; Portuguese abbreviations (`"SEG"`,
//!   `"SÁB"`, ...) and capitalised English tokens are accepted.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{RegistryError, Result};

/// Day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "mon", alias = "Mon", alias = "MON", alias = "SEG", alias = "seg")]
    Mon,
    #[serde(rename = "tue", alias = "Tue", alias = "TUE", alias = "TER", alias = "ter")]
    Tue,
    #[serde(rename = "wed", alias = "Wed", alias = "WED", alias = "QUA", alias = "qua")]
    Wed,
    #[serde(rename = "thu", alias = "Thu", alias = "THU", alias = "QUI", alias = "qui")]
    Thu,
    #[serde(rename = "fri", alias = "Fri", alias = "FRI", alias = "SEX", alias = "sex")]
    Fri,
    #[serde(
        rename = "sat",
        alias = "Sat",
        alias = "SAT",
        alias = "SAB",
        alias = "SÁB",
        alias = "sab"
    )]
    Sat,
    #[serde(rename = "sun", alias = "Sun", alias = "SUN", alias = "DOM", alias = "dom")]
    Sun,
}

impl Weekday {
    /// All days, Monday first.
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Weekday of a calendar date.
    pub fn of(date: NaiveDate) -> Self {
        Self::from(date.weekday())
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
            chrono::Weekday::Sun => Weekday::Sun,
        }
    }
}

impl From<Weekday> for chrono::Weekday {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => chrono::Weekday::Mon,
            Weekday::Tue => chrono::Weekday::Tue,
            Weekday::Wed => chrono::Weekday::Wed,
            Weekday::Thu => chrono::Weekday::Thu,
            Weekday::Fri => chrono::Weekday::Fri,
            Weekday::Sat => chrono::Weekday::Sat,
            Weekday::Sun => chrono::Weekday::Sun,
        }
    }
}

/// A set of weekdays, serialized as a list in Monday-first order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdaySet(BTreeSet<Weekday>);

impl WeekdaySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a day.
    pub fn with(mut self, day: Weekday) -> Self {
        self.0.insert(day);
        self
    }

    /// Whether `day` is in the set.
    pub fn contains(&self, day: Weekday) -> bool {
        self.0.contains(&day)
    }

    /// Whether the two sets share at least one day.
    pub fn intersects(&self, other: &Self) -> bool {
        self.0.iter().any(|day| other.0.contains(day))
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of days.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Days in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Weekday; N]> for WeekdaySet {
    fn from(days: [Weekday; N]) -> Self {
        days.into_iter().collect()
    }
}

/// A time-of-day interval.
///
/// Whether the end instant is shared with an adjacent window is decided by
/// the overlap detector's boundary policy, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start.
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    /// Window end. Must be later than `start`.
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parses a window from two `"HH:MM"` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let window = Self::new(parse_time(start, "start")?, parse_time(end, "end")?);
        window.validate()?;
        Ok(window)
    }

    /// Length in minutes.
    #[inline]
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Rejects empty or inverted windows and sub-minute precision.
    pub fn validate(&self) -> Result<()> {
        for (field, time) in [("start", self.start), ("end", self.end)] {
            if !is_whole_minute(time) {
                return Err(RegistryError::invalid(
                    field,
                    format!("{time} is not a whole minute"),
                ));
            }
        }
        if self.start >= self.end {
            return Err(RegistryError::invalid(
                "end",
                format!(
                    "end {} must be later than start {}",
                    self.end.format("%H:%M"),
                    self.start.format("%H:%M")
                ),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day (inclusive).
    #[serde(with = "date")]
    pub start: NaiveDate,
    /// Last day (inclusive).
    #[serde(with = "date")]
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new date range.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Whether `day` falls within the range.
    #[inline]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Whether two ranges share at least one day.
    pub fn intersects(&self, other: &Self) -> bool {
        self.start.max(other.start) <= self.end.min(other.end)
    }

    /// Number of days in the range (0 when inverted).
    pub fn len_days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(0)
    }

    /// Rejects inverted ranges.
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(RegistryError::invalid(
                "end_date",
                format!("end {} is before start {}", self.end, self.start),
            ));
        }
        Ok(())
    }
}

/// Parses a `"HH:MM"` or `"HH:MM:SS"` time. Seconds are dropped.
pub fn parse_time(raw: &str, field: &'static str) -> Result<NaiveTime> {
    let raw = raw.trim();
    let time = NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| RegistryError::invalid(field, format!("`{raw}` is not a HH:MM time")))?;
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0)
        .ok_or_else(|| RegistryError::invalid(field, format!("`{raw}` is not a HH:MM time")))
}

fn is_whole_minute(time: NaiveTime) -> bool {
    time.second() == 0 && time.nanosecond() == 0
}

/// Parses an ISO or day-first date.
pub fn parse_date(raw: &str, field: &'static str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .map_err(|_| RegistryError::invalid(field, format!("`{raw}` is not a date")))
}

/// `NaiveTime` as `"HH:MM"`.
pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw, "time").map_err(de::Error::custom)
    }

    /// `Option<NaiveTime>` variant for patch fields.
    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapper(#[serde(with = "super")] NaiveTime);

            Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(time)| time))
        }
    }
}

/// `NaiveDate` as ISO, accepting `DD/MM/YYYY` on input.
pub(crate) mod date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format("%Y-%m-%d"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw, "date").map_err(de::Error::custom)
    }

    /// `Option<NaiveDate>` variant for patch fields.
    pub mod option {
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            #[derive(Deserialize)]
            struct Wrapper(#[serde(with = "super")] NaiveDate);

            Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(date)| date))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: &str) -> NaiveTime {
        parse_time(raw, "t").unwrap()
    }

    fn d(raw: &str) -> NaiveDate {
        parse_date(raw, "d").unwrap()
    }

    #[test]
    fn test_time_window() {
        let w = TimeWindow::parse("08:00", "12:30").unwrap();
        assert_eq!(w.duration_minutes(), 270);
        assert_eq!(w.to_string(), "08:00-12:30");

        assert!(TimeWindow::parse("12:00", "12:00").is_err());
        assert!(TimeWindow::parse("13:00", "12:00").is_err());
        assert!(TimeWindow::parse("8h", "12:00").is_err());
    }

    #[test]
    fn test_time_window_wire_format() {
        let w = TimeWindow::new(t("08:00"), t("12:00"));
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"start":"08:00","end":"12:00"}"#);

        let back: TimeWindow = serde_json::from_str(r#"{"start":"08:00:00","end":"12:00"}"#).unwrap();
        assert_eq!(back, w);
    }

    #[test]
    fn test_seconds_are_truncated_on_input() {
        assert_eq!(t("08:00:59"), t("08:00"));
        let w: TimeWindow =
            serde_json::from_str(r#"{"start":"08:00:30","end":"12:00:45"}"#).unwrap();
        assert_eq!(w.to_string(), "08:00-12:00");
        assert_eq!(serde_json::to_string(&w).unwrap(), r#"{"start":"08:00","end":"12:00"}"#);

        // Collapses to an empty window once truncated.
        assert!(TimeWindow::parse("08:00:10", "08:00:50").is_err());
    }

    #[test]
    fn test_sub_minute_window_rejected() {
        let start = NaiveTime::from_hms_opt(8, 0, 10).unwrap();
        let end = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        match TimeWindow::new(start, end).validate() {
            Err(RegistryError::InvalidField { field, .. }) => assert_eq!(field, "start"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_date_range() {
        let a = DateRange::new(d("2025-03-03"), d("2025-03-14"));
        let b = DateRange::new(d("2025-03-14"), d("2025-03-20"));
        let c = DateRange::new(d("2025-03-15"), d("2025-03-20"));

        assert!(a.intersects(&b)); // shared last day
        assert!(!a.intersects(&c));
        assert_eq!(a.len_days(), 12);
        assert!(a.contains(d("2025-03-03")));
        assert!(!a.contains(d("2025-03-15")));
        assert!(DateRange::new(d("2025-03-10"), d("2025-03-01")).validate().is_err());
    }

    #[test]
    fn test_day_first_dates_accepted() {
        assert_eq!(d("03/02/2025"), d("2025-02-03"));
        let r: DateRange =
            serde_json::from_str(r#"{"start":"03/02/2025","end":"2025-02-28"}"#).unwrap();
        assert_eq!(
            serde_json::to_string(&r).unwrap(),
            r#"{"start":"2025-02-03","end":"2025-02-28"}"#
        );
    }

    #[test]
    fn test_weekday_aliases() {
        let set: WeekdaySet = serde_json::from_str(r#"["SEG", "qua", "Fri", "SÁB"]"#).unwrap();
        assert_eq!(
            set,
            WeekdaySet::from([Weekday::Mon, Weekday::Wed, Weekday::Fri, Weekday::Sat])
        );
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"["mon","wed","fri","sat"]"#
        );
    }

    #[test]
    fn test_weekday_set_intersection() {
        let mon_wed = WeekdaySet::from([Weekday::Mon, Weekday::Wed]);
        let tue_thu = WeekdaySet::from([Weekday::Tue, Weekday::Thu]);
        let wed_fri = WeekdaySet::from([Weekday::Wed, Weekday::Fri]);

        assert!(!mon_wed.intersects(&tue_thu));
        assert!(mon_wed.intersects(&wed_fri));
        assert!(!mon_wed.intersects(&WeekdaySet::new()));
    }

    #[test]
    fn test_weekday_of_date() {
        assert_eq!(Weekday::of(d("2025-03-03")), Weekday::Mon);
        assert_eq!(Weekday::of(d("2025-03-09")), Weekday::Sun);
    }
}

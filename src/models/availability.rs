//! Instructor availability.
//!
//! An availability record lists the `(weekday, shift)` slots an instructor
//! offers during one period of a year. There is at most one record per
//! instructor, year and period.
//!
//! # Periods
//! | Wire form | Meaning |
//! |-----------|---------|
//! | `month-1` .. `month-12` | one calendar month |
//! | `quarter-1` .. `quarter-4` | three months |
//! | `semester-1`, `semester-2` | six months |
//! | `year` | the whole year |

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::time::{DateRange, Weekday};
use crate::error::{RegistryError, Result};
use crate::store::{default_true, ensure_same_id, required, EntityId, Record};

/// Part of a year an availability record covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    Month(u32),
    Quarter(u32),
    Semester(u32),
    Year,
}

impl Period {
    /// Builds a period from a kind (`month`, `quarter`, `semester`, `year`)
    /// and a number. The number is ignored for `year`.
    ///
    /// Kinds are case-insensitive; out-of-range numbers are rejected.
    pub fn normalize(kind: &str, value: &str) -> Result<Self> {
        let number = || {
            let raw = value.trim();
            raw.parse::<u32>().map_err(|_| {
                RegistryError::invalid("period_value", format!("`{raw}` is not a period number"))
            })
        };
        let period = match kind.trim().to_lowercase().as_str() {
            "month" => Period::Month(number()?),
            "quarter" => Period::Quarter(number()?),
            "semester" => Period::Semester(number()?),
            "year" => Period::Year,
            other => {
                return Err(RegistryError::invalid(
                    "period_type",
                    format!("unknown period type `{other}`"),
                ))
            }
        };
        period.validate()?;
        Ok(period)
    }

    /// Period kind as a lowercase word.
    pub fn kind(&self) -> &'static str {
        match self {
            Period::Month(_) => "month",
            Period::Quarter(_) => "quarter",
            Period::Semester(_) => "semester",
            Period::Year => "year",
        }
    }

    /// First and last month (1-based, inclusive).
    pub fn months(&self) -> (u32, u32) {
        match *self {
            Period::Month(m) => (m, m),
            Period::Quarter(q) => ((q * 3).saturating_sub(2), q * 3),
            Period::Semester(s) => ((s * 6).saturating_sub(5), s * 6),
            Period::Year => (1, 12),
        }
    }

    /// Rejects out-of-range numbers.
    pub fn validate(&self) -> Result<()> {
        let (number, max) = match *self {
            Period::Month(m) => (m, 12),
            Period::Quarter(q) => (q, 4),
            Period::Semester(s) => (s, 2),
            Period::Year => return Ok(()),
        };
        if number == 0 || number > max {
            return Err(RegistryError::invalid(
                "period_value",
                format!("{} must be between 1 and {max}, got {number}", self.kind()),
            ));
        }
        Ok(())
    }

    /// Calendar days the period spans in `year`.
    pub fn bounds(&self, year: i32) -> Result<DateRange> {
        self.validate()?;
        let (first, last) = self.months();
        let invalid_year = || RegistryError::invalid("year", format!("{year} is out of range"));
        let start = NaiveDate::from_ymd_opt(year, first, 1).ok_or_else(invalid_year)?;
        let after = if last == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, last + 1, 1)
        }
        .ok_or_else(invalid_year)?;
        Ok(DateRange::new(start, after - Duration::days(1)))
    }

    /// The month period containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        Period::Month(date.month())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Period::Month(n) | Period::Quarter(n) | Period::Semester(n) => {
                write!(f, "{}-{n}", self.kind())
            }
            Period::Year => f.write_str("year"),
        }
    }
}

impl TryFrom<String> for Period {
    type Error = RegistryError;

    fn try_from(raw: String) -> Result<Self> {
        match raw.split_once('-') {
            Some((kind, value)) => Period::normalize(kind, value),
            None => Period::normalize(&raw, ""),
        }
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

/// A weekday on which an instructor can teach a given shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    #[serde(alias = "dia")]
    pub weekday: Weekday,
    #[serde(alias = "turno_id")]
    pub shift_id: EntityId,
}

impl AvailabilitySlot {
    pub fn new(weekday: Weekday, shift_id: EntityId) -> Self {
        Self { weekday, shift_id }
    }
}

/// Slots an instructor offers in one period of a year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    /// Store-assigned identity.
    pub id: EntityId,
    #[serde(alias = "instrutor_id")]
    pub instructor_id: EntityId,
    #[serde(alias = "ano")]
    pub year: i32,
    pub period: Period,
    #[serde(default)]
    pub slots: BTreeSet<AvailabilitySlot>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// Soft-delete flag.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Create/update payload for [`Availability`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AvailabilityPatch {
    pub id: Option<EntityId>,
    #[serde(default, alias = "instrutor_id")]
    pub instructor_id: Option<EntityId>,
    #[serde(default, alias = "ano")]
    pub year: Option<i32>,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub slots: Option<BTreeSet<AvailabilitySlot>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl AvailabilityPatch {
    /// Payload for `instructor_id` in `period` of `year`, with no slots.
    pub fn new(instructor_id: EntityId, year: i32, period: Period) -> Self {
        Self {
            instructor_id: Some(instructor_id),
            year: Some(year),
            period: Some(period),
            slots: Some(BTreeSet::new()),
            ..Self::default()
        }
    }

    /// Adds a slot.
    pub fn with_slot(mut self, weekday: Weekday, shift_id: EntityId) -> Self {
        self.slots
            .get_or_insert_with(BTreeSet::new)
            .insert(AvailabilitySlot::new(weekday, shift_id));
        self
    }

    /// Sets the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl Availability {
    /// Whether `weekday` of `shift_id` is offered.
    pub fn offers(&self, weekday: Weekday, shift_id: EntityId) -> bool {
        self.slots.contains(&AvailabilitySlot::new(weekday, shift_id))
    }

    /// Calendar days covered.
    pub fn date_range(&self) -> Result<DateRange> {
        self.period.bounds(self.year)
    }
}

impl Record for Availability {
    type Patch = AvailabilityPatch;
    const COLLECTION: &'static str = "instructor_availability";

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn requested_id(patch: &AvailabilityPatch) -> Option<EntityId> {
        patch.id
    }

    fn from_patch(id: EntityId, patch: AvailabilityPatch) -> Result<Self> {
        Ok(Self {
            id,
            instructor_id: required(patch.instructor_id, Self::COLLECTION, "instructor_id")?,
            year: required(patch.year, Self::COLLECTION, "year")?,
            period: required(patch.period, Self::COLLECTION, "period")?,
            slots: patch.slots.unwrap_or_default(),
            notes: patch.notes.unwrap_or_default(),
            active: patch.active.unwrap_or(true),
        })
    }

    fn merge(&mut self, patch: AvailabilityPatch) -> Result<()> {
        ensure_same_id(self.id, patch.id)?;
        if let Some(instructor_id) = patch.instructor_id {
            self.instructor_id = instructor_id;
        }
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(period) = patch.period {
            self.period = period;
        }
        if let Some(slots) = patch.slots {
            self.slots = slots;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.year <= 0 {
            return Err(RegistryError::invalid(
                "year",
                format!("{} is not a valid year", self.year),
            ));
        }
        self.date_range().map(|_| ())
    }

    fn natural_key(&self) -> Option<String> {
        Some(format!("{}|{}|{}", self.instructor_id, self.year, self.period))
    }
}

//! Academic calendar model.
//!
//! One calendar per year, keyed by the year itself. Each of the twelve
//! months lists its working (teaching) days and its holidays by day number.
//!
//! # Precedence
//! Holidays override working days. A date is a working day iff:
//! - Its day number is listed in the month's `working_days`, AND
//! - It is NOT listed in the month's `holidays`.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::time::DateRange;
use crate::error::{RegistryError, Result};
use crate::store::{default_true, ensure_same_id, required, EntityId, Record};

/// Working days and holidays of one month, as day-of-month numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthDays {
    #[serde(default)]
    pub working_days: BTreeSet<u32>,
    #[serde(default)]
    pub holidays: BTreeSet<u32>,
}

impl MonthDays {
    /// Adds working days.
    pub fn with_working_days(mut self, days: impl IntoIterator<Item = u32>) -> Self {
        self.working_days.extend(days);
        self
    }

    /// Adds holidays.
    pub fn with_holidays(mut self, days: impl IntoIterator<Item = u32>) -> Self {
        self.holidays.extend(days);
        self
    }
}

fn twelve_months() -> Vec<MonthDays> {
    vec![MonthDays::default(); 12]
}

/// Academic calendar of one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    /// Store-assigned identity.
    pub id: EntityId,
    /// Calendar year. Unique across the collection.
    #[serde(alias = "ano")]
    pub year: i32,
    /// January first. Always twelve entries.
    #[serde(default = "twelve_months")]
    pub months: Vec<MonthDays>,
    /// Soft-delete flag.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Create/update payload for [`Calendar`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarPatch {
    pub id: Option<EntityId>,
    #[serde(default, alias = "ano")]
    pub year: Option<i32>,
    #[serde(default)]
    pub months: Option<Vec<MonthDays>>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl CalendarPatch {
    /// Create payload for `year` with twelve empty months.
    pub fn new(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }

    /// Sets one month (1-based).
    pub fn with_month(mut self, month: u32, days: MonthDays) -> Self {
        let months = self.months.get_or_insert_with(twelve_months);
        if let Some(slot) = months.get_mut(month.saturating_sub(1) as usize) {
            *slot = days;
        }
        self
    }
}

impl Calendar {
    /// Days of a month (1-based).
    pub fn month(&self, month: u32) -> Option<&MonthDays> {
        let index = month.checked_sub(1)?;
        self.months.get(index as usize)
    }

    /// Whether `date` is a listed holiday.
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        date.year() == self.year
            && self
                .month(date.month())
                .is_some_and(|m| m.holidays.contains(&date.day()))
    }

    /// Whether `date` is a working day of this calendar.
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        if date.year() != self.year || self.is_holiday(date) {
            return false;
        }
        self.month(date.month())
            .is_some_and(|m| m.working_days.contains(&date.day()))
    }

    /// Working days of this calendar inside `range`.
    pub fn working_days_in(&self, range: &DateRange) -> usize {
        range
            .start
            .iter_days()
            .take_while(|day| *day <= range.end)
            .filter(|day| self.is_working_day(*day))
            .count()
    }

    /// Working days in the whole year.
    pub fn total_working_days(&self) -> usize {
        self.months
            .iter()
            .map(|m| m.working_days.difference(&m.holidays).count())
            .sum()
    }
}

impl Record for Calendar {
    type Patch = CalendarPatch;
    const COLLECTION: &'static str = "calendars";

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn requested_id(patch: &CalendarPatch) -> Option<EntityId> {
        patch.id
    }

    fn from_patch(id: EntityId, patch: CalendarPatch) -> Result<Self> {
        Ok(Self {
            id,
            year: required(patch.year, Self::COLLECTION, "year")?,
            months: patch.months.unwrap_or_else(twelve_months),
            active: patch.active.unwrap_or(true),
        })
    }

    fn merge(&mut self, patch: CalendarPatch) -> Result<()> {
        ensure_same_id(self.id, patch.id)?;
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(months) = patch.months {
            self.months = months;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.months.len() != 12 {
            return Err(RegistryError::invalid(
                "months",
                format!("expected 12 months, got {}", self.months.len()),
            ));
        }
        for (index, month) in self.months.iter().enumerate() {
            let number = index as u32 + 1;
            for day in month.working_days.iter().chain(&month.holidays) {
                if NaiveDate::from_ymd_opt(self.year, number, *day).is_none() {
                    return Err(RegistryError::invalid(
                        "months",
                        format!("{}-{number:02} has no day {day}", self.year),
                    ));
                }
            }
        }
        Ok(())
    }

    fn natural_key(&self) -> Option<String> {
        Some(self.year.to_string())
    }
}

//! Shift model.
//!
//! A shift is a named daily time window ("Morning 08:00-12:00") with the
//! weekdays it normally runs on. Schedule entries that do not declare their
//! own window or weekdays inherit them from their shift.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::time::{hhmm, TimeWindow, WeekdaySet};
use crate::error::{RegistryError, Result};
use crate::store::{default_true, ensure_same_id, required, required_text, EntityId, Record};

/// A named daily time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    /// Store-assigned identity.
    pub id: EntityId,
    #[serde(alias = "nome")]
    pub name: String,
    /// Daily start.
    #[serde(with = "hhmm", alias = "horario_inicio")]
    pub start: NaiveTime,
    /// Daily end. Later than `start`.
    #[serde(with = "hhmm", alias = "horario_fim")]
    pub end: NaiveTime,
    /// Default weekdays. May be empty, in which case entries must declare
    /// their own.
    #[serde(default, alias = "dias_semana")]
    pub weekdays: WeekdaySet,
    /// Soft-delete flag.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Create/update payload for [`Shift`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShiftPatch {
    pub id: Option<EntityId>,
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
    #[serde(default, with = "hhmm::option", alias = "horario_inicio")]
    pub start: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option", alias = "horario_fim")]
    pub end: Option<NaiveTime>,
    #[serde(default, alias = "dias_semana")]
    pub weekdays: Option<WeekdaySet>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl ShiftPatch {
    /// Create payload for a shift running `window` on `weekdays`.
    pub fn new(name: impl Into<String>, window: TimeWindow, weekdays: WeekdaySet) -> Self {
        Self {
            name: Some(name.into()),
            start: Some(window.start),
            end: Some(window.end),
            weekdays: Some(weekdays),
            ..Self::default()
        }
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

impl Shift {
    /// The shift's daily window.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// Length of one shift day in minutes.
    pub fn daily_minutes(&self) -> i64 {
        self.window().duration_minutes()
    }

    /// Length of one shift day in hours.
    pub fn daily_hours(&self) -> f64 {
        self.daily_minutes() as f64 / 60.0
    }
}

impl Record for Shift {
    type Patch = ShiftPatch;
    const COLLECTION: &'static str = "shifts";

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn requested_id(patch: &ShiftPatch) -> Option<EntityId> {
        patch.id
    }

    fn from_patch(id: EntityId, patch: ShiftPatch) -> Result<Self> {
        Ok(Self {
            id,
            name: required_text(patch.name, Self::COLLECTION, "name")?,
            start: required(patch.start, Self::COLLECTION, "start")?,
            end: required(patch.end, Self::COLLECTION, "end")?,
            weekdays: patch.weekdays.unwrap_or_default(),
            active: patch.active.unwrap_or(true),
        })
    }

    fn merge(&mut self, patch: ShiftPatch) -> Result<()> {
        ensure_same_id(self.id, patch.id)?;
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(start) = patch.start {
            self.start = start;
        }
        if let Some(end) = patch.end {
            self.end = end;
        }
        if let Some(weekdays) = patch.weekdays {
            self.weekdays = weekdays;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RegistryError::MissingRequiredField {
                collection: Self::COLLECTION,
                field: "name",
            });
        }
        self.window().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::time::Weekday;

    #[test]
    fn test_shift_daily_hours() {
        let shift = Shift::from_patch(
            1,
            ShiftPatch::new(
                "Morning",
                TimeWindow::parse("08:00", "12:30").unwrap(),
                WeekdaySet::from([Weekday::Mon, Weekday::Wed]),
            ),
        )
        .unwrap();
        assert_eq!(shift.daily_minutes(), 270);
        assert_eq!(shift.daily_hours(), 4.5);
        assert_eq!(shift.window().to_string(), "08:00-12:30");
    }

    #[test]
    fn test_shift_rejects_inverted_window() {
        let patch: ShiftPatch =
            serde_json::from_str(r#"{"name": "Night", "start": "22:00", "end": "18:00"}"#).unwrap();
        let shift = Shift::from_patch(1, patch).unwrap();
        assert!(shift.validate().is_err());
    }

    #[test]
    fn test_shift_legacy_payload() {
        let patch: ShiftPatch = serde_json::from_str(
            r#"{"nome": "Noite", "horario_inicio": "19:00", "horario_fim": "22:00", "dias_semana": ["SEG", "QUA"]}"#,
        )
        .unwrap();
        let shift = Shift::from_patch(3, patch).unwrap();
        assert!(shift.weekdays.contains(Weekday::Wed));
        assert_eq!(shift.daily_minutes(), 180);

        let json = serde_json::to_value(&shift).unwrap();
        assert_eq!(json["start"], "19:00");
        assert_eq!(json["weekdays"], serde_json::json!(["mon", "wed"]));
    }
}

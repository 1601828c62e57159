//! Schedule entry model.
//!
//! A schedule entry is one time-bound offering of a curricular unit: which
//! course and unit, who teaches it, in which room and shift, between which
//! dates. The weekly pattern is either declared on the entry or inherited
//! from its shift (see [`crate::validation::ReferenceResolver`]).
//!
//! # Status
//! Only cancelled entries stop occupying their room and instructors.
//! Confirmed, postponed and in-progress entries all count as active.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::time::{date, DateRange, TimeWindow, WeekdaySet};
use crate::error::{RegistryError, Result};
use crate::store::{ensure_same_id, present, required, EntityId, Record};

/// Lifecycle status of a schedule entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleStatus {
    #[default]
    Confirmed,
    Postponed,
    InProgress,
    Cancelled,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScheduleStatus::Confirmed => "confirmed",
            ScheduleStatus::Postponed => "postponed",
            ScheduleStatus::InProgress => "in-progress",
            ScheduleStatus::Cancelled => "cancelled",
        })
    }
}

/// A time-bound offering of a curricular unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Store-assigned identity.
    pub id: EntityId,
    #[serde(alias = "curso_id")]
    pub course_id: EntityId,
    #[serde(alias = "unidade_id")]
    pub unit_id: EntityId,
    /// Teaching collaborators. Never empty, no repeats.
    #[serde(alias = "instrutor_ids")]
    pub instructor_ids: Vec<EntityId>,
    #[serde(alias = "sala_id")]
    pub room_id: EntityId,
    #[serde(alias = "turno_id")]
    pub shift_id: EntityId,
    #[serde(default, alias = "analista_id", skip_serializing_if = "Option::is_none")]
    pub analyst_id: Option<EntityId>,
    #[serde(default, alias = "assistente_id", skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<EntityId>,
    /// First day (inclusive).
    #[serde(with = "date", alias = "data_inicio")]
    pub start_date: NaiveDate,
    /// Last day (inclusive).
    #[serde(with = "date", alias = "data_fim")]
    pub end_date: NaiveDate,
    /// Explicit daily window. `None` = the shift's window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
    /// Explicit weekdays. `None` = the shift's weekdays.
    #[serde(default, alias = "dias_execucao", skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<WeekdaySet>,
    #[serde(default, alias = "qtd_alunos")]
    pub student_count: u32,
    #[serde(default, alias = "turma")]
    pub class_label: String,
    #[serde(default, alias = "observacoes")]
    pub notes: String,
    /// Free-form caller data, stored verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub status: ScheduleStatus,
}

/// Create/update payload for [`ScheduleEntry`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleEntryPatch {
    pub id: Option<EntityId>,
    #[serde(default, alias = "curso_id")]
    pub course_id: Option<EntityId>,
    #[serde(default, alias = "unidade_id")]
    pub unit_id: Option<EntityId>,
    #[serde(default, alias = "instrutor_ids")]
    pub instructor_ids: Option<Vec<EntityId>>,
    #[serde(default, alias = "sala_id")]
    pub room_id: Option<EntityId>,
    #[serde(default, alias = "turno_id")]
    pub shift_id: Option<EntityId>,
    #[serde(default, alias = "analista_id", deserialize_with = "present")]
    pub analyst_id: Option<Option<EntityId>>,
    #[serde(default, alias = "assistente_id", deserialize_with = "present")]
    pub assistant_id: Option<Option<EntityId>>,
    #[serde(default, with = "date::option", alias = "data_inicio")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "date::option", alias = "data_fim")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "present")]
    pub time_window: Option<Option<TimeWindow>>,
    #[serde(default, alias = "dias_execucao", deserialize_with = "present")]
    pub weekdays: Option<Option<WeekdaySet>>,
    #[serde(default, alias = "qtd_alunos")]
    pub student_count: Option<u32>,
    #[serde(default, alias = "turma")]
    pub class_label: Option<String>,
    #[serde(default, alias = "observacoes")]
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
}

impl ScheduleEntryPatch {
    /// Create payload with every required reference.
    pub fn new(
        course_id: EntityId,
        unit_id: EntityId,
        instructor_id: EntityId,
        room_id: EntityId,
        shift_id: EntityId,
        dates: DateRange,
    ) -> Self {
        Self {
            course_id: Some(course_id),
            unit_id: Some(unit_id),
            instructor_ids: Some(vec![instructor_id]),
            room_id: Some(room_id),
            shift_id: Some(shift_id),
            start_date: Some(dates.start),
            end_date: Some(dates.end),
            ..Self::default()
        }
    }

    /// Adds a co-instructor.
    pub fn with_instructor(mut self, instructor_id: EntityId) -> Self {
        self.instructor_ids
            .get_or_insert_with(Vec::new)
            .push(instructor_id);
        self
    }

    /// Sets the room.
    pub fn with_room(mut self, room_id: EntityId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    /// Sets the analyst.
    pub fn with_analyst(mut self, analyst_id: EntityId) -> Self {
        self.analyst_id = Some(Some(analyst_id));
        self
    }

    /// Sets the assistant.
    pub fn with_assistant(mut self, assistant_id: EntityId) -> Self {
        self.assistant_id = Some(Some(assistant_id));
        self
    }

    /// Sets the date range.
    pub fn with_dates(mut self, dates: DateRange) -> Self {
        self.start_date = Some(dates.start);
        self.end_date = Some(dates.end);
        self
    }

    /// Overrides the shift's daily window.
    pub fn with_time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(Some(window));
        self
    }

    /// Overrides the shift's weekdays.
    pub fn with_weekdays(mut self, weekdays: WeekdaySet) -> Self {
        self.weekdays = Some(Some(weekdays));
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: ScheduleStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the class label.
    pub fn with_class_label(mut self, label: impl Into<String>) -> Self {
        self.class_label = Some(label.into());
        self
    }

    /// Sets the student count.
    pub fn with_student_count(mut self, count: u32) -> Self {
        self.student_count = Some(count);
        self
    }

    /// Adds a metadata key.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Removes repeated ids, keeping first occurrences in order.
fn dedup_ids(ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

impl ScheduleEntry {
    /// The entry's inclusive date range.
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    /// Whether this entry has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status == ScheduleStatus::Cancelled
    }

    /// Whether `instructor_id` teaches this entry.
    pub fn has_instructor(&self, instructor_id: EntityId) -> bool {
        self.instructor_ids.contains(&instructor_id)
    }

    /// First of this entry's instructors that also teaches `other`.
    pub fn shared_instructor(&self, other: &ScheduleEntry) -> Option<EntityId> {
        self.instructor_ids
            .iter()
            .copied()
            .find(|id| other.has_instructor(*id))
    }
}

impl Record for ScheduleEntry {
    type Patch = ScheduleEntryPatch;
    const COLLECTION: &'static str = "schedule_entries";

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        !self.is_cancelled()
    }

    fn requested_id(patch: &ScheduleEntryPatch) -> Option<EntityId> {
        patch.id
    }

    fn from_patch(id: EntityId, patch: ScheduleEntryPatch) -> Result<Self> {
        Ok(Self {
            id,
            course_id: required(patch.course_id, Self::COLLECTION, "course_id")?,
            unit_id: required(patch.unit_id, Self::COLLECTION, "unit_id")?,
            instructor_ids: dedup_ids(required(
                patch.instructor_ids,
                Self::COLLECTION,
                "instructor_ids",
            )?),
            room_id: required(patch.room_id, Self::COLLECTION, "room_id")?,
            shift_id: required(patch.shift_id, Self::COLLECTION, "shift_id")?,
            analyst_id: patch.analyst_id.flatten(),
            assistant_id: patch.assistant_id.flatten(),
            start_date: required(patch.start_date, Self::COLLECTION, "start_date")?,
            end_date: required(patch.end_date, Self::COLLECTION, "end_date")?,
            time_window: patch.time_window.flatten(),
            weekdays: patch.weekdays.flatten(),
            student_count: patch.student_count.unwrap_or(0),
            class_label: patch.class_label.unwrap_or_default(),
            notes: patch.notes.unwrap_or_default(),
            metadata: patch.metadata.unwrap_or_default(),
            status: patch.status.unwrap_or_default(),
        })
    }

    fn merge(&mut self, patch: ScheduleEntryPatch) -> Result<()> {
        ensure_same_id(self.id, patch.id)?;
        if let Some(course_id) = patch.course_id {
            self.course_id = course_id;
        }
        if let Some(unit_id) = patch.unit_id {
            self.unit_id = unit_id;
        }
        if let Some(instructor_ids) = patch.instructor_ids {
            self.instructor_ids = dedup_ids(instructor_ids);
        }
        if let Some(room_id) = patch.room_id {
            self.room_id = room_id;
        }
        if let Some(shift_id) = patch.shift_id {
            self.shift_id = shift_id;
        }
        if let Some(analyst_id) = patch.analyst_id {
            self.analyst_id = analyst_id;
        }
        if let Some(assistant_id) = patch.assistant_id {
            self.assistant_id = assistant_id;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            self.end_date = end_date;
        }
        if let Some(time_window) = patch.time_window {
            self.time_window = time_window;
        }
        if let Some(weekdays) = patch.weekdays {
            self.weekdays = weekdays;
        }
        if let Some(student_count) = patch.student_count {
            self.student_count = student_count;
        }
        if let Some(class_label) = patch.class_label {
            self.class_label = class_label;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.instructor_ids.is_empty() {
            return Err(RegistryError::MissingRequiredField {
                collection: Self::COLLECTION,
                field: "instructor_ids",
            });
        }
        self.date_range().validate()?;
        if let Some(window) = &self.time_window {
            window.validate()?;
        }
        if self.weekdays.as_ref().is_some_and(WeekdaySet::is_empty) {
            return Err(RegistryError::invalid(
                "weekdays",
                "weekday set must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::time::{parse_date, Weekday};

    fn dates(start: &str, end: &str) -> DateRange {
        DateRange::new(parse_date(start, "s").unwrap(), parse_date(end, "e").unwrap())
    }

    fn entry(patch: ScheduleEntryPatch) -> ScheduleEntry {
        ScheduleEntry::from_patch(1, patch).unwrap()
    }

    #[test]
    fn test_entry_defaults() {
        let e = entry(ScheduleEntryPatch::new(1, 2, 3, 4, 5, dates("2025-03-03", "2025-03-28")));
        assert_eq!(e.status, ScheduleStatus::Confirmed);
        assert!(e.is_active());
        assert!(e.time_window.is_none());
        assert!(e.weekdays.is_none());
        assert!(e.validate().is_ok());
    }

    #[test]
    fn test_entry_instructors_deduplicated() {
        let e = entry(
            ScheduleEntryPatch::new(1, 2, 3, 4, 5, dates("2025-03-03", "2025-03-28"))
                .with_instructor(9)
                .with_instructor(3),
        );
        assert_eq!(e.instructor_ids, vec![3, 9]);

        let other = entry(
            ScheduleEntryPatch::new(1, 2, 9, 4, 5, dates("2025-03-03", "2025-03-28")),
        );
        assert_eq!(e.shared_instructor(&other), Some(9));
    }

    #[test]
    fn test_entry_validation() {
        let inverted = entry(ScheduleEntryPatch::new(1, 2, 3, 4, 5, dates("2025-03-28", "2025-03-03")));
        assert!(matches!(
            inverted.validate(),
            Err(RegistryError::InvalidField { field: "end_date", .. })
        ));

        let no_days = entry(
            ScheduleEntryPatch::new(1, 2, 3, 4, 5, dates("2025-03-03", "2025-03-28"))
                .with_weekdays(WeekdaySet::new()),
        );
        assert!(matches!(
            no_days.validate(),
            Err(RegistryError::InvalidField { field: "weekdays", .. })
        ));

        let no_instructors = entry(ScheduleEntryPatch {
            instructor_ids: Some(Vec::new()),
            ..ScheduleEntryPatch::new(1, 2, 3, 4, 5, dates("2025-03-03", "2025-03-28"))
        });
        assert!(no_instructors.validate().is_err());
    }

    #[test]
    fn test_cancelled_is_inactive() {
        let e = entry(
            ScheduleEntryPatch::new(1, 2, 3, 4, 5, dates("2025-03-03", "2025-03-28"))
                .with_status(ScheduleStatus::Cancelled),
        );
        assert!(!e.is_active());

        for status in [ScheduleStatus::Postponed, ScheduleStatus::InProgress] {
            let e = entry(
                ScheduleEntryPatch::new(1, 2, 3, 4, 5, dates("2025-03-03", "2025-03-28"))
                    .with_status(status),
            );
            assert!(e.is_active());
        }
    }

    #[test]
    fn test_legacy_payload() {
        let patch: ScheduleEntryPatch = serde_json::from_str(
            r#"{
                "curso_id": 1, "unidade_id": 2, "instrutor_ids": [3], "sala_id": 4, "turno_id": 5,
                "data_inicio": "03/03/2025", "data_fim": "2025-03-28",
                "dias_execucao": ["SEG", "QUA"], "qtd_alunos": 18, "turma": "T1",
                "status": "in-progress"
            }"#,
        )
        .unwrap();
        let e = entry(patch);
        assert_eq!(e.start_date, parse_date("2025-03-03", "d").unwrap());
        assert_eq!(e.weekdays, Some(WeekdaySet::from([Weekday::Mon, Weekday::Wed])));
        assert_eq!(e.status, ScheduleStatus::InProgress);
        assert_eq!(e.student_count, 18);

        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["start_date"], "2025-03-03");
        assert_eq!(json["status"], "in-progress");
    }

    #[test]
    fn test_patch_clears_explicit_window() {
        let mut e = entry(
            ScheduleEntryPatch::new(1, 2, 3, 4, 5, dates("2025-03-03", "2025-03-28"))
                .with_time_window(TimeWindow::parse("08:00", "10:00").unwrap()),
        );
        let patch: ScheduleEntryPatch =
            serde_json::from_str(r#"{"time_window": null, "notes": "moved"}"#).unwrap();
        e.merge(patch).unwrap();
        assert!(e.time_window.is_none());
        assert_eq!(e.notes, "moved");
    }
}

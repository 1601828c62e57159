//! Registry service: the write surface over every collection.
//!
//! # Responsibility
//! - Create/update/list/get for every entity kind.
//! - Run the validation pipeline on every schedule write.
//! - Keep each course's unit hours within its planned total.
//! - Batch-import curricular units atomically.
//! - Refuse to remove records that active entries still reference.
//!
//! # Invariants
//! - A failed operation leaves every collection unchanged.
//! - Collections are locked in alphabetical order of collection name:
//!   `calendars`, `collaborators`, `courses`, `curricular_units`,
//!   `instructor_availability`, `rooms`, `schedule_entries`, `shifts`.
//! - A schedule write holds the `schedule_entries` lock from the moment it
//!   reads existing entries until its commit, so two writers can never both
//!   pass the conflict check against the same snapshot.

use chrono::NaiveDate;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{RegistryError, Result};
use crate::import::{UnitBatch, UnitDraft};
use crate::models::{
    Availability, AvailabilityPatch, AvailabilitySlot, Calendar, CalendarPatch, Collaborator,
    CollaboratorPatch, Course, CoursePatch, CurricularUnit, Period, Room, RoomPatch,
    ScheduleEntry, ScheduleEntryPatch, ScheduleStatus, Shift, ShiftPatch, UnitPatch, WeekdaySet,
};
use crate::store::{
    required, Backend, CollectionReader, CollectionWriter, EntityId, EntityStore, FileBackend,
    MemoryBackend, Record,
};
use crate::validation::{Booking, Catalog, Conflict, Overload, ReferenceResolver, ScheduleWindow};

/// Tolerance for comparing hour sums.
const HOURS_EPSILON: f64 = 1e-6;

/// Outcome of a conflict preview. Nothing is committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictReport {
    /// Identity the candidate has or would be given.
    pub entry_id: EntityId,
    /// Room/instructor conflicts, ascending by existing entry identity.
    pub conflicts: Vec<Conflict>,
    /// Over-cap weeks, by instructor then week.
    pub overloads: Vec<Overload>,
}

impl ConflictReport {
    /// Whether the candidate would be accepted.
    pub fn is_clear(&self) -> bool {
        self.conflicts.is_empty() && self.overloads.is_empty()
    }
}

/// Planned vs allocated hours of a course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CourseHours {
    pub course_id: EntityId,
    /// The course's total hours.
    pub planned: f64,
    /// Sum of the declared hours of its active units.
    pub allocated: f64,
}

impl CourseHours {
    /// Planned hours not yet allocated to a unit.
    pub fn remaining(&self) -> f64 {
        self.planned - self.allocated
    }

    /// Whether allocation matches the plan exactly.
    pub fn is_balanced(&self) -> bool {
        (self.planned - self.allocated).abs() <= HOURS_EPSILON
    }
}

/// Guards held by a schedule operation, acquired in global lock order.
struct ScheduleLocks<'a, S> {
    collaborators: CollectionReader<'a, Collaborator>,
    courses: CollectionReader<'a, Course>,
    units: CollectionReader<'a, CurricularUnit>,
    rooms: CollectionReader<'a, Room>,
    schedules: S,
    shifts: CollectionReader<'a, Shift>,
}

impl<S> ScheduleLocks<'_, S> {
    fn catalog(&self) -> Catalog<'_> {
        Catalog {
            courses: self.courses.records(),
            units: self.units.records(),
            collaborators: self.collaborators.records(),
            rooms: self.rooms.records(),
            shifts: self.shifts.records(),
        }
    }
}

fn logged<T: Record>(event: &str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(record) => info!(
            "event={event} module=registry status=ok collection={} id={}",
            T::COLLECTION,
            record.id()
        ),
        Err(err @ RegistryError::Persistence(_)) => error!(
            "event={event} module=registry status=error collection={} error={err}",
            T::COLLECTION
        ),
        Err(err) => warn!(
            "event={event} module=registry status=rejected collection={} error={err}",
            T::COLLECTION
        ),
    }
    result
}

/// Field of the first active entry that satisfies `refers`.
fn referencing_entry(
    entries: &[ScheduleEntry],
    refers: impl Fn(&ScheduleEntry) -> Option<&'static str>,
) -> Option<&'static str> {
    entries
        .iter()
        .filter(|entry| entry.is_active())
        .find_map(refers)
}

/// Removes record `id` unless `blocker` names a field still referencing it.
fn commit_removal<T: Record>(
    mut writer: CollectionWriter<'_, T>,
    id: EntityId,
    blocker: Option<&'static str>,
) -> Result<T> {
    if let Some(field) = blocker {
        return Err(RegistryError::InvalidReference { field, id });
    }
    let record = writer.remove(id)?;
    writer.commit()?;
    Ok(record)
}

fn allocated_hours(course_id: EntityId, units: &[CurricularUnit]) -> f64 {
    units
        .iter()
        .filter(|unit| unit.course_id == course_id && unit.is_active())
        .map(CurricularUnit::declared_hours)
        .sum()
}

fn active_course(courses: &[Course], course_id: EntityId) -> Result<&Course> {
    courses
        .iter()
        .find(|course| course.id == course_id && course.is_active())
        .ok_or(RegistryError::InvalidReference {
            field: "course_id",
            id: course_id,
        })
}

/// Scheduling registry over all collections.
#[derive(Debug)]
pub struct Registry {
    config: EngineConfig,
    availability: EntityStore<Availability>,
    calendars: EntityStore<Calendar>,
    collaborators: EntityStore<Collaborator>,
    courses: EntityStore<Course>,
    units: EntityStore<CurricularUnit>,
    rooms: EntityStore<Room>,
    schedules: EntityStore<ScheduleEntry>,
    shifts: EntityStore<Shift>,
}

impl Registry {
    /// Opens a registry per `config`: file-backed under `data_dir` when set,
    /// in memory otherwise.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let backend: Arc<dyn Backend> = match &config.data_dir {
            Some(dir) => Arc::new(FileBackend::new(dir.clone())),
            None => Arc::new(MemoryBackend::new()),
        };
        Self::with_backend(backend, config)
    }

    /// Empty in-memory registry with default settings.
    pub fn in_memory() -> Result<Self> {
        Self::open(EngineConfig::default())
    }

    /// File-backed registry with default settings.
    pub fn open_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(EngineConfig::default().with_data_dir(dir.as_ref()))
    }

    /// Registry over an explicit backend.
    pub fn with_backend(backend: Arc<dyn Backend>, config: EngineConfig) -> Result<Self> {
        let registry = Self {
            availability: EntityStore::open(backend.clone())?,
            calendars: EntityStore::open(backend.clone())?,
            collaborators: EntityStore::open(backend.clone())?,
            courses: EntityStore::open(backend.clone())?,
            units: EntityStore::open(backend.clone())?,
            rooms: EntityStore::open(backend.clone())?,
            schedules: EntityStore::open(backend.clone())?,
            shifts: EntityStore::open(backend)?,
            config,
        };
        info!(
            "event=registry_open module=registry status=ok boundary={:?} week_start={:?}",
            registry.config.boundary, registry.config.week_start
        );
        Ok(registry)
    }

    /// Active settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- courses --------------------------------------------------------

    pub fn list_courses(&self) -> Vec<Course> {
        self.courses.list()
    }

    pub fn get_course(&self, id: EntityId) -> Result<Course> {
        self.courses.get(id)
    }

    pub fn create_course(&self, patch: CoursePatch) -> Result<Course> {
        logged("course_create", self.courses.create(patch))
    }

    /// Updates a course. With unit-hour enforcement on, the total may not
    /// drop below the hours already allocated to its active units.
    pub fn update_course(&self, id: EntityId, patch: CoursePatch) -> Result<Course> {
        logged("course_update", self.write_course(id, patch))
    }

    fn write_course(&self, id: EntityId, patch: CoursePatch) -> Result<Course> {
        let mut courses = self.courses.write();
        let units = self.units.read();
        let course = courses.update(id, patch)?;
        if course.is_active() {
            self.check_unit_hours(&course, units.records())?;
        }
        courses.commit()?;
        Ok(course)
    }

    /// Creates a course and its units together.
    ///
    /// Every unit must declare hours and the hours must add up to the
    /// course's total exactly. If the units cannot be persisted the course
    /// is removed again.
    pub fn create_course_with_units(
        &self,
        patch: CoursePatch,
        drafts: Vec<UnitDraft>,
    ) -> Result<(Course, Vec<CurricularUnit>)> {
        let result = self.write_course_with_units(patch, drafts);
        match &result {
            Ok((course, units)) => info!(
                "event=course_create_with_units module=registry status=ok id={} units={}",
                course.id,
                units.len()
            ),
            Err(err @ RegistryError::Persistence(_)) => error!(
                "event=course_create_with_units module=registry status=error error={err}"
            ),
            Err(err) => warn!(
                "event=course_create_with_units module=registry status=rejected error={err}"
            ),
        }
        result
    }

    fn write_course_with_units(
        &self,
        patch: CoursePatch,
        drafts: Vec<UnitDraft>,
    ) -> Result<(Course, Vec<CurricularUnit>)> {
        let mut courses = self.courses.write();
        let mut units = self.units.write();

        let course = courses.create(patch)?;
        let created = drafts
            .into_iter()
            .map(|draft| {
                if draft.hours.is_none() {
                    return Err(RegistryError::MissingRequiredField {
                        collection: CurricularUnit::COLLECTION,
                        field: "hours",
                    });
                }
                units.create(draft.into_patch(course.id))
            })
            .collect::<Result<Vec<_>>>()?;

        let allocated = allocated_hours(course.id, units.records());
        if (allocated - course.total_hours).abs() > HOURS_EPSILON {
            return Err(RegistryError::UnitHoursMismatch {
                course_id: course.id,
                planned: course.total_hours,
                allocated,
            });
        }

        courses.commit()?;
        if let Err(err) = units.commit() {
            warn!(
                "event=course_rollback module=registry status=start course_id={} error={err}",
                course.id
            );
            if let Err(rollback) = self.courses.remove(course.id) {
                error!(
                    "event=course_rollback module=registry status=error course_id={} error={rollback}",
                    course.id
                );
            }
            return Err(err);
        }
        Ok((course, created))
    }

    /// Planned vs allocated hours of a course.
    pub fn course_hours(&self, course_id: EntityId) -> Result<CourseHours> {
        let course = self.courses.get(course_id)?;
        let units = self.units.read();
        Ok(CourseHours {
            course_id,
            planned: course.total_hours,
            allocated: allocated_hours(course_id, units.records()),
        })
    }

    /// Deletes a course that no unit and no active entry references.
    pub fn remove_course(&self, id: EntityId) -> Result<Course> {
        let courses = self.courses.write();
        let units = self.units.read();
        let schedules = self.schedules.read();
        let blocker = if units.records().iter().any(|unit| unit.course_id == id) {
            Some("course_id")
        } else {
            referencing_entry(schedules.records(), |entry| {
                (entry.course_id == id).then_some("course_id")
            })
        };
        logged("course_remove", commit_removal(courses, id, blocker))
    }

    fn check_unit_hours(&self, course: &Course, units: &[CurricularUnit]) -> Result<()> {
        if !self.config.enforce_unit_hours {
            return Ok(());
        }
        let allocated = allocated_hours(course.id, units);
        if allocated > course.total_hours + HOURS_EPSILON {
            return Err(RegistryError::UnitHoursMismatch {
                course_id: course.id,
                planned: course.total_hours,
                allocated,
            });
        }
        Ok(())
    }

    // -- curricular units -----------------------------------------------

    pub fn list_units(&self) -> Vec<CurricularUnit> {
        self.units.list()
    }

    /// Units of one course, in insertion order.
    pub fn units_of_course(&self, course_id: EntityId) -> Vec<CurricularUnit> {
        self.units
            .read()
            .records()
            .iter()
            .filter(|unit| unit.course_id == course_id)
            .cloned()
            .collect()
    }

    pub fn get_unit(&self, id: EntityId) -> Result<CurricularUnit> {
        self.units.get(id)
    }

    /// Creates a unit of an active course.
    pub fn create_unit(&self, patch: UnitPatch) -> Result<CurricularUnit> {
        logged("unit_create", self.write_unit(None, patch))
    }

    /// Updates a unit. Moving it to another course requires that course to
    /// be active.
    pub fn update_unit(&self, id: EntityId, patch: UnitPatch) -> Result<CurricularUnit> {
        logged("unit_update", self.write_unit(Some(id), patch))
    }

    fn write_unit(&self, id: Option<EntityId>, patch: UnitPatch) -> Result<CurricularUnit> {
        let courses = self.courses.read();
        let mut units = self.units.write();
        let (unit, strict) = match id {
            Some(id) => {
                let previous_course = units.get(id).map(|unit| unit.course_id);
                let unit = units.update(id, patch)?;
                let moved = previous_course != Some(unit.course_id);
                (unit, moved)
            }
            None => (units.create(patch)?, true),
        };
        let course = if strict {
            Some(active_course(courses.records(), unit.course_id)?)
        } else {
            courses.get(unit.course_id)
        };
        if let Some(course) = course {
            self.check_unit_hours(course, units.records())?;
        }
        units.commit()?;
        Ok(unit)
    }

    /// Deletes a unit that no active entry references.
    pub fn remove_unit(&self, id: EntityId) -> Result<CurricularUnit> {
        let units = self.units.write();
        let schedules = self.schedules.read();
        let blocker = referencing_entry(schedules.records(), |entry| {
            (entry.unit_id == id).then_some("unit_id")
        });
        logged("unit_remove", commit_removal(units, id, blocker))
    }

    /// Imports a batch of units into `course_id`.
    ///
    /// The whole batch is rejected with `InvalidReference` when the course
    /// does not exist or is inactive. Units get sequential identities and
    /// are persisted with one write; any failure persists none of them.
    pub fn import_units(
        &self,
        course_id: EntityId,
        batch: impl Into<UnitBatch>,
    ) -> Result<Vec<CurricularUnit>> {
        let result = self.write_unit_batch(course_id, batch.into());
        match &result {
            Ok(created) => info!(
                "event=unit_import module=registry status=ok course_id={course_id} units={}",
                created.len()
            ),
            Err(err) => warn!(
                "event=unit_import module=registry status=rejected course_id={course_id} error={err}"
            ),
        }
        result
    }

    fn write_unit_batch(&self, course_id: EntityId, batch: UnitBatch) -> Result<Vec<CurricularUnit>> {
        let courses = self.courses.read();
        let course = active_course(courses.records(), course_id)?;
        let drafts = batch.into_drafts()?;

        let mut units = self.units.write();
        let created = drafts
            .into_iter()
            .map(|draft| units.create(draft.into_patch(course_id)))
            .collect::<Result<Vec<_>>>()?;
        self.check_unit_hours(course, units.records())?;
        units.commit()?;
        Ok(created)
    }

    // -- collaborators, rooms, shifts, calendars ------------------------

    pub fn list_collaborators(&self) -> Vec<Collaborator> {
        self.collaborators.list()
    }

    pub fn get_collaborator(&self, id: EntityId) -> Result<Collaborator> {
        self.collaborators.get(id)
    }

    pub fn create_collaborator(&self, patch: CollaboratorPatch) -> Result<Collaborator> {
        logged("collaborator_create", self.collaborators.create(patch))
    }

    pub fn update_collaborator(&self, id: EntityId, patch: CollaboratorPatch) -> Result<Collaborator> {
        logged("collaborator_update", self.collaborators.update(id, patch))
    }

    /// Deletes a collaborator that no active entry and no availability
    /// record references.
    pub fn remove_collaborator(&self, id: EntityId) -> Result<Collaborator> {
        let collaborators = self.collaborators.write();
        let availability = self.availability.read();
        let schedules = self.schedules.read();
        let blocker = if availability
            .records()
            .iter()
            .any(|record| record.instructor_id == id)
        {
            Some("instructor_id")
        } else {
            referencing_entry(schedules.records(), |entry| {
                if entry.has_instructor(id) {
                    Some("instructor_ids")
                } else if entry.analyst_id == Some(id) {
                    Some("analyst_id")
                } else if entry.assistant_id == Some(id) {
                    Some("assistant_id")
                } else {
                    None
                }
            })
        };
        logged("collaborator_remove", commit_removal(collaborators, id, blocker))
    }

    pub fn list_rooms(&self) -> Vec<Room> {
        self.rooms.list()
    }

    pub fn get_room(&self, id: EntityId) -> Result<Room> {
        self.rooms.get(id)
    }

    pub fn create_room(&self, patch: RoomPatch) -> Result<Room> {
        logged("room_create", self.rooms.create(patch))
    }

    pub fn update_room(&self, id: EntityId, patch: RoomPatch) -> Result<Room> {
        logged("room_update", self.rooms.update(id, patch))
    }

    /// Deletes a room that no active entry references.
    pub fn remove_room(&self, id: EntityId) -> Result<Room> {
        let rooms = self.rooms.write();
        let schedules = self.schedules.read();
        let blocker = referencing_entry(schedules.records(), |entry| {
            (entry.room_id == id).then_some("room_id")
        });
        logged("room_remove", commit_removal(rooms, id, blocker))
    }

    pub fn list_shifts(&self) -> Vec<Shift> {
        self.shifts.list()
    }

    pub fn get_shift(&self, id: EntityId) -> Result<Shift> {
        self.shifts.get(id)
    }

    pub fn create_shift(&self, patch: ShiftPatch) -> Result<Shift> {
        logged("shift_create", self.shifts.create(patch))
    }

    pub fn update_shift(&self, id: EntityId, patch: ShiftPatch) -> Result<Shift> {
        logged("shift_update", self.shifts.update(id, patch))
    }

    /// Deletes a shift that no active entry and no availability slot
    /// references.
    pub fn remove_shift(&self, id: EntityId) -> Result<Shift> {
        let availability = self.availability.read();
        let schedules = self.schedules.read();
        let shifts = self.shifts.write();
        let blocker = if availability
            .records()
            .iter()
            .any(|record| record.slots.iter().any(|slot| slot.shift_id == id))
        {
            Some("slots")
        } else {
            referencing_entry(schedules.records(), |entry| {
                (entry.shift_id == id).then_some("shift_id")
            })
        };
        logged("shift_remove", commit_removal(shifts, id, blocker))
    }

    pub fn list_calendars(&self) -> Vec<Calendar> {
        self.calendars.list()
    }

    pub fn get_calendar(&self, id: EntityId) -> Result<Calendar> {
        self.calendars.get(id)
    }

    /// Creates a calendar. A second calendar for the same year is a
    /// `DuplicateIdentity`.
    pub fn create_calendar(&self, patch: CalendarPatch) -> Result<Calendar> {
        logged("calendar_create", self.calendars.create(patch))
    }

    pub fn update_calendar(&self, id: EntityId, patch: CalendarPatch) -> Result<Calendar> {
        logged("calendar_update", self.calendars.update(id, patch))
    }

    pub fn remove_calendar(&self, id: EntityId) -> Result<Calendar> {
        logged("calendar_remove", self.calendars.remove(id))
    }

    /// Calendar of `year`, if one exists.
    pub fn calendar_for_year(&self, year: i32) -> Option<Calendar> {
        self.calendars
            .read()
            .records()
            .iter()
            .find(|calendar| calendar.year == year)
            .cloned()
    }

    // -- instructor availability ----------------------------------------

    pub fn list_availability(&self) -> Vec<Availability> {
        self.availability.list()
    }

    pub fn get_availability(&self, id: EntityId) -> Result<Availability> {
        self.availability.get(id)
    }

    /// Record of `instructor_id` for `period` of `year`, if one exists.
    pub fn find_availability(
        &self,
        instructor_id: EntityId,
        year: i32,
        period: Period,
    ) -> Option<Availability> {
        self.availability
            .read()
            .records()
            .iter()
            .find(|record| {
                record.instructor_id == instructor_id
                    && record.year == year
                    && record.period == period
            })
            .cloned()
    }

    /// Creates or replaces the availability of an instructor for one
    /// period.
    ///
    /// The record is matched on instructor, year and period; fields present
    /// in `patch` overwrite the stored ones. The instructor and every slot's
    /// shift must be active.
    pub fn set_availability(&self, patch: AvailabilityPatch) -> Result<Availability> {
        logged("availability_set", self.write_availability(patch))
    }

    fn write_availability(&self, patch: AvailabilityPatch) -> Result<Availability> {
        let collaborators = self.collaborators.read();
        let mut records = self.availability.write();
        let shifts = self.shifts.read();

        let instructor_id = required(patch.instructor_id, Availability::COLLECTION, "instructor_id")?;
        let year = required(patch.year, Availability::COLLECTION, "year")?;
        let period = required(patch.period, Availability::COLLECTION, "period")?;
        let existing = records
            .records()
            .iter()
            .find(|r| r.instructor_id == instructor_id && r.year == year && r.period == period)
            .map(|r| r.id);
        let record = match existing {
            Some(id) => records.update(id, patch)?,
            None => records.create(patch)?,
        };

        if !collaborators
            .records()
            .iter()
            .any(|c| c.id == record.instructor_id && c.is_active())
        {
            return Err(RegistryError::InvalidReference {
                field: "instructor_id",
                id: record.instructor_id,
            });
        }
        for slot in &record.slots {
            if !shifts
                .records()
                .iter()
                .any(|shift| shift.id == slot.shift_id && shift.is_active())
            {
                return Err(RegistryError::InvalidReference {
                    field: "shift_id",
                    id: slot.shift_id,
                });
            }
        }
        records.commit()?;
        Ok(record)
    }

    pub fn remove_availability(&self, id: EntityId) -> Result<Availability> {
        logged("availability_remove", self.availability.remove(id))
    }

    /// `(weekday, shift)` slots `instructor_id` already teaches during
    /// `period` of `year`.
    ///
    /// A slot counts when an active entry of the instructor meets on that
    /// weekday at least once inside the period.
    pub fn instructor_busy_slots(
        &self,
        instructor_id: EntityId,
        year: i32,
        period: Period,
    ) -> Result<BTreeSet<AvailabilitySlot>> {
        let range = period.bounds(year)?;
        let locks = self.lock_schedules(EntityStore::read);
        let bookings = ReferenceResolver::history(locks.catalog()).bookings(locks.schedules.records());

        let mut busy = BTreeSet::new();
        for booking in bookings
            .iter()
            .filter(|booking| booking.entry.has_instructor(instructor_id))
        {
            for weekday in booking.window.weekdays.iter() {
                let meetings = ScheduleWindow::new(
                    booking.window.dates,
                    WeekdaySet::from([weekday]),
                    booking.window.times,
                );
                if meetings.occurrences_in(&range) > 0 {
                    busy.insert(AvailabilitySlot::new(weekday, booking.entry.shift_id));
                }
            }
        }
        Ok(busy)
    }

    // -- schedule entries -----------------------------------------------

    fn lock_schedules<'a, S>(
        &'a self,
        acquire: impl FnOnce(&'a EntityStore<ScheduleEntry>) -> S,
    ) -> ScheduleLocks<'a, S> {
        let collaborators = self.collaborators.read();
        let courses = self.courses.read();
        let units = self.units.read();
        let rooms = self.rooms.read();
        let schedules = acquire(&self.schedules);
        let shifts = self.shifts.read();
        ScheduleLocks {
            collaborators,
            courses,
            units,
            rooms,
            schedules,
            shifts,
        }
    }

    /// Runs the validation pipeline on a prepared candidate.
    fn admit(
        &self,
        catalog: Catalog<'_>,
        candidate: &ScheduleEntry,
        existing: &[ScheduleEntry],
    ) -> Result<()> {
        let window = ReferenceResolver::new(catalog).resolve(candidate)?;
        if candidate.is_cancelled() {
            return Ok(());
        }
        let candidate = Booking {
            entry: candidate,
            window,
        };
        let bookings = ReferenceResolver::history(catalog).bookings(existing);
        self.config
            .conflict_checker()
            .check(&candidate, &bookings)?;
        self.config
            .aggregator()
            .check(&candidate, &bookings, catalog.collaborators)
    }

    fn write_schedule(&self, id: Option<EntityId>, patch: ScheduleEntryPatch) -> Result<ScheduleEntry> {
        let mut locks = self.lock_schedules(EntityStore::write);
        let candidate = match id {
            Some(id) => locks.schedules.prepare_update(id, patch)?,
            None => locks.schedules.prepare_create(patch)?,
        };
        self.admit(locks.catalog(), &candidate, locks.schedules.records())?;
        match id {
            Some(_) => locks.schedules.replace(candidate.clone())?,
            None => locks.schedules.insert(candidate.clone())?,
        }
        locks.schedules.commit()?;
        Ok(candidate)
    }

    pub fn list_schedules(&self) -> Vec<ScheduleEntry> {
        self.schedules.list()
    }

    pub fn get_schedule(&self, id: EntityId) -> Result<ScheduleEntry> {
        self.schedules.get(id)
    }

    /// Creates a schedule entry after reference, conflict and weekly-hour
    /// checks.
    pub fn create_schedule(&self, patch: ScheduleEntryPatch) -> Result<ScheduleEntry> {
        logged("schedule_create", self.write_schedule(None, patch))
    }

    /// Updates a schedule entry; the merged entry is re-validated in full
    /// and never conflicts with its own previous version.
    pub fn update_schedule(&self, id: EntityId, patch: ScheduleEntryPatch) -> Result<ScheduleEntry> {
        logged("schedule_update", self.write_schedule(Some(id), patch))
    }

    /// Cancels a schedule entry, freeing its room and instructors.
    ///
    /// References are not re-checked, so entries pointing at since-
    /// deactivated records can still be cancelled.
    pub fn cancel_schedule(&self, id: EntityId) -> Result<ScheduleEntry> {
        logged(
            "schedule_cancel",
            self.schedules.update(
                id,
                ScheduleEntryPatch::default().with_status(ScheduleStatus::Cancelled),
            ),
        )
    }

    /// Deletes a schedule entry. Its identity is never reused.
    pub fn remove_schedule(&self, id: EntityId) -> Result<ScheduleEntry> {
        logged("schedule_remove", self.schedules.remove(id))
    }

    /// Previews a create (`existing_id` = `None`) or an update without
    /// committing anything.
    ///
    /// Reference failures are returned as errors; conflicts and over-cap
    /// weeks are all listed in the report.
    pub fn check_conflicts(
        &self,
        patch: ScheduleEntryPatch,
        existing_id: Option<EntityId>,
    ) -> Result<ConflictReport> {
        let locks = self.lock_schedules(EntityStore::write);
        let candidate = match existing_id {
            Some(id) => locks.schedules.prepare_update(id, patch)?,
            None => locks.schedules.prepare_create(patch)?,
        };
        let catalog = locks.catalog();
        let window = ReferenceResolver::new(catalog).resolve(&candidate)?;

        let mut report = ConflictReport {
            entry_id: candidate.id,
            conflicts: Vec::new(),
            overloads: Vec::new(),
        };
        if !candidate.is_cancelled() {
            let booking = Booking {
                entry: &candidate,
                window,
            };
            let bookings = ReferenceResolver::history(catalog).bookings(locks.schedules.records());
            report.conflicts = self
                .config
                .conflict_checker()
                .find_conflicts(&booking, &bookings);
            report.overloads =
                self.config
                    .aggregator()
                    .find_overloads(&booking, &bookings, catalog.collaborators);
        }
        debug!(
            "event=schedule_preview module=registry status=ok entry_id={} conflicts={} overloads={}",
            report.entry_id,
            report.conflicts.len(),
            report.overloads.len()
        );
        Ok(report)
    }

    /// Effective weekly pattern of an existing entry, tolerating inactive
    /// references.
    pub fn resolve_schedule(&self, id: EntityId) -> Result<ScheduleWindow> {
        let locks = self.lock_schedules(EntityStore::read);
        let entry = locks.schedules.get(id).ok_or(RegistryError::NotFound {
            collection: ScheduleEntry::COLLECTION,
            id,
        })?;
        ReferenceResolver::history(locks.catalog()).resolve(entry)
    }

    /// Active entries booked into `room_id`, by start date.
    pub fn schedules_for_room(&self, room_id: EntityId) -> Vec<ScheduleEntry> {
        self.active_schedules(|entry| entry.room_id == room_id)
    }

    /// Active entries taught by `instructor_id`, by start date.
    pub fn schedules_for_instructor(&self, instructor_id: EntityId) -> Vec<ScheduleEntry> {
        self.active_schedules(|entry| entry.has_instructor(instructor_id))
    }

    fn active_schedules(&self, keep: impl Fn(&ScheduleEntry) -> bool) -> Vec<ScheduleEntry> {
        let mut entries: Vec<ScheduleEntry> = self
            .schedules
            .read()
            .records()
            .iter()
            .filter(|entry| entry.is_active() && keep(*entry))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| (entry.start_date, entry.id));
        entries
    }

    /// Hours committed by `instructor_id` in the week containing `date`.
    pub fn instructor_weekly_hours(&self, instructor_id: EntityId, date: NaiveDate) -> f64 {
        let locks = self.lock_schedules(EntityStore::read);
        let bookings = ReferenceResolver::history(locks.catalog()).bookings(locks.schedules.records());
        let week = self.config.week_start.week_of(date);
        self.config
            .aggregator()
            .committed_hours(instructor_id, week, &bookings)
    }
}

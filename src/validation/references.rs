//! Reference resolution for schedule entries.
//!
//! A schedule entry only stores identities. Before any overlap computation
//! the resolver looks every one of them up, fresh, in the current
//! collections and derives the entry's effective [`ScheduleWindow`]
//! (explicit window/weekdays, falling back to the shift's).

use log::warn;

use super::overlap::ScheduleWindow;
use crate::error::{RegistryError, Result};
use crate::models::{Collaborator, Course, CurricularUnit, Room, ScheduleEntry, Shift};
use crate::store::{EntityId, Record};

/// Borrowed view of the collections a schedule entry refers to.
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'a> {
    pub courses: &'a [Course],
    pub units: &'a [CurricularUnit],
    pub collaborators: &'a [Collaborator],
    pub rooms: &'a [Room],
    pub shifts: &'a [Shift],
}

/// Whether inactive referenced records are acceptable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferenceMode {
    /// Every reference must exist and be active. Used for all writes.
    #[default]
    Strict,
    /// References must exist; inactive ones are accepted. Read-time only.
    History,
}

/// A schedule entry paired with its resolved weekly pattern.
#[derive(Debug, Clone)]
pub struct Booking<'e> {
    pub entry: &'e ScheduleEntry,
    pub window: ScheduleWindow,
}

impl Booking<'_> {
    /// Identity of the booked entry.
    pub fn id(&self) -> EntityId {
        self.entry.id
    }
}

/// Resolves schedule-entry references against a [`Catalog`].
#[derive(Debug, Clone, Copy)]
pub struct ReferenceResolver<'a> {
    catalog: Catalog<'a>,
    mode: ReferenceMode,
}

impl<'a> ReferenceResolver<'a> {
    /// Strict resolver for writes.
    pub fn new(catalog: Catalog<'a>) -> Self {
        Self {
            catalog,
            mode: ReferenceMode::Strict,
        }
    }

    /// Resolver that tolerates inactive references, for historical reads.
    pub fn history(catalog: Catalog<'a>) -> Self {
        Self {
            catalog,
            mode: ReferenceMode::History,
        }
    }

    /// The resolver's mode.
    pub fn mode(&self) -> ReferenceMode {
        self.mode
    }

    fn lookup<T: Record>(
        &self,
        records: &'a [T],
        field: &'static str,
        id: EntityId,
    ) -> Result<&'a T> {
        match records.iter().find(|record| record.id() == id) {
            Some(record) if record.is_active() || self.mode == ReferenceMode::History => {
                Ok(record)
            }
            _ => Err(RegistryError::InvalidReference { field, id }),
        }
    }

    /// Checks every reference of `entry` and returns its effective window.
    ///
    /// Order of checks: course, unit (and that it belongs to the course),
    /// instructors, analyst, assistant, room, shift.
    pub fn resolve(&self, entry: &ScheduleEntry) -> Result<ScheduleWindow> {
        self.lookup(self.catalog.courses, "course_id", entry.course_id)?;
        let unit = self.lookup(self.catalog.units, "unit_id", entry.unit_id)?;
        if unit.course_id != entry.course_id {
            return Err(RegistryError::InvalidReference {
                field: "unit_id",
                id: entry.unit_id,
            });
        }
        for instructor_id in &entry.instructor_ids {
            self.lookup(self.catalog.collaborators, "instructor_ids", *instructor_id)?;
        }
        if let Some(analyst_id) = entry.analyst_id {
            self.lookup(self.catalog.collaborators, "analyst_id", analyst_id)?;
        }
        if let Some(assistant_id) = entry.assistant_id {
            self.lookup(self.catalog.collaborators, "assistant_id", assistant_id)?;
        }
        self.lookup(self.catalog.rooms, "room_id", entry.room_id)?;
        self.window_of(entry)
    }

    /// Effective window of `entry`, resolving only its shift.
    pub fn window_of(&self, entry: &ScheduleEntry) -> Result<ScheduleWindow> {
        let shift = self.lookup(self.catalog.shifts, "shift_id", entry.shift_id)?;
        let times = entry.time_window.unwrap_or_else(|| shift.window());
        times.validate()?;
        let weekdays = entry
            .weekdays
            .clone()
            .unwrap_or_else(|| shift.weekdays.clone());
        if weekdays.is_empty() {
            return Err(RegistryError::invalid(
                "weekdays",
                format!(
                    "entry declares no weekdays and shift {} has none",
                    shift.id
                ),
            ));
        }
        Ok(ScheduleWindow::new(entry.date_range(), weekdays, times))
    }

    /// Bookings of every active entry, in ascending identity order.
    ///
    /// Entries whose window cannot be derived (e.g. their shift was removed)
    /// are skipped with a warning.
    pub fn bookings<'e>(&self, entries: &'e [ScheduleEntry]) -> Vec<Booking<'e>> {
        let mut bookings: Vec<Booking<'e>> = entries
            .iter()
            .filter(|entry| entry.is_active())
            .filter_map(|entry| match self.window_of(entry) {
                Ok(window) => Some(Booking { entry, window }),
                Err(err) => {
                    warn!(
                        "event=booking_skipped module=validation status=error entry_id={} error={}",
                        entry.id, err
                    );
                    None
                }
            })
            .collect();
        bookings.sort_by_key(Booking::id);
        bookings
    }
}

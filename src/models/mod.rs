//! Academic scheduling domain models.
//!
//! Registry records and the time primitives they are built from. Every
//! record implements [`Record`](crate::store::Record) and has a companion
//! `*Patch` payload used for both create and partial update.
//!
//! # Entities
//!
//! | Record | Collection | Referenced by |
//! |--------|------------|---------------|
//! | Course | `courses` | CurricularUnit, ScheduleEntry |
//! | CurricularUnit | `curricular_units` | ScheduleEntry |
//! | Collaborator | `collaborators` | ScheduleEntry (instructors, analyst, assistant) |
//! | Room | `rooms` | ScheduleEntry |
//! | Shift | `shifts` | ScheduleEntry |
//! | Calendar | `calendars` | |
//! | Availability | `instructor_availability` | |
//! | ScheduleEntry | `schedule_entries` | |

mod availability;
mod calendar;
mod collaborator;
mod course;
mod room;
mod schedule;
mod shift;
pub(crate) mod time;
mod unit;

pub use availability::{Availability, AvailabilityPatch, AvailabilitySlot, Period};
pub use calendar::{Calendar, CalendarPatch, MonthDays};
pub use collaborator::{Collaborator, CollaboratorPatch, Role};
pub use course::{Course, CoursePatch};
pub use room::{Room, RoomPatch};
pub use schedule::{ScheduleEntry, ScheduleEntryPatch, ScheduleStatus};
pub use shift::{Shift, ShiftPatch};
pub use time::{parse_date, parse_time, DateRange, TimeWindow, Weekday, WeekdaySet};
pub use unit::{CurricularUnit, UnitPatch};

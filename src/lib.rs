//! Academic course scheduling core.
//!
//! Keeps the catalog of a teaching institution (courses, curricular units,
//! collaborators, rooms, shifts, calendars) and the schedule entries that
//! book them, refusing any entry that would double-book a room or an
//! instructor or push an instructor past their weekly hour cap.
//!
//! # Modules
//!
//! - **`models`**: Domain records: `Course`, `CurricularUnit`, `Collaborator`,
//!   `Room`, `Shift`, `Calendar`, `ScheduleEntry`, `Availability`, and the
//!   time primitives `TimeWindow`, `DateRange`, `WeekdaySet`
//! - **`store`**: Persisted collections with sequential identities and
//!   staged, all-or-nothing writes
//! - **`validation`**: Reference resolution, overlap detection, conflict
//!   checking, weekly hour aggregation
//! - **`import`**: Curricular unit batch payloads
//! - **`registry`**: The write surface tying store and validation together
//! - **`config`**: TOML engine settings
//!
//! # Example
//!
//! ```
//! use course_scheduler::models::{
//!     CollaboratorPatch, CoursePatch, DateRange, RoomPatch, ScheduleEntryPatch, ShiftPatch,
//!     TimeWindow, UnitPatch, Weekday, WeekdaySet,
//! };
//! use course_scheduler::{Registry, RegistryError};
//!
//! let registry = Registry::in_memory().unwrap();
//! let course = registry.create_course(CoursePatch::new("Python", "FIC", 160.0)).unwrap();
//! let unit = registry.create_unit(UnitPatch::new(course.id, "Basics")).unwrap();
//! let ana = registry.create_collaborator(CollaboratorPatch::new("Ana Souza")).unwrap();
//! let lab = registry.create_room(RoomPatch::new("Lab 1", 20)).unwrap();
//! let morning = registry
//!     .create_shift(ShiftPatch::new(
//!         "Morning",
//!         TimeWindow::parse("08:00", "12:00").unwrap(),
//!         WeekdaySet::from([Weekday::Mon, Weekday::Wed]),
//!     ))
//!     .unwrap();
//!
//! let march = DateRange::new(
//!     chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
//!     chrono::NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
//! );
//! let entry = ScheduleEntryPatch::new(course.id, unit.id, ana.id, lab.id, morning.id, march);
//! registry.create_schedule(entry.clone()).unwrap();
//!
//! let err = registry.create_schedule(entry).unwrap_err();
//! assert!(matches!(err, RegistryError::SchedulingConflict { .. }));
//! ```

pub mod config;
pub mod error;
pub mod import;
pub mod models;
pub mod registry;
pub mod store;
pub mod validation;

pub use config::EngineConfig;
pub use error::{PersistenceError, RegistryError, Result};
pub use registry::{ConflictReport, CourseHours, Registry};

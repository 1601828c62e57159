//! Schedule-entry validation pipeline.
//!
//! Every schedule write runs, in order:
//! 1. [`ReferenceResolver`]: every referenced record exists and is active,
//!    and the entry's effective weekly pattern is derived.
//! 2. [`ConflictChecker`]: no room or instructor is double-booked, using the
//!    [`OverlapDetector`] pairwise.
//! 3. [`WeeklyHourAggregator`]: no capped instructor exceeds their weekly
//!    hours.
//!
//! A payload that fails a step never reaches the next one. The pipeline only
//! reads; persisting is the caller's job.

mod conflict;
mod overlap;
mod references;
mod workload;

pub use conflict::{Conflict, ConflictChecker, ConflictDimension};
pub use overlap::{BoundaryPolicy, OverlapDetector, ScheduleWindow};
pub use references::{Booking, Catalog, ReferenceMode, ReferenceResolver};
pub use workload::{Overload, WeekStart, WeeklyHourAggregator};

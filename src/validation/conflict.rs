//! Room and instructor double-booking checks.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::overlap::OverlapDetector;
use super::references::Booking;
use crate::error::{RegistryError, Result};
use crate::store::EntityId;

/// The shared resource two entries collide on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDimension {
    Room,
    Instructor,
}

impl fmt::Display for ConflictDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictDimension::Room => f.write_str("room"),
            ConflictDimension::Instructor => f.write_str("instructor"),
        }
    }
}

/// One detected double booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// The existing entry the candidate collides with.
    pub entry_id: EntityId,
    pub dimension: ConflictDimension,
    /// The shared instructor, for instructor conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor_id: Option<EntityId>,
}

impl From<Conflict> for RegistryError {
    fn from(conflict: Conflict) -> Self {
        RegistryError::SchedulingConflict {
            entry_id: conflict.entry_id,
            dimension: conflict.dimension,
        }
    }
}

/// Checks a candidate booking against existing bookings.
///
/// Existing bookings that are cancelled or carry the candidate's own
/// identity are ignored. Each sharing dimension is evaluated independently,
/// and results are ordered by ascending entry identity (room before
/// instructor for the same entry).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictChecker {
    detector: OverlapDetector,
}

impl ConflictChecker {
    /// Creates a checker using `detector` for the pairwise test.
    pub fn new(detector: OverlapDetector) -> Self {
        Self { detector }
    }

    /// Every conflict of `candidate` with `existing`.
    pub fn find_conflicts(&self, candidate: &Booking<'_>, existing: &[Booking<'_>]) -> Vec<Conflict> {
        let mut others: Vec<&Booking<'_>> = existing
            .iter()
            .filter(|other| other.id() != candidate.id() && !other.entry.is_cancelled())
            .collect();
        others.sort_by_key(|other| other.id());

        let mut conflicts = Vec::new();
        for other in others {
            let same_room = other.entry.room_id == candidate.entry.room_id;
            let shared_instructor = candidate.entry.shared_instructor(other.entry);
            if !same_room && shared_instructor.is_none() {
                continue;
            }
            if !self.detector.overlaps(&candidate.window, &other.window) {
                continue;
            }
            if same_room {
                conflicts.push(Conflict {
                    entry_id: other.id(),
                    dimension: ConflictDimension::Room,
                    instructor_id: None,
                });
            }
            if let Some(instructor_id) = shared_instructor {
                conflicts.push(Conflict {
                    entry_id: other.id(),
                    dimension: ConflictDimension::Instructor,
                    instructor_id: Some(instructor_id),
                });
            }
        }
        conflicts
    }

    /// Fails with the first conflict found, if any.
    pub fn check(&self, candidate: &Booking<'_>, existing: &[Booking<'_>]) -> Result<()> {
        match self.find_conflicts(candidate, existing).into_iter().next() {
            Some(conflict) => Err(conflict.into()),
            None => Ok(()),
        }
    }
}

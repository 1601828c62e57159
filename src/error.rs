//! Error types for registry and scheduling operations.
//!
//! Every failure is synchronous and carries enough structured detail
//! (collection names, field names, ids, hour totals) for a caller to render
//! a precise message. No operation persists anything before its last
//! validation step, so an `Err` always means stored state is unchanged.

use chrono::NaiveDate;
use thiserror::Error;

use crate::store::EntityId;
use crate::validation::ConflictDimension;

/// Errors raised by an entity store backend.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on collection `{collection}`: {source}")]
    Io {
        collection: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode collection `{collection}`: {source}")]
    Encode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode collection `{collection}`: {source}")]
    Decode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors returned by the registry and the validation pipeline.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{collection}: no record with id {id}")]
    NotFound {
        collection: &'static str,
        id: EntityId,
    },

    #[error("{collection}: required field `{field}` is missing")]
    MissingRequiredField {
        collection: &'static str,
        field: &'static str,
    },

    #[error("{collection}: identity `{key}` is already taken")]
    DuplicateIdentity {
        collection: &'static str,
        key: String,
    },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("invalid `{field}` reference to record {id}")]
    InvalidReference { field: &'static str, id: EntityId },

    #[error("{dimension} conflict with schedule entry {entry_id}")]
    SchedulingConflict {
        entry_id: EntityId,
        dimension: ConflictDimension,
    },

    #[error(
        "instructor {instructor_id} would be committed to {total}h in the week of {week} (cap {cap}h)"
    )]
    WeeklyHourLimitExceeded {
        instructor_id: EntityId,
        week: NaiveDate,
        total: f64,
        cap: f64,
    },

    #[error("course {course_id} plans {planned}h but its units add up to {allocated}h")]
    UnitHoursMismatch {
        course_id: EntityId,
        planned: f64,
        allocated: f64,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

//! Record contract shared by every stored entity.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Debug;

use crate::error::{RegistryError, Result};

/// Store-assigned sequential identity, unique within one collection.
pub type EntityId = u64;

/// An entity owned by an [`EntityStore`](super::EntityStore).
///
/// Each record has a companion `Patch` type whose fields are all optional.
/// The same patch shape is used to create a record (required fields must be
/// present) and to update one (present fields are merged over the record).
pub trait Record: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Partial payload with every field optional.
    type Patch: Clone + Debug + Default + Send;

    /// Collection name, also the persisted document name.
    const COLLECTION: &'static str;

    /// Identity of this record.
    fn id(&self) -> EntityId;

    /// Soft-delete flag. Inactive records stay readable for history.
    fn is_active(&self) -> bool;

    /// Identity explicitly requested by a patch, if any.
    fn requested_id(patch: &Self::Patch) -> Option<EntityId>;

    /// Builds a new record from a create payload.
    fn from_patch(id: EntityId, patch: Self::Patch) -> Result<Self>;

    /// Merges a partial payload over this record.
    fn merge(&mut self, patch: Self::Patch) -> Result<()>;

    /// Checks record-local invariants. Called on every write path.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Secondary unique key within the collection (e.g. calendar year).
    fn natural_key(&self) -> Option<String> {
        None
    }
}

/// Unwraps a required patch field.
pub(crate) fn required<T>(value: Option<T>, collection: &'static str, field: &'static str) -> Result<T> {
    value.ok_or(RegistryError::MissingRequiredField { collection, field })
}

/// Unwraps a required text field; blank text counts as missing.
pub(crate) fn required_text(
    value: Option<String>,
    collection: &'static str,
    field: &'static str,
) -> Result<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(RegistryError::MissingRequiredField { collection, field }),
    }
}

/// Rejects an update payload that tries to change a record's identity.
pub(crate) fn ensure_same_id(current: EntityId, requested: Option<EntityId>) -> Result<()> {
    match requested {
        Some(id) if id != current => Err(RegistryError::invalid(
            "id",
            format!("identity {current} cannot be changed to {id}"),
        )),
        _ => Ok(()),
    }
}

/// Deserializes a present field (including `null`) as `Some(..)`.
///
/// Paired with `#[serde(default)]` on an `Option<Option<T>>` patch field:
/// absent = keep, `null` = clear, value = set.
pub(crate) fn present<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

pub(crate) fn default_true() -> bool {
    true
}

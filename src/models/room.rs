//! Room model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{RegistryError, Result};
use crate::store::{default_true, ensure_same_id, present, required, required_text, EntityId, Record};

/// A physical room that schedule entries are booked into.
///
/// # Examples
///
/// ```
/// use course_scheduler::models::{Room, RoomPatch};
/// use course_scheduler::store::Record;
///
/// let lab = Room::from_patch(1, RoomPatch::new("Lab 3", 24).with_resource("projector")).unwrap();
/// assert!(lab.has_resource("projector"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Store-assigned identity.
    pub id: EntityId,
    #[serde(alias = "nome")]
    pub name: String,
    /// Seats.
    #[serde(alias = "capacidade")]
    pub capacity: u32,
    #[serde(default, alias = "pavimento", skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    /// Resource tags (e.g. "projector", "lab").
    #[serde(default, alias = "recursos")]
    pub resources: BTreeSet<String>,
    /// Soft-delete flag.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Create/update payload for [`Room`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoomPatch {
    pub id: Option<EntityId>,
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
    #[serde(default, alias = "capacidade")]
    pub capacity: Option<u32>,
    #[serde(default, alias = "pavimento", deserialize_with = "present")]
    pub floor: Option<Option<String>>,
    #[serde(default, alias = "recursos")]
    pub resources: Option<BTreeSet<String>>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl RoomPatch {
    /// Create payload with a name and capacity.
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: Some(name.into()),
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Sets the floor.
    pub fn with_floor(mut self, floor: impl Into<String>) -> Self {
        self.floor = Some(Some(floor.into()));
        self
    }

    /// Adds a resource tag.
    pub fn with_resource(mut self, tag: impl Into<String>) -> Self {
        self.resources
            .get_or_insert_with(BTreeSet::new)
            .insert(tag.into());
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

impl Room {
    /// Whether the room carries a resource tag.
    pub fn has_resource(&self, tag: &str) -> bool {
        self.resources.contains(tag)
    }
}

impl Record for Room {
    type Patch = RoomPatch;
    const COLLECTION: &'static str = "rooms";

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn requested_id(patch: &RoomPatch) -> Option<EntityId> {
        patch.id
    }

    fn from_patch(id: EntityId, patch: RoomPatch) -> Result<Self> {
        Ok(Self {
            id,
            name: required_text(patch.name, Self::COLLECTION, "name")?,
            capacity: required(patch.capacity, Self::COLLECTION, "capacity")?,
            floor: patch.floor.flatten(),
            resources: patch.resources.unwrap_or_default(),
            active: patch.active.unwrap_or(true),
        })
    }

    fn merge(&mut self, patch: RoomPatch) -> Result<()> {
        ensure_same_id(self.id, patch.id)?;
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(capacity) = patch.capacity {
            self.capacity = capacity;
        }
        if let Some(floor) = patch.floor {
            self.floor = floor;
        }
        if let Some(resources) = patch.resources {
            self.resources = resources;
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_legacy_payload() {
        let patch: RoomPatch = serde_json::from_str(
            r#"{"nome": "Sala 12", "capacidade": 30, "pavimento": "2", "recursos": ["tv"]}"#,
        )
        .unwrap();
        let room = Room::from_patch(12, patch).unwrap();
        assert_eq!(room.capacity, 30);
        assert_eq!(room.floor.as_deref(), Some("2"));
        assert!(room.has_resource("tv"));
    }

    #[test]
    fn test_room_requires_capacity() {
        let err = Room::from_patch(
            1,
            RoomPatch {
                name: Some("Sala".into()),
                ..RoomPatch::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MissingRequiredField {
                field: "capacity",
                ..
            }
        ));
    }

    #[test]
    fn test_room_merge_clears_floor() {
        let mut room = Room::from_patch(1, RoomPatch::new("Lab", 20).with_floor("1")).unwrap();
        let patch: RoomPatch = serde_json::from_str(r#"{"floor": null, "capacity": 25}"#).unwrap();
        room.merge(patch).unwrap();
        assert_eq!(room.floor, None);
        assert_eq!(room.capacity, 25);
    }
}

//! Curricular unit model.
//!
//! A curricular unit is one subject of a course. It belongs to exactly one
//! course and may declare its own hours; the course's total hours are the
//! budget its units share.

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::store::{default_true, ensure_same_id, present, required, required_text, EntityId, Record};

/// A curricular unit of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurricularUnit {
    /// Store-assigned identity.
    pub id: EntityId,
    /// Owning course.
    #[serde(alias = "curso_id")]
    pub course_id: EntityId,
    /// Display name.
    #[serde(alias = "nome")]
    pub name: String,
    /// Declared hours, when known.
    #[serde(default, alias = "carga_horaria", skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    /// Module/term label.
    #[serde(default, alias = "modulo", skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Soft-delete flag.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Create/update payload for [`CurricularUnit`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitPatch {
    pub id: Option<EntityId>,
    #[serde(default, alias = "curso_id")]
    pub course_id: Option<EntityId>,
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
    #[serde(default, alias = "carga_horaria", deserialize_with = "present")]
    pub hours: Option<Option<f64>>,
    #[serde(default, alias = "modulo", deserialize_with = "present")]
    pub module: Option<Option<String>>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl UnitPatch {
    /// Create payload for a unit of `course_id`.
    pub fn new(course_id: EntityId, name: impl Into<String>) -> Self {
        Self {
            course_id: Some(course_id),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the declared hours.
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.hours = Some(Some(hours));
        self
    }

    /// Sets the module label.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(Some(module.into()));
        self
    }
}

impl CurricularUnit {
    /// Declared hours, zero when unknown.
    pub fn declared_hours(&self) -> f64 {
        self.hours.unwrap_or(0.0)
    }
}

impl Record for CurricularUnit {
    type Patch = UnitPatch;
    const COLLECTION: &'static str = "curricular_units";

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn requested_id(patch: &UnitPatch) -> Option<EntityId> {
        patch.id
    }

    fn from_patch(id: EntityId, patch: UnitPatch) -> Result<Self> {
        Ok(Self {
            id,
            course_id: required(patch.course_id, Self::COLLECTION, "course_id")?,
            name: required_text(patch.name, Self::COLLECTION, "name")?,
            hours: patch.hours.flatten(),
            module: patch.module.flatten(),
            active: patch.active.unwrap_or(true),
        })
    }

    fn merge(&mut self, patch: UnitPatch) -> Result<()> {
        ensure_same_id(self.id, patch.id)?;
        if let Some(course_id) = patch.course_id {
            self.course_id = course_id;
        }
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(hours) = patch.hours {
            self.hours = hours;
        }
        if let Some(module) = patch.module {
            self.module = module;
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
        if let Some(hours) = self.hours {
            if !hours.is_finite() || hours < 0.0 {
                return Err(RegistryError::invalid(
                    "hours",
                    format!("{hours} is not a valid number of hours"),
                ));
            }
        }
        Ok(())
    }
}

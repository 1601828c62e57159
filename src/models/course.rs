//! Course model.
//!
//! A course is the offering umbrella: a name, a level tag and the total
//! number of planned hours, split across its curricular units.

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::store::{default_true, ensure_same_id, required, required_text, EntityId, Record};

/// A course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Store-assigned identity.
    pub id: EntityId,
    /// Display name.
    #[serde(alias = "nome")]
    pub name: String,
    /// Category/level tag (e.g. "technical", "qualification").
    #[serde(alias = "segmento", alias = "tipo_curso", alias = "nivel")]
    pub level: String,
    /// Total planned hours.
    #[serde(alias = "carga_horaria_total")]
    pub total_hours: f64,
    /// Soft-delete flag.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Create/update payload for [`Course`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoursePatch {
    pub id: Option<EntityId>,
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
    #[serde(default, alias = "segmento", alias = "tipo_curso", alias = "nivel")]
    pub level: Option<String>,
    #[serde(default, alias = "carga_horaria_total")]
    pub total_hours: Option<f64>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl CoursePatch {
    /// Full create payload.
    pub fn new(name: impl Into<String>, level: impl Into<String>, total_hours: f64) -> Self {
        Self {
            name: Some(name.into()),
            level: Some(level.into()),
            total_hours: Some(total_hours),
            ..Self::default()
        }
    }

    /// Requests an explicit identity.
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

impl Record for Course {
    type Patch = CoursePatch;
    const COLLECTION: &'static str = "courses";

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn requested_id(patch: &CoursePatch) -> Option<EntityId> {
        patch.id
    }

    fn from_patch(id: EntityId, patch: CoursePatch) -> Result<Self> {
        Ok(Self {
            id,
            name: required_text(patch.name, Self::COLLECTION, "name")?,
            level: required_text(patch.level, Self::COLLECTION, "level")?,
            total_hours: required(patch.total_hours, Self::COLLECTION, "total_hours")?,
            active: patch.active.unwrap_or(true),
        })
    }

    fn merge(&mut self, patch: CoursePatch) -> Result<()> {
        ensure_same_id(self.id, patch.id)?;
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(level) = patch.level {
            self.level = level.trim().to_string();
        }
        if let Some(total_hours) = patch.total_hours {
            self.total_hours = total_hours;
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
        if self.level.is_empty() {
            return Err(RegistryError::MissingRequiredField {
                collection: Self::COLLECTION,
                field: "level",
            });
        }
        if !self.total_hours.is_finite() || self.total_hours < 0.0 {
            return Err(RegistryError::invalid(
                "total_hours",
                format!("{} is not a valid number of hours", self.total_hours),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_from_patch() {
        let course = Course::from_patch(1, CoursePatch::new(" Python ", "FIC", 160.0)).unwrap();
        assert_eq!(course.name, "Python");
        assert_eq!(course.level, "FIC");
        assert!(course.active);
    }

    #[test]
    fn test_course_missing_fields() {
        let err = Course::from_patch(
            1,
            CoursePatch {
                name: Some("Python".into()),
                total_hours: Some(160.0),
                ..CoursePatch::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MissingRequiredField { field: "level", .. }
        ));
    }

    #[test]
    fn test_course_legacy_aliases() {
        let patch: CoursePatch = serde_json::from_str(
            r#"{"nome": "Excel", "tipo_curso": "Livre", "carga_horaria_total": 40}"#,
        )
        .unwrap();
        let course = Course::from_patch(7, patch).unwrap();
        assert_eq!(course.level, "Livre");
        assert_eq!(course.total_hours, 40.0);

        let json = serde_json::to_value(&course).unwrap();
        assert_eq!(json["level"], "Livre");
        assert!(json.get("tipo_curso").is_none());
    }

    #[test]
    fn test_course_patch_rejects_typos() {
        let result: std::result::Result<CoursePatch, _> =
            serde_json::from_str(r#"{"totl_hours": 10}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_course_merge() {
        let mut course = Course::from_patch(1, CoursePatch::new("Python", "FIC", 160.0)).unwrap();
        course
            .merge(CoursePatch {
                total_hours: Some(200.0),
                active: Some(false),
                ..CoursePatch::default()
            })
            .unwrap();
        assert_eq!(course.total_hours, 200.0);
        assert!(!course.is_active());
        assert_eq!(course.name, "Python");

        assert!(course.merge(CoursePatch::default().with_id(2)).is_err());
    }

    #[test]
    fn test_course_rejects_negative_hours() {
        let course = Course::from_patch(1, CoursePatch::new("Python", "FIC", -1.0)).unwrap();
        assert!(course.validate().is_err());
    }
}

//! Collaborator model.
//!
//! Collaborators are the people attached to schedule entries: instructors
//! teach, analysts and assistants support. Instructors may carry a weekly
//! hour cap enforced by the workload check.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{RegistryError, Result};
use crate::store::{default_true, ensure_same_id, present, required_text, EntityId, Record};

/// Collaborator role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Teaches schedule entries.
    #[default]
    #[serde(rename = "instructor", alias = "Instructor", alias = "Instrutor")]
    Instructor,
    /// Coordinates schedule entries.
    #[serde(rename = "analyst", alias = "Analyst", alias = "Analista")]
    Analyst,
    /// Supports schedule entries.
    #[serde(rename = "assistant", alias = "Assistant", alias = "Assistente")]
    Assistant,
}

/// An instructor, analyst or assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    /// Store-assigned identity.
    pub id: EntityId,
    /// Full name.
    #[serde(alias = "nome")]
    pub name: String,
    /// Display name ("first last").
    #[serde(default, alias = "nome_sobrenome", alias = "nome_curto")]
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, alias = "telefone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Role tag.
    #[serde(default, alias = "tipo")]
    pub role: Role,
    /// Subjects this collaborator can cover.
    #[serde(default, alias = "especialidades")]
    pub specialties: BTreeSet<String>,
    /// Weekly hour cap. `None` = unlimited.
    #[serde(default, alias = "max_horas_semana", skip_serializing_if = "Option::is_none")]
    pub max_weekly_hours: Option<f64>,
    /// Soft-delete flag.
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Create/update payload for [`Collaborator`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollaboratorPatch {
    pub id: Option<EntityId>,
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
    #[serde(default, alias = "nome_sobrenome", alias = "nome_curto")]
    pub short_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Option<String>>,
    #[serde(default, alias = "telefone", deserialize_with = "present")]
    pub phone: Option<Option<String>>,
    #[serde(default, alias = "tipo")]
    pub role: Option<Role>,
    #[serde(default, alias = "especialidades")]
    pub specialties: Option<BTreeSet<String>>,
    #[serde(default, alias = "max_horas_semana", deserialize_with = "present")]
    pub max_weekly_hours: Option<Option<f64>>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl CollaboratorPatch {
    /// Create payload with a name and the default role.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Sets the weekly hour cap.
    pub fn with_max_weekly_hours(mut self, hours: f64) -> Self {
        self.max_weekly_hours = Some(Some(hours));
        self
    }

    /// Adds a specialty.
    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialties
            .get_or_insert_with(BTreeSet::new)
            .insert(specialty.into());
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

/// "First Last" from a full name.
fn short_name_of(full_name: &str) -> String {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [first, .., last] => format!("{first} {last}"),
    }
}

impl Collaborator {
    /// Whether this collaborator has a given specialty.
    pub fn has_specialty(&self, name: &str) -> bool {
        self.specialties.contains(name)
    }
}

impl Record for Collaborator {
    type Patch = CollaboratorPatch;
    const COLLECTION: &'static str = "collaborators";

    fn id(&self) -> EntityId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn requested_id(patch: &CollaboratorPatch) -> Option<EntityId> {
        patch.id
    }

    fn from_patch(id: EntityId, patch: CollaboratorPatch) -> Result<Self> {
        let name = required_text(patch.name, Self::COLLECTION, "name")?;
        let short_name = match patch.short_name {
            Some(short) if !short.trim().is_empty() => short.trim().to_string(),
            _ => short_name_of(&name),
        };
        Ok(Self {
            id,
            name,
            short_name,
            email: patch.email.flatten(),
            phone: patch.phone.flatten(),
            role: patch.role.unwrap_or_default(),
            specialties: patch.specialties.unwrap_or_default(),
            max_weekly_hours: patch.max_weekly_hours.flatten(),
            active: patch.active.unwrap_or(true),
        })
    }

    fn merge(&mut self, patch: CollaboratorPatch) -> Result<()> {
        ensure_same_id(self.id, patch.id)?;
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(short_name) = patch.short_name {
            self.short_name = short_name.trim().to_string();
        }
        if self.short_name.is_empty() {
            self.short_name = short_name_of(&self.name);
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(specialties) = patch.specialties {
            self.specialties = specialties;
        }
        if let Some(cap) = patch.max_weekly_hours {
            self.max_weekly_hours = cap;
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
        if let Some(cap) = self.max_weekly_hours {
            if !cap.is_finite() || cap < 0.0 {
                return Err(RegistryError::invalid(
                    "max_weekly_hours",
                    format!("{cap} is not a valid weekly cap"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_derivation() {
        assert_eq!(short_name_of("Ana Maria Souza"), "Ana Souza");
        assert_eq!(short_name_of("Ana"), "Ana");
        assert_eq!(short_name_of("  "), "");

        let c = Collaborator::from_patch(1, CollaboratorPatch::new("João Pedro Lima")).unwrap();
        assert_eq!(c.short_name, "João Lima");
        assert_eq!(c.role, Role::Instructor);
    }

    #[test]
    fn test_legacy_payload() {
        let patch: CollaboratorPatch = serde_json::from_str(
            r#"{"nome": "Carla Dias", "tipo": "Analista", "max_horas_semana": 20, "telefone": "555"}"#,
        )
        .unwrap();
        let c = Collaborator::from_patch(2, patch).unwrap();
        assert_eq!(c.role, Role::Analyst);
        assert_eq!(c.max_weekly_hours, Some(20.0));
        assert_eq!(c.phone.as_deref(), Some("555"));
    }

    #[test]
    fn test_cap_can_be_cleared() {
        let mut c = Collaborator::from_patch(
            1,
            CollaboratorPatch::new("Rui Alves").with_max_weekly_hours(10.0),
        )
        .unwrap();
        let clear: CollaboratorPatch = serde_json::from_str(r#"{"max_weekly_hours": null}"#).unwrap();
        c.merge(clear).unwrap();
        assert_eq!(c.max_weekly_hours, None);
    }

    #[test]
    fn test_specialties() {
        let c = Collaborator::from_patch(
            1,
            CollaboratorPatch::new("Rui Alves")
                .with_specialty("networks")
                .with_specialty("linux"),
        )
        .unwrap();
        assert!(c.has_specialty("linux"));
        assert!(!c.has_specialty("python"));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result: std::result::Result<CollaboratorPatch, _> =
            serde_json::from_str(r#"{"name": "X", "role": "Director"}"#);
        assert!(result.is_err());
    }
}

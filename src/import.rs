//! Curricular unit batch input.
//!
//! A batch is either a list of structured unit records or free text with one
//! unit per line:
//!
//! ```text
//! Logic; 40
//! Databases; 60,5
//! Final project
//! ```
//!
//! Hours are optional; a decimal comma is accepted. Blank lines are skipped.

use serde::Deserialize;

use crate::error::{RegistryError, Result};
use crate::models::UnitPatch;
use crate::store::EntityId;

/// One unit of a batch, before it is attached to a course.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitDraft {
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(default, alias = "carga_horaria")]
    pub hours: Option<f64>,
    #[serde(default, alias = "modulo")]
    pub module: Option<String>,
}

impl UnitDraft {
    /// Draft with a name and no hours.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hours: None,
            module: None,
        }
    }

    /// Sets the hours.
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.hours = Some(hours);
        self
    }

    /// Create payload attaching this draft to `course_id`.
    pub fn into_patch(self, course_id: EntityId) -> UnitPatch {
        UnitPatch {
            course_id: Some(course_id),
            name: Some(self.name),
            hours: Some(self.hours),
            module: Some(self.module),
            ..UnitPatch::default()
        }
    }
}

/// Batch payload: structured records or raw lines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum UnitBatch {
    Records(Vec<UnitDraft>),
    Text(String),
}

impl UnitBatch {
    /// Normalizes the batch into drafts. An empty batch is rejected.
    pub fn into_drafts(self) -> Result<Vec<UnitDraft>> {
        let drafts = match self {
            UnitBatch::Records(drafts) => drafts,
            UnitBatch::Text(text) => parse_unit_lines(&text)?,
        };
        if drafts.is_empty() {
            return Err(RegistryError::invalid("units", "batch contains no units"));
        }
        Ok(drafts)
    }
}

impl From<Vec<UnitDraft>> for UnitBatch {
    fn from(drafts: Vec<UnitDraft>) -> Self {
        UnitBatch::Records(drafts)
    }
}

impl From<&str> for UnitBatch {
    fn from(text: &str) -> Self {
        UnitBatch::Text(text.to_string())
    }
}

/// Parses `"<name>; <hours>"` lines.
pub fn parse_unit_lines(text: &str) -> Result<Vec<UnitDraft>> {
    let mut drafts = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let (name, hours) = match line.split_once(';') {
            Some((name, hours)) => (name.trim(), hours.trim()),
            None => (line, ""),
        };
        if name.is_empty() {
            return Err(RegistryError::invalid(
                "name",
                format!("line {}: unit name is empty", index + 1),
            ));
        }
        let hours = if hours.is_empty() {
            None
        } else {
            let parsed = hours
                .replace(',', ".")
                .parse::<f64>()
                .ok()
                .filter(|h| h.is_finite() && *h >= 0.0);
            match parsed {
                Some(hours) => Some(hours),
                None => {
                    return Err(RegistryError::invalid(
                        "hours",
                        format!("line {}: `{hours}` is not a number of hours", index + 1),
                    ))
                }
            }
        };
        drafts.push(UnitDraft {
            name: name.to_string(),
            hours,
            module: None,
        });
    }
    Ok(drafts)
}

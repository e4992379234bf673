//! Event templates: reusable role/class blueprints used to seed new events.
//!
//! Field order matters for the TOML form: scalar fields come before the
//! `roles` array of tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RaidcallError, Result};
use crate::event::{ClassInfo, RoleSlot};

/// A named, reusable event blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTemplate {
    /// Unique key.
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    /// Upper bound on the sum of role limits (None or 0 = unchecked).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub allow_multi_signup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub roles: Vec<TemplateRole>,
}

/// A role inside a template. Same shape as [`RoleSlot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRole {
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    pub limit: u32,
    #[serde(default)]
    pub classes: Vec<ClassInfo>,
}

impl EventTemplate {
    /// Check the template is usable. Called on every catalog write.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RaidcallError::Validation(
                "template name is required".into(),
            ));
        }
        if self.roles.is_empty() {
            return Err(RaidcallError::Validation(format!(
                "template '{}' must define at least one role",
                self.name
            )));
        }

        let mut total: u64 = 0;
        for role in &self.roles {
            if role.name.trim().is_empty() {
                return Err(RaidcallError::Validation(format!(
                    "every role in template '{}' needs a name",
                    self.name
                )));
            }
            if role.limit == 0 {
                return Err(RaidcallError::Validation(format!(
                    "role '{}' limit must be greater than 0",
                    role.name
                )));
            }
            total += u64::from(role.limit);
        }

        if let Some(max) = self.max_participants
            && max > 0
            && total > u64::from(max)
        {
            return Err(RaidcallError::Validation(format!(
                "sum of role limits ({total}) exceeds max participants ({max})"
            )));
        }

        Ok(())
    }

    /// Roles to copy onto a new event.
    pub fn to_role_slots(&self) -> Vec<RoleSlot> {
        self.roles
            .iter()
            .map(|r| RoleSlot {
                name: r.name.clone(),
                emoji: r.emoji.clone(),
                limit: r.limit,
                classes: r.classes.clone(),
            })
            .collect()
    }

    /// File stem used for this template's record.
    pub fn file_stem(&self) -> String {
        sanitize_filename(&self.name)
    }
}

/// Keep ASCII alphanumerics, `-` and `_`; map spaces to `_`; drop the rest.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => Some(c),
            ' ' => Some('_'),
            _ => None,
        })
        .collect()
}

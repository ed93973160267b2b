//! Entity domain model.
//!
//! # Responsibility
//! - Define the record that attributes attach to.
//! - Map entity status to and from its stored text form.
//!
//! # Invariants
//! - `id` is assigned once at creation and never reused.
//! - `kind` is a free-form, non-empty collection tag.
//! - `deleted_at` is the source of truth for tombstone state.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Opaque, URL-safe entity identifier produced by an `IdGenerator`.
pub type EntityId = String;

/// Lifecycle status of an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Default status for newly created entities.
    #[default]
    Active,
    /// Retained but switched off by the caller.
    Inactive,
}

impl EntityStatus {
    /// Returns the stored text form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl Display for EntityStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!(
                "unsupported entity status `{other}`; expected active|inactive"
            )),
        }
    }
}

/// Persisted entity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub status: EntityStatus,
    /// Serialized as `type` to match the storage column.
    #[serde(rename = "type")]
    pub kind: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    /// Unix epoch milliseconds. `Some` marks a soft-deleted entity.
    pub deleted_at: Option<i64>,
}

impl Entity {
    /// Returns whether this entity should be considered visible.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Returns whether this entity is live and marked active.
    pub fn is_active(&self) -> bool {
        self.is_live() && self.status == EntityStatus::Active
    }
}

//! Attribute domain model.
//!
//! # Invariants
//! - At most one live attribute exists per `(entity_id, key)`.
//! - `value` is opaque text; raw vs. JSON interpretation belongs to the reader.

use crate::model::entity::EntityId;
use serde::{Deserialize, Serialize};

/// Opaque attribute identifier produced by an `IdGenerator`.
pub type AttributeId = String;

/// Persisted `entity_attributes` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub entity_id: EntityId,
    /// Stored in `attribute_key`.
    pub key: String,
    /// Stored in `attribute_value`.
    pub value: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

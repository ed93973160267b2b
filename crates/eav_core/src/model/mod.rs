//! Domain model for entities and their attributes.
//!
//! # Responsibility
//! - Define the records persisted in `entities` and `entity_attributes`.
//! - Provide argument validation shared by repository write paths.
//!
//! # Invariants
//! - Every entity is identified by an opaque, generated `EntityId`.
//! - Deletion is represented by `deleted_at` tombstones, not hard delete.

pub mod attribute;
pub mod entity;
pub mod validation;

//! Entity façade bound to an attribute repository.
//!
//! # Invariants
//! - Holds no state beyond the entity snapshot; every accessor reads or
//!   writes through the repository.
//! - Malformed structured values surface as `RepoError::Serialization`.

use crate::model::attribute::Attribute;
use crate::model::entity::Entity;
use crate::repo::attribute_repo::{AttributeRepository, BatchUpsertReport};
use crate::repo::RepoResult;
use serde_json::Value;
use std::collections::BTreeMap;

/// One entity plus accessors for its attributes.
pub struct EntityHandle<'repo, R: ?Sized> {
    entity: Entity,
    attributes: &'repo R,
}

impl<'repo, R: AttributeRepository + ?Sized> EntityHandle<'repo, R> {
    pub fn new(entity: Entity, attributes: &'repo R) -> Self {
        Self { entity, attributes }
    }

    /// Entity snapshot as loaded or created.
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn id(&self) -> &str {
        &self.entity.id
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }

    pub fn get_attribute(&self, key: &str) -> RepoResult<Option<Attribute>> {
        self.attributes.find_by_key(&self.entity.id, key)
    }

    /// Returns the raw attribute value, or `default` when the key is unset.
    pub fn get_attribute_value(&self, key: &str, default: &str) -> RepoResult<String> {
        Ok(self
            .get_attribute(key)?
            .map_or_else(|| default.to_string(), |attribute| attribute.value))
    }

    /// Returns the decoded attribute value, or `default` when the key is unset.
    pub fn get_attribute_json(&self, key: &str, default: Value) -> RepoResult<Value> {
        Ok(self
            .attributes
            .find_json_by_key(&self.entity.id, key)?
            .unwrap_or(default))
    }

    pub fn set_attribute(&self, key: &str, value: &str) -> RepoResult<Attribute> {
        self.attributes.upsert(&self.entity.id, key, value)
    }

    pub fn set_attribute_json(&self, key: &str, value: &Value) -> RepoResult<Attribute> {
        self.attributes.upsert_json(&self.entity.id, key, value)
    }

    /// Writes all values in one transaction.
    pub fn set_attributes(&self, attributes: &BTreeMap<String, String>) -> RepoResult<()> {
        self.attributes.batch_upsert(&self.entity.id, attributes)
    }

    /// Writes all encodable values in one transaction.
    pub fn set_attributes_json(
        &self,
        attributes: &BTreeMap<String, Value>,
    ) -> RepoResult<BatchUpsertReport> {
        self.attributes.batch_upsert_json(&self.entity.id, attributes)
    }

    /// Lists all live attributes ordered by key.
    pub fn attributes(&self) -> RepoResult<Vec<Attribute>> {
        self.attributes.list_for_entity(&self.entity.id)
    }
}

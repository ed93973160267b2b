//! Entity use-case service.
//!
//! # Responsibility
//! - Provide lookup/creation entry points that return `EntityHandle`s.
//! - Delegate persistence to repository implementations.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/transaction contracts.
//! - Service layer remains storage-agnostic.

use crate::model::entity::{Entity, EntityStatus};
use crate::repo::entity_repo::{EntityListQuery, EntityRepository};
use crate::repo::RepoResult;
use crate::service::entity_handle::EntityHandle;
use std::collections::BTreeMap;

/// Handle type produced by `EntityService<E>`.
pub type Handle<'repo, E> = EntityHandle<'repo, <E as EntityRepository>::Attributes>;

/// Use-case service wrapper for entity operations.
pub struct EntityService<E: EntityRepository> {
    repo: E,
}

impl<E: EntityRepository> EntityService<E> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: E) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &E {
        &self.repo
    }

    /// Wraps an already loaded entity.
    pub fn handle(&self, entity: Entity) -> Handle<'_, E> {
        EntityHandle::new(entity, self.repo.attributes())
    }

    /// Loads one live entity as a handle.
    pub fn open(&self, entity_id: &str) -> RepoResult<Option<Handle<'_, E>>> {
        Ok(self
            .repo
            .find_by_id(entity_id)?
            .map(|entity| self.handle(entity)))
    }

    pub fn create(&self, kind: &str) -> RepoResult<Handle<'_, E>> {
        let entity = self.repo.create(kind)?;
        Ok(self.handle(entity))
    }

    /// Creates one entity with its initial attributes atomically.
    pub fn create_with_attributes(
        &self,
        kind: &str,
        attributes: &BTreeMap<String, String>,
    ) -> RepoResult<Handle<'_, E>> {
        let entity = self.repo.create_with_attributes(kind, attributes)?;
        Ok(self.handle(entity))
    }

    pub fn find_by_attribute(
        &self,
        kind: &str,
        key: &str,
        value: &str,
    ) -> RepoResult<Option<Handle<'_, E>>> {
        Ok(self
            .repo
            .find_by_attribute(kind, key, value)?
            .map(|entity| self.handle(entity)))
    }

    pub fn list_by_attribute(&self, kind: &str, key: &str, value: &str) -> RepoResult<Vec<Entity>> {
        self.repo.list_by_attribute(kind, key, value)
    }

    pub fn list(&self, query: &EntityListQuery) -> RepoResult<Vec<Entity>> {
        self.repo.list(query)
    }

    pub fn count(&self, kind: &str) -> RepoResult<u64> {
        self.repo.count(kind)
    }

    pub fn set_status(&self, entity_id: &str, status: EntityStatus) -> RepoResult<()> {
        self.repo.set_status(entity_id, status)
    }

    /// Soft-deletes one entity and all its attributes.
    pub fn delete(&self, entity_id: &str) -> RepoResult<()> {
        self.repo.delete(entity_id)
    }
}

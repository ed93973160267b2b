//! Entity-Attribute-Value storage over SQLite.
//!
//! Entities are opaque, typed records; attributes are named string values
//! attached to them and written with upsert semantics. This crate is the single
//! source of truth for the store's invariants.

pub mod codec;
pub mod db;
pub mod ids;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use codec::{CodecError, CodecResult, JsonSerializer, ValueSerializer};
pub use ids::{IdGenerator, UuidIdGenerator};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attribute::{Attribute, AttributeId};
pub use model::entity::{Entity, EntityId, EntityStatus};
pub use model::validation::ValidationError;
pub use repo::attribute_repo::{AttributeRepository, BatchUpsertReport, SqliteAttributeRepository};
pub use repo::entity_repo::{
    EntityListQuery, EntityOrderColumn, EntityRepository, SortDirection, SqliteEntityRepository,
};
pub use repo::{RepoError, RepoResult};
pub use service::entity_handle::EntityHandle;
pub use service::entity_service::EntityService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

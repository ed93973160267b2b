//! Entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own the entity lifecycle: create, create-with-attributes, delete.
//! - Resolve entities by id, by attribute value and by paginated listing.
//!
//! # Invariants
//! - `create_with_attributes` and `delete` are all-or-nothing.
//! - `delete` tombstones attributes before the entity, in one transaction.
//! - Attribute lookups are scoped to live entities of the requested type.
//!
//! Attribute-value lookups run as nested sub-queries over
//! `idx_entity_attributes_key_value`; there is no application-maintained
//! reverse index, so cost grows with the number of rows sharing a value.

use crate::codec::{JsonSerializer, ValueSerializer};
use crate::ids::{IdGenerator, UuidIdGenerator};
use crate::model::entity::{Entity, EntityStatus};
use crate::model::validation::{
    require_attribute_key, require_entity_id, require_entity_type, ValidationError,
};
use crate::repo::attribute_repo::{AttributeRepository, SqliteAttributeRepository};
use crate::repo::{now_epoch_ms, run_in_transaction, RepoError, RepoResult};
use log::{debug, error};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Instant;

const ENTITY_SELECT_SQL: &str = "SELECT
    id,
    status,
    type,
    created_at,
    updated_at,
    deleted_at
FROM entities";

/// Entity ids of type `?1` owning a live attribute `?2 = ?3`.
const MATCHING_ENTITY_IDS_SQL: &str = "SELECT entity_id
FROM entity_attributes
WHERE entity_id IN (
        SELECT id FROM entities WHERE type = ?1 AND deleted_at IS NULL
    )
  AND attribute_key = ?2
  AND attribute_value = ?3
  AND deleted_at IS NULL";

/// Whitelisted ordering columns for entity listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntityOrderColumn {
    Id,
    Status,
    Type,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl EntityOrderColumn {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Status => "status",
            Self::Type => "type",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for EntityOrderColumn {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "status" => Ok(Self::Status),
            "type" => Ok(Self::Type),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            _ => Err(ValidationError::UnsupportedOrderColumn(value.to_string())),
        }
    }
}

/// Sort direction for entity listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ValidationError::UnsupportedSortDirection(value.to_string())),
        }
    }
}

/// Query options for listing entities of one type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityListQuery {
    /// Entity type to list.
    pub kind: String,
    /// Number of rows to skip.
    pub offset: u64,
    /// Maximum rows to return. `0` returns everything after `offset`.
    pub per_page: u64,
    /// Reserved. Accepted for callers but not applied to the query.
    pub search: Option<String>,
    /// Column to sort by.
    pub order_by: EntityOrderColumn,
    /// Sort direction, also applied to the insertion-order tie-break.
    pub direction: SortDirection,
}

impl EntityListQuery {
    /// Lists every entity of `kind`, oldest first.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }
}

/// Repository interface for entity lifecycle and lookups.
pub trait EntityRepository {
    /// Attribute repository sharing this repository's connection.
    type Attributes: AttributeRepository;

    fn attributes(&self) -> &Self::Attributes;
    /// Creates one active entity of `kind`.
    fn create(&self, kind: &str) -> RepoResult<Entity>;
    /// Creates one entity and its initial attributes atomically.
    fn create_with_attributes(
        &self,
        kind: &str,
        attributes: &BTreeMap<String, String>,
    ) -> RepoResult<Entity>;
    /// Soft-deletes one entity and all its attributes atomically.
    fn delete(&self, entity_id: &str) -> RepoResult<()>;
    /// Loads one live entity.
    fn find_by_id(&self, entity_id: &str) -> RepoResult<Option<Entity>>;
    /// Loads the first live entity of `kind` whose attribute `key` equals `value`.
    fn find_by_attribute(&self, kind: &str, key: &str, value: &str)
        -> RepoResult<Option<Entity>>;
    /// Loads every live entity of `kind` whose attribute `key` equals `value`.
    ///
    /// Row order is unspecified.
    fn list_by_attribute(&self, kind: &str, key: &str, value: &str) -> RepoResult<Vec<Entity>>;
    /// Lists one page of live entities of one type.
    fn list(&self, query: &EntityListQuery) -> RepoResult<Vec<Entity>>;
    /// Counts live entities of `kind`.
    fn count(&self, kind: &str) -> RepoResult<u64>;
    /// Switches the status of one live entity.
    fn set_status(&self, entity_id: &str, status: EntityStatus) -> RepoResult<()>;
}

/// SQLite-backed entity repository composed over the attribute repository.
pub struct SqliteEntityRepository<'conn, G = UuidIdGenerator, S = JsonSerializer> {
    attributes: SqliteAttributeRepository<'conn, G, S>,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Creates a repository with uuid ids and JSON values.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Self::try_with_parts(conn, UuidIdGenerator, JsonSerializer)
    }
}

impl<'conn, G: IdGenerator, S: ValueSerializer> SqliteEntityRepository<'conn, G, S> {
    /// Creates a repository from a migrated connection and explicit collaborators.
    pub fn try_with_parts(conn: &'conn Connection, ids: G, serializer: S) -> RepoResult<Self> {
        Ok(Self {
            attributes: SqliteAttributeRepository::try_with_parts(conn, ids, serializer)?,
        })
    }

    fn conn(&self) -> &'conn Connection {
        self.attributes.connection()
    }

    fn insert_entity(&self, conn: &Connection, kind: &str) -> RepoResult<Entity> {
        let now = now_epoch_ms();
        let entity = Entity {
            id: self.attributes.ids().generate(),
            status: EntityStatus::Active,
            kind: kind.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        conn.execute(
            "INSERT INTO entities (
                id,
                status,
                type,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                entity.id.as_str(),
                entity.status.as_str(),
                entity.kind.as_str(),
                entity.created_at,
                entity.updated_at,
            ],
        )?;

        Ok(entity)
    }
}

impl<'conn, G: IdGenerator, S: ValueSerializer> EntityRepository
    for SqliteEntityRepository<'conn, G, S>
{
    type Attributes = SqliteAttributeRepository<'conn, G, S>;

    fn attributes(&self) -> &Self::Attributes {
        &self.attributes
    }

    fn create(&self, kind: &str) -> RepoResult<Entity> {
        require_entity_type(kind)?;

        let entity = self.insert_entity(self.conn(), kind)?;
        debug!(
            "event=entity_create module=repo status=ok entity_id={} type={}",
            entity.id, entity.kind
        );
        Ok(entity)
    }

    fn create_with_attributes(
        &self,
        kind: &str,
        attributes: &BTreeMap<String, String>,
    ) -> RepoResult<Entity> {
        require_entity_type(kind)?;
        for key in attributes.keys() {
            require_attribute_key(key)?;
        }

        let started_at = Instant::now();
        let result = run_in_transaction(self.conn(), |tx| {
            let entity = self.insert_entity(tx, kind)?;
            for (key, value) in attributes {
                self.attributes.write_value(tx, &entity.id, key, value)?;
            }
            Ok(entity)
        });

        match &result {
            Ok(entity) => debug!(
                "event=entity_create module=repo status=ok entity_id={} type={} keys={} duration_ms={}",
                entity.id,
                kind,
                attributes.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=entity_create module=repo status=error type={} keys={} duration_ms={} error_code=create_rolled_back error={}",
                kind,
                attributes.len(),
                started_at.elapsed().as_millis(),
                err
            ),
        }

        result
    }

    fn delete(&self, entity_id: &str) -> RepoResult<()> {
        require_entity_id(entity_id)?;

        let started_at = Instant::now();
        let result = run_in_transaction(self.conn(), |tx| {
            let now = now_epoch_ms();
            let attributes_deleted = tx.execute(
                "UPDATE entity_attributes
                 SET
                    deleted_at = ?2,
                    updated_at = ?2
                 WHERE entity_id = ?1
                   AND deleted_at IS NULL;",
                params![entity_id, now],
            )?;
            let entities_deleted = tx.execute(
                "UPDATE entities
                 SET
                    deleted_at = ?2,
                    updated_at = ?2
                 WHERE id = ?1
                   AND deleted_at IS NULL;",
                params![entity_id, now],
            )?;
            Ok((entities_deleted, attributes_deleted))
        });

        match result {
            Ok((entities_deleted, attributes_deleted)) => {
                debug!(
                    "event=entity_delete module=repo status=ok entity_id={} matched={} attributes={} duration_ms={}",
                    entity_id,
                    entities_deleted,
                    attributes_deleted,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=entity_delete module=repo status=error entity_id={} duration_ms={} error_code=delete_rolled_back error={}",
                    entity_id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn find_by_id(&self, entity_id: &str) -> RepoResult<Option<Entity>> {
        if entity_id.is_empty() {
            return Ok(None);
        }

        let mut stmt = self.conn().prepare(&format!(
            "{ENTITY_SELECT_SQL}
             WHERE id = ?1
               AND deleted_at IS NULL;"
        ))?;

        let mut rows = stmt.query([entity_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entity_row(row)?));
        }

        Ok(None)
    }

    fn find_by_attribute(
        &self,
        kind: &str,
        key: &str,
        value: &str,
    ) -> RepoResult<Option<Entity>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{MATCHING_ENTITY_IDS_SQL} LIMIT 1;"))?;

        let mut rows = stmt.query(params![kind, key, value])?;
        let entity_id: String = match rows.next()? {
            Some(row) => row.get(0)?,
            None => return Ok(None),
        };

        self.find_by_id(&entity_id)
    }

    fn list_by_attribute(&self, kind: &str, key: &str, value: &str) -> RepoResult<Vec<Entity>> {
        let mut stmt = self.conn().prepare(&format!(
            "{ENTITY_SELECT_SQL}
             WHERE deleted_at IS NULL
               AND id IN ({MATCHING_ENTITY_IDS_SQL});"
        ))?;

        let mut rows = stmt.query(params![kind, key, value])?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }

        Ok(entities)
    }

    fn list(&self, query: &EntityListQuery) -> RepoResult<Vec<Entity>> {
        if query.search.is_some() {
            debug!("event=entity_list module=repo status=ignored_search type={}", query.kind);
        }

        let direction = query.direction.as_sql();
        let mut sql = format!(
            "{ENTITY_SELECT_SQL}
             WHERE type = ?
               AND deleted_at IS NULL
             ORDER BY {} {direction}, rowid {direction}",
            query.order_by.as_sql()
        );
        let mut bind_values: Vec<Value> = vec![Value::Text(query.kind.clone())];

        if query.per_page > 0 {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(to_sql_count(query.per_page)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(to_sql_count(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(to_sql_count(query.offset)));
        }

        let mut stmt = self.conn().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }

        Ok(entities)
    }

    fn count(&self, kind: &str) -> RepoResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*)
             FROM entities
             WHERE type = ?1
               AND deleted_at IS NULL;",
            [kind],
            |row| row.get(0),
        )?;

        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative entity count `{count}`")))
    }

    fn set_status(&self, entity_id: &str, status: EntityStatus) -> RepoResult<()> {
        require_entity_id(entity_id)?;

        let changed = self.conn().execute(
            "UPDATE entities
             SET
                status = ?2,
                updated_at = ?3
             WHERE id = ?1
               AND deleted_at IS NULL;",
            params![entity_id, status.as_str(), now_epoch_ms()],
        )?;

        if changed == 0 {
            return Err(RepoError::EntityNotFound(entity_id.to_string()));
        }

        Ok(())
    }
}

fn parse_entity_row(row: &Row<'_>) -> RepoResult<Entity> {
    let status_text: String = row.get("status")?;
    let status = EntityStatus::from_str(&status_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid entity status `{status_text}` in entities.status"
        ))
    })?;

    Ok(Entity {
        id: row.get("id")?,
        status,
        kind: row.get("type")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

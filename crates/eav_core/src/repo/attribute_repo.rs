//! Attribute repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own reads and writes of `entity_attributes`.
//! - Provide single-key and batch upserts with transactional batches.
//!
//! # Invariants
//! - One live row per `(entity_id, attribute_key)`, enforced by the unique
//!   index and a single `INSERT .. ON CONFLICT DO UPDATE` statement.
//! - Writes only land when the owning entity is live.
//! - A failed batch leaves no partial writes behind.

use crate::codec::{JsonSerializer, ValueSerializer};
use crate::ids::{IdGenerator, UuidIdGenerator};
use crate::model::attribute::Attribute;
use crate::model::validation::{require_attribute_key, require_entity_id};
use crate::repo::{ensure_connection_ready, now_epoch_ms, run_in_transaction};
use crate::repo::{RepoError, RepoResult};
use log::{debug, error, warn};
use rusqlite::{params, Connection, Row};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

const ATTRIBUTE_SELECT_SQL: &str = "SELECT
    id,
    entity_id,
    attribute_key,
    attribute_value,
    created_at,
    updated_at,
    deleted_at
FROM entity_attributes";

// `WHERE EXISTS` both gates on a live owner and keeps SQLite from parsing
// `ON CONFLICT` as a join constraint of the SELECT.
const ATTRIBUTE_UPSERT_SQL: &str = "INSERT INTO entity_attributes (
    id,
    entity_id,
    attribute_key,
    attribute_value,
    created_at,
    updated_at
)
SELECT ?1, ?2, ?3, ?4, ?5, ?5
WHERE EXISTS (
    SELECT 1 FROM entities WHERE id = ?2 AND deleted_at IS NULL
)
ON CONFLICT(entity_id, attribute_key) DO UPDATE SET
    attribute_value = excluded.attribute_value,
    updated_at = excluded.updated_at,
    deleted_at = NULL;";

/// Outcome of a structured batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchUpsertReport {
    /// Number of keys written in the committed transaction.
    pub written: usize,
    /// Keys whose value the serializer rejected; nothing was written for them.
    pub skipped_keys: Vec<String>,
}

/// Repository interface for entity attributes.
pub trait AttributeRepository {
    /// Finds the live attribute for `(entity_id, key)`.
    fn find_by_key(&self, entity_id: &str, key: &str) -> RepoResult<Option<Attribute>>;
    /// Finds and decodes a structured attribute value.
    fn find_json_by_key(&self, entity_id: &str, key: &str) -> RepoResult<Option<Value>>;
    /// Lists all live attributes of one entity ordered by key.
    fn list_for_entity(&self, entity_id: &str) -> RepoResult<Vec<Attribute>>;
    /// Creates or overwrites one raw string attribute.
    fn upsert(&self, entity_id: &str, key: &str, value: &str) -> RepoResult<Attribute>;
    /// Creates or overwrites one structured attribute.
    fn upsert_json(&self, entity_id: &str, key: &str, value: &Value) -> RepoResult<Attribute>;
    /// Writes all raw string attributes in one transaction.
    fn batch_upsert(
        &self,
        entity_id: &str,
        attributes: &BTreeMap<String, String>,
    ) -> RepoResult<()>;
    /// Writes all encodable structured attributes in one transaction.
    fn batch_upsert_json(
        &self,
        entity_id: &str,
        attributes: &BTreeMap<String, Value>,
    ) -> RepoResult<BatchUpsertReport>;
}

/// SQLite-backed attribute repository.
pub struct SqliteAttributeRepository<'conn, G = UuidIdGenerator, S = JsonSerializer> {
    conn: &'conn Connection,
    ids: G,
    serializer: S,
}

impl<'conn> SqliteAttributeRepository<'conn> {
    /// Creates a repository with uuid ids and JSON values.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Self::try_with_parts(conn, UuidIdGenerator, JsonSerializer)
    }
}

impl<'conn, G: IdGenerator, S: ValueSerializer> SqliteAttributeRepository<'conn, G, S> {
    /// Creates a repository from a migrated connection and explicit collaborators.
    pub fn try_with_parts(conn: &'conn Connection, ids: G, serializer: S) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            ids,
            serializer,
        })
    }

    pub(crate) fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub(crate) fn ids(&self) -> &G {
        &self.ids
    }

    /// Runs the upsert statement on `conn`, which may be an open transaction.
    pub(crate) fn write_value(
        &self,
        conn: &Connection,
        entity_id: &str,
        key: &str,
        value: &str,
    ) -> RepoResult<()> {
        let changed = conn.execute(
            ATTRIBUTE_UPSERT_SQL,
            params![self.ids.generate(), entity_id, key, value, now_epoch_ms()],
        )?;

        if changed == 0 {
            return Err(RepoError::EntityNotFound(entity_id.to_string()));
        }

        Ok(())
    }

    fn upsert_and_load(&self, entity_id: &str, key: &str, value: &str) -> RepoResult<Attribute> {
        require_entity_id(entity_id)?;
        require_attribute_key(key)?;

        self.write_value(self.conn, entity_id, key, value)?;
        debug!("event=attribute_upsert module=repo status=ok entity_id={entity_id} key={key}");

        find_live_attribute(self.conn, entity_id, key)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "attribute `{key}` of entity `{entity_id}` missing after upsert"
            ))
        })
    }
}

impl<G: IdGenerator, S: ValueSerializer> AttributeRepository
    for SqliteAttributeRepository<'_, G, S>
{
    fn find_by_key(&self, entity_id: &str, key: &str) -> RepoResult<Option<Attribute>> {
        if entity_id.is_empty() {
            return Ok(None);
        }

        find_live_attribute(self.conn, entity_id, key)
    }

    fn find_json_by_key(&self, entity_id: &str, key: &str) -> RepoResult<Option<Value>> {
        match self.find_by_key(entity_id, key)? {
            Some(attribute) => Ok(Some(self.serializer.decode(&attribute.value)?)),
            None => Ok(None),
        }
    }

    fn list_for_entity(&self, entity_id: &str) -> RepoResult<Vec<Attribute>> {
        if entity_id.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(&format!(
            "{ATTRIBUTE_SELECT_SQL}
             WHERE entity_id = ?1
               AND deleted_at IS NULL
             ORDER BY attribute_key ASC;"
        ))?;
        let mut rows = stmt.query([entity_id])?;
        let mut attributes = Vec::new();
        while let Some(row) = rows.next()? {
            attributes.push(parse_attribute_row(row)?);
        }

        Ok(attributes)
    }

    fn upsert(&self, entity_id: &str, key: &str, value: &str) -> RepoResult<Attribute> {
        self.upsert_and_load(entity_id, key, value)
    }

    fn upsert_json(&self, entity_id: &str, key: &str, value: &Value) -> RepoResult<Attribute> {
        let encoded = self.serializer.encode(value)?;
        self.upsert_and_load(entity_id, key, &encoded)
    }

    fn batch_upsert(
        &self,
        entity_id: &str,
        attributes: &BTreeMap<String, String>,
    ) -> RepoResult<()> {
        require_entity_id(entity_id)?;
        for key in attributes.keys() {
            require_attribute_key(key)?;
        }

        let started_at = Instant::now();
        let result = run_in_transaction(self.conn, |tx| {
            for (key, value) in attributes {
                self.write_value(tx, entity_id, key, value)?;
            }
            Ok(())
        });
        log_batch_outcome(entity_id, attributes.len(), started_at, &result);

        result
    }

    fn batch_upsert_json(
        &self,
        entity_id: &str,
        attributes: &BTreeMap<String, Value>,
    ) -> RepoResult<BatchUpsertReport> {
        require_entity_id(entity_id)?;

        let mut encoded = BTreeMap::new();
        let mut skipped_keys = Vec::new();
        for (key, value) in attributes {
            require_attribute_key(key)?;
            match self.serializer.encode(value) {
                Ok(text) => {
                    encoded.insert(key.clone(), text);
                }
                Err(err) => {
                    warn!(
                        "event=attribute_batch_upsert module=repo status=skipped entity_id={entity_id} key={key} error={err}"
                    );
                    skipped_keys.push(key.clone());
                }
            }
        }

        self.batch_upsert(entity_id, &encoded)?;

        Ok(BatchUpsertReport {
            written: encoded.len(),
            skipped_keys,
        })
    }
}

pub(crate) fn find_live_attribute(
    conn: &Connection,
    entity_id: &str,
    key: &str,
) -> RepoResult<Option<Attribute>> {
    let mut stmt = conn.prepare(&format!(
        "{ATTRIBUTE_SELECT_SQL}
         WHERE entity_id = ?1
           AND attribute_key = ?2
           AND deleted_at IS NULL
         LIMIT 1;"
    ))?;

    let mut rows = stmt.query(params![entity_id, key])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_attribute_row(row)?));
    }

    Ok(None)
}

fn parse_attribute_row(row: &Row<'_>) -> RepoResult<Attribute> {
    let key: String = row.get("attribute_key")?;
    if key.is_empty() {
        return Err(RepoError::InvalidData(
            "empty key in entity_attributes.attribute_key".to_string(),
        ));
    }

    Ok(Attribute {
        id: row.get("id")?,
        entity_id: row.get("entity_id")?,
        key,
        value: row.get("attribute_value")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn log_batch_outcome(
    entity_id: &str,
    keys: usize,
    started_at: Instant,
    result: &RepoResult<()>,
) {
    match result {
        Ok(()) => debug!(
            "event=attribute_batch_upsert module=repo status=ok entity_id={} keys={} duration_ms={}",
            entity_id,
            keys,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=attribute_batch_upsert module=repo status=error entity_id={} keys={} duration_ms={} error_code=batch_rolled_back error={}",
            entity_id,
            keys,
            started_at.elapsed().as_millis(),
            err
        ),
    }
}

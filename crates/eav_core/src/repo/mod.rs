//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the attribute and entity data access contracts.
//! - Keep SQL details and transaction boundaries out of callers.
//!
//! # Invariants
//! - Reads only return live rows (`deleted_at IS NULL`).
//! - Multi-statement writes run in one `IMMEDIATE` transaction and roll back
//!   on any error, including unwinding.
//! - "No such row" is `Ok(None)`, never an error.

pub mod attribute_repo;
pub mod entity_repo;
mod error;
mod readiness;

pub use error::{RepoError, RepoResult};

pub(crate) use readiness::ensure_connection_ready;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::{SystemTime, UNIX_EPOCH};

/// Runs `work` inside one immediate transaction on `conn`.
///
/// Commits when `work` returns `Ok`. Otherwise the transaction is dropped,
/// which rolls it back before the error reaches the caller.
pub(crate) fn run_in_transaction<T, F>(conn: &Connection, work: F) -> RepoResult<T>
where
    F: FnOnce(&Transaction<'_>) -> RepoResult<T>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = work(&tx)?;
    tx.commit()?;
    Ok(value)
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

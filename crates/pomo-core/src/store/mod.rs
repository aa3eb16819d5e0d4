//! Owner-scoped persistent storage for tasks and sessions using redb.
//!
//! # Table design
//!
//! Every record key starts with the owner id followed by a NUL byte:
//! ```text
//! tasks        [ owner | 0x00 | seq: u64 BE ]                    -> JSON Task
//! task_index   [ task uuid: 16 bytes ]                           -> tasks key
//! sessions     [ owner | 0x00 | seq: u64 BE ]                    -> JSON Session
//! idempotency  [ owner | 0x00 | token ]                          -> sessions key
//! meta         "task_seq" | "session_seq"                        -> u64
//! ```
//!
//! Listing is a range scan over `[owner|0x00, owner|0x01)`, so one owner's
//! scan can never reach another owner's records. Each mutating call runs in a
//! single write transaction; redb serializes writers, so concurrent requests
//! for the same owner cannot interleave a read-modify-write.

mod sessions;
mod tasks;

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{PomoError, Result};
use crate::types::OwnerId;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const TASKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tasks");
const TASK_INDEX: TableDefinition<&[u8], &[u8]> = TableDefinition::new("task_index");
const SESSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("sessions");
const IDEMPOTENCY: TableDefinition<&[u8], &[u8]> = TableDefinition::new("idempotency");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const TASK_SEQ: &str = "task_seq";
const SESSION_SEQ: &str = "session_seq";

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn owner_prefix(owner: &OwnerId) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.as_str().len() + 1);
    key.extend_from_slice(owner.as_str().as_bytes());
    key.push(0x00);
    key
}

/// Exclusive upper bound of an owner's key space.
fn owner_upper_bound(owner: &OwnerId) -> Vec<u8> {
    let mut key = owner_prefix(owner);
    if let Some(last) = key.last_mut() {
        *last = 0x01;
    }
    key
}

fn task_key(owner: &OwnerId, seq: u64) -> Vec<u8> {
    let mut key = owner_prefix(owner);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Sessions are keyed by record order, so the newest is always last in an
/// owner's range regardless of clock resolution.
fn session_key(owner: &OwnerId, seq: u64) -> Vec<u8> {
    let mut key = owner_prefix(owner);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Bump the counter `name` in `meta` and return the new value.
fn next_seq(meta: &mut redb::Table<&str, u64>, name: &str) -> Result<u64> {
    let seq = meta
        .get(name)
        .map_err(db_err)?
        .map(|g| g.value())
        .unwrap_or(0)
        + 1;
    meta.insert(name, seq).map_err(db_err)?;
    Ok(seq)
}

fn idempotency_key(owner: &OwnerId, token: &str) -> Vec<u8> {
    let mut key = owner_prefix(owner);
    key.extend_from_slice(token.as_bytes());
    key
}

/// Storage engine errors are reported as transient: the caller may retry.
fn db_err(e: impl std::fmt::Display) -> PomoError {
    tracing::error!(error = %e, "store operation failed");
    PomoError::TransientStore(e.to_string())
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Task Store and Session Log over a single redb database.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the database at `path`, creating all tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        Self::init(db)
    }

    /// Volatile database for tests and ephemeral servers.
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(db_err)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self> {
        // Ensure the tables exist before any reads
        let wt = db.begin_write().map_err(db_err)?;
        wt.open_table(TASKS).map_err(db_err)?;
        wt.open_table(TASK_INDEX).map_err(db_err)?;
        wt.open_table(SESSIONS).map_err(db_err)?;
        wt.open_table(IDEMPOTENCY).map_err(db_err)?;
        wt.open_table(META).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_ranges_do_not_overlap_for_prefix_owners() {
        let a = OwnerId::new("ann").unwrap();
        let b = OwnerId::new("anna").unwrap();
        let a_lo = owner_prefix(&a);
        let a_hi = owner_upper_bound(&a);
        let b_key = task_key(&b, 1);
        assert!(!(a_lo.as_slice() <= b_key.as_slice() && b_key.as_slice() < a_hi.as_slice()));
        let a_key = task_key(&a, u64::MAX);
        assert!(a_lo.as_slice() <= a_key.as_slice() && a_key.as_slice() < a_hi.as_slice());
    }

    #[test]
    fn task_keys_sort_by_sequence() {
        let o = OwnerId::new("o").unwrap();
        assert!(task_key(&o, 2) < task_key(&o, 10));
        assert!(task_key(&o, 255) < task_key(&o, 256));
    }

    #[test]
    fn open_on_disk_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/data/pomo.redb");
        Store::open(&path).unwrap();
        assert!(path.exists());
    }
}

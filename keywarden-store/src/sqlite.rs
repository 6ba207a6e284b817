//! SQLite-backed key store.
//!
//! A single `rusqlite` connection behind a mutex; callers are expected to
//! invoke this from blocking threads. Record ids are UUID v7, so
//! `ORDER BY id DESC` picks the most recently created row wherever duplicate
//! values or hardware ids need a tie-break.

use crate::error::{StoreError, StoreResult};
use crate::KeyStore;
use chrono::{DateTime, Utc};
use keywarden_types::{KeyId, KeyRecord, NewKey};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// Persistent store for key records backed by SQLite.
pub struct SqliteKeyStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKeyStore {
    /// Opens (or creates) a key store at the given path.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory key store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS license_keys (
                id          TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                hwid        TEXT,
                usage_limit INTEGER NOT NULL,
                uses        INTEGER NOT NULL DEFAULT 0,
                expires_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_license_keys_value ON license_keys (value);
            CREATE INDEX IF NOT EXISTS idx_license_keys_hwid ON license_keys (hwid);
            CREATE INDEX IF NOT EXISTS idx_license_keys_expires_at ON license_keys (expires_at);
            ",
        )?;
        Ok(())
    }
}

impl KeyStore for SqliteKeyStore {
    fn insert(&self, new: NewKey) -> StoreResult<KeyRecord> {
        let record = KeyRecord {
            id: KeyId::new(),
            value: new.value,
            hwid: None,
            usage_limit: new.usage_limit,
            uses: 0,
            expires_at: new.expires_at,
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO license_keys (id, value, hwid, usage_limit, uses, expires_at)
             VALUES (?1, ?2, NULL, ?3, 0, ?4)",
            params![
                record.id.to_string(),
                record.value,
                record.usage_limit,
                record.expires_at.timestamp_millis(),
            ],
        )?;
        Ok(record)
    }

    fn find_by_value(&self, value: &str) -> StoreResult<Option<KeyRecord>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                "SELECT id, value, hwid, usage_limit, uses, expires_at FROM license_keys
                 WHERE value = ?1 ORDER BY id DESC LIMIT 1",
                params![value],
                read_row,
            )
            .optional()?;
        raw.map(decode_row).transpose()
    }

    fn find_by_hwid(&self, hwid: &str) -> StoreResult<Option<KeyRecord>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                "SELECT id, value, hwid, usage_limit, uses, expires_at FROM license_keys
                 WHERE hwid = ?1 ORDER BY id DESC LIMIT 1",
                params![hwid],
                read_row,
            )
            .optional()?;
        raw.map(decode_row).transpose()
    }

    fn update_if_uses(&self, record: &KeyRecord, expected_uses: u32) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE license_keys SET hwid = ?1, uses = ?2 WHERE id = ?3 AND uses = ?4",
            params![
                record.hwid,
                record.uses,
                record.id.to_string(),
                expected_uses,
            ],
        )?;
        Ok(changed == 1)
    }

    fn delete_by_id(&self, id: KeyId) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM license_keys WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM license_keys WHERE expires_at < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(deleted as u64)
    }

    fn delete_all(&self) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM license_keys", [])?;
        Ok(deleted as u64)
    }

    fn list_all(&self) -> StoreResult<Vec<KeyRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, value, hwid, usage_limit, uses, expires_at FROM license_keys
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], read_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(decode_row(row?)?);
        }
        Ok(result)
    }
}

type RawRow = (String, String, Option<String>, i64, i64, i64);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_row((id, value, hwid, usage_limit, uses, expires_at): RawRow) -> StoreResult<KeyRecord> {
    let id = KeyId::parse(&id).map_err(|e| StoreError::CorruptRecord(format!("invalid id: {e}")))?;
    let usage_limit = u32::try_from(usage_limit)
        .map_err(|_| StoreError::CorruptRecord(format!("usage_limit out of range: {usage_limit}")))?;
    let uses = u32::try_from(uses)
        .map_err(|_| StoreError::CorruptRecord(format!("uses out of range: {uses}")))?;
    let expires_at = DateTime::from_timestamp_millis(expires_at)
        .ok_or_else(|| StoreError::CorruptRecord(format!("expires_at out of range: {expires_at}")))?;
    Ok(KeyRecord {
        id,
        value,
        hwid,
        usage_limit,
        uses,
        expires_at,
    })
}

//! SQLite storage layer for Keywarden.
//!
//! Provides persistent storage for license key records. The store is a dumb
//! ledger: it assigns record ids, answers lookups, and performs conditional
//! writes, but it never applies lifecycle rules (those belong to the engine).
//!
//! # Architecture
//!
//! - One `license_keys` table, one row per key record
//! - Conditional updates use the `uses` counter as a version field, which is
//!   what makes concurrent redemptions race-safe
//! - Duplicate key values are tolerated; lookups resolve to the newest record

mod error;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteKeyStore;

use chrono::{DateTime, Utc};
use keywarden_types::{KeyId, KeyRecord, NewKey};

/// Storage abstraction for key records.
///
/// Implementations are synchronous; async callers run them on blocking
/// threads. Every method takes `&self`, so implementations handle their own
/// interior locking.
pub trait KeyStore: Send + Sync {
    /// Inserts a new key, assigning a fresh id. The stored record starts
    /// unbound with zero uses.
    fn insert(&self, new: NewKey) -> StoreResult<KeyRecord>;

    /// Looks up a key by its value. When duplicate values exist, returns the
    /// most recently created record.
    fn find_by_value(&self, value: &str) -> StoreResult<Option<KeyRecord>>;

    /// Looks up a key by its bound hardware id. When several records are
    /// bound to the same hardware id, returns the most recently created.
    fn find_by_hwid(&self, hwid: &str) -> StoreResult<Option<KeyRecord>>;

    /// Writes `record`'s mutable columns (`hwid` and `uses`) only if the
    /// stored row still has exactly `expected_uses` uses. Returns whether the
    /// write happened; `false` means a concurrent update or delete won.
    fn update_if_uses(&self, record: &KeyRecord, expected_uses: u32) -> StoreResult<bool>;

    /// Deletes a record by id. Returns whether a row existed; deleting a
    /// missing id is not an error.
    fn delete_by_id(&self, id: KeyId) -> StoreResult<bool>;

    /// Deletes every record whose expiry lies strictly before `cutoff`,
    /// returning how many were removed.
    fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    /// Deletes every record, returning how many were removed.
    fn delete_all(&self) -> StoreResult<u64>;

    /// Returns all records, oldest first.
    fn list_all(&self) -> StoreResult<Vec<KeyRecord>>;
}

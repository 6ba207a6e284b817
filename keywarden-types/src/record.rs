//! The license key record and its insertion form.

use crate::ids::KeyId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored license key.
///
/// `value`, `usage_limit`, and `expires_at` are fixed at creation; only
/// `hwid` and `uses` change over the record's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Unique record identifier, assigned by the store on insertion.
    pub id: KeyId,
    /// The opaque key string presented by clients.
    pub value: String,
    /// Hardware identifier bound on first redemption, `None` until then.
    pub hwid: Option<String>,
    /// Maximum number of redemptions (at least 1).
    pub usage_limit: u32,
    /// Redemptions consumed so far, `0..=usage_limit`.
    pub uses: u32,
    /// Instant after which the key is expired.
    pub expires_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Returns true if the key is expired at `now` (strictly past `expires_at`).
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Returns true if every permitted redemption has been consumed.
    #[must_use]
    pub fn limit_reached(&self) -> bool {
        self.uses >= self.usage_limit
    }

    /// Returns the number of redemptions still available.
    #[must_use]
    pub fn remaining_uses(&self) -> u32 {
        self.usage_limit.saturating_sub(self.uses)
    }

    /// Returns true if the key is bound to a hardware id other than `hwid`.
    /// An unbound key never conflicts.
    #[must_use]
    pub fn hwid_conflicts(&self, hwid: &str) -> bool {
        matches!(&self.hwid, Some(bound) if bound != hwid)
    }
}

/// The fields of a key record that exist before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKey {
    /// The opaque key string presented by clients.
    pub value: String,
    /// Maximum number of redemptions (at least 1).
    pub usage_limit: u32,
    /// Instant after which the key is expired.
    pub expires_at: DateTime<Utc>,
}

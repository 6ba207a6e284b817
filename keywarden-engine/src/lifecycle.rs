//! Pure lifecycle decisions for license keys.
//!
//! Every rule about creating, redeeming, and checking keys lives here as a
//! pure function of a record snapshot and an instant. The service layer
//! loads snapshots and persists whatever these functions decide; nothing in
//! this module performs I/O.

use chrono::{DateTime, Duration, Utc};
use keywarden_types::{KeyId, KeyRecord, NewKey};

/// Usage limit applied when a create request does not specify one.
pub const DEFAULT_USAGE_LIMIT: u32 = 1;

/// Time-to-live applied when a create request does not specify one.
pub const DEFAULT_TTL_MINUTES: i64 = 60;

/// TTLs are clamped to ±100 years so expiry arithmetic cannot overflow.
const MAX_TTL_MINUTES: i64 = 100 * 365 * 24 * 60;

/// Builds the insertion form of a key created at `now`.
///
/// A zero `usage_limit` is raised to 1. A zero or negative `ttl_minutes` is
/// honored as given and yields a record that is already expired, which the
/// sweeper or the next touch will remove.
#[must_use]
pub fn new_key(value: String, usage_limit: u32, ttl_minutes: i64, now: DateTime<Utc>) -> NewKey {
    let ttl = ttl_minutes.clamp(-MAX_TTL_MINUTES, MAX_TTL_MINUTES);
    NewKey {
        value,
        usage_limit: usage_limit.max(1),
        expires_at: truncate_to_millis(now + Duration::minutes(ttl)),
    }
}

/// Expiries are persisted at millisecond precision; truncate up front so a
/// record compares equal before and after a round trip through the store.
fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// What a redemption attempt should do to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemDecision {
    /// No record carries this value.
    NotFound,
    /// The record is past its expiry and must be removed.
    Expired {
        /// Id of the record to delete.
        delete: KeyId,
    },
    /// The record is bound to a different hardware id. Nothing changes.
    HwidMismatch,
    /// Every permitted use is consumed. Nothing changes.
    LimitReached,
    /// The redemption is granted.
    Redeem {
        /// The record to persist, with the binding applied and `uses`
        /// incremented.
        updated: KeyRecord,
        /// The `uses` value the stored row must still have for the write to
        /// land; anything else means a concurrent touch won.
        expected_uses: u32,
    },
}

/// Decides a redemption attempt against a record snapshot.
///
/// Rejections are ranked: missing record, then expiry, then hardware id
/// conflict, then usage limit. An expired record always reports `Expired`,
/// even when its hardware id would also mismatch or its limit is exhausted.
/// A granted redemption binds the hardware id if the record is unbound and
/// never rebinds one that is already set.
#[must_use]
pub fn decide_redeem(
    snapshot: Option<&KeyRecord>,
    hwid: &str,
    now: DateTime<Utc>,
) -> RedeemDecision {
    let Some(record) = snapshot else {
        return RedeemDecision::NotFound;
    };
    if record.is_expired(now) {
        return RedeemDecision::Expired { delete: record.id };
    }
    if record.hwid_conflicts(hwid) {
        return RedeemDecision::HwidMismatch;
    }
    if record.limit_reached() {
        return RedeemDecision::LimitReached;
    }

    let mut updated = record.clone();
    if updated.hwid.is_none() {
        updated.hwid = Some(hwid.to_string());
    }
    updated.uses += 1;
    RedeemDecision::Redeem {
        expected_uses: record.uses,
        updated,
    }
}

/// What a hardware id check should do to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckDecision {
    /// No record is bound to this hardware id.
    NotFound,
    /// The bound record is past its expiry and must be removed.
    Expired {
        /// Id of the record to delete.
        delete: KeyId,
    },
    /// The hardware id holds a live key.
    Valid {
        /// The key value bound to the hardware id.
        value: String,
    },
}

/// Decides a hardware id check against a record snapshot.
///
/// Checking is read-only for live records: it neither consumes a use nor
/// alters the binding.
#[must_use]
pub fn decide_check(snapshot: Option<&KeyRecord>, now: DateTime<Utc>) -> CheckDecision {
    let Some(record) = snapshot else {
        return CheckDecision::NotFound;
    };
    if record.is_expired(now) {
        return CheckDecision::Expired { delete: record.id };
    }
    CheckDecision::Valid {
        value: record.value.clone(),
    }
}

//! Async orchestration of lifecycle decisions against the store.

use crate::error::{ServiceError, ServiceResult};
use crate::lifecycle::{self, CheckDecision, RedeemDecision};
use chrono::{DateTime, Utc};
use keywarden_store::{KeyStore, StoreResult};
use keywarden_types::{KeyId, KeyRecord};
use std::sync::Arc;
use tracing::{debug, info};

/// The result of a redemption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// The redemption was granted; carries the updated record.
    Redeemed(KeyRecord),
    /// No record carries this value.
    NotFound,
    /// The record is bound to a different hardware id.
    HwidMismatch,
    /// Every permitted use is consumed.
    LimitReached,
    /// The record was expired; it has been removed.
    Expired,
}

/// The result of a hardware id check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The hardware id holds a live key.
    Valid {
        /// The key value bound to the hardware id.
        value: String,
    },
    /// No record is bound to this hardware id.
    NotFound,
    /// The bound record was expired; it has been removed.
    Expired,
}

/// Orchestrates key lifecycle operations against a shared store.
///
/// The service holds no state beyond the store handle. The store is
/// synchronous, so every call runs on a blocking thread.
pub struct KeyService {
    store: Arc<dyn KeyStore>,
}

impl KeyService {
    /// Creates a service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// Creates a key and returns the stored record.
    pub async fn create(
        &self,
        value: String,
        usage_limit: u32,
        ttl_minutes: i64,
    ) -> ServiceResult<KeyRecord> {
        let new = lifecycle::new_key(value, usage_limit, ttl_minutes, Utc::now());
        let store = Arc::clone(&self.store);
        let record = run_blocking(move || store.insert(new)).await?;
        info!(key_id = %record.id, usage_limit = record.usage_limit, "key created");
        Ok(record)
    }

    /// Redeems a key for a device, binding the key to the device's hardware
    /// id on first redemption.
    ///
    /// Runs an optimistic loop: snapshot, decide, then a conditional write
    /// keyed on the snapshot's `uses`. A lost write means another redemption
    /// or a delete landed in between; the next iteration sees its effect, so
    /// the loop repeats at most as often as `uses` can still grow.
    pub async fn redeem(&self, value: &str, hwid: &str) -> ServiceResult<RedeemOutcome> {
        loop {
            let store = Arc::clone(&self.store);
            let lookup = value.to_string();
            let snapshot = run_blocking(move || store.find_by_value(&lookup)).await?;

            match lifecycle::decide_redeem(snapshot.as_ref(), hwid, Utc::now()) {
                RedeemDecision::NotFound => return Ok(RedeemOutcome::NotFound),
                RedeemDecision::HwidMismatch => {
                    debug!(value, hwid, "redemption rejected, hardware id mismatch");
                    return Ok(RedeemOutcome::HwidMismatch);
                }
                RedeemDecision::LimitReached => {
                    debug!(value, "redemption rejected, usage limit reached");
                    return Ok(RedeemOutcome::LimitReached);
                }
                RedeemDecision::Expired { delete } => {
                    self.remove_expired(delete).await?;
                    return Ok(RedeemOutcome::Expired);
                }
                RedeemDecision::Redeem {
                    updated,
                    expected_uses,
                } => {
                    let store = Arc::clone(&self.store);
                    let candidate = updated.clone();
                    let written =
                        run_blocking(move || store.update_if_uses(&candidate, expected_uses))
                            .await?;
                    if written {
                        info!(
                            key_id = %updated.id,
                            uses = updated.uses,
                            usage_limit = updated.usage_limit,
                            "key redeemed"
                        );
                        return Ok(RedeemOutcome::Redeemed(updated));
                    }
                    debug!(key_id = %updated.id, "conditional write lost a race, retrying");
                }
            }
        }
    }

    /// Looks up the key bound to a hardware id without consuming a use.
    pub async fn check_hwid(&self, hwid: &str) -> ServiceResult<CheckOutcome> {
        let store = Arc::clone(&self.store);
        let lookup = hwid.to_string();
        let snapshot = run_blocking(move || store.find_by_hwid(&lookup)).await?;

        match lifecycle::decide_check(snapshot.as_ref(), Utc::now()) {
            CheckDecision::NotFound => Ok(CheckOutcome::NotFound),
            CheckDecision::Expired { delete } => {
                self.remove_expired(delete).await?;
                Ok(CheckOutcome::Expired)
            }
            CheckDecision::Valid { value } => Ok(CheckOutcome::Valid { value }),
        }
    }

    /// Returns every stored record, oldest first.
    pub async fn list(&self) -> ServiceResult<Vec<KeyRecord>> {
        let store = Arc::clone(&self.store);
        run_blocking(move || store.list_all()).await
    }

    /// Deletes every record, returning how many were removed.
    pub async fn purge_all(&self) -> ServiceResult<u64> {
        let store = Arc::clone(&self.store);
        let removed = run_blocking(move || store.delete_all()).await?;
        info!(removed, "purged all keys");
        Ok(removed)
    }

    /// Deletes every record already expired at `now`, returning how many
    /// were removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> ServiceResult<u64> {
        let store = Arc::clone(&self.store);
        run_blocking(move || store.delete_expired_before(now)).await
    }

    async fn remove_expired(&self, id: KeyId) -> ServiceResult<()> {
        let store = Arc::clone(&self.store);
        run_blocking(move || store.delete_by_id(id)).await?;
        info!(key_id = %id, "removed expired key on touch");
        Ok(())
    }
}

async fn run_blocking<T, F>(f: F) -> ServiceResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ServiceError::from),
        Err(join) => Err(ServiceError::Task(join.to_string())),
    }
}

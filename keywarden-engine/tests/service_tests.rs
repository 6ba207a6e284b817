//! Tests for the async key service against a real in-memory store.

use chrono::{Duration, Utc};
use keywarden_engine::{CheckOutcome, KeyService, RedeemOutcome};
use keywarden_store::{KeyStore, SqliteKeyStore};
use keywarden_types::NewKey;
use std::sync::Arc;

fn service() -> KeyService {
    let store = Arc::new(SqliteKeyStore::open_in_memory().unwrap());
    KeyService::new(store)
}

/// Service plus a raw handle on the same store, for tests that need to
/// plant records the public operations cannot produce (e.g. bound but
/// already expired).
fn service_with_store() -> (KeyService, Arc<SqliteKeyStore>) {
    let store = Arc::new(SqliteKeyStore::open_in_memory().unwrap());
    (KeyService::new(store.clone()), store)
}

// ── Create ────────────────────────────────────────────────────────

#[tokio::test]
async fn create_stores_a_fresh_record() {
    let service = service();
    let record = service.create("AAAA-1111".into(), 3, 60).await.unwrap();

    assert_eq!(record.value, "AAAA-1111");
    assert_eq!(record.usage_limit, 3);
    assert_eq!(record.uses, 0);
    assert_eq!(record.hwid, None);

    let listed = service.list().await.unwrap();
    assert_eq!(listed, vec![record]);
}

#[tokio::test]
async fn create_raises_zero_limit_to_one() {
    let service = service();
    let record = service.create("AAAA-1111".into(), 0, 60).await.unwrap();
    assert_eq!(record.usage_limit, 1);
}

#[tokio::test]
async fn create_accepts_negative_ttl_as_pre_expired() {
    let service = service();
    let record = service.create("AAAA-1111".into(), 1, -5).await.unwrap();
    assert!(record.is_expired(Utc::now()));
}

// ── Redeem ────────────────────────────────────────────────────────

#[tokio::test]
async fn redeem_lifecycle_binds_counts_and_exhausts() {
    let service = service();
    service.create("AAAA-1111".into(), 2, 60).await.unwrap();

    // First redemption binds device A and consumes one use.
    match service.redeem("AAAA-1111", "device-a").await.unwrap() {
        RedeemOutcome::Redeemed(rec) => {
            assert_eq!(rec.hwid.as_deref(), Some("device-a"));
            assert_eq!(rec.uses, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // Device B is locked out for the record's whole life.
    assert_eq!(
        service.redeem("AAAA-1111", "device-b").await.unwrap(),
        RedeemOutcome::HwidMismatch
    );

    // Device A can consume the second use.
    match service.redeem("AAAA-1111", "device-a").await.unwrap() {
        RedeemOutcome::Redeemed(rec) => assert_eq!(rec.uses, 2),
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The allowance is gone.
    assert_eq!(
        service.redeem("AAAA-1111", "device-a").await.unwrap(),
        RedeemOutcome::LimitReached
    );
}

#[tokio::test]
async fn redeem_unknown_value() {
    let service = service();
    assert_eq!(
        service.redeem("NOPE-0000", "device-a").await.unwrap(),
        RedeemOutcome::NotFound
    );
}

#[tokio::test]
async fn rejected_redemptions_consume_nothing() {
    let service = service();
    service.create("AAAA-1111".into(), 2, 60).await.unwrap();
    service.redeem("AAAA-1111", "device-a").await.unwrap();

    service.redeem("AAAA-1111", "device-b").await.unwrap();
    service.redeem("AAAA-1111", "device-b").await.unwrap();

    let listed = service.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].uses, 1);
    assert_eq!(listed[0].hwid.as_deref(), Some("device-a"));
}

#[tokio::test]
async fn redeeming_an_expired_key_deletes_it() {
    let service = service();
    service.create("GONE-0000".into(), 5, -1).await.unwrap();

    assert_eq!(
        service.redeem("GONE-0000", "device-a").await.unwrap(),
        RedeemOutcome::Expired
    );
    assert!(service.list().await.unwrap().is_empty());

    // The record is gone, so the next attempt is a plain miss.
    assert_eq!(
        service.redeem("GONE-0000", "device-a").await.unwrap(),
        RedeemOutcome::NotFound
    );
}

// ── Check ─────────────────────────────────────────────────────────

#[tokio::test]
async fn check_finds_the_bound_key() {
    let service = service();
    service.create("AAAA-1111".into(), 2, 60).await.unwrap();
    service.redeem("AAAA-1111", "device-a").await.unwrap();

    assert_eq!(
        service.check_hwid("device-a").await.unwrap(),
        CheckOutcome::Valid {
            value: "AAAA-1111".to_string()
        }
    );
}

#[tokio::test]
async fn check_unknown_hwid() {
    let service = service();
    service.create("AAAA-1111".into(), 2, 60).await.unwrap();
    assert_eq!(
        service.check_hwid("device-a").await.unwrap(),
        CheckOutcome::NotFound
    );
}

#[tokio::test]
async fn check_does_not_consume_a_use() {
    let service = service();
    service.create("AAAA-1111".into(), 2, 60).await.unwrap();
    service.redeem("AAAA-1111", "device-a").await.unwrap();

    for _ in 0..5 {
        service.check_hwid("device-a").await.unwrap();
    }

    let listed = service.list().await.unwrap();
    assert_eq!(listed[0].uses, 1);
}

#[tokio::test]
async fn checking_an_expired_binding_deletes_it() {
    let (service, store) = service_with_store();

    // Plant a record that was bound while live and has since expired.
    let mut record = store
        .insert(NewKey {
            value: "OLD-00000".to_string(),
            usage_limit: 2,
            expires_at: Utc::now() - Duration::minutes(5),
        })
        .unwrap();
    record.hwid = Some("device-a".to_string());
    record.uses = 1;
    assert!(store.update_if_uses(&record, 0).unwrap());

    assert_eq!(
        service.check_hwid("device-a").await.unwrap(),
        CheckOutcome::Expired
    );
    assert!(service.list().await.unwrap().is_empty());
}

// ── Purge and sweep ───────────────────────────────────────────────

#[tokio::test]
async fn purge_all_reports_count() {
    let service = service();
    service.create("AAAA-1111".into(), 1, 60).await.unwrap();
    service.create("BBBB-2222".into(), 1, 60).await.unwrap();

    assert_eq!(service.purge_all().await.unwrap(), 2);
    assert_eq!(service.purge_all().await.unwrap(), 0);
    assert!(service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn sweep_removes_exactly_the_expired_records() {
    let service = service();
    service.create("DEAD-0001".into(), 1, -30).await.unwrap();
    service.create("DEAD-0002".into(), 1, -1).await.unwrap();
    service.create("DEAD-0003".into(), 1, -90).await.unwrap();
    service.create("LIVE-0001".into(), 1, 60).await.unwrap();
    service.create("LIVE-0002".into(), 1, 120).await.unwrap();

    assert_eq!(service.sweep_expired(Utc::now()).await.unwrap(), 3);

    let mut remaining: Vec<_> = service
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.value)
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec!["LIVE-0001", "LIVE-0002"]);

    // A second sweep finds nothing left to do.
    assert_eq!(service.sweep_expired(Utc::now()).await.unwrap(), 0);
}

// ── Concurrency ───────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_never_exceed_the_limit() {
    let store = Arc::new(SqliteKeyStore::open_in_memory().unwrap());
    let service = Arc::new(KeyService::new(store));
    service.create("RACE-0000".into(), 4, 60).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.redeem("RACE-0000", "device-a").await.unwrap()
        }));
    }

    let mut granted = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            RedeemOutcome::Redeemed(_) => granted += 1,
            RedeemOutcome::LimitReached => limited += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(granted, 4);
    assert_eq!(limited, 12);

    let listed = service.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].uses, 4);
    assert_eq!(listed[0].hwid.as_deref(), Some("device-a"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_redemptions_bind_exactly_once() {
    let store = Arc::new(SqliteKeyStore::open_in_memory().unwrap());
    let service = Arc::new(KeyService::new(store));
    service.create("BIND-0000".into(), 16, 60).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = Arc::clone(&service);
        let hwid = if i % 2 == 0 { "device-a" } else { "device-b" };
        handles.push(tokio::spawn(async move {
            service.redeem("BIND-0000", hwid).await.unwrap()
        }));
    }

    let mut granted = Vec::new();
    let mut mismatched = 0;
    for handle in handles {
        match handle.await.unwrap() {
            RedeemOutcome::Redeemed(rec) => granted.push(rec),
            RedeemOutcome::HwidMismatch => mismatched += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    let listed = service.list().await.unwrap();
    let winner = listed[0].hwid.clone().unwrap();

    // Whichever device bound first, the binding never changed hands and
    // every grant went to it.
    assert!(winner == "device-a" || winner == "device-b");
    assert!(!granted.is_empty());
    assert_eq!(granted.len() + mismatched, 8);
    assert_eq!(listed[0].uses as usize, granted.len());
    for rec in &granted {
        assert_eq!(rec.hwid.as_deref(), Some(winner.as_str()));
    }
}

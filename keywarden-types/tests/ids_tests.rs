use keywarden_types::KeyId;
use std::collections::HashSet;
use std::str::FromStr;

// ── KeyId ─────────────────────────────────────────────────────────

#[test]
fn key_id_new_is_unique() {
    let a = KeyId::new();
    let b = KeyId::new();
    assert_ne!(a, b);
}

#[test]
fn key_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    let id = KeyId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
}

#[test]
fn key_id_display_and_parse() {
    let id = KeyId::new();
    let s = id.to_string();
    let parsed = KeyId::parse(&s).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn key_id_from_str() {
    let id = KeyId::new();
    let s = id.to_string();
    let parsed: KeyId = KeyId::from_str(&s).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn key_id_parse_invalid() {
    assert!(KeyId::parse("not-a-uuid").is_err());
}

#[test]
fn key_id_from_str_invalid() {
    assert!(KeyId::from_str("garbage").is_err());
}

#[test]
fn key_id_default_is_unique() {
    let a = KeyId::default();
    let b = KeyId::default();
    assert_ne!(a, b);
}

#[test]
fn key_id_hash_and_eq() {
    let id = KeyId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id); // duplicate
    assert_eq!(set.len(), 1);
}

#[test]
fn key_id_clone_and_copy() {
    let id = KeyId::new();
    let cloned = id;
    assert_eq!(id, cloned);
}

#[test]
fn key_id_serialization_roundtrip() {
    let id = KeyId::new();
    let json = serde_json::to_string(&id).unwrap();
    let parsed: KeyId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn key_id_serializes_as_plain_string() {
    let id = KeyId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
}

#[test]
fn key_id_debug_contains_key_id() {
    let id = KeyId::new();
    let debug = format!("{:?}", id);
    assert!(debug.contains("KeyId"));
}

#[test]
fn key_ids_order_by_creation_time() {
    let earlier = KeyId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let later = KeyId::new();
    assert!(later.to_string() > earlier.to_string());
}

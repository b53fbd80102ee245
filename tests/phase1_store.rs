//! Phase 1 tests: score store, action encoding, snapshot format.

use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::NamedTempFile;

use karma::format::{SnapshotReader, SnapshotWriter};
use karma::store::{KeyKind, MemoryStore, Order, ScoreStore};
use karma::types::header::{SnapshotHeader, HEADER_SIZE};
use karma::types::{keys, Action, KarmaError, ManualClock, FORMAT_VERSION, SNAPSHOT_MAGIC};

// ==================== Helpers ====================

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ))
}

fn store_with(clock: &Arc<ManualClock>) -> MemoryStore {
    MemoryStore::with_clock(clock.clone())
}

// ==================== Ranked Set Tests ====================

#[test]
fn test_incr_by_creates_member_at_zero() {
    let store = MemoryStore::new();
    assert_eq!(store.incr_by("terms", "foo", 1.0).unwrap(), 1.0);
    assert_eq!(store.incr_by("terms", "foo", -3.0).unwrap(), -2.0);
    assert_eq!(store.score("terms", "foo").unwrap(), Some(-2.0));
    assert_eq!(store.score("terms", "bar").unwrap(), None);
}

#[test]
fn test_ranked_add_reports_new_members() {
    let store = MemoryStore::new();
    assert!(store.ranked_add("r", "a", 1.0).unwrap());
    assert!(!store.ranked_add("r", "a", 5.0).unwrap());
    assert_eq!(store.score("r", "a").unwrap(), Some(5.0));
    assert_eq!(store.ranked_len("r").unwrap(), 1);
}

#[test]
fn test_range_by_rank_orders_ties_by_name() {
    let store = MemoryStore::new();
    for (member, score) in [("b", 1.0), ("a", 1.0), ("c", 2.0), ("d", 0.0)] {
        store.ranked_add("r", member, score).unwrap();
    }

    let asc: Vec<String> = store
        .range_by_rank("r", Order::Ascending, 0, None)
        .unwrap()
        .into_iter()
        .map(|(m, _)| m)
        .collect();
    assert_eq!(asc, vec!["d", "a", "b", "c"]);

    let desc: Vec<String> = store
        .range_by_rank("r", Order::Descending, 0, None)
        .unwrap()
        .into_iter()
        .map(|(m, _)| m)
        .collect();
    assert_eq!(desc, vec!["c", "b", "a", "d"]);

    let page = store.range_by_rank("r", Order::Ascending, 1, Some(2)).unwrap();
    assert_eq!(page, vec![("a".to_string(), 1.0), ("b".to_string(), 1.0)]);
}

#[test]
fn test_range_by_score_is_inclusive() {
    let store = MemoryStore::new();
    for i in 0..10 {
        store.ranked_add("r", &format!("m{i}"), i as f64).unwrap();
    }
    let hits = store.range_by_score("r", 2.0, 4.0).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].1, 2.0);
    assert_eq!(hits[2].1, 4.0);

    assert_eq!(store.remove_range_by_score("r", f64::NEG_INFINITY, 4.0).unwrap(), 5);
    assert_eq!(store.ranked_len("r").unwrap(), 5);
}

#[test]
fn test_removing_last_member_removes_key() {
    let store = MemoryStore::new();
    store.ranked_add("r", "only", 1.0).unwrap();
    assert!(store.exists("r").unwrap());
    assert!(store.ranked_remove("r", "only").unwrap());
    assert!(!store.exists("r").unwrap());
    assert!(!store.ranked_remove("r", "only").unwrap());

    store.set_add("s", "x").unwrap();
    store.set_remove("s", "x").unwrap();
    assert!(!store.exists("s").unwrap());
}

// ==================== Set and Value Tests ====================

#[test]
fn test_set_membership() {
    let store = MemoryStore::new();
    assert!(store.set_add("links:foo", "bar").unwrap());
    assert!(store.set_add("links:foo", "baz").unwrap());
    assert!(!store.set_add("links:foo", "bar").unwrap());
    assert_eq!(store.set_members("links:foo").unwrap(), vec!["bar", "baz"]);
    assert!(store.set_contains("links:foo", "baz").unwrap());
    assert!(store.set_remove("links:foo", "baz").unwrap());
    assert!(!store.set_contains("links:foo", "baz").unwrap());
    assert!(store.set_members("links:none").unwrap().is_empty());
}

#[test]
fn test_wrong_kind_is_rejected() {
    let store = MemoryStore::new();
    store.set_add("modified:foo", "U1").unwrap();
    let err = store.incr_by("modified:foo", "U1", 1.0).unwrap_err();
    assert!(matches!(err, KarmaError::WrongKind { expected: "ranked set", .. }));
    assert!(store.set_value("modified:foo", "x").is_ok());
    assert_eq!(store.key_kind("modified:foo").unwrap(), Some(KeyKind::Value));
    assert!(matches!(
        store.set_add("modified:foo", "U1"),
        Err(KarmaError::WrongKind { .. })
    ));
}

#[test]
fn test_keys_with_prefix_sorted() {
    let store = MemoryStore::new();
    store.set_add("links:b", "x").unwrap();
    store.set_add("links:a", "x").unwrap();
    store.set_add("linked_to:x", "a").unwrap();
    store.ranked_add("modified:a", "U1", 1.0).unwrap();
    assert_eq!(
        store.keys_with_prefix(keys::LINKS_PREFIX).unwrap(),
        vec!["links:a", "links:b"]
    );
}

#[test]
fn test_values_and_sentinels() {
    let store = MemoryStore::new();
    assert_eq!(store.get_value(keys::SUPPORT_DECAY).unwrap(), None);
    store.set_value(keys::SUPPORT_DECAY, "1").unwrap();
    assert_eq!(store.get_value(keys::SUPPORT_DECAY).unwrap().as_deref(), Some("1"));
    assert_eq!(store.ttl(keys::SUPPORT_DECAY).unwrap(), None);
    assert!(store.remove(keys::SUPPORT_DECAY).unwrap());
    assert!(!store.remove(keys::SUPPORT_DECAY).unwrap());
}

// ==================== Expiry Tests ====================

#[test]
fn test_expiring_value_lifecycle() {
    let clock = clock();
    let store = store_with(&clock);
    let key = keys::cooldown("U1", "foo");

    store.set_with_expiry(&key, "1", 300).unwrap();
    assert_eq!(store.ttl(&key).unwrap(), Some(300));

    clock.advance_secs(100);
    assert_eq!(store.ttl(&key).unwrap(), Some(200));
    assert!(store.exists(&key).unwrap());

    clock.advance_secs(200);
    assert_eq!(store.ttl(&key).unwrap(), None);
    assert!(!store.exists(&key).unwrap());
    assert_eq!(store.get_value(&key).unwrap(), None);
}

#[test]
fn test_offline_store_is_unavailable() {
    let store = MemoryStore::new();
    store.set_online(false);
    assert!(matches!(
        store.incr_by("terms", "foo", 1.0),
        Err(KarmaError::StoreUnavailable(_))
    ));
    store.set_online(true);
    assert!(store.incr_by("terms", "foo", 1.0).is_ok());
}

// ==================== Action Encoding Tests ====================

#[test]
fn test_action_wire_format() {
    let at = DateTime::from_timestamp_micros(1_700_000_000_123_456).unwrap();
    let action = Action::new("foo", Some("U1".to_string()), 1, at);
    let raw = action.serialize();
    assert_eq!(raw, r#"["foo","U1",1,1700000000.123456]"#);
    assert_eq!(Action::deserialize(&raw).unwrap(), action);
}

#[test]
fn test_action_anonymous_and_numeric_user() {
    let anon = Action::deserialize(r#"["foo",null,-1,1700000000.5]"#).unwrap();
    assert_eq!(anon.user_id, None);
    assert_eq!(anon.delta, -1);

    let numeric = Action::deserialize(r#"["foo",42,1,1700000000.0]"#).unwrap();
    assert_eq!(numeric.user_id.as_deref(), Some("42"));
}

#[test]
fn test_action_corrupt_entries() {
    for raw in [
        "not json",
        r#"["foo","U1",1]"#,
        r#"[1,"U1",1,1700000000.0]"#,
        r#"["foo","U1","x",1700000000.0]"#,
        r#"["foo",true,1,1700000000.0]"#,
    ] {
        assert!(matches!(
            Action::deserialize(raw),
            Err(KarmaError::CorruptAction(_))
        ));
    }
}

// ==================== Snapshot Format Tests ====================

#[test]
fn test_header_roundtrip() {
    let header = SnapshotHeader::new(1234);
    let mut buf = Vec::new();
    header.write_to(&mut buf).unwrap();
    assert_eq!(buf.len(), HEADER_SIZE);
    assert_eq!(&buf[..4], &SNAPSHOT_MAGIC);

    let read = SnapshotHeader::read_from(&mut Cursor::new(&buf)).unwrap();
    assert_eq!(read.version, FORMAT_VERSION);
    assert_eq!(read.body_len, 1234);
}

#[test]
fn test_header_rejects_bad_magic_and_version() {
    let mut buf = Vec::new();
    SnapshotHeader::new(0).write_to(&mut buf).unwrap();

    let mut bad_magic = buf.clone();
    bad_magic[0] = b'X';
    assert!(matches!(
        SnapshotHeader::read_from(&mut Cursor::new(&bad_magic)),
        Err(KarmaError::InvalidMagic)
    ));

    let mut bad_version = buf.clone();
    bad_version[4] = 99;
    assert!(matches!(
        SnapshotHeader::read_from(&mut Cursor::new(&bad_version)),
        Err(KarmaError::UnsupportedVersion(99))
    ));
}

#[test]
fn test_snapshot_roundtrip_preserves_everything() {
    let clock = clock();
    let store = store_with(&clock);
    store.incr_by(keys::TERMS, "foo", 3.0).unwrap();
    store.incr_by(keys::TERMS, "bar", -2.0).unwrap();
    store.incr_by(&keys::modified("foo"), "U1", 3.0).unwrap();
    store.set_add(&keys::links("foo"), "bar").unwrap();
    store.set_add(&keys::linked_to("bar"), "foo").unwrap();
    store.set_value(keys::SUPPORT_REVERSE_LINKS, "1").unwrap();
    store
        .set_with_expiry(&keys::cooldown("U1", "foo"), "1", 300)
        .unwrap();

    let tmp = NamedTempFile::new().unwrap();
    SnapshotWriter::write_to_file(&store, tmp.path()).unwrap();

    clock.advance_secs(60);
    let loaded = SnapshotReader::read_from_file(tmp.path(), clock.clone()).unwrap();
    assert_eq!(loaded.score(keys::TERMS, "foo").unwrap(), Some(3.0));
    assert_eq!(loaded.score(keys::TERMS, "bar").unwrap(), Some(-2.0));
    assert_eq!(loaded.score(&keys::modified("foo"), "U1").unwrap(), Some(3.0));
    assert_eq!(loaded.set_members(&keys::links("foo")).unwrap(), vec!["bar"]);
    assert_eq!(loaded.set_members(&keys::linked_to("bar")).unwrap(), vec!["foo"]);
    assert!(loaded.exists(keys::SUPPORT_REVERSE_LINKS).unwrap());
    assert_eq!(
        loaded.ttl(&keys::cooldown("U1", "foo")).unwrap(),
        Some(240)
    );
    assert_eq!(loaded.key_count(), store.key_count());
}

#[test]
fn test_snapshot_drops_expired_values() {
    let clock = clock();
    let store = store_with(&clock);
    store
        .set_with_expiry(&keys::cooldown("U1", "foo"), "1", 10)
        .unwrap();

    let mut buf = Vec::new();
    SnapshotWriter::write_to(&store.snapshot(), &mut buf).unwrap();

    clock.advance_secs(11);
    let snapshot = SnapshotReader::read_from(&mut Cursor::new(&buf)).unwrap();
    let loaded = MemoryStore::from_snapshot(snapshot, clock.clone());
    assert!(!loaded.exists(&keys::cooldown("U1", "foo")).unwrap());
}

#[test]
fn test_snapshot_truncated_and_missing() {
    let clock = clock();
    let store = store_with(&clock);
    store.incr_by(keys::TERMS, "foo", 1.0).unwrap();

    let mut buf = Vec::new();
    SnapshotWriter::write_to(&store.snapshot(), &mut buf).unwrap();
    buf.truncate(buf.len() - 1);
    assert!(matches!(
        SnapshotReader::read_from(&mut Cursor::new(&buf)),
        Err(KarmaError::Truncated)
    ));
    assert!(matches!(
        SnapshotReader::read_from(&mut Cursor::new(&buf[..8])),
        Err(KarmaError::Truncated)
    ));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.krm");
    let empty = SnapshotReader::read_or_create(&path, clock.clone()).unwrap();
    assert_eq!(empty.key_count(), 0);
    assert!(!path.exists());
}

//! Phase 3 tests: action log and decay engine.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use karma::config::KarmaConfig;
use karma::engine::{ActionLog, DecayEngine, KarmaEngine};
use karma::store::{MemoryStore, ScoreStore};
use karma::types::{keys, to_unix_secs, Action, Clock, ManualClock};

const HOUR: i64 = 3600;

// ==================== Helpers ====================

fn decay_config() -> KarmaConfig {
    KarmaConfig::builder()
        .cooldown(None)
        .link_threshold(None)
        .decay(true)
        .decay_interval(HOUR as u64)
        .build()
        .unwrap()
}

fn engine_with(config: KarmaConfig) -> (KarmaEngine<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ));
    let store = MemoryStore::with_clock(clock.clone());
    (KarmaEngine::with_clock(store, config, clock.clone()), clock)
}

fn own(engine: &KarmaEngine<MemoryStore>, term: &str) -> i64 {
    engine.check(term).unwrap().own
}

// ==================== Action Log Tests ====================

#[test]
fn test_mutations_append_actions() {
    let (engine, clock) = engine_with(decay_config());
    engine.increment("foo", "U1").unwrap();
    clock.advance_secs(5);
    engine.decrement("foo", "U2").unwrap();

    let actions = ActionLog::new(engine.store()).all().unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].user_id.as_deref(), Some("U1"));
    assert_eq!(actions[0].delta, 1);
    assert_eq!(actions[1].delta, -1);
    assert_eq!(actions[1].at - actions[0].at, Duration::seconds(5));
}

#[test]
fn test_no_actions_without_decay() {
    let config = KarmaConfig::builder().cooldown(None).build().unwrap();
    let (engine, _) = engine_with(config);
    engine.increment("foo", "U1").unwrap();
    assert!(ActionLog::new(engine.store()).is_empty().unwrap());
    assert!(engine.run_decay().unwrap().is_empty());
}

#[test]
fn test_identical_actions_get_distinct_slots() {
    let (engine, _) = engine_with(decay_config());
    for _ in 0..3 {
        engine.increment("foo", "U1").unwrap();
    }
    let actions = ActionLog::new(engine.store()).all().unwrap();
    assert_eq!(actions.len(), 3);
    assert!(actions[0].at < actions[1].at && actions[1].at < actions[2].at);
}

#[test]
fn test_tally_groups_by_term_and_user() {
    let (engine, _) = engine_with(decay_config());
    engine.increment("foo", "U1").unwrap();
    engine.increment("foo", "U1").unwrap();
    engine.decrement("foo", "U2").unwrap();
    engine.increment("bar", "U1").unwrap();

    let tallies = ActionLog::new(engine.store()).tally().unwrap();
    let foo = &tallies["foo"];
    assert_eq!(foo.count(Some("U1")), 2);
    assert_eq!(foo.count(Some("U2")), 1);
    assert_eq!(foo.count(None), 0);
    assert_eq!(foo.total(), 3);
    assert_eq!(foo.delta_sum, 1);
    assert_eq!(tallies["bar"].delta_sum, 1);
}

// ==================== Decay Tests ====================

#[test]
fn test_expired_actions_are_reversed() {
    let (engine, clock) = engine_with(decay_config());
    engine.increment("foo", "U1").unwrap();
    engine.increment("foo", "U2").unwrap();
    clock.advance_secs(HOUR / 2);
    engine.increment("foo", "U3").unwrap();
    assert_eq!(own(&engine, "foo"), 3);

    clock.advance_secs(HOUR / 2);
    assert_eq!(own(&engine, "foo"), 1);
    let users: Vec<String> = engine
        .modified("foo")
        .unwrap()
        .into_iter()
        .map(|m| m.user_id)
        .collect();
    assert_eq!(users, vec!["U3"]);

    clock.advance_secs(HOUR / 2);
    assert_eq!(own(&engine, "foo"), 0);
    let best = engine.list_best(None).unwrap();
    assert_eq!(best.len(), 1);
    assert_eq!((best[0].term.as_str(), best[0].score), ("foo", 0));
    assert!(ActionLog::new(engine.store()).is_empty().unwrap());
}

#[test]
fn test_expired_decrements_restore_score() {
    let (engine, clock) = engine_with(decay_config());
    engine.increment("foo", "U1").unwrap();
    clock.advance_secs(10);
    engine.decrement("foo", "U2").unwrap();
    engine.decrement("foo", "U3").unwrap();
    assert_eq!(own(&engine, "foo"), -1);

    clock.advance_secs(HOUR - 10);
    assert_eq!(own(&engine, "foo"), -2);
    clock.advance_secs(10);
    assert_eq!(own(&engine, "foo"), 0);
}

#[test]
fn test_decay_keeps_links_of_zeroed_terms() {
    let (engine, clock) = engine_with(decay_config());
    engine.increment("bar", "U1").unwrap();
    engine.link("foo", "bar").unwrap();
    clock.advance_secs(10);
    engine.increment("foo", "U1").unwrap();
    clock.advance_secs(HOUR - 10);

    let report = engine.run_decay().unwrap();
    assert_eq!(report.terms_touched, vec!["bar"]);
    assert_eq!(engine.store().score(keys::TERMS, "bar").unwrap(), Some(0.0));
    assert_eq!(engine.term("foo").links().unwrap(), vec!["bar"]);
    assert_eq!(engine.check("foo").unwrap().total, 1);
}

#[test]
fn test_decay_report_and_idempotence() {
    let (engine, clock) = engine_with(decay_config());
    engine.increment("foo", "U1").unwrap();
    engine.increment("foo", "U2").unwrap();
    engine.decrement("bar", "U1").unwrap();
    engine.increment("keep", "U1").unwrap();
    engine.increment("keep", "U2").unwrap();
    clock.advance_secs(HOUR - 1);
    engine.increment("keep", "U3").unwrap();
    clock.advance_secs(1);

    let store = engine.store();
    let now = clock.now();
    let report = DecayEngine::new(store, HOUR as u64).run(now).unwrap();
    assert_eq!(report.actions_expired, 5);
    assert_eq!(report.terms_touched, vec!["bar", "foo", "keep"]);
    assert_eq!(report.modifiers_cleared, 5);
    assert_eq!(store.score(keys::TERMS, "foo").unwrap(), Some(0.0));
    assert_eq!(store.score(keys::TERMS, "bar").unwrap(), Some(0.0));

    let again = DecayEngine::new(store, HOUR as u64).run(now).unwrap();
    assert!(again.is_empty());
    assert_eq!(store.score(keys::TERMS, "keep").unwrap(), Some(1.0));
    assert_eq!(store.ranked_len(keys::ACTIONS).unwrap(), 1);
}

#[test]
fn test_decayed_and_voted_zero_terms_list_alike() {
    let (engine, clock) = engine_with(decay_config());
    engine.increment("five", "U1").unwrap();
    clock.advance_secs(HOUR / 2);
    engine.increment("four", "U1").unwrap();
    engine.decrement("four", "U2").unwrap();
    engine.increment("one", "U1").unwrap();
    clock.advance_secs(HOUR / 2);

    assert_eq!(own(&engine, "five"), 0);
    assert_eq!(own(&engine, "four"), 0);
    let best: Vec<(String, i64)> = engine
        .list_best(None)
        .unwrap()
        .into_iter()
        .map(|r| (r.term, r.score))
        .collect();
    assert_eq!(
        best,
        vec![
            ("one".to_string(), 1),
            ("four".to_string(), 0),
            ("five".to_string(), 0)
        ]
    );
}

#[test]
fn test_decay_then_vote_keeps_score_equal_to_live_history() {
    let (engine, clock) = engine_with(decay_config());
    engine.increment("foo", "U1").unwrap();
    clock.advance_secs(HOUR);
    engine.run_decay().unwrap();
    engine.increment("foo", "U9").unwrap();
    assert_eq!(own(&engine, "foo"), 1);

    let live: i64 = ActionLog::new(engine.store())
        .all()
        .unwrap()
        .iter()
        .map(|a| a.delta)
        .sum();
    assert_eq!(live, 1);

    clock.advance_secs(HOUR);
    assert_eq!(own(&engine, "foo"), 0);
    assert_eq!(engine.list_worst(None).unwrap()[0].score, 0);
}

#[test]
fn test_decay_skips_scores_without_history() {
    let (engine, clock) = engine_with(decay_config());
    engine.store().ranked_add(keys::TERMS, "legacy", 7.0).unwrap();
    engine.increment("foo", "U1").unwrap();
    clock.advance_secs(2 * HOUR);
    assert_eq!(own(&engine, "legacy"), 7);
    assert_eq!(own(&engine, "foo"), 0);
}

#[test]
fn test_decay_drops_undecodable_entries() {
    let (engine, clock) = engine_with(decay_config());
    let store = engine.store();
    engine.increment("foo", "U1").unwrap();
    let stale = clock.now() - Duration::seconds(2 * HOUR);
    store
        .ranked_add(keys::ACTIONS, "{not an action", to_unix_secs(stale))
        .unwrap();

    let report = engine.run_decay().unwrap();
    assert_eq!(report.actions_expired, 0);
    assert_eq!(store.ranked_len(keys::ACTIONS).unwrap(), 1);
    assert_eq!(own(&engine, "foo"), 1);
}

#[test]
fn test_concurrent_decay_never_double_counts() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let log = ActionLog::new(store.as_ref());
    let start = clock.now();

    for i in 0..200 {
        let user = format!("U{}", i % 7);
        let delta = if i % 3 == 0 { -1 } else { 1 };
        store.incr_by(keys::TERMS, "foo", delta as f64).unwrap();
        store.incr_by(&keys::modified("foo"), &user, 1.0).unwrap();
        let at = start + Duration::milliseconds(i);
        log.append(Action::new("foo", Some(user), delta, at)).unwrap();
    }
    store.incr_by(keys::TERMS, "foo", 5.0).unwrap();

    let now = start + Duration::seconds(2 * HOUR);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let store = store.clone();
            scope.spawn(move || {
                DecayEngine::new(store.as_ref(), HOUR as u64)
                    .run(now)
                    .unwrap();
            });
        }
    });

    assert_eq!(store.score(keys::TERMS, "foo").unwrap(), Some(5.0));
    assert_eq!(store.ranked_len(keys::ACTIONS).unwrap(), 0);
    assert!(!store.exists(&keys::modified("foo")).unwrap());
}

#[test]
fn test_shared_store_between_engines() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let first = KarmaEngine::shared(store.clone(), decay_config(), clock.clone());
    let second = KarmaEngine::shared(store.clone(), decay_config(), clock.clone());

    first.increment("foo", "U1").unwrap();
    second.increment("foo", "U2").unwrap();
    assert_eq!(first.check("foo").unwrap().own, 2);

    clock.advance_secs(HOUR);
    first.run_decay().unwrap();
    second.run_decay().unwrap();
    assert_eq!(second.check("foo").unwrap().own, 0);
}

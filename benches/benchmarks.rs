//! Criterion benchmarks for karma.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::Rng;
use tempfile::NamedTempFile;

use karma::config::{KarmaConfig, SigmoidDistributor};
use karma::engine::{ActionLog, DecayEngine, KarmaEngine};
use karma::format::{SnapshotReader, SnapshotWriter};
use karma::store::{MemoryStore, ScoreStore};
use karma::types::{keys, Action, Clock, ManualClock};
use karma::upgrade::DecayBackfill;

const HOUR: i64 = 3600;

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ))
}

fn open_config(decay: bool) -> KarmaConfig {
    KarmaConfig::builder()
        .cooldown(None)
        .link_threshold(None)
        .decay(decay)
        .decay_interval(HOUR as u64)
        .build()
        .unwrap()
}

/// Store with `count` actions spread over the two hours before `clock.now()`.
fn make_action_store(clock: &Arc<ManualClock>, count: usize, terms: usize) -> MemoryStore {
    let mut rng = rand::thread_rng();
    let store = MemoryStore::with_clock(clock.clone());
    let log = ActionLog::new(&store);
    let now = clock.now();
    for _ in 0..count {
        let term = format!("term_{}", rng.gen_range(0..terms));
        let user = format!("U{}", rng.gen_range(0..50));
        let delta = if rng.gen_bool(0.7) { 1 } else { -1 };
        let at = now - Duration::milliseconds(rng.gen_range(0..2 * HOUR * 1000));
        store.incr_by(keys::TERMS, &term, delta as f64).unwrap();
        store.incr_by(&keys::modified(&term), &user, 1.0).unwrap();
        log.append(Action::new(term, Some(user), delta, at)).unwrap();
    }
    store
}

/// Store with aggregate scores and counts but no history.
fn make_legacy_store(clock: &Arc<ManualClock>, terms: usize) -> MemoryStore {
    let mut rng = rand::thread_rng();
    let store = MemoryStore::with_clock(clock.clone());
    for t in 0..terms {
        let term = format!("term_{t}");
        let score: i64 = rng.gen_range(-20..60);
        store.ranked_add(keys::TERMS, &term, score as f64).unwrap();
        for u in 0..rng.gen_range(1..8) {
            store
                .ranked_add(&keys::modified(&term), &format!("U{u}"), 1.0)
                .unwrap();
        }
    }
    store
}

fn bench_increment(c: &mut Criterion) {
    let clock = clock();
    let engine = KarmaEngine::with_clock(
        MemoryStore::with_clock(clock.clone()),
        open_config(false),
        clock.clone(),
    );

    c.bench_function("increment_1k_terms", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let term = format!("term_{}", rng.gen_range(0..1000));
            let _ = engine.increment(&term, "U1");
        })
    });
}

fn bench_increment_with_decay(c: &mut Criterion) {
    let clock = clock();
    let engine = KarmaEngine::with_clock(
        MemoryStore::with_clock(clock.clone()),
        open_config(true),
        clock.clone(),
    );

    c.bench_function("increment_with_decay", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            clock.advance_secs(1);
            let term = format!("term_{}", rng.gen_range(0..1000));
            let _ = engine.increment(&term, "U1");
        })
    });
}

fn bench_decay_pass(c: &mut Criterion) {
    let clock = clock();

    c.bench_function("decay_10k_actions", |b| {
        b.iter_batched(
            || make_action_store(&clock, 10_000, 500),
            |store| {
                let _ = DecayEngine::new(&store, HOUR as u64).run(clock.now());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_backfill(c: &mut Criterion) {
    let clock = clock();

    c.bench_function("backfill_1k_terms", |b| {
        b.iter_batched(
            || make_legacy_store(&clock, 1_000),
            |store| {
                let _ = DecayBackfill::new(&store, 30 * 24 * HOUR as u64, &SigmoidDistributor)
                    .run(clock.now());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_list_best(c: &mut Criterion) {
    let clock = clock();
    let engine = KarmaEngine::with_clock(
        make_legacy_store(&clock, 10_000),
        open_config(false),
        clock.clone(),
    );

    c.bench_function("list_best_10k_terms", |b| {
        b.iter(|| {
            let _ = engine.list_best(Some(25));
        })
    });
}

fn bench_snapshot_roundtrip(c: &mut Criterion) {
    let clock = clock();
    let store = make_action_store(&clock, 10_000, 500);
    let tmp = NamedTempFile::new().unwrap();

    c.bench_function("snapshot_write_10k_actions", |b| {
        b.iter(|| {
            SnapshotWriter::write_to_file(&store, tmp.path()).unwrap();
        })
    });

    SnapshotWriter::write_to_file(&store, tmp.path()).unwrap();
    c.bench_function("snapshot_read_10k_actions", |b| {
        b.iter(|| {
            let _ = SnapshotReader::read_from_file(tmp.path(), clock.clone());
        })
    });
}

criterion_group!(
    benches,
    bench_increment,
    bench_increment_with_decay,
    bench_decay_pass,
    bench_backfill,
    bench_list_best,
    bench_snapshot_roundtrip,
);
criterion_main!(benches);

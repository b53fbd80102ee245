//! In-process [`ScoreStore`] with lazy key expiry and snapshot support.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{KeyKind, Order, RankedSet, ScoreStore};
use crate::types::{
    from_unix_secs, to_unix_secs, Clock, KarmaError, KarmaResult, SystemClock,
};

/// Data held at one key.
#[derive(Debug, Clone)]
enum Slot {
    Ranked(RankedSet),
    Set(BTreeSet<String>),
    Value {
        value: String,
        expires_at: Option<DateTime<Utc>>,
    },
}

impl Slot {
    fn kind(&self) -> KeyKind {
        match self {
            Self::Ranked(_) => KeyKind::Ranked,
            Self::Set(_) => KeyKind::Set,
            Self::Value { .. } => KeyKind::Value,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self, Self::Value { expires_at: Some(at), .. } if *at <= now)
    }
}

/// Serializable image of a [`MemoryStore`], used by the snapshot format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Ranked sets as (member, score) pairs, ascending.
    pub ranked: BTreeMap<String, Vec<(String, f64)>>,
    /// Plain sets.
    pub sets: BTreeMap<String, Vec<String>>,
    /// Plain values and their absolute expiry in unix seconds.
    pub values: BTreeMap<String, SnapshotValue>,
}

/// A value entry inside a [`StoreSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotValue {
    pub value: String,
    pub expires_at: Option<f64>,
}

/// A [`ScoreStore`] held entirely in memory.
///
/// Every trait method takes the single internal lock, so each call is atomic
/// with respect to other callers sharing the store.
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
    online: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
            online: AtomicBool::new(true),
        }
    }

    /// Rebuild a store from a snapshot. Values whose deadline has passed are
    /// dropped.
    pub fn from_snapshot(snapshot: StoreSnapshot, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let mut slots = HashMap::new();

        for (key, entries) in snapshot.ranked {
            if !entries.is_empty() {
                slots.insert(key, Slot::Ranked(entries.into_iter().collect()));
            }
        }
        for (key, members) in snapshot.sets {
            if !members.is_empty() {
                slots.insert(key, Slot::Set(members.into_iter().collect()));
            }
        }
        for (key, entry) in snapshot.values {
            let slot = Slot::Value {
                value: entry.value,
                expires_at: entry.expires_at.and_then(from_unix_secs),
            };
            if !slot.is_expired(now) {
                slots.insert(key, slot);
            }
        }

        Self {
            slots: Mutex::new(slots),
            clock,
            online: AtomicBool::new(true),
        }
    }

    /// Capture the live contents of the store.
    pub fn snapshot(&self) -> StoreSnapshot {
        let now = self.clock.now();
        let slots = self.slots.lock();
        let mut snapshot = StoreSnapshot::default();

        for (key, slot) in slots.iter() {
            match slot {
                Slot::Ranked(set) => {
                    snapshot.ranked.insert(key.clone(), set.entries());
                }
                Slot::Set(members) => {
                    snapshot
                        .sets
                        .insert(key.clone(), members.iter().cloned().collect());
                }
                Slot::Value { value, expires_at } => {
                    if slot.is_expired(now) {
                        continue;
                    }
                    snapshot.values.insert(
                        key.clone(),
                        SnapshotValue {
                            value: value.clone(),
                            expires_at: expires_at.map(to_unix_secs),
                        },
                    );
                }
            }
        }
        snapshot
    }

    /// Simulate the backend going away or coming back. While offline every
    /// call fails with `StoreUnavailable`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, AtomicOrdering::SeqCst);
    }

    /// Number of live keys.
    pub fn key_count(&self) -> usize {
        let now = self.clock.now();
        self.slots
            .lock()
            .values()
            .filter(|slot| !slot.is_expired(now))
            .count()
    }

    fn check_online(&self) -> KarmaResult<()> {
        if self.online.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(KarmaError::StoreUnavailable(
                "memory store is offline".to_string(),
            ))
        }
    }

    /// Run `f` over the slot map after dropping `key` if it has expired.
    fn with_slots<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, Slot>) -> KarmaResult<T>,
    ) -> KarmaResult<T> {
        self.check_online()?;
        let now = self.clock.now();
        let mut slots = self.slots.lock();
        if slots.get(key).is_some_and(|slot| slot.is_expired(now)) {
            slots.remove(key);
        }
        f(&mut slots)
    }

    fn with_ranked<T>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&mut RankedSet>) -> T,
    ) -> KarmaResult<T> {
        self.with_slots(key, |slots| {
            let result = match slots.get_mut(key) {
                None => f(None),
                Some(Slot::Ranked(set)) => f(Some(set)),
                Some(_) => return Err(wrong_kind(key, KeyKind::Ranked)),
            };
            if matches!(slots.get(key), Some(Slot::Ranked(set)) if set.is_empty()) {
                slots.remove(key);
            }
            Ok(result)
        })
    }

    fn with_set<T>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&mut BTreeSet<String>>) -> T,
    ) -> KarmaResult<T> {
        self.with_slots(key, |slots| {
            let result = match slots.get_mut(key) {
                None => f(None),
                Some(Slot::Set(set)) => f(Some(set)),
                Some(_) => return Err(wrong_kind(key, KeyKind::Set)),
            };
            if matches!(slots.get(key), Some(Slot::Set(set)) if set.is_empty()) {
                slots.remove(key);
            }
            Ok(result)
        })
    }

    fn ranked_entry<'a>(
        slots: &'a mut HashMap<String, Slot>,
        key: &str,
    ) -> KarmaResult<&'a mut RankedSet> {
        match slots
            .entry(key.to_string())
            .or_insert_with(|| Slot::Ranked(RankedSet::new()))
        {
            Slot::Ranked(set) => Ok(set),
            _ => Err(wrong_kind(key, KeyKind::Ranked)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_kind(key: &str, expected: KeyKind) -> KarmaError {
    KarmaError::WrongKind {
        key: key.to_string(),
        expected: expected.name(),
    }
}

impl ScoreStore for MemoryStore {
    fn incr_by(&self, collection: &str, member: &str, delta: f64) -> KarmaResult<f64> {
        self.with_slots(collection, |slots| {
            let set = Self::ranked_entry(slots, collection)?;
            Ok(set.increment(member, delta))
        })
    }

    fn score(&self, collection: &str, member: &str) -> KarmaResult<Option<f64>> {
        self.with_ranked(collection, |set| set.and_then(|s| s.score(member)))
    }

    fn ranked_add(&self, collection: &str, member: &str, score: f64) -> KarmaResult<bool> {
        self.with_slots(collection, |slots| {
            let set = Self::ranked_entry(slots, collection)?;
            Ok(set.insert(member, score))
        })
    }

    fn ranked_remove(&self, collection: &str, member: &str) -> KarmaResult<bool> {
        self.with_ranked(collection, |set| set.is_some_and(|s| s.remove(member)))
    }

    fn range_by_rank(
        &self,
        collection: &str,
        order: Order,
        offset: usize,
        limit: Option<usize>,
    ) -> KarmaResult<Vec<(String, f64)>> {
        self.with_ranked(collection, |set| {
            set.map(|s| s.range_by_rank(order, offset, limit))
                .unwrap_or_default()
        })
    }

    fn range_by_score(
        &self,
        collection: &str,
        min: f64,
        max: f64,
    ) -> KarmaResult<Vec<(String, f64)>> {
        self.with_ranked(collection, |set| {
            set.map(|s| s.range_by_score(min, max)).unwrap_or_default()
        })
    }

    fn remove_range_by_score(&self, collection: &str, min: f64, max: f64) -> KarmaResult<usize> {
        self.with_ranked(collection, |set| {
            set.map(|s| s.remove_range_by_score(min, max))
                .unwrap_or(0)
        })
    }

    fn ranked_len(&self, collection: &str) -> KarmaResult<usize> {
        self.with_ranked(collection, |set| set.map(|s| s.len()).unwrap_or(0))
    }

    fn set_add(&self, key: &str, member: &str) -> KarmaResult<bool> {
        self.with_slots(key, |slots| {
            match slots
                .entry(key.to_string())
                .or_insert_with(|| Slot::Set(BTreeSet::new()))
            {
                Slot::Set(set) => Ok(set.insert(member.to_string())),
                _ => Err(wrong_kind(key, KeyKind::Set)),
            }
        })
    }

    fn set_remove(&self, key: &str, member: &str) -> KarmaResult<bool> {
        self.with_set(key, |set| set.is_some_and(|s| s.remove(member)))
    }

    fn set_members(&self, key: &str) -> KarmaResult<Vec<String>> {
        self.with_set(key, |set| {
            set.map(|s| s.iter().cloned().collect()).unwrap_or_default()
        })
    }

    fn set_contains(&self, key: &str, member: &str) -> KarmaResult<bool> {
        self.with_set(key, |set| set.is_some_and(|s| s.contains(member)))
    }

    fn set_value(&self, key: &str, value: &str) -> KarmaResult<()> {
        self.with_slots(key, |slots| {
            slots.insert(
                key.to_string(),
                Slot::Value {
                    value: value.to_string(),
                    expires_at: None,
                },
            );
            Ok(())
        })
    }

    fn get_value(&self, key: &str) -> KarmaResult<Option<String>> {
        self.with_slots(key, |slots| match slots.get(key) {
            None => Ok(None),
            Some(Slot::Value { value, .. }) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_kind(key, KeyKind::Value)),
        })
    }

    fn set_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> KarmaResult<()> {
        let ttl = i64::try_from(ttl_secs).map_err(|_| {
            KarmaError::StoreUnavailable(format!("expiry of {ttl_secs}s is out of range"))
        })?;
        let expires_at = self.clock.now() + Duration::seconds(ttl);
        self.with_slots(key, |slots| {
            slots.insert(
                key.to_string(),
                Slot::Value {
                    value: value.to_string(),
                    expires_at: Some(expires_at),
                },
            );
            Ok(())
        })
    }

    fn ttl(&self, key: &str) -> KarmaResult<Option<u64>> {
        let now = self.clock.now();
        self.with_slots(key, |slots| match slots.get(key) {
            Some(Slot::Value {
                expires_at: Some(at),
                ..
            }) => {
                let remaining_ms = (*at - now).num_milliseconds().max(0) as u64;
                Ok(Some(remaining_ms.div_ceil(1000)))
            }
            _ => Ok(None),
        })
    }

    fn exists(&self, key: &str) -> KarmaResult<bool> {
        self.with_slots(key, |slots| Ok(slots.contains_key(key)))
    }

    fn remove(&self, key: &str) -> KarmaResult<bool> {
        self.with_slots(key, |slots| Ok(slots.remove(key).is_some()))
    }

    fn key_kind(&self, key: &str) -> KarmaResult<Option<KeyKind>> {
        self.with_slots(key, |slots| Ok(slots.get(key).map(Slot::kind)))
    }

    fn keys_with_prefix(&self, prefix: &str) -> KarmaResult<Vec<String>> {
        self.check_online()?;
        let now = self.clock.now();
        let mut slots = self.slots.lock();
        slots.retain(|_, slot| !slot.is_expired(now));
        let mut keys: Vec<String> = slots
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }
}

//! The action log: every score change, ranked by when it happened.

use std::collections::HashMap;

use chrono::Duration;

use crate::store::{Order, ScoreStore};
use crate::types::{keys, Action, KarmaResult};

/// Attempts at finding a free timestamp before an append gives up.
const MAX_APPEND_ATTEMPTS: usize = 64;

/// Existing actions for one term, grouped for the decay backfill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermTally {
    /// Number of actions per user; `None` counts anonymous actions.
    pub per_user: HashMap<Option<String>, i64>,
    /// Sum of all action deltas.
    pub delta_sum: i64,
}

impl TermTally {
    /// Number of actions attributed to `user_id` (`None` for anonymous).
    pub fn count(&self, user_id: Option<&str>) -> i64 {
        self.per_user
            .get(&user_id.map(str::to_string))
            .copied()
            .unwrap_or(0)
    }

    /// Total number of actions.
    pub fn total(&self) -> i64 {
        self.per_user.values().sum()
    }
}

/// Typed access to the `actions` ranked set.
pub struct ActionLog<'a, S: ScoreStore> {
    store: &'a S,
}

impl<'a, S: ScoreStore> ActionLog<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Record an action. If an identical entry already exists the timestamp
    /// is moved forward one microsecond at a time until the entry is unique.
    /// Returns the action as stored.
    pub fn append(&self, action: Action) -> KarmaResult<Action> {
        let mut action = action;
        for _ in 0..MAX_APPEND_ATTEMPTS {
            if self
                .store
                .ranked_add(keys::ACTIONS, &action.serialize(), action.rank())?
            {
                return Ok(action);
            }
            action.at += Duration::microseconds(1);
        }
        log::warn!("Could not find a free slot for action {}", action);
        Ok(action)
    }

    /// Raw entries ranked at or before `cutoff` (unix seconds).
    pub fn entries_until(&self, cutoff: f64) -> KarmaResult<Vec<(String, f64)>> {
        self.store
            .range_by_score(keys::ACTIONS, f64::NEG_INFINITY, cutoff)
    }

    /// Remove one raw entry. Returns false if another caller got to it first.
    pub fn claim(&self, raw: &str) -> KarmaResult<bool> {
        self.store.ranked_remove(keys::ACTIONS, raw)
    }

    /// Drop every entry ranked at or before `cutoff`.
    pub fn prune_until(&self, cutoff: f64) -> KarmaResult<usize> {
        self.store
            .remove_range_by_score(keys::ACTIONS, f64::NEG_INFINITY, cutoff)
    }

    /// All decodable actions, oldest first. Undecodable entries are logged
    /// and skipped.
    pub fn all(&self) -> KarmaResult<Vec<Action>> {
        let entries = self
            .store
            .range_by_rank(keys::ACTIONS, Order::Ascending, 0, None)?;
        Ok(entries
            .into_iter()
            .filter_map(|(raw, _)| match Action::deserialize(&raw) {
                Ok(action) => Some(action),
                Err(e) => {
                    log::warn!("Skipping action log entry: {}", e);
                    None
                }
            })
            .collect())
    }

    /// Number of entries in the log.
    pub fn len(&self) -> KarmaResult<usize> {
        self.store.ranked_len(keys::ACTIONS)
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> KarmaResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Count existing actions per term and user.
    pub fn tally(&self) -> KarmaResult<HashMap<String, TermTally>> {
        let mut tallies: HashMap<String, TermTally> = HashMap::new();
        for action in self.all()? {
            let tally = tallies.entry(action.term).or_default();
            *tally.per_user.entry(action.user_id).or_insert(0) += 1;
            tally.delta_sum += action.delta;
        }
        Ok(tallies)
    }

    /// Remove every action recorded for `term`.
    pub fn purge_term(&self, term: &str) -> KarmaResult<usize> {
        let entries = self
            .store
            .range_by_rank(keys::ACTIONS, Order::Ascending, 0, None)?;
        let mut removed = 0;
        for (raw, _) in entries {
            let matches = Action::deserialize(&raw).is_ok_and(|action| action.term == term);
            if matches && self.claim(&raw)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

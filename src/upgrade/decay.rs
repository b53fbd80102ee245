//! Decay backfill: rebuild an action history from aggregate scores.
//!
//! A term that was scored before decay was switched on has a score and
//! per-user counts but no actions, so nothing would ever expire. The
//! backfill synthesizes the missing actions and spreads them over the decay
//! window so the score erodes gradually instead of dropping all at once.
//!
//! For a term with score `S`, recorded counts `C[u]`, and an existing log
//! holding `existing[u]` actions with delta sum `D`:
//!
//! * `missing[u] = max(C[u] - existing[u], 0)`, `N = sum(missing)`.
//! * New actions must add up to `R = S - D`; `s` is the sign of `R`, else
//!   of `S`, else `+1`.
//! * `N <= |R|`: attributed actions carry `s`, plus `|R| - N` anonymous
//!   actions carrying `s`.
//! * `N > |R|`: the first `2 * floor((N - |R|) / 2)` attributed actions
//!   alternate `-s, +s`; an odd excess adds one anonymous `-s`.
//!
//! Anonymous actions take the oldest ages. Attributed actions take the rest
//! round-robin across users in modified-ranking order.

use chrono::{DateTime, Duration, Utc};

use crate::config::DecayDistributor;
use crate::engine::{ActionLog, TermTally};
use crate::store::{Order, ScoreStore};
use crate::types::{keys, Action, KarmaResult};

/// One action the backfill will create.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    pub user_id: Option<String>,
    pub delta: i64,
    /// Seconds before "now".
    pub age_secs: f64,
}

/// Plan the synthetic actions for one term.
///
/// `counts` are the recorded `(user_id, count)` pairs in modified-ranking
/// order; `existing` describes actions already in the log for this term.
pub fn plan_term(
    score: i64,
    counts: &[(String, i64)],
    existing: &TermTally,
    interval: f64,
    distributor: &dyn DecayDistributor,
) -> Vec<PlannedAction> {
    let mut missing: Vec<(&str, usize)> = counts
        .iter()
        .map(|(user_id, count)| {
            let have = existing.count(Some(user_id));
            (user_id.as_str(), (count - have).max(0) as usize)
        })
        .filter(|(_, n)| *n > 0)
        .collect();
    let attributed_count: usize = missing.iter().map(|(_, n)| n).sum();

    let remaining = score - existing.delta_sum;
    let sign = if remaining != 0 {
        remaining.signum()
    } else if score != 0 {
        score.signum()
    } else {
        1
    };
    let needed = remaining.unsigned_abs() as usize;

    let (anonymous_count, anonymous_delta, balanced_pairs) = if attributed_count <= needed {
        (needed - attributed_count, sign, 0)
    } else {
        let excess = attributed_count - needed;
        (excess % 2, -sign, excess / 2)
    };

    // Round-robin over users so one user's actions do not cluster together.
    let mut attributed = Vec::with_capacity(attributed_count);
    while attributed.len() < attributed_count {
        for (user_id, left) in missing.iter_mut() {
            if *left > 0 {
                attributed.push(*user_id);
                *left -= 1;
            }
        }
    }

    let total = anonymous_count + attributed_count;
    let mut ages: Vec<f64> = (0..total)
        .map(|i| distributor.age(interval, i, total).clamp(0.0, interval.max(0.0)))
        .collect();
    ages.sort_by(|a, b| b.total_cmp(a));
    let mut ages = ages.into_iter();

    let mut plan = Vec::with_capacity(total);
    for age_secs in ages.by_ref().take(anonymous_count) {
        plan.push(PlannedAction {
            user_id: None,
            delta: anonymous_delta,
            age_secs,
        });
    }
    for (slot, (user_id, age_secs)) in attributed.into_iter().zip(ages).enumerate() {
        let delta = if slot < balanced_pairs * 2 {
            if slot % 2 == 0 {
                -sign
            } else {
                sign
            }
        } else {
            sign
        };
        plan.push(PlannedAction {
            user_id: Some(user_id.to_string()),
            delta,
            age_secs,
        });
    }
    plan
}

/// Applies [`plan_term`] to every scored term.
pub struct DecayBackfill<'a, S: ScoreStore> {
    store: &'a S,
    interval_secs: u64,
    distributor: &'a dyn DecayDistributor,
}

impl<'a, S: ScoreStore> DecayBackfill<'a, S> {
    pub fn new(store: &'a S, interval_secs: u64, distributor: &'a dyn DecayDistributor) -> Self {
        Self {
            store,
            interval_secs,
            distributor,
        }
    }

    /// Create the missing actions. Returns how many were appended.
    pub fn run(&self, now: DateTime<Utc>) -> KarmaResult<usize> {
        let log = ActionLog::new(self.store);
        let tallies = log.tally()?;
        let no_history = TermTally::default();
        let interval = self.interval_secs as f64;

        let mut created = 0;
        for (term, score) in self
            .store
            .range_by_rank(keys::TERMS, Order::Ascending, 0, None)?
        {
            let counts: Vec<(String, i64)> = self
                .store
                .range_by_rank(&keys::modified(&term), Order::Descending, 0, None)?
                .into_iter()
                .map(|(user_id, count)| (user_id, count.round() as i64))
                .collect();
            let existing = tallies.get(&term).unwrap_or(&no_history);
            let plan = plan_term(
                score.round() as i64,
                &counts,
                existing,
                interval,
                self.distributor,
            );
            if plan.is_empty() {
                continue;
            }

            log::debug!("Backfilling {} action(s) for '{}'", plan.len(), term);
            for planned in plan {
                let at = now - Duration::microseconds((planned.age_secs * 1_000_000.0).round() as i64);
                log.append(Action::new(
                    term.as_str(),
                    planned.user_id,
                    planned.delta,
                    at,
                ))?;
                created += 1;
            }
        }
        Ok(created)
    }
}

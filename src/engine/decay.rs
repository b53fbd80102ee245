//! Expiry of old actions and reversal of their effect on scores.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::actions::ActionLog;
use crate::store::ScoreStore;
use crate::types::{keys, to_unix_secs, Action, KarmaResult};

/// Report from one decay pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecayReport {
    /// Actions whose effect was reversed.
    pub actions_expired: usize,
    /// Terms that lost at least one action, sorted.
    pub terms_touched: Vec<String>,
    /// Modifier entries removed because their count reached zero.
    pub modifiers_cleared: usize,
}

impl DecayReport {
    /// Whether the pass changed anything.
    pub fn is_empty(&self) -> bool {
        self.actions_expired == 0 && self.modifiers_cleared == 0
    }
}

/// Expires actions older than the decay window.
///
/// Each expired entry is claimed (removed from the log) before its delta is
/// reversed, so two passes racing over the same entry reverse it once.
pub struct DecayEngine<'a, S: ScoreStore> {
    store: &'a S,
    interval_secs: u64,
}

impl<'a, S: ScoreStore> DecayEngine<'a, S> {
    pub fn new(store: &'a S, interval_secs: u64) -> Self {
        Self {
            store,
            interval_secs,
        }
    }

    /// Expire everything at or before `now - interval`.
    pub fn run(&self, now: DateTime<Utc>) -> KarmaResult<DecayReport> {
        let cutoff = to_unix_secs(now) - self.interval_secs as f64;
        let log = ActionLog::new(self.store);

        let mut report = DecayReport::default();
        let mut touched = BTreeSet::new();

        for (raw, _) in log.entries_until(cutoff)? {
            let action = match Action::deserialize(&raw) {
                Ok(action) => action,
                Err(e) => {
                    log::warn!("Dropping undecodable action during decay: {}", e);
                    continue;
                }
            };
            if !log.claim(&raw)? {
                continue;
            }
            self.reverse(&action)?;
            touched.insert(action.term);
            report.actions_expired += 1;
        }

        log.prune_until(cutoff)?;

        for term in &touched {
            report.modifiers_cleared +=
                self.store
                    .remove_range_by_score(&keys::modified(term), f64::NEG_INFINITY, 0.0)?;
        }

        if report.actions_expired > 0 {
            log::info!(
                "Decay expired {} action(s) across {} term(s)",
                report.actions_expired,
                touched.len()
            );
        }
        report.terms_touched = touched.into_iter().collect();
        Ok(report)
    }

    fn reverse(&self, action: &Action) -> KarmaResult<()> {
        self.store
            .incr_by(keys::TERMS, &action.term, -(action.delta as f64))?;
        if let Some(user_id) = &action.user_id {
            self.store
                .incr_by(&keys::modified(&action.term), user_id, -1.0)?;
        }
        Ok(())
    }
}

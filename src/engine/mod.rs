//! The karma engine: term operations, listings, decay, and migrations.
//!
//! Every operation that reads or changes a score first runs the decay pass
//! through [`KarmaEngine::fresh`] so that expired contributions never show.

pub mod actions;
pub mod cooldown;
pub mod decay;
pub mod directory;
pub mod term;

pub use actions::{ActionLog, TermTally};
pub use cooldown::Cooldown;
pub use decay::{DecayEngine, DecayReport};
pub use directory::{StaticDirectory, User, UserDirectory};
pub use term::{
    DeleteReport, LinkOutcome, LinkedScore, Modifier, ModifyOutcome, ScoreReport, Term,
};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::KarmaConfig;
use crate::store::{Order, ScoreStore};
use crate::types::{keys, Clock, KarmaResult, SystemClock};
use crate::upgrade::{MigrationReport, Upgrader};

/// One row of a best/worst listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedTerm {
    pub term: String,
    pub score: i64,
}

/// A modifier with the display name resolved through a [`UserDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedModifier {
    pub user_id: String,
    /// Display name, or the raw user id when the lookup failed.
    pub name: String,
    pub count: i64,
}

/// Entry point for all term operations against one store.
pub struct KarmaEngine<S: ScoreStore> {
    store: Arc<S>,
    config: KarmaConfig,
    clock: Arc<dyn Clock>,
}

impl<S: ScoreStore> KarmaEngine<S> {
    /// Create an engine reading wall-clock time.
    pub fn new(store: S, config: KarmaConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit time source.
    pub fn with_clock(store: S, config: KarmaConfig, clock: Arc<dyn Clock>) -> Self {
        Self::shared(Arc::new(store), config, clock)
    }

    /// Create an engine over a store other handlers also use.
    pub fn shared(store: Arc<S>, config: KarmaConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &KarmaConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Handle for the term named by `raw`, after normalization.
    pub fn term(&self, raw: &str) -> Term<'_, S> {
        Term::new(self, self.config.normalize(raw))
    }

    /// Run the decay pass (when enabled), then `op`.
    pub fn fresh<T>(&self, op: impl FnOnce() -> KarmaResult<T>) -> KarmaResult<T> {
        if self.config.decay_enabled() {
            DecayEngine::new(self.store(), self.config.decay_interval()).run(self.now())?;
        }
        op()
    }

    /// Expire old contributions now. Returns an empty report when decay is
    /// off.
    pub fn run_decay(&self) -> KarmaResult<DecayReport> {
        if !self.config.decay_enabled() {
            log::debug!("Decay is disabled; nothing to expire");
            return Ok(DecayReport::default());
        }
        DecayEngine::new(self.store(), self.config.decay_interval()).run(self.now())
    }

    pub fn increment(&self, term: &str, user_id: &str) -> KarmaResult<ModifyOutcome> {
        self.term(term).increment(user_id)
    }

    pub fn decrement(&self, term: &str, user_id: &str) -> KarmaResult<ModifyOutcome> {
        self.term(term).decrement(user_id)
    }

    pub fn check(&self, term: &str) -> KarmaResult<ScoreReport> {
        self.term(term).check()
    }

    /// Link `from -> to`: `to`'s own score counts towards `from`'s total.
    pub fn link(&self, from: &str, to: &str) -> KarmaResult<LinkOutcome> {
        self.term(from).link(&self.term(to))
    }

    pub fn unlink(&self, from: &str, to: &str) -> KarmaResult<bool> {
        self.term(from).unlink(&self.term(to))
    }

    /// Highest scores first. `n` defaults to the configured listing size and
    /// is capped at the configured maximum.
    pub fn list_best(&self, n: Option<usize>) -> KarmaResult<Vec<RankedTerm>> {
        self.list(Order::Descending, n)
    }

    /// Lowest scores first.
    pub fn list_worst(&self, n: Option<usize>) -> KarmaResult<Vec<RankedTerm>> {
        self.list(Order::Ascending, n)
    }

    pub fn modified(&self, term: &str) -> KarmaResult<Vec<Modifier>> {
        self.term(term).modified()
    }

    /// [`modified`](Self::modified) with display names. Lookup failures fall
    /// back to the raw id.
    pub fn modified_names(
        &self,
        term: &str,
        directory: &dyn UserDirectory,
    ) -> KarmaResult<Vec<NamedModifier>> {
        let modifiers = self.modified(term)?;
        Ok(modifiers
            .into_iter()
            .map(|m| {
                let name = match directory.lookup(&m.user_id) {
                    Ok(user) => user.name,
                    Err(e) => {
                        log::warn!("User lookup failed for '{}': {}", m.user_id, e);
                        m.user_id.clone()
                    }
                };
                NamedModifier {
                    user_id: m.user_id,
                    name,
                    count: m.count,
                }
            })
            .collect())
    }

    /// Delete a term by its stored name, without normalization.
    pub fn delete(&self, term: &str) -> KarmaResult<DeleteReport> {
        Term::new(self, term.to_string()).delete()
    }

    /// Apply every pending data upgrade, in order.
    pub fn run_migrations(&self) -> KarmaResult<MigrationReport> {
        Upgrader::new(self.store(), &self.config, self.now()).run_all()
    }

    /// Number of scored terms.
    pub fn term_count(&self) -> KarmaResult<usize> {
        self.fresh(|| self.store.ranked_len(keys::TERMS))
    }

    pub(crate) fn own_score(&self, term: &str) -> KarmaResult<i64> {
        Ok(self
            .store
            .score(keys::TERMS, term)?
            .map(|score| score.round() as i64)
            .unwrap_or(0))
    }

    fn list(&self, order: Order, n: Option<usize>) -> KarmaResult<Vec<RankedTerm>> {
        let n = n
            .unwrap_or(self.config.default_list_size())
            .min(self.config.max_list_size());
        self.fresh(|| {
            let entries = self.store.range_by_rank(keys::TERMS, order, 0, Some(n))?;
            Ok(entries
                .into_iter()
                .map(|(term, score)| RankedTerm {
                    term,
                    score: score.round() as i64,
                })
                .collect())
        })
    }
}

//! A named term and every operation on its score.

use std::fmt;

use serde::Serialize;

use super::actions::ActionLog;
use super::cooldown::Cooldown;
use super::KarmaEngine;
use crate::graph::{DetachReport, LinkGraph};
use crate::store::{Order, ScoreStore};
use crate::types::{keys, Action, KarmaError, KarmaResult};

/// Score of one linked term, as reported by [`Term::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedScore {
    pub term: String,
    pub score: i64,
}

/// Snapshot of a term's score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub term: String,
    /// Own score plus the own scores of every linked term.
    pub total: i64,
    /// Own score.
    pub own: i64,
    /// Linked terms in name order.
    pub links: Vec<LinkedScore>,
}

/// One user's contribution count for a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Modifier {
    pub user_id: String,
    pub count: i64,
}

/// Result of an increment or decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifyOutcome {
    /// The change was recorded.
    Applied(ScoreReport),
    /// The user changed this term too recently; nothing was recorded.
    CoolingDown { term: String, remaining_secs: u64 },
}

impl ModifyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Turn a refusal into [`KarmaError::CooldownActive`].
    pub fn into_result(self) -> KarmaResult<ScoreReport> {
        match self {
            Self::Applied(report) => Ok(report),
            Self::CoolingDown {
                term,
                remaining_secs,
            } => Err(KarmaError::CooldownActive {
                term,
                remaining_secs,
            }),
        }
    }
}

/// Result of a link request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
    /// At least one of the terms is below the absolute threshold.
    ThresholdNotMet { threshold: i64 },
}

impl LinkOutcome {
    /// Turn a refusal into [`KarmaError::ThresholdNotMet`]. `Ok(true)` means a
    /// new link was created.
    pub fn into_result(self) -> KarmaResult<bool> {
        match self {
            Self::Linked => Ok(true),
            Self::AlreadyLinked => Ok(false),
            Self::ThresholdNotMet { threshold } => Err(KarmaError::ThresholdNotMet { threshold }),
        }
    }
}

/// What a successful delete removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteReport {
    pub term: String,
    pub actions_purged: usize,
    /// Terms the deleted term linked to.
    pub outgoing: Vec<String>,
    /// Terms that linked to the deleted term.
    pub incoming: Vec<String>,
}

/// A term bound to an engine. Cheap to create; holds no score state.
pub struct Term<'a, S: ScoreStore> {
    engine: &'a KarmaEngine<S>,
    name: String,
}

impl<'a, S: ScoreStore> Term<'a, S> {
    pub(crate) fn new(engine: &'a KarmaEngine<S>, name: String) -> Self {
        Self { engine, name }
    }

    /// The normalized name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current score and link breakdown.
    pub fn check(&self) -> KarmaResult<ScoreReport> {
        self.engine.fresh(|| self.report())
    }

    pub fn own_score(&self) -> KarmaResult<i64> {
        self.engine.fresh(|| self.engine.own_score(&self.name))
    }

    pub fn total_score(&self) -> KarmaResult<i64> {
        Ok(self.check()?.total)
    }

    /// Terms this one aggregates, sorted.
    pub fn links(&self) -> KarmaResult<Vec<String>> {
        self.engine.fresh(|| self.graph().links_of(&self.name))
    }

    /// Terms aggregating this one, sorted.
    pub fn linked_to(&self) -> KarmaResult<Vec<String>> {
        self.engine.fresh(|| self.graph().linked_to(&self.name))
    }

    pub fn increment(&self, user_id: &str) -> KarmaResult<ModifyOutcome> {
        self.modify(user_id, 1)
    }

    pub fn decrement(&self, user_id: &str) -> KarmaResult<ModifyOutcome> {
        self.modify(user_id, -1)
    }

    /// Make `other`'s own score count towards this term's total.
    pub fn link(&self, other: &Term<'_, S>) -> KarmaResult<LinkOutcome> {
        if self.name == other.name {
            return Err(KarmaError::SelfLink(self.name.clone()));
        }
        self.engine.fresh(|| {
            if let Some(threshold) = self.engine.config().link_threshold() {
                let own = self.engine.own_score(&self.name)?;
                let theirs = self.engine.own_score(&other.name)?;
                if own.abs() < threshold || theirs.abs() < threshold {
                    return Ok(LinkOutcome::ThresholdNotMet { threshold });
                }
            }
            if self.graph().link(&self.name, &other.name)? {
                log::debug!("Linked '{}' -> '{}'", self.name, other.name);
                Ok(LinkOutcome::Linked)
            } else {
                Ok(LinkOutcome::AlreadyLinked)
            }
        })
    }

    /// Remove the link to `other`. Returns whether it existed.
    pub fn unlink(&self, other: &Term<'_, S>) -> KarmaResult<bool> {
        self.engine
            .fresh(|| self.graph().unlink(&self.name, &other.name))
    }

    /// Contribution counts, highest first.
    pub fn modified(&self) -> KarmaResult<Vec<Modifier>> {
        self.engine.fresh(|| {
            let entries = self.engine.store().range_by_rank(
                &keys::modified(&self.name),
                Order::Descending,
                0,
                None,
            )?;
            Ok(entries
                .into_iter()
                .map(|(user_id, count)| Modifier {
                    user_id,
                    count: count.round() as i64,
                })
                .collect())
        })
    }

    /// Remove the term and everything that refers to it. The related keys are
    /// cleaned even when the term has no score, in which case
    /// [`KarmaError::TermNotFound`] is returned afterwards.
    pub fn delete(&self) -> KarmaResult<DeleteReport> {
        self.engine.fresh(|| {
            let store = self.engine.store();
            let existed = store.ranked_remove(keys::TERMS, &self.name)?;
            store.remove(&keys::modified(&self.name))?;
            let actions_purged = ActionLog::new(store).purge_term(&self.name)?;
            let DetachReport { outgoing, incoming } = self.graph().detach(&self.name)?;

            if !existed {
                return Err(KarmaError::TermNotFound(self.name.clone()));
            }
            log::info!(
                "Deleted '{}' ({} action(s), {} link(s), {} backlink(s))",
                self.name,
                actions_purged,
                outgoing.len(),
                incoming.len()
            );
            Ok(DeleteReport {
                term: self.name.clone(),
                actions_purged,
                outgoing,
                incoming,
            })
        })
    }

    fn modify(&self, user_id: &str, delta: i64) -> KarmaResult<ModifyOutcome> {
        self.engine.fresh(|| {
            let store = self.engine.store();
            let cooldown = Cooldown::new(store, self.engine.config().cooldown());
            if let Some(remaining_secs) = cooldown.remaining(user_id, &self.name)? {
                return Ok(ModifyOutcome::CoolingDown {
                    term: self.name.clone(),
                    remaining_secs,
                });
            }

            store.incr_by(keys::TERMS, &self.name, delta as f64)?;
            store.incr_by(&keys::modified(&self.name), user_id, 1.0)?;
            cooldown.arm(user_id, &self.name)?;

            if self.engine.config().decay_enabled() {
                let action = Action::new(
                    self.name.as_str(),
                    Some(user_id.to_string()),
                    delta,
                    self.engine.now(),
                );
                ActionLog::new(store).append(action)?;
            }

            Ok(ModifyOutcome::Applied(self.report()?))
        })
    }

    fn report(&self) -> KarmaResult<ScoreReport> {
        let own = self.engine.own_score(&self.name)?;
        let links = self
            .graph()
            .links_of(&self.name)?
            .into_iter()
            .map(|term| {
                let score = self.engine.own_score(&term)?;
                Ok(LinkedScore { term, score })
            })
            .collect::<KarmaResult<Vec<_>>>()?;
        let total = own + links.iter().map(|l| l.score).sum::<i64>();
        Ok(ScoreReport {
            term: self.name.clone(),
            total,
            own,
            links,
        })
    }

    fn graph(&self) -> LinkGraph<'_, S> {
        LinkGraph::new(self.engine.store())
    }
}

impl<S: ScoreStore> PartialEq for Term<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<S: ScoreStore> fmt::Display for Term<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<S: ScoreStore> fmt::Debug for Term<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Term").field("name", &self.name).finish()
    }
}

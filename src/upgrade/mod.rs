//! One-time data upgrades, each guarded by a sentinel key.
//!
//! Upgrades run in a fixed order: reverse links, modified counts, then the
//! decay backfill. A sentinel is written only after its upgrade finishes, so
//! an interrupted run is retried from the start of that step next time.

pub mod decay;
pub mod modified_counts;
pub mod reverse_links;

pub use decay::{plan_term, DecayBackfill, PlannedAction};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::KarmaConfig;
use crate::store::ScoreStore;
use crate::types::{keys, KarmaResult};

/// Outcome of one upgrade step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpgradeStatus {
    /// The upgrade ran and touched `items` entries.
    Applied { items: usize },
    /// The sentinel was already set.
    AlreadyApplied,
    /// The upgrade is not applicable yet.
    Skipped { reason: &'static str },
}

impl UpgradeStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Report from [`Upgrader::run_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub reverse_links: UpgradeStatus,
    pub modified_counts: UpgradeStatus,
    pub decay: UpgradeStatus,
}

impl MigrationReport {
    /// Whether any step did work in this run.
    pub fn applied_any(&self) -> bool {
        self.reverse_links.is_applied()
            || self.modified_counts.is_applied()
            || self.decay.is_applied()
    }
}

/// Runs upgrade steps against one store.
pub struct Upgrader<'a, S: ScoreStore> {
    store: &'a S,
    config: &'a KarmaConfig,
    now: DateTime<Utc>,
}

impl<'a, S: ScoreStore> Upgrader<'a, S> {
    pub fn new(store: &'a S, config: &'a KarmaConfig, now: DateTime<Utc>) -> Self {
        Self { store, config, now }
    }

    /// Run every step in order.
    pub fn run_all(&self) -> KarmaResult<MigrationReport> {
        let report = MigrationReport {
            reverse_links: self.upgrade_reverse_links()?,
            modified_counts: self.upgrade_modified_counts()?,
            decay: self.upgrade_decay()?,
        };
        if report.applied_any() {
            log::info!("Migrations complete: {:?}", report);
        }
        Ok(report)
    }

    /// Populate `linked_to` from the existing `links` sets.
    pub fn upgrade_reverse_links(&self) -> KarmaResult<UpgradeStatus> {
        self.guarded(keys::SUPPORT_REVERSE_LINKS, || {
            reverse_links::run(self.store)
        })
    }

    /// Convert plain `modified` sets to ranked contribution counts.
    pub fn upgrade_modified_counts(&self) -> KarmaResult<UpgradeStatus> {
        self.guarded(keys::SUPPORT_MODIFIED_COUNTS, || {
            modified_counts::run(self.store, self.config.upgrader())
        })
    }

    /// Synthesize action history for scores recorded before decay was on.
    pub fn upgrade_decay(&self) -> KarmaResult<UpgradeStatus> {
        if self.is_applied(keys::SUPPORT_DECAY)? {
            return Ok(UpgradeStatus::AlreadyApplied);
        }
        if !self.config.decay_enabled() {
            return Ok(UpgradeStatus::Skipped {
                reason: "decay is disabled",
            });
        }
        if !self.is_applied(keys::SUPPORT_MODIFIED_COUNTS)? {
            return Ok(UpgradeStatus::Skipped {
                reason: "modified counts have not been upgraded",
            });
        }
        self.guarded(keys::SUPPORT_DECAY, || {
            DecayBackfill::new(
                self.store,
                self.config.decay_interval(),
                self.config.distributor(),
            )
            .run(self.now)
        })
    }

    /// Whether the sentinel `key` is set.
    pub fn is_applied(&self, key: &str) -> KarmaResult<bool> {
        self.store.exists(key)
    }

    fn guarded(
        &self,
        sentinel: &str,
        step: impl FnOnce() -> KarmaResult<usize>,
    ) -> KarmaResult<UpgradeStatus> {
        if self.is_applied(sentinel)? {
            return Ok(UpgradeStatus::AlreadyApplied);
        }
        log::debug!("Running upgrade {}", sentinel);
        let items = step()?;
        self.store.set_value(sentinel, "1")?;
        log::info!("Upgrade {} applied ({} item(s))", sentinel, items);
        Ok(UpgradeStatus::Applied { items })
    }
}

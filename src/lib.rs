//! Karma: reputation scores for named terms.
//!
//! Terms collect signed points from users, aggregate the scores of linked
//! terms, rate-limit each user per term, and optionally let contributions
//! expire after a decay window. Scores that predate decay can be backfilled
//! into a synthetic action history by the upgrade module.

pub mod cli;
pub mod config;
pub mod engine;
pub mod format;
pub mod graph;
pub mod store;
pub mod types;
pub mod upgrade;

// Re-export commonly used types at the crate root
pub use config::{
    DecayDistributor, IdentityNormalizer, KarmaConfig, KarmaConfigBuilder, KarmaSettings,
    LinearDistributor, LowercaseNormalizer, ModifiedUpgrader, OnePerUserUpgrader,
    SigmoidDistributor, TermNormalizer,
};
pub use engine::{
    DecayReport, DeleteReport, KarmaEngine, LinkOutcome, LinkedScore, Modifier, ModifyOutcome,
    NamedModifier, RankedTerm, ScoreReport, StaticDirectory, Term, User, UserDirectory,
};
pub use format::{SnapshotReader, SnapshotWriter};
pub use graph::LinkGraph;
pub use store::{KeyKind, MemoryStore, Order, ScoreStore};
pub use types::{Action, Clock, KarmaError, KarmaResult, ManualClock, SystemClock};
pub use upgrade::{MigrationReport, UpgradeStatus, Upgrader};

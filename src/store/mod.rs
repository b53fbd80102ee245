//! The score store abstraction and its in-memory implementation.
//!
//! The engine is written against [`ScoreStore`], a small Redis-like surface:
//! ranked sets with atomic increments, plain sets, plain values, and expiring
//! values. Each method is atomic on its own; sequences of calls are not.

pub mod memory;
pub mod ranked;

pub use memory::{MemoryStore, StoreSnapshot};
pub use ranked::RankedSet;

use crate::types::KarmaResult;

/// Direction of a ranked range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Lowest score first.
    Ascending,
    /// Highest score first.
    Descending,
}

/// The kind of data held at a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Ranked set (member -> score).
    Ranked,
    /// Unordered set of members.
    Set,
    /// Plain string value, possibly expiring.
    Value,
}

impl KeyKind {
    /// Return a human-readable name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ranked => "ranked set",
            Self::Set => "set",
            Self::Value => "value",
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Persistent key-value capability the karma engine runs against.
///
/// Implementations report an unreachable backend as
/// [`KarmaError::StoreUnavailable`](crate::types::KarmaError::StoreUnavailable)
/// and a key of the wrong kind as
/// [`KarmaError::WrongKind`](crate::types::KarmaError::WrongKind). Removing the
/// last member of a ranked set or set removes the key.
pub trait ScoreStore: Send + Sync {
    /// Add `delta` to `member`'s score, creating it at 0. Returns the new score.
    fn incr_by(&self, collection: &str, member: &str, delta: f64) -> KarmaResult<f64>;

    /// Score of `member`, if present.
    fn score(&self, collection: &str, member: &str) -> KarmaResult<Option<f64>>;

    /// Insert or update `member`. Returns true if it was not present before.
    fn ranked_add(&self, collection: &str, member: &str, score: f64) -> KarmaResult<bool>;

    /// Remove `member`. Returns true if it was present.
    fn ranked_remove(&self, collection: &str, member: &str) -> KarmaResult<bool>;

    /// Members in rank order, skipping `offset` and returning at most `limit`.
    /// Equal scores are ordered by member name (reversed for descending).
    fn range_by_rank(
        &self,
        collection: &str,
        order: Order,
        offset: usize,
        limit: Option<usize>,
    ) -> KarmaResult<Vec<(String, f64)>>;

    /// Members with `min <= score <= max`, ascending.
    fn range_by_score(&self, collection: &str, min: f64, max: f64)
        -> KarmaResult<Vec<(String, f64)>>;

    /// Remove members with `min <= score <= max`. Returns how many were removed.
    fn remove_range_by_score(&self, collection: &str, min: f64, max: f64) -> KarmaResult<usize>;

    /// Number of members in a ranked set.
    fn ranked_len(&self, collection: &str) -> KarmaResult<usize>;

    /// Add `member` to a set. Returns true if it was not present before.
    fn set_add(&self, key: &str, member: &str) -> KarmaResult<bool>;

    /// Remove `member` from a set. Returns true if it was present.
    fn set_remove(&self, key: &str, member: &str) -> KarmaResult<bool>;

    /// All members of a set, sorted.
    fn set_members(&self, key: &str) -> KarmaResult<Vec<String>>;

    /// Whether `member` is in the set.
    fn set_contains(&self, key: &str, member: &str) -> KarmaResult<bool>;

    /// Store a non-expiring value.
    fn set_value(&self, key: &str, value: &str) -> KarmaResult<()>;

    /// Read a value.
    fn get_value(&self, key: &str) -> KarmaResult<Option<String>>;

    /// Store a value that disappears after `ttl_secs` seconds.
    fn set_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> KarmaResult<()>;

    /// Whole seconds (rounded up) until `key` expires. `None` if the key is
    /// absent or has no expiry.
    fn ttl(&self, key: &str) -> KarmaResult<Option<u64>>;

    /// Whether `key` holds any data.
    fn exists(&self, key: &str) -> KarmaResult<bool>;

    /// Delete `key`. Returns true if it existed.
    fn remove(&self, key: &str) -> KarmaResult<bool>;

    /// Kind of data at `key`.
    fn key_kind(&self, key: &str) -> KarmaResult<Option<KeyKind>>;

    /// All keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> KarmaResult<Vec<String>>;
}

//! The persisted keyspace. These names are shared with existing data and must
//! not change.

/// Ranked set: term -> aggregate score.
pub const TERMS: &str = "terms";

/// Ranked set: serialized action -> unix timestamp.
pub const ACTIONS: &str = "actions";

/// Sentinel set once reverse links have been built.
pub const SUPPORT_REVERSE_LINKS: &str = "support:reverse_links";

/// Sentinel set once modified sets have been converted to counts.
pub const SUPPORT_MODIFIED_COUNTS: &str = "support:modified_counts";

/// Sentinel set once the decay backfill has run.
pub const SUPPORT_DECAY: &str = "support:decay";

pub const MODIFIED_PREFIX: &str = "modified:";
pub const LINKS_PREFIX: &str = "links:";
pub const LINKED_TO_PREFIX: &str = "linked_to:";
pub const COOLDOWN_PREFIX: &str = "cooldown:";

/// Ranked set of user id -> contribution count for `term`.
pub fn modified(term: &str) -> String {
    format!("{MODIFIED_PREFIX}{term}")
}

/// Set of terms `term` links to.
pub fn links(term: &str) -> String {
    format!("{LINKS_PREFIX}{term}")
}

/// Set of terms that link to `term`.
pub fn linked_to(term: &str) -> String {
    format!("{LINKED_TO_PREFIX}{term}")
}

/// Expiring marker for `user_id` modifying `term`.
pub fn cooldown(user_id: &str, term: &str) -> String {
    format!("{COOLDOWN_PREFIX}{user_id}:{term}")
}

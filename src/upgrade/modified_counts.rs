//! Converts legacy `modified:<term>` sets of user ids into ranked counts.

use crate::config::ModifiedUpgrader;
use crate::store::{KeyKind, ScoreStore};
use crate::types::{keys, KarmaResult};

/// Convert every `modified:*` key that is still a plain set, including sets
/// whose term no longer has a score. Returns the number of keys converted.
pub fn run<S: ScoreStore>(store: &S, upgrader: &dyn ModifiedUpgrader) -> KarmaResult<usize> {
    let mut converted = 0;
    for key in store.keys_with_prefix(keys::MODIFIED_PREFIX)? {
        if store.key_kind(&key)? != Some(KeyKind::Set) {
            continue;
        }
        let term = &key[keys::MODIFIED_PREFIX.len()..];
        let user_ids = store.set_members(&key)?;
        let score = store
            .score(keys::TERMS, term)?
            .map(|s| s.round() as i64)
            .unwrap_or(0);

        let weighted = upgrader.upgrade(score, &user_ids);
        store.remove(&key)?;
        for (weight, user_id) in &weighted {
            store.incr_by(&key, user_id, *weight)?;
        }
        log::debug!(
            "Converted {} ({} user(s), score {})",
            key,
            weighted.len(),
            score
        );
        converted += 1;
    }
    Ok(converted)
}

//! Per-user, per-term rate limiting on expiring markers.

use crate::store::ScoreStore;
use crate::types::{keys, KarmaResult};

/// Rate gate for one store. A user is cooling down on a term for as long as
/// the `cooldown:<user>:<term>` marker exists; the store expires it.
pub struct Cooldown<'a, S: ScoreStore> {
    store: &'a S,
    secs: Option<u64>,
}

impl<'a, S: ScoreStore> Cooldown<'a, S> {
    /// `secs` of `None` (or 0) never arms markers. Markers left from an earlier
    /// configuration are still honored until they expire.
    pub fn new(store: &'a S, secs: Option<u64>) -> Self {
        Self {
            store,
            secs: secs.filter(|s| *s > 0),
        }
    }

    /// Seconds left before `user_id` may modify `term` again, `None` if free.
    pub fn remaining(&self, user_id: &str, term: &str) -> KarmaResult<Option<u64>> {
        Ok(self
            .store
            .ttl(&keys::cooldown(user_id, term))?
            .filter(|secs| *secs > 0))
    }

    /// (Re)start the cooldown after a successful modification. Returns whether
    /// a marker was set.
    pub fn arm(&self, user_id: &str, term: &str) -> KarmaResult<bool> {
        match self.secs {
            Some(secs) => {
                self.store
                    .set_with_expiry(&keys::cooldown(user_id, term), "1", secs)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

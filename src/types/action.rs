//! A single recorded contribution to a term's score.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::clock::{from_unix_secs, to_unix_secs};
use crate::types::error::{KarmaError, KarmaResult};

/// One timestamped, signed change to a term's score.
///
/// On the wire an action is the JSON array `[term, user_id, delta, unix_secs]`
/// where `user_id` is `null` for anonymous actions created by the decay
/// backfill.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Normalized term name.
    pub term: String,
    /// Acting user, or `None` when unattributed.
    pub user_id: Option<String>,
    /// Signed change applied to the term's score.
    pub delta: i64,
    /// When the change happened.
    pub at: DateTime<Utc>,
}

impl Action {
    /// Create an action.
    pub fn new(
        term: impl Into<String>,
        user_id: Option<String>,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            term: term.into(),
            user_id,
            delta,
            at,
        }
    }

    /// The rank this action sorts by in the action log.
    pub fn rank(&self) -> f64 {
        to_unix_secs(self.at)
    }

    /// Encode as the JSON 4-tuple stored in the action log.
    pub fn serialize(&self) -> String {
        let user = match &self.user_id {
            Some(id) => Value::String(id.clone()),
            None => Value::Null,
        };
        serde_json::json!([self.term, user, self.delta, self.rank()]).to_string()
    }

    /// Decode an action log entry.
    ///
    /// User ids written by other clients as numbers are accepted and kept as
    /// their decimal string.
    pub fn deserialize(raw: &str) -> KarmaResult<Self> {
        let corrupt = || KarmaError::CorruptAction(raw.to_string());

        let tuple: Vec<Value> = serde_json::from_str(raw).map_err(|_| corrupt())?;
        let [term, user, delta, at] = <[Value; 4]>::try_from(tuple).map_err(|_| corrupt())?;

        let term = term.as_str().ok_or_else(corrupt)?.to_string();
        let user_id = match user {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => return Err(corrupt()),
        };
        let delta = delta.as_i64().ok_or_else(corrupt)?;
        let at = at.as_f64().and_then(from_unix_secs).ok_or_else(corrupt)?;

        Ok(Self {
            term,
            user_id,
            delta,
            at,
        })
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.term,
            self.user_id.as_deref().unwrap_or("anonymous"),
            self.delta,
            self.at.to_rfc3339()
        )
    }
}

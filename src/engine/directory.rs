//! User lookup used to render modifier lists.

use std::collections::BTreeMap;

use crate::types::{KarmaError, KarmaResult};

/// A resolved user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// Maps opaque user ids to display names. Provided by the host.
pub trait UserDirectory {
    fn lookup(&self, user_id: &str) -> KarmaResult<User>;
}

/// Fixed id -> name table, e.g. from the `[users]` section of the settings.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    names: BTreeMap<String, String>,
}

impl StaticDirectory {
    pub fn new(names: BTreeMap<String, String>) -> Self {
        Self { names }
    }

    /// Add or replace one entry.
    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(id.into(), name.into());
    }
}

impl UserDirectory for StaticDirectory {
    fn lookup(&self, user_id: &str) -> KarmaResult<User> {
        self.names
            .get(user_id)
            .map(|name| User {
                id: user_id.to_string(),
                name: name.clone(),
            })
            .ok_or_else(|| KarmaError::UserNotFound(user_id.to_string()))
    }
}

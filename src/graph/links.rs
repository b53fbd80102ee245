//! Directed links between terms with a maintained reverse index.
//!
//! `links:<a>` holds every term `a` aggregates; `linked_to:<b>` holds every
//! term whose `links` set contains `b`. Every write here keeps both sides in
//! step.

use crate::store::ScoreStore;
use crate::types::{keys, KarmaResult};

/// Link edges removed when a term is detached from the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetachReport {
    /// Terms the detached term linked to.
    pub outgoing: Vec<String>,
    /// Terms that linked to the detached term.
    pub incoming: Vec<String>,
}

/// Typed access to the link sets.
pub struct LinkGraph<'a, S: ScoreStore> {
    store: &'a S,
}

impl<'a, S: ScoreStore> LinkGraph<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Add the edge `from -> to`. Returns false if it already existed.
    pub fn link(&self, from: &str, to: &str) -> KarmaResult<bool> {
        let created = self.store.set_add(&keys::links(from), to)?;
        // Also repairs a missing reverse entry on an existing edge.
        self.store.set_add(&keys::linked_to(to), from)?;
        Ok(created)
    }

    /// Remove the edge `from -> to`. Returns false if there was no such edge.
    pub fn unlink(&self, from: &str, to: &str) -> KarmaResult<bool> {
        let removed = self.store.set_remove(&keys::links(from), to)?;
        self.store.set_remove(&keys::linked_to(to), from)?;
        Ok(removed)
    }

    /// Terms `term` links to, sorted.
    pub fn links_of(&self, term: &str) -> KarmaResult<Vec<String>> {
        self.store.set_members(&keys::links(term))
    }

    /// Terms linking to `term`, sorted.
    pub fn linked_to(&self, term: &str) -> KarmaResult<Vec<String>> {
        self.store.set_members(&keys::linked_to(term))
    }

    /// Remove every edge touching `term`, in both directions.
    pub fn detach(&self, term: &str) -> KarmaResult<DetachReport> {
        let outgoing = self.links_of(term)?;
        for target in &outgoing {
            self.store.set_remove(&keys::linked_to(target), term)?;
        }
        self.store.remove(&keys::links(term))?;

        let incoming = self.linked_to(term)?;
        for source in &incoming {
            self.store.set_remove(&keys::links(source), term)?;
        }
        self.store.remove(&keys::linked_to(term))?;

        Ok(DetachReport { outgoing, incoming })
    }

    /// Rebuild `linked_to` entries from every existing `links` set. Returns
    /// the number of edges visited.
    pub fn rebuild_reverse_index(&self) -> KarmaResult<usize> {
        let mut edges = 0;
        for key in self.store.keys_with_prefix(keys::LINKS_PREFIX)? {
            let term = &key[keys::LINKS_PREFIX.len()..];
            for target in self.store.set_members(&key)? {
                self.store.set_add(&keys::linked_to(&target), term)?;
                edges += 1;
            }
        }
        Ok(edges)
    }
}

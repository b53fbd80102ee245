//! Builds the `linked_to` reverse index for stores created before it existed.

use crate::graph::LinkGraph;
use crate::store::ScoreStore;
use crate::types::KarmaResult;

/// Returns the number of link edges indexed.
pub fn run<S: ScoreStore>(store: &S) -> KarmaResult<usize> {
    LinkGraph::new(store).rebuild_reverse_index()
}

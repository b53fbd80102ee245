//! Ranked set: members ordered by score, ties broken by member name.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use super::Order;

/// f64 with a total order, so it can key a BTreeSet.
#[derive(Debug, Clone, Copy)]
struct Rank(f64);

impl PartialEq for Rank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rank {}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A set of unique members, each with a score.
#[derive(Debug, Clone, Default)]
pub struct RankedSet {
    /// member -> score.
    scores: HashMap<String, f64>,
    /// Sorted by (score, member) ascending.
    ordered: BTreeSet<(Rank, String)>,
}

impl RankedSet {
    /// Create an empty ranked set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a member. Returns true if the member is new.
    pub fn insert(&mut self, member: &str, score: f64) -> bool {
        let is_new = match self.scores.insert(member.to_string(), score) {
            Some(old) => {
                self.ordered.remove(&(Rank(old), member.to_string()));
                false
            }
            None => true,
        };
        self.ordered.insert((Rank(score), member.to_string()));
        is_new
    }

    /// Add `delta` to a member's score, creating it at 0. Returns the new score.
    pub fn increment(&mut self, member: &str, delta: f64) -> f64 {
        let score = self.scores.get(member).copied().unwrap_or(0.0) + delta;
        self.insert(member, score);
        score
    }

    /// Remove a member. Returns true if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(Rank(score), member.to_string()));
                true
            }
            None => false,
        }
    }

    /// Score of a member.
    pub fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Members in rank order after skipping `offset`, at most `limit` of them.
    pub fn range_by_rank(
        &self,
        order: Order,
        offset: usize,
        limit: Option<usize>,
    ) -> Vec<(String, f64)> {
        let limit = limit.unwrap_or(usize::MAX);
        let entries = |(rank, member): &(Rank, String)| (member.clone(), rank.0);
        match order {
            Order::Ascending => self
                .ordered
                .iter()
                .skip(offset)
                .take(limit)
                .map(entries)
                .collect(),
            Order::Descending => self
                .ordered
                .iter()
                .rev()
                .skip(offset)
                .take(limit)
                .map(entries)
                .collect(),
        }
    }

    /// Members with `min <= score <= max`, ascending.
    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<(String, f64)> {
        self.ordered
            .iter()
            .skip_while(|(rank, _)| rank.0 < min)
            .take_while(|(rank, _)| rank.0 <= max)
            .map(|(rank, member)| (member.clone(), rank.0))
            .collect()
    }

    /// Remove members with `min <= score <= max`. Returns how many were removed.
    pub fn remove_range_by_score(&mut self, min: f64, max: f64) -> usize {
        let doomed: Vec<String> = self
            .range_by_score(min, max)
            .into_iter()
            .map(|(member, _)| member)
            .collect();
        for member in &doomed {
            self.remove(member);
        }
        doomed.len()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// All (member, score) pairs, ascending.
    pub fn entries(&self) -> Vec<(String, f64)> {
        self.range_by_rank(Order::Ascending, 0, None)
    }
}

impl FromIterator<(String, f64)> for RankedSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut set = RankedSet::new();
        for (member, score) in iter {
            set.insert(&member, score);
        }
        set
    }
}

//! On-demand parent index, built only when a game doesn't supply
//! `canonical_parent_positions`. During the solving tier's initial scan,
//! every canonical position's canonical children are enumerated and the
//! reverse edge `(child, parent)` recorded. Queries destructively move
//! the parent list out — retrograde analysis consumes each position's
//! parent list exactly once, so taking ownership amortizes memory instead
//! of leaving consumed lists resident.

use crate::tier::{Position, Tier, TierPosition};
use std::collections::HashMap;

/// Chunked arrays of parent `TierPosition`s keyed by the child's
/// `(tier, position)` composite key.
#[derive(Debug, Default)]
pub struct ReverseGraph {
    parents: HashMap<(Tier, Position), Vec<TierPosition>>,
}

impl ReverseGraph {
    pub fn new() -> Self {
        Self { parents: HashMap::new() }
    }

    /// Records that `parent` has canonical child `child`.
    pub fn record_edge(&mut self, child: TierPosition, parent: TierPosition) {
        self.parents.entry((child.tier, child.position)).or_default().push(parent);
    }

    /// Moves `child`'s parent list out, leaving nothing behind. Returns
    /// an empty vec if `child` has no recorded parents (or has already
    /// been queried once).
    pub fn take_parents(&mut self, child: TierPosition) -> Vec<TierPosition> {
        self.parents.remove(&(child.tier, child.position)).unwrap_or_default()
    }

    pub fn contains(&self, child: TierPosition) -> bool {
        self.parents.contains_key(&(child.tier, child.position))
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(tier: u64, pos: u64) -> TierPosition {
        TierPosition::new(Tier(tier), Position(pos))
    }

    #[test]
    fn take_parents_returns_all_recorded_edges_once() {
        let mut g = ReverseGraph::new();
        g.record_edge(tp(1, 0), tp(1, 5));
        g.record_edge(tp(1, 0), tp(1, 6));
        let parents = g.take_parents(tp(1, 0));
        assert_eq!(parents, vec![tp(1, 5), tp(1, 6)]);
        assert!(g.take_parents(tp(1, 0)).is_empty());
    }

    #[test]
    fn unrecorded_child_has_no_parents() {
        let mut g = ReverseGraph::new();
        assert!(!g.contains(tp(2, 0)));
        assert!(g.take_parents(tp(2, 0)).is_empty());
    }

    #[test]
    fn parents_from_different_tiers_are_keyed_independently() {
        let mut g = ReverseGraph::new();
        g.record_edge(tp(1, 0), tp(1, 1));
        g.record_edge(tp(2, 0), tp(2, 1));
        assert_eq!(g.take_parents(tp(1, 0)), vec![tp(1, 1)]);
        assert_eq!(g.take_parents(tp(2, 0)), vec![tp(2, 1)]);
    }
}

//! Tier DAG driver: topologically orders the game's tiers, tracks
//! readiness, and dispatches canonical tiers to the [`Worker`].
//!
//! Edges come from the game's `child_tiers`, which may name non-canonical
//! tiers; the driver canonicalizes every edge endpoint via
//! `canonical_tier` so the dependency graph it tracks has exactly one node
//! per symmetry class — the only tiers ever actually dispatched.

use crate::database::Database;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::tier::{DbStatus, Tier, TopologyStatus};
use crate::worker::{SolveReport, Worker};
use std::collections::{HashMap, HashSet, VecDeque};

struct TierNode {
    topology: TopologyStatus,
    unsolved_children: u32,
    parents: Vec<Tier>,
}

/// Aggregate outcome of one `Driver::solve()` run: per-tier reports plus
/// the solved/skipped/failed/scanned tallies spec.md §4.I/§7 call for.
#[derive(Debug, Default)]
pub struct DriverSummary {
    pub solved: u64,
    pub skipped: u64,
    pub failed: u64,
    pub scanned: u64,
    pub reports: Vec<SolveReport>,
    pub failed_tiers: Vec<Tier>,
}

impl DriverSummary {
    /// `Undecided` only on fatal (cycle / graph-structure) errors per
    /// spec.md §4.I step 7 — those surface as an `Err` from `solve()`
    /// instead, so a returned `DriverSummary` always reflects a run that
    /// reached the end of the ready queue. This is `true` iff every
    /// dispatched tier solved (i.e. `failed == 0`).
    pub fn fully_solved(&self) -> bool {
        self.failed == 0
    }
}

pub struct Driver {
    engine: Engine,
}

impl Driver {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Drives every tier reachable from the game's initial tier to
    /// completion. Per-tier failures are tallied, not fatal: the run keeps
    /// draining the ready queue so the caller gets full totals. Only a
    /// cycle in the tier graph (or a game that reports one of its own
    /// tiers as its own canonical parent) is fatal to the whole run.
    pub fn solve(&self, db: &mut Database, force: bool) -> Result<DriverSummary> {
        let game = self.engine.game.clone();
        let initial = game.canonical_tier(game.initial_tier());
        let mut nodes: HashMap<Tier, TierNode> = HashMap::new();

        // Iterative DFS with three-color cycle detection. `stack` holds
        // (tier, next child index to visit) so we can resume a partially
        // expanded frame without recursion.
        let mut stack: Vec<(Tier, usize)> = Vec::new();
        nodes.insert(initial, TierNode { topology: TopologyStatus::InProgress, unsolved_children: 0, parents: Vec::new() });
        stack.push((initial, 0));

        while let Some(&(tier, child_idx)) = stack.last() {
            let raw_children = game.child_tiers(tier);
            let canonical_children: Vec<Tier> = {
                let mut seen = HashSet::new();
                raw_children
                    .into_iter()
                    .map(|c| game.canonical_tier(c))
                    .filter(|c| seen.insert(*c))
                    .collect()
            };

            if child_idx >= canonical_children.len() {
                nodes.get_mut(&tier).unwrap().topology = TopologyStatus::Closed;
                nodes.get_mut(&tier).unwrap().unsolved_children = canonical_children.len() as u32;
                stack.pop();
                continue;
            }

            let child = canonical_children[child_idx];
            stack.last_mut().unwrap().1 += 1;

            if child == tier {
                return Err(EngineError::GraphStructure(format!("tier {tier} is its own child")));
            }

            match nodes.get(&child).map(|n| n.topology) {
                Some(TopologyStatus::InProgress) => {
                    return Err(EngineError::GraphStructure(format!("cycle in tier DAG: {tier} -> {child}")));
                }
                Some(TopologyStatus::Closed) => {
                    nodes.get_mut(&child).unwrap().parents.push(tier);
                }
                Some(TopologyStatus::NotVisited) | None => {
                    nodes.insert(child, TierNode { topology: TopologyStatus::InProgress, unsolved_children: 0, parents: vec![tier] });
                    stack.push((child, 0));
                }
            }
        }

        let mut ready: VecDeque<Tier> = nodes
            .iter()
            .filter(|(_, n)| n.unsolved_children == 0)
            .map(|(&t, _)| t)
            .collect();

        let mut summary = DriverSummary::default();
        let worker = Worker::new(self.engine.clone());

        while let Some(tier) = ready.pop_front() {
            summary.scanned += 1;
            if !force && db.tier_status(tier) == DbStatus::Solved {
                summary.skipped += 1;
                if let Ok(report) = worker.solve(db, tier, None, false, None) {
                    summary.reports.push(report);
                }
            } else {
                match worker.solve(db, tier, None, force, None) {
                    Ok(report) => {
                        summary.solved += 1;
                        summary.reports.push(report);
                    }
                    Err(err) => {
                        log::warn!("tier {tier} failed to solve: {err}");
                        summary.failed += 1;
                        summary.failed_tiers.push(tier);
                        continue;
                    }
                }
            }

            let parents = nodes.get(&tier).map(|n| n.parents.clone()).unwrap_or_default();
            for parent in parents {
                if let Some(node) = nodes.get_mut(&parent) {
                    if node.unsolved_children > 0 {
                        node.unsolved_children -= 1;
                        if node.unsolved_children == 0 {
                            ready.push_back(parent);
                        }
                    }
                }
            }
        }

        if summary.fully_solved() {
            db.mark_finished()?;
        }
        log::info!(
            "driver finished: solved={} skipped={} failed={} scanned={}",
            summary.solved, summary.skipped, summary.failed, summary.scanned
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;
    use crate::record::Value;
    use crate::tier::{Position, TierPosition, TierType};
    use std::sync::Arc;

    /// A 10-tier chain (0..=9), each tier one legal position, primitive
    /// Lose at tier 9 and otherwise a single forced move to the next tier
    /// — enough to exercise topological ordering without pulling in the
    /// tic-tac-toe reference game.
    struct Chain;
    impl Game for Chain {
        fn initial_tier(&self) -> Tier {
            Tier(0)
        }
        fn initial_position(&self) -> Position {
            Position(0)
        }
        fn tier_size(&self, tier: Tier) -> u64 {
            if tier.0 <= 9 {
                1
            } else {
                0
            }
        }
        fn generate_moves(&self, tp: TierPosition) -> Vec<u64> {
            if tp.tier.0 < 9 {
                vec![0]
            } else {
                vec![]
            }
        }
        fn primitive(&self, tp: TierPosition) -> Value {
            if tp.tier.0 == 9 {
                Value::Lose
            } else {
                Value::Undecided
            }
        }
        fn do_move(&self, tp: TierPosition, _: u64) -> TierPosition {
            TierPosition::new(Tier(tp.tier.0 + 1), Position(0))
        }
        fn is_legal_position(&self, _: TierPosition) -> bool {
            true
        }
        fn canonical_position(&self, tp: TierPosition) -> Position {
            tp.position
        }
        fn canonical_child_positions(&self, tp: TierPosition) -> Vec<TierPosition> {
            self.generate_moves(tp).into_iter().map(|m| self.do_move(tp, m)).collect()
        }
        fn child_tiers(&self, tier: Tier) -> Vec<Tier> {
            if tier.0 < 9 {
                vec![Tier(tier.0 + 1)]
            } else {
                vec![]
            }
        }
        fn tier_type(&self, _: Tier) -> TierType {
            TierType::ImmediateTransition
        }
        fn canonical_tier(&self, tier: Tier) -> Tier {
            tier
        }
    }

    fn test_engine() -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (Engine::new(dir.path(), u64::MAX, 1, Arc::new(Chain)), dir)
    }

    #[test]
    fn solves_every_tier_in_a_chain() {
        let (engine, _dir) = test_engine();
        let mut db = Database::new(&engine).unwrap();
        let driver = Driver::new(engine);
        let summary = driver.solve(&mut db, false).unwrap();
        assert_eq!(summary.solved, 10);
        assert_eq!(summary.failed, 0);
        assert!(summary.fully_solved());

        db.load_tier(Tier(0), 1).unwrap();
        assert_eq!(db.get_value_from_loaded(Tier(0), Position(0)).unwrap(), Value::Win);
        assert_eq!(db.get_remoteness_from_loaded(Tier(0), Position(0)).unwrap(), 9);
    }

    #[test]
    fn self_referential_tier_is_a_fatal_graph_error() {
        struct SelfLoop;
        impl Game for SelfLoop {
            fn initial_tier(&self) -> Tier {
                Tier(0)
            }
            fn initial_position(&self) -> Position {
                Position(0)
            }
            fn tier_size(&self, _: Tier) -> u64 {
                1
            }
            fn generate_moves(&self, _: TierPosition) -> Vec<u64> {
                vec![0]
            }
            fn primitive(&self, _: TierPosition) -> Value {
                Value::Undecided
            }
            fn do_move(&self, tp: TierPosition, _: u64) -> TierPosition {
                tp
            }
            fn is_legal_position(&self, _: TierPosition) -> bool {
                true
            }
            fn canonical_position(&self, tp: TierPosition) -> Position {
                tp.position
            }
            fn canonical_child_positions(&self, tp: TierPosition) -> Vec<TierPosition> {
                vec![tp]
            }
            fn child_tiers(&self, tier: Tier) -> Vec<Tier> {
                vec![tier]
            }
            fn tier_type(&self, _: Tier) -> TierType {
                TierType::Loopy
            }
            fn canonical_tier(&self, tier: Tier) -> Tier {
                tier
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(dir.path(), u64::MAX, 1, Arc::new(SelfLoop));
        let mut db = Database::new(&engine).unwrap();
        let driver = Driver::new(engine);
        assert!(matches!(driver.solve(&mut db, false), Err(EngineError::GraphStructure(_))));
    }

    #[test]
    fn skips_already_solved_tiers_unless_forced() {
        let (engine, _dir) = test_engine();
        let mut db = Database::new(&engine).unwrap();
        let driver = Driver::new(engine);
        driver.solve(&mut db, false).unwrap();

        let second = driver.solve(&mut db, false).unwrap();
        assert_eq!(second.solved, 0);
        assert_eq!(second.skipped, 10);
    }
}

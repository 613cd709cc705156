//! Per-tier solver: selects one of three algorithms based on the game's
//! declared `TierType` and fills a tier's records from its (already
//! solved) child tiers.

use crate::database::Database;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::frontier::Frontier;
use crate::record::{Comparator, Remoteness, Value, MAX_REMOTENESS};
use crate::reverse_graph::ReverseGraph;
use crate::tier::{Position, Tier, TierPosition, TierType};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Total order over `(Value, Remoteness)` used to pick the best of several
/// candidate records: Lose beats Tie beats Draw beats Win; within Lose
/// smaller remoteness wins, within Win and Tie larger remoteness wins.
/// Applied to *un-swapped* child records (a child valued Lose is the best
/// possible find, since it means the current player wins by moving there).
pub fn primitive_comparator(candidate: (Value, Remoteness), current: (Value, Remoteness)) -> Ordering {
    fn rank(v: Value) -> i8 {
        match v {
            Value::Lose => 3,
            Value::Tie => 2,
            Value::Draw => 1,
            Value::Win => 0,
            Value::Undecided | Value::Error => -1,
        }
    }
    let (cv, cr) = candidate;
    let (uv, ur) = current;
    match rank(cv).cmp(&rank(uv)) {
        Ordering::Equal => match cv {
            Value::Lose => cr.cmp(&ur).reverse(),
            Value::Win | Value::Tie => cr.cmp(&ur),
            _ => Ordering::Equal,
        },
        other => other,
    }
}

pub const PRIMITIVE_COMPARATOR: Comparator = primitive_comparator;

/// Folds `children`'s raw (value, remoteness) pairs (from each child's own
/// mover perspective) into the position's own (value, remoteness) by
/// picking the best under `primitive_comparator` and swapping Win/Lose.
/// Returns `None` if any child is still `Undecided`/`Error` — the
/// position cannot be resolved yet.
pub fn resolve_from_children(children: &[(Value, Remoteness)]) -> Option<(Value, Remoteness)> {
    let mut best: Option<(Value, Remoteness)> = None;
    for &c in children {
        if !matches!(c.0, Value::Win | Value::Lose | Value::Tie | Value::Draw) {
            return None;
        }
        best = Some(match best {
            None => c,
            Some(cur) => {
                if primitive_comparator(c, cur) == Ordering::Greater {
                    c
                } else {
                    cur
                }
            }
        });
    }
    let (value, remoteness) = best?;
    Some(match value {
        Value::Lose => (Value::Win, remoteness + 1),
        Value::Win => (Value::Lose, remoteness + 1),
        Value::Tie => (Value::Tie, remoteness + 1),
        Value::Draw => (Value::Draw, 0),
        _ => unreachable!("resolve_from_children only folds terminal-outcome or Draw children"),
    })
}

/// Bytes a single record costs once repacked on disk; used only to size
/// memlimit-bounded child-tier batches during immediate-transition solving.
const BYTES_PER_RECORD_ESTIMATE: u64 = 2;

/// Runs `f` over `0..n`, across worker threads when the `parallel` feature
/// is enabled (mirroring `block::compress_blocks`'s parallel-compute/
/// sequential-apply split): the per-index `Game` calls this drives (legality,
/// `primitive`, `canonical_child_positions`) are read-only and independent,
/// so they're safe to fan out; callers apply the collected results to the
/// database sequentially afterward.
fn parallel_scan<T, F>(n: u64, f: F) -> Vec<T>
where
    F: Fn(u64) -> T + Sync + Send,
    T: Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..n).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..n).map(f).collect()
    }
}

/// The algorithm `worker_solve` dispatches to. `None` at the call site
/// means "pick the default for this tier's `TierType`"; callers that need
/// to pin a specific algorithm (tests, `--compare` reruns) pass `Some`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMethod {
    ImmediateTransition,
    BackwardInduction,
    ValueIteration,
}

impl SolveMethod {
    /// Loopy/LoopFree tiers default to backward induction: a parent
    /// function (supplied or reverse-graph-built, per spec.md §4.G) is
    /// always obtainable, so the O(V+E) retrograde sweep is preferred over
    /// value iteration's O(R·E) repeated passes. `ValueIteration` remains
    /// selectable explicitly for tiers where the reverse graph would be
    /// too large to hold in memory.
    fn default_for(tier_type: TierType) -> Self {
        match tier_type {
            TierType::ImmediateTransition => SolveMethod::ImmediateTransition,
            TierType::Loopy | TierType::LoopFree => SolveMethod::BackwardInduction,
        }
    }
}

/// Result of solving one tier: whether every legal canonical position
/// ended up with a non-`Undecided` value, outcome counts, and the example
/// position realizing the longest remoteness (for the end-of-tier report).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveReport {
    pub tier: Tier,
    pub solved: bool,
    pub win: u64,
    pub lose: u64,
    pub tie: u64,
    pub draw: u64,
    pub longest_remoteness: Remoteness,
    pub longest_position: Option<Position>,
}

pub struct Worker {
    engine: Engine,
}

impl Worker {
    /// `worker_init(game_api, db_chunk_size, memlimit)` — here the game and
    /// memlimit already live on `Engine`; `db_chunk_size` is the block
    /// compressor's concern and has a crate-wide default.
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// `worker_solve(method, tier, force, compare) -> (ok, solved_flag)`,
    /// realized here as `Result<SolveReport>` (`ok` is `ok()`/`err()` on the
    /// `Result`, `solved_flag` is `SolveReport::solved`). `method` pins an
    /// algorithm; `None` defaults per `SolveMethod::default_for`. `force`
    /// re-solves even if a flushed file already exists; `compare` checks
    /// every resolved record against a reference database, raising
    /// `Discrepancy` on the first mismatch.
    pub fn solve(
        &self,
        db: &mut Database,
        tier: Tier,
        method: Option<SolveMethod>,
        force: bool,
        compare: Option<&Database>,
    ) -> Result<SolveReport> {
        if !force && db.tier_status(tier) == crate::tier::DbStatus::Solved {
            return self.tally(db, tier);
        }
        let game = self.engine.game.clone();
        let method = method.unwrap_or_else(|| SolveMethod::default_for(game.tier_type(tier)));
        log::debug!("solving tier {tier} via {method:?}");
        match method {
            SolveMethod::ImmediateTransition => self.solve_immediate_transition(db, tier)?,
            SolveMethod::BackwardInduction => self.solve_backward_induction(db, tier)?,
            SolveMethod::ValueIteration => self.solve_value_iteration(db, tier)?,
        }
        if let Some(reference) = compare {
            self.compare_against(db, reference, tier)?;
        }
        let report = self.tally(db, tier)?;
        log::info!(
            "tier {} solved={} win={} lose={} tie={} draw={} longest_remoteness={}",
            report.tier, report.solved, report.win, report.lose, report.tie, report.draw, report.longest_remoteness
        );
        Ok(report)
    }

    fn tally(&self, db: &mut Database, tier: Tier) -> Result<SolveReport> {
        let size = self.engine.game.tier_size(tier);
        if !db.is_tier_loaded(tier) {
            db.load_tier(tier, size)?;
        }
        let mut report = SolveReport {
            tier,
            solved: true,
            win: 0,
            lose: 0,
            tie: 0,
            draw: 0,
            longest_remoteness: 0,
            longest_position: None,
        };
        for i in 0..size {
            let tp = TierPosition::new(tier, Position(i));
            if !self.engine.game.is_legal_position(tp) {
                continue;
            }
            if self.engine.game.canonical_position(tp) != Position(i) {
                continue;
            }
            let value = db.get_value_from_loaded(tier, Position(i))?;
            match value {
                Value::Win => report.win += 1,
                Value::Lose => report.lose += 1,
                Value::Tie => report.tie += 1,
                Value::Draw => report.draw += 1,
                Value::Undecided | Value::Error => report.solved = false,
            }
            if value.is_terminal_outcome() {
                let r = db.get_remoteness_from_loaded(tier, Position(i))?;
                if r >= report.longest_remoteness {
                    report.longest_remoteness = r;
                    report.longest_position = Some(Position(i));
                }
            }
        }
        db.unload_tier(tier);
        Ok(report)
    }

    fn compare_against(&self, db: &mut Database, reference: &Database, tier: Tier) -> Result<()> {
        let size = self.engine.game.tier_size(tier);
        if !db.is_tier_loaded(tier) {
            db.load_tier(tier, size)?;
        }
        let mut probe = reference.probe();
        for i in 0..size {
            let tp = TierPosition::new(tier, Position(i));
            if !self.engine.game.is_legal_position(tp) || self.engine.game.canonical_position(tp) != Position(i) {
                continue;
            }
            let ours = db.get_value_from_loaded(tier, Position(i))?;
            let theirs = probe.probe_value(tp);
            if ours != theirs {
                return Err(EngineError::Discrepancy(tp, format!("value {ours} != reference {theirs}")));
            }
        }
        Ok(())
    }

    // -- H.1: immediate-transition scan ---------------------------------

    fn solve_immediate_transition(&self, db: &mut Database, tier: Tier) -> Result<()> {
        let game = self.engine.game.clone();
        let size = game.tier_size(tier);
        db.create_solving_tier(tier, size)?;

        let mut resolved = vec![false; size as usize];
        let mut best: Vec<Option<(Value, Remoteness)>> = vec![None; size as usize];
        let mut seen = vec![0u32; size as usize];
        let mut total = vec![0u32; size as usize];

        enum Scan {
            Skip,
            Primitive(Value),
            NoChildren,
            Pending(u32),
        }
        let scanned = {
            let game = &game;
            parallel_scan(size, move |i| {
                let tp = TierPosition::new(tier, Position(i));
                if !game.is_legal_position(tp) || game.canonical_position(tp) != Position(i) {
                    return Scan::Skip;
                }
                let prim = game.primitive(tp);
                if prim != Value::Undecided {
                    return Scan::Primitive(prim);
                }
                let children = game.canonical_child_positions(tp);
                if children.is_empty() {
                    Scan::NoChildren
                } else {
                    Scan::Pending(children.len() as u32)
                }
            })
        };
        for (i, outcome) in scanned.into_iter().enumerate() {
            match outcome {
                Scan::Skip => resolved[i] = true,
                Scan::Primitive(value) => {
                    db.set_value_remoteness(Position(i as u64), value, 0)?;
                    resolved[i] = true;
                }
                Scan::NoChildren => {
                    db.set_value_remoteness(Position(i as u64), Value::Draw, 0)?;
                    resolved[i] = true;
                }
                Scan::Pending(count) => total[i] = count,
            }
        }

        let child_tiers = game.child_tiers(tier);
        let budget_positions = (self.engine.memlimit_bytes / BYTES_PER_RECORD_ESTIMATE).max(1);
        let mut idx = 0usize;
        while idx < child_tiers.len() {
            let mut batch = Vec::new();
            let mut used = 0u64;
            while idx < child_tiers.len() {
                let ct = child_tiers[idx];
                let ct_size = game.tier_size(ct);
                if !batch.is_empty() && used + ct_size > budget_positions {
                    break;
                }
                db.load_tier(ct, ct_size)?;
                batch.push(ct);
                used += ct_size;
                idx += 1;
            }

            for i in 0..size {
                if resolved[i as usize] {
                    continue;
                }
                let tp = TierPosition::new(tier, Position(i));
                for child in game.canonical_child_positions(tp) {
                    if child.tier == tier || !db.is_tier_loaded(child.tier) {
                        continue;
                    }
                    if !batch.contains(&child.tier) {
                        continue;
                    }
                    let v = db.get_value_from_loaded(child.tier, child.position)?;
                    let r = db.get_remoteness_from_loaded(child.tier, child.position)?;
                    seen[i as usize] += 1;
                    best[i as usize] = Some(match best[i as usize] {
                        None => (v, r),
                        Some(cur) => {
                            if primitive_comparator((v, r), cur) == Ordering::Greater {
                                (v, r)
                            } else {
                                cur
                            }
                        }
                    });
                }
                if seen[i as usize] == total[i as usize] {
                    if let Some((value, remoteness)) = resolve_from_children(&[best[i as usize].unwrap()]) {
                        db.set_value_remoteness(Position(i), value, remoteness)?;
                        resolved[i as usize] = true;
                    }
                }
            }
            for ct in &batch {
                db.unload_tier(*ct);
            }
        }

        for i in 0..size {
            if !resolved[i as usize] {
                db.set_value_remoteness(Position(i), Value::Draw, 0)?;
            }
        }
        db.flush_solving_tier()?;
        db.free_solving_tier();
        Ok(())
    }

    // -- H.2: backward induction (default path for Loopy/LoopFree) ------

    fn solve_backward_induction(&self, db: &mut Database, tier: Tier) -> Result<()> {
        let game = self.engine.game.clone();
        let size = game.tier_size(tier);
        db.create_solving_tier(tier, size)?;

        const ILLEGAL: u32 = u32::MAX;
        let mut undecided = vec![0u32; size as usize];
        let mut reverse = ReverseGraph::new();
        let child_tiers = game.child_tiers(tier);
        let mut frontier = Frontier::init(MAX_REMOTENESS as usize + 2, 1 + child_tiers.len());

        enum Scan {
            Illegal,
            NonCanonical,
            Node { children: Vec<TierPosition>, primitive: Value },
        }
        let scanned = {
            let game = &game;
            parallel_scan(size, move |i| {
                let tp = TierPosition::new(tier, Position(i));
                if !game.is_legal_position(tp) {
                    return Scan::Illegal;
                }
                if game.canonical_position(tp) != Position(i) {
                    return Scan::NonCanonical;
                }
                Scan::Node { children: game.canonical_child_positions(tp), primitive: game.primitive(tp) }
            })
        };
        for (i, outcome) in scanned.into_iter().enumerate() {
            let i = i as u64;
            let tp = TierPosition::new(tier, Position(i));
            match outcome {
                Scan::Illegal => undecided[i as usize] = ILLEGAL,
                Scan::NonCanonical => {}
                Scan::Node { children, primitive } => {
                    undecided[i as usize] = children.len() as u32;
                    for child in &children {
                        if game.canonical_parent_positions(*child, tier).is_none() {
                            reverse.record_edge(*child, tp);
                        }
                    }
                    if primitive != Value::Undecided {
                        db.set_value_remoteness(Position(i), primitive, 0)?;
                        undecided[i as usize] = 0;
                        frontier.add(tier, Position(i), 0, 0);
                    }
                }
            }
        }

        for (src_idx, &ct) in child_tiers.iter().enumerate() {
            let ct_size = game.tier_size(ct);
            db.load_tier(ct, ct_size)?;
            for p in 0..ct_size {
                let value = db.get_value_from_loaded(ct, Position(p))?;
                if value.is_terminal_outcome() {
                    let r = db.get_remoteness_from_loaded(ct, Position(p))?;
                    frontier.add(ct, Position(p), r as usize, src_idx + 1);
                }
            }
        }

        // Ties are staged here instead of resolved inline: spec.md §4.H.2
        // requires every remoteness's Lose/Win entries to be exhausted,
        // across the whole tier, before any Tie is allowed to settle a
        // parent. Resolving a Tie early can zero a parent's
        // `num_undecided_children` before a later, lower-remoteness-losing
        // sibling has a chance to mark that parent a Win instead.
        let mut deferred_ties: VecDeque<(TierPosition, usize)> = VecDeque::new();

        for r in 0..frontier.num_remoteness_buckets() {
            frontier.accumulate_dividers(r);
            let entries: Vec<_> = frontier.bucket(r).to_vec();
            for entry in entries {
                let child_tp = TierPosition::new(entry.tier, entry.position);
                let value = if entry.tier == tier {
                    db.get_value(entry.position)?
                } else {
                    db.get_value_from_loaded(entry.tier, entry.position)?
                };
                if value == Value::Tie {
                    deferred_ties.push_back((child_tp, r));
                    continue;
                }
                let parents = match game.canonical_parent_positions(child_tp, tier) {
                    Some(p) => p,
                    None => reverse.take_parents(child_tp),
                };
                for parent in parents {
                    if parent.tier != tier {
                        continue;
                    }
                    let idx = parent.position.0 as usize;
                    if undecided[idx] == ILLEGAL || undecided[idx] == 0 {
                        continue;
                    }
                    match value {
                        Value::Lose => {
                            db.set_value_remoteness(parent.position, Value::Win, r as Remoteness + 1)?;
                            undecided[idx] = 0;
                            frontier.add(tier, parent.position, r + 1, 0);
                        }
                        Value::Win => {
                            undecided[idx] -= 1;
                            if undecided[idx] == 0 {
                                db.set_value_remoteness(parent.position, Value::Lose, r as Remoteness + 1)?;
                                frontier.add(tier, parent.position, r + 1, 0);
                            }
                        }
                        _ => {}
                    }
                }
            }
            frontier.free_remoteness(r);
        }

        // Drain the deferred Ties now that every Win/Lose has had a chance
        // to settle its parents first. Resolving a Tie parent can itself
        // cascade into further Ties for that parent's own parents, so newly
        // resolved entries are pushed back onto the same queue.
        while let Some((child_tp, r)) = deferred_ties.pop_front() {
            let parents = match game.canonical_parent_positions(child_tp, tier) {
                Some(p) => p,
                None => reverse.take_parents(child_tp),
            };
            for parent in parents {
                if parent.tier != tier {
                    continue;
                }
                let idx = parent.position.0 as usize;
                if undecided[idx] == ILLEGAL || undecided[idx] == 0 {
                    continue;
                }
                db.set_value_remoteness(parent.position, Value::Tie, r as Remoteness + 1)?;
                undecided[idx] = 0;
                deferred_ties.push_back((TierPosition::new(tier, parent.position), r + 1));
            }
        }

        for i in 0..size {
            if undecided[i as usize] != ILLEGAL && undecided[i as usize] > 0 {
                let tp = TierPosition::new(tier, Position(i));
                if game.canonical_position(tp) == Position(i) {
                    db.set_value_remoteness(Position(i), Value::Draw, 0)?;
                }
            }
        }

        for ct in &child_tiers {
            db.unload_tier(*ct);
        }
        db.flush_solving_tier()?;
        db.free_solving_tier();
        Ok(())
    }

    // -- H.3: value iteration (loopy, no parent function required) ------

    /// Initializes every legal canonical position to `Draw`, then
    /// repeatedly recomputes each position's (value, remoteness) from its
    /// current children until a full pass makes no change. O(V) memory —
    /// no reverse graph or frontier bookkeeping — at the cost of O(R·E)
    /// worst-case time across the fixed-point passes.
    fn solve_value_iteration(&self, db: &mut Database, tier: Tier) -> Result<()> {
        let game = self.engine.game.clone();
        let size = game.tier_size(tier);
        db.create_solving_tier(tier, size)?;

        enum Scan {
            Skip,
            Primitive(Value),
            Pending,
        }
        let scanned = {
            let game = &game;
            parallel_scan(size, move |i| {
                let tp = TierPosition::new(tier, Position(i));
                if !game.is_legal_position(tp) || game.canonical_position(tp) != Position(i) {
                    return Scan::Skip;
                }
                match game.primitive(tp) {
                    Value::Undecided => Scan::Pending,
                    prim => Scan::Primitive(prim),
                }
            })
        };
        let mut legal_canonical = Vec::new();
        for (i, outcome) in scanned.into_iter().enumerate() {
            let i = i as u64;
            match outcome {
                Scan::Skip => {}
                Scan::Primitive(prim) => db.set_value_remoteness(Position(i), prim, 0)?,
                Scan::Pending => {
                    db.set_value_remoteness(Position(i), Value::Draw, 0)?;
                    legal_canonical.push(i);
                }
            }
        }

        let child_tiers = game.child_tiers(tier);
        for &ct in &child_tiers {
            if ct != tier {
                let ct_size = game.tier_size(ct);
                db.load_tier(ct, ct_size)?;
            }
        }

        // Each pass reads every legal position's children from the snapshot
        // at the start of the pass (Jacobi-style) so the recompute step is
        // independent per position and safe to run across worker threads;
        // only applying the collected updates to `db` is sequential.
        let mut pass = 0u64;
        loop {
            let recomputed: Vec<Result<Option<(u64, Value, Remoteness)>>> = {
                let db = &*db;
                let game = &game;
                let legal_canonical = &legal_canonical;
                parallel_scan(legal_canonical.len() as u64, move |idx| {
                    let i = legal_canonical[idx as usize];
                    let tp = TierPosition::new(tier, Position(i));
                    let children = game.canonical_child_positions(tp);
                    if children.is_empty() {
                        return Ok(None);
                    }
                    let mut child_records = Vec::with_capacity(children.len());
                    for child in &children {
                        let (v, r) = if child.tier == tier {
                            (db.get_value(child.position)?, db.get_remoteness(child.position)?)
                        } else {
                            (db.get_value_from_loaded(child.tier, child.position)?, db.get_remoteness_from_loaded(child.tier, child.position)?)
                        };
                        child_records.push((v, r));
                    }
                    match resolve_from_children(&child_records) {
                        Some((value, remoteness)) => {
                            let current = (db.get_value(Position(i))?, db.get_remoteness(Position(i))?);
                            if (value, remoteness) != current {
                                Ok(Some((i, value, remoteness)))
                            } else {
                                Ok(None)
                            }
                        }
                        None => Ok(None),
                    }
                })
            };

            let mut changed = false;
            for update in recomputed {
                if let Some((i, value, remoteness)) = update? {
                    db.set_value_remoteness(Position(i), value, remoteness)?;
                    changed = true;
                }
            }
            pass += 1;
            if !changed {
                break;
            }
        }
        log::debug!("tier {tier} value iteration converged after {pass} passes");

        for ct in &child_tiers {
            if *ct != tier {
                db.unload_tier(*ct);
            }
        }
        db.flush_solving_tier()?;
        db.free_solving_tier();
        Ok(())
    }
}

/// Invariants checked by a random walk over `tier`'s legal positions
/// against its flushed records, probabilistically.
#[derive(Debug, Clone, Default)]
pub struct TestReport {
    pub positions_checked: u64,
    pub failures: Vec<String>,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// `worker_test(tier, parent_tiers, seed)`. `parent_tiers` is implicit here
/// (consistency checks only look at `tier`'s own children, already
/// reachable through the game API); `seed` drives the sampled walk.
pub fn worker_test(engine: &Engine, db: &Database, tier: Tier, sample_size: u64, seed: u64) -> TestReport {
    let game = &engine.game;
    let size = game.tier_size(tier);
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut probe = db.probe();
    let mut report = TestReport::default();

    if size == 0 {
        return report;
    }
    for _ in 0..sample_size {
        let i = rng.random_range(0..size);
        let tp = TierPosition::new(tier, Position(i));
        if !game.is_legal_position(tp) {
            continue;
        }
        report.positions_checked += 1;
        let value = probe.probe_value(tp);
        let remoteness = probe.probe_remoteness(tp);
        if value == Value::Error {
            report.failures.push(format!("probe returned Error at {tp}"));
            continue;
        }
        let prim = game.primitive(tp);
        if prim != Value::Undecided {
            if value != prim || remoteness != 0 {
                report.failures.push(format!("primitive mismatch at {tp}: expected {prim}/0, got {value}/{remoteness}"));
            }
            continue;
        }
        match value {
            Value::Win => {
                let children = game.canonical_child_positions(tp);
                let found = children.iter().any(|c| {
                    probe.probe_value(*c) == Value::Lose && probe.probe_remoteness(*c) + 1 == remoteness
                });
                if !found {
                    report.failures.push(format!("win consistency failed at {tp}: no Lose child at remoteness {}", remoteness.saturating_sub(1)));
                }
            }
            Value::Lose => {
                let children = game.canonical_child_positions(tp);
                if !children.iter().all(|c| probe.probe_value(*c) == Value::Win) {
                    report.failures.push(format!("lose consistency failed at {tp}: not every child is Win"));
                }
            }
            Value::Undecided | Value::Error => {
                report.failures.push(format!("position {tp} left undecided after solving"));
            }
            Value::Tie | Value::Draw => {}
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_comparator_ranks_lose_over_tie_over_draw_over_win() {
        assert_eq!(primitive_comparator((Value::Lose, 0), (Value::Tie, 0)), Ordering::Greater);
        assert_eq!(primitive_comparator((Value::Tie, 0), (Value::Draw, 0)), Ordering::Greater);
        assert_eq!(primitive_comparator((Value::Draw, 0), (Value::Win, 0)), Ordering::Greater);
    }

    #[test]
    fn primitive_comparator_tie_breaks_by_remoteness() {
        assert_eq!(primitive_comparator((Value::Lose, 1), (Value::Lose, 3)), Ordering::Greater);
        assert_eq!(primitive_comparator((Value::Win, 5), (Value::Win, 2)), Ordering::Greater);
        assert_eq!(primitive_comparator((Value::Tie, 5), (Value::Tie, 2)), Ordering::Greater);
    }

    #[test]
    fn resolve_from_children_swaps_lose_child_into_win_parent() {
        let children = [(Value::Lose, 2), (Value::Win, 9)];
        assert_eq!(resolve_from_children(&children), Some((Value::Win, 3)));
    }

    #[test]
    fn resolve_from_children_all_win_becomes_lose() {
        let children = [(Value::Win, 2), (Value::Win, 6)];
        assert_eq!(resolve_from_children(&children), Some((Value::Lose, 7)));
    }

    #[test]
    fn resolve_from_children_none_when_any_child_undecided() {
        let children = [(Value::Win, 1), (Value::Undecided, 0)];
        assert_eq!(resolve_from_children(&children), None);
    }

    #[test]
    fn resolve_from_children_prefers_tie_over_draw() {
        let children = [(Value::Draw, 0), (Value::Tie, 4)];
        assert_eq!(resolve_from_children(&children), Some((Value::Tie, 5)));
    }

    /// A single Loopy tier built so that position 0's first child (1) is a
    /// primitive Tie and its second child (2) heads a four-deep chain that
    /// resolves to Lose. Backward induction must not let the Tie child
    /// settle position 0 before the Lose child is reached: the correct
    /// value is Win, since 0 can always move to the Lose child regardless
    /// of what its Tie child offers.
    struct TieThenLoseChain;
    impl crate::game::Game for TieThenLoseChain {
        fn initial_tier(&self) -> Tier {
            Tier(0)
        }
        fn initial_position(&self) -> Position {
            Position(0)
        }
        fn tier_size(&self, _tier: Tier) -> u64 {
            7
        }
        fn generate_moves(&self, tp: TierPosition) -> Vec<u64> {
            match tp.position.0 {
                0 => vec![1, 2],
                1 | 6 => vec![],
                n => vec![n + 1],
            }
        }
        fn primitive(&self, tp: TierPosition) -> Value {
            match tp.position.0 {
                1 => Value::Tie,
                6 => Value::Lose,
                _ => Value::Undecided,
            }
        }
        fn do_move(&self, tp: TierPosition, mv: u64) -> TierPosition {
            TierPosition::new(tp.tier, Position(mv))
        }
        fn is_legal_position(&self, tp: TierPosition) -> bool {
            tp.position.0 <= 6
        }
        fn canonical_position(&self, tp: TierPosition) -> Position {
            tp.position
        }
        fn canonical_child_positions(&self, tp: TierPosition) -> Vec<TierPosition> {
            self.generate_moves(tp).into_iter().map(|m| self.do_move(tp, m)).collect()
        }
        fn child_tiers(&self, _tier: Tier) -> Vec<Tier> {
            vec![]
        }
        fn tier_type(&self, _tier: Tier) -> TierType {
            TierType::Loopy
        }
        fn canonical_tier(&self, tier: Tier) -> Tier {
            tier
        }
    }

    #[test]
    fn backward_induction_defers_tie_so_a_later_lose_child_still_wins() {
        use crate::engine::Engine;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(dir.path(), u64::MAX, 1, Arc::new(TieThenLoseChain));
        let mut db = Database::new(&engine).unwrap();
        let worker = Worker::new(engine);

        worker.solve(&mut db, Tier(0), None, false, None).unwrap();
        db.load_tier(Tier(0), 7).unwrap();
        assert_eq!(db.get_value_from_loaded(Tier(0), Position(0)).unwrap(), Value::Win);
        assert_eq!(db.get_remoteness_from_loaded(Tier(0), Position(0)).unwrap(), 5);
    }
}

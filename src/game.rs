//! The Game API surface: everything the engine needs from a game-specific
//! rule engine. Required methods supply move generation, primitive
//! detection, and the tier graph; the three optional methods default to
//! `None`, signaling that the engine must fall back to a reverse-graph
//! build, skip symmetric-tier canonicalization, or use a decimal tier name.

use crate::record::Value;
use crate::tier::{Position, Tier, TierPosition, TierType};

/// A move is an opaque token the game assigns meaning to; the engine only
/// ever round-trips it through `do_move`.
pub type Move = u64;

/// Polymorphic hook into a specific game's rules and tier-graph topology.
/// Implementations must be safe to share across solver threads: the
/// within-tier sweep calls these methods concurrently from a thread pool.
pub trait Game: Send + Sync {
    fn initial_tier(&self) -> Tier;
    fn initial_position(&self) -> Position;

    /// Number of legal position hashes in `tier`.
    fn tier_size(&self, tier: Tier) -> u64;

    /// Every legal move available from `tp`.
    fn generate_moves(&self, tp: TierPosition) -> Vec<Move>;

    /// `Undecided` unless `tp` is a terminal position, in which case the
    /// outcome from the perspective of the player to move at `tp`.
    fn primitive(&self, tp: TierPosition) -> Value;

    fn do_move(&self, tp: TierPosition, mv: Move) -> TierPosition;

    fn is_legal_position(&self, tp: TierPosition) -> bool;

    /// Maps any position to the canonical representative of its symmetry
    /// class within its own tier.
    fn canonical_position(&self, tp: TierPosition) -> Position;

    /// Canonical positions reachable from `tp` in one move, deduplicated.
    fn canonical_child_positions(&self, tp: TierPosition) -> Vec<TierPosition>;

    fn child_tiers(&self, tier: Tier) -> Vec<Tier>;

    fn tier_type(&self, tier: Tier) -> TierType;

    /// The canonical tier `tier` belongs to (itself, if `tier` is already
    /// canonical).
    fn canonical_tier(&self, tier: Tier) -> Tier;

    /// Canonical parent positions of `tp` that live in `parent_tier`.
    /// Returning `None` (the default) tells the worker no parent function
    /// is available and it must build a reverse graph instead.
    fn canonical_parent_positions(&self, _tp: TierPosition, _parent_tier: Tier) -> Option<Vec<TierPosition>> {
        None
    }

    /// Remaps `tp` into the symmetric tier `symmetric`, for reading a
    /// non-canonical child tier's records from its canonical sibling.
    /// `None` means the game has no symmetry to exploit for this tier pair.
    fn position_in_symmetric_tier(&self, _tp: TierPosition, _symmetric: Tier) -> Option<Position> {
        None
    }

    /// Human-readable name for `tier`, used as the on-disk file stem.
    /// `None` falls back to the tier's decimal value.
    fn tier_name(&self, _tier: Tier) -> Option<String> {
        None
    }
}

/// Resolves the file stem for `tier`, falling back to its decimal label
/// when the game doesn't supply a name.
pub fn tier_file_stem(game: &dyn Game, tier: Tier) -> String {
    game.tier_name(tier).unwrap_or_else(|| tier.0.to_string())
}

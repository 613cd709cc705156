use std::fmt::{self, Display, Formatter};

/// Opaque 64-bit label for a class of positions. The engine never inspects
/// the bits of a `Tier`; it is handed back verbatim to the `Game` API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tier(pub u64);

impl From<u64> for Tier {
    fn from(raw: u64) -> Self {
        Tier(raw)
    }
}
impl From<Tier> for u64 {
    fn from(tier: Tier) -> Self {
        tier.0
    }
}
impl Display for Tier {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 64-bit index of a position within a tier. Values outside `[0, size)` of
/// the owning tier are illegal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(pub u64);

impl From<u64> for Position {
    fn from(raw: u64) -> Self {
        Position(raw)
    }
}
impl From<Position> for u64 {
    fn from(pos: Position) -> Self {
        pos.0
    }
}
impl Display for Position {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `Position` paired with the `Tier` it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TierPosition {
    pub tier: Tier,
    pub position: Position,
}

impl TierPosition {
    pub fn new(tier: Tier, position: Position) -> Self {
        Self { tier, position }
    }
}

impl Display for TierPosition {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.position, self.tier)
    }
}

/// The solving method a tier requires, supplied by the game's tier graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierType {
    /// Every legal position's every move exits the tier: solvable in one
    /// forward-then-backward scan once child tiers are loaded.
    ImmediateTransition,
    /// Contains cycles; requires retrograde analysis. A parent function may
    /// or may not be supplied.
    Loopy,
    /// Contains no cycles but children live in the same tier (not handled by
    /// the immediate-transition fast path because intra-tier edges exist).
    LoopFree,
}

/// Topological status of a tier during the driver's DFS (three-color
/// cycle detection: unvisited, on the current DFS stack, or closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyStatus {
    NotVisited,
    InProgress,
    Closed,
}

/// On-disk presence/integrity status of a tier's record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbStatus {
    Missing,
    Solved,
    Corrupted,
}

/// Aggregate status of the whole game's solve, derived from every tier's
/// `DbStatus` plus the top-level `.finish` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    Solved,
    Incomplete,
    Error,
}

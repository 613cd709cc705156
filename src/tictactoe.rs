//! Reference `Game` implementation used by the integration test suite and
//! the `solve`/`probe` example binaries. Not part of the core engine: a toy
//! rule engine of the kind spec.md treats as an external collaborator, kept
//! here only so the engine has something concrete to drive end-to-end.
//!
//! Tiers are ply count (0..=9): every move places one mark and advances to
//! the next tier, so the whole game is `TierType::ImmediateTransition`.
//! Positions are ungrouped by symmetry (`canonical_position` is the
//! identity) — correctness of value/remoteness doesn't depend on it.

use crate::game::Game;
use crate::record::Value;
use crate::tier::{Position, Tier, TierPosition, TierType};

const CELLS: u32 = 9;
const EMPTY: u64 = 0;
const X: u64 = 1;
const O: u64 = 2;

const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

pub struct TicTacToe;

fn cell(board: u64, i: usize) -> u64 {
    (board / 3u64.pow(i as u32)) % 3
}

fn set_cell(board: u64, i: usize, mark: u64) -> u64 {
    board + mark * 3u64.pow(i as u32)
}

fn has_triple(board: u64, mark: u64) -> bool {
    WIN_LINES.iter().any(|line| line.iter().all(|&i| cell(board, i) == mark))
}

fn counts(board: u64) -> (u32, u32) {
    let mut x = 0;
    let mut o = 0;
    for i in 0..CELLS as usize {
        match cell(board, i) {
            v if v == X => x += 1,
            v if v == O => o += 1,
            _ => {}
        }
    }
    (x, o)
}

impl Game for TicTacToe {
    fn initial_tier(&self) -> Tier {
        Tier(0)
    }

    fn initial_position(&self) -> Position {
        Position(0)
    }

    fn tier_size(&self, tier: Tier) -> u64 {
        if tier.0 <= 9 {
            3u64.pow(CELLS)
        } else {
            0
        }
    }

    fn generate_moves(&self, tp: TierPosition) -> Vec<u64> {
        if self.primitive(tp) != Value::Undecided {
            return Vec::new();
        }
        (0..CELLS as usize)
            .filter(|&i| cell(tp.position.0, i) == EMPTY)
            .map(|i| i as u64)
            .collect()
    }

    fn primitive(&self, tp: TierPosition) -> Value {
        let board = tp.position.0;
        let (x, o) = counts(board);
        if x != o && x != o + 1 {
            return Value::Undecided;
        }
        let x_wins = has_triple(board, X);
        let o_wins = has_triple(board, O);
        if x_wins && o_wins {
            return Value::Undecided;
        }
        if x_wins {
            return Value::Lose;
        }
        if o_wins {
            return Value::Lose;
        }
        if tp.tier.0 == 9 {
            return Value::Tie;
        }
        Value::Undecided
    }

    fn do_move(&self, tp: TierPosition, mv: u64) -> TierPosition {
        let (x, o) = counts(tp.position.0);
        let mark = if x == o { X } else { O };
        let board = set_cell(tp.position.0, mv as usize, mark);
        TierPosition::new(Tier(tp.tier.0 + 1), Position(board))
    }

    fn is_legal_position(&self, tp: TierPosition) -> bool {
        let board = tp.position.0;
        if board >= 3u64.pow(CELLS) {
            return false;
        }
        let (x, o) = counts(board);
        if x + o != tp.tier.0 as u32 {
            return false;
        }
        if x != o && x != o + 1 {
            return false;
        }
        let x_wins = has_triple(board, X);
        let o_wins = has_triple(board, O);
        if x_wins && o_wins {
            return false;
        }
        if x_wins && x != o + 1 {
            return false;
        }
        if o_wins && x != o {
            return false;
        }
        true
    }

    fn canonical_position(&self, tp: TierPosition) -> Position {
        tp.position
    }

    fn canonical_child_positions(&self, tp: TierPosition) -> Vec<TierPosition> {
        self.generate_moves(tp).into_iter().map(|mv| self.do_move(tp, mv)).collect()
    }

    fn child_tiers(&self, tier: Tier) -> Vec<Tier> {
        if tier.0 < 9 {
            vec![Tier(tier.0 + 1)]
        } else {
            Vec::new()
        }
    }

    fn tier_type(&self, _tier: Tier) -> TierType {
        TierType::ImmediateTransition
    }

    fn canonical_tier(&self, tier: Tier) -> Tier {
        tier
    }

    fn tier_name(&self, tier: Tier) -> Option<String> {
        Some(format!("ply{}", tier.0))
    }
}

/// Empty board, marks placed left-to-right starting at cell 0, X first.
pub fn board_from_moves(moves: &[usize]) -> Position {
    let mut board = 0u64;
    for (i, &cell_idx) in moves.iter().enumerate() {
        let mark = if i % 2 == 0 { X } else { O };
        board = set_cell(board, cell_idx, mark);
    }
    Position(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_is_legal_at_tier_zero() {
        let game = TicTacToe;
        let tp = TierPosition::new(Tier(0), game.initial_position());
        assert!(game.is_legal_position(tp));
        assert_eq!(game.primitive(tp), Value::Undecided);
    }

    #[test]
    fn three_in_a_row_is_primitive_lose_for_mover() {
        let game = TicTacToe;
        // X: 0, O: 3, X: 1, O: 4, X: 2  -> X completes top row on move 5.
        let board = board_from_moves(&[0, 3, 1, 4, 2]);
        let tp = TierPosition::new(Tier(5), board);
        assert!(game.is_legal_position(tp));
        assert_eq!(game.primitive(tp), Value::Lose);
        assert!(game.generate_moves(tp).is_empty());
    }

    #[test]
    fn full_board_no_winner_is_tie() {
        // X O X / X O O / O X X — full, no three in a row.
        let board = board_from_moves(&[0, 1, 2, 4, 3, 5, 7, 6, 8]);
        let game = TicTacToe;
        let tp = TierPosition::new(Tier(9), board);
        assert!(game.is_legal_position(tp));
        assert_eq!(game.primitive(tp), Value::Tie);
    }

    #[test]
    fn double_triple_is_illegal() {
        // Fabricate a board with both X and O having a winning line —
        // unreachable by legal play, so is_legal_position must reject it.
        let mut board = 0u64;
        for &i in &[0, 1, 2] {
            board = set_cell(board, i, X);
        }
        for &i in &[3, 4, 5] {
            board = set_cell(board, i, O);
        }
        let game = TicTacToe;
        let tp = TierPosition::new(Tier(6), Position(board));
        assert!(!game.is_legal_position(tp));
    }
}

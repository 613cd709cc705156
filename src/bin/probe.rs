//! Looks up a single Tic-Tac-Toe position's value and remoteness from a
//! sandbox directory already produced by the `solve` binary.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tiersolve::database::Database;
use tiersolve::engine::Engine;
use tiersolve::tictactoe::TicTacToe;
use tiersolve::{Position, Tier, TierPosition};

/// Probe a solved sandbox for one tier/position's record.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory containing the solved `.adb.xz` tier files.
    #[arg(short, long, default_value = "sandbox")]
    sandbox: PathBuf,

    /// Ply count (0..=9).
    tier: u64,

    /// Base-3-packed board position index.
    position: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let engine = Engine::new(args.sandbox, u64::MAX, 1, Arc::new(TicTacToe));
    let db = Database::new(&engine).expect("open sandbox directory");
    let mut probe = db.probe();

    let tp = TierPosition::new(Tier(args.tier), Position(args.position));
    let value = probe.probe_value(tp);
    let remoteness = probe.probe_remoteness(tp);
    println!("{tp} -> {value} in {remoteness}");
}

//! Drives the engine end-to-end against the bundled Tic-Tac-Toe reference
//! game, the only `Game` implementation shipped in this crate (game-specific
//! rule engines are otherwise an external collaborator — see spec.md §1).

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tiersolve::database::Database;
use tiersolve::driver::Driver;
use tiersolve::engine::Engine;
use tiersolve::tictactoe::TicTacToe;

/// Solve the bundled Tic-Tac-Toe reference game into a tier database.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory the per-tier `.adb.xz` files and checkpoints live under.
    #[arg(short, long, default_value = "sandbox")]
    sandbox: PathBuf,

    /// Resident-record memory budget in bytes for immediate-transition
    /// child-tier batching.
    #[arg(short, long, default_value_t = 64 * 1024 * 1024)]
    memlimit: u64,

    /// Re-solve tiers even if a flushed file already exists.
    #[arg(short, long)]
    force: bool,

    /// Thread count for within-tier data parallelism.
    #[arg(short, long)]
    threads: Option<usize>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let threads = args.threads.unwrap_or_else(num_cpus::get);
    let engine = Engine::new(args.sandbox, args.memlimit, threads, Arc::new(TicTacToe));
    let mut db = Database::new(&engine).expect("create sandbox directory");

    let summary = Driver::new(engine).solve(&mut db, args.force).expect("fatal tier-graph error");

    for report in &summary.reports {
        println!(
            "tier {:>3}  win={:<6} lose={:<6} tie={:<6} draw={:<6} longest={}",
            report.tier, report.win, report.lose, report.tie, report.draw, report.longest_remoteness
        );
    }
    if summary.fully_solved() {
        println!("{}", format!("solved {} tiers ({} skipped)", summary.solved, summary.skipped).green());
    } else {
        println!("{}", format!("{} tiers failed to solve", summary.failed).red());
        std::process::exit(1);
    }
}

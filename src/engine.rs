//! Explicit engine configuration. The source this design is drawn from
//! keeps the sandbox path, memory budget, thread count, and current game
//! behind process-wide singletons; here they are fields of one value built
//! once by the caller and passed by reference everywhere else.

use crate::game::Game;
use std::path::PathBuf;
use std::sync::Arc;

/// Bundles everything the driver, worker, and database need to know about
/// the run: where tier files live, how much memory a tier solve may use,
/// how many threads to spread work over, and which game is being solved.
#[derive(Clone)]
pub struct Engine {
    pub sandbox_path: PathBuf,
    pub memlimit_bytes: u64,
    pub threads: usize,
    pub game: Arc<dyn Game>,
}

impl Engine {
    pub fn new(sandbox_path: impl Into<PathBuf>, memlimit_bytes: u64, threads: usize, game: Arc<dyn Game>) -> Self {
        Self {
            sandbox_path: sandbox_path.into(),
            memlimit_bytes,
            threads: threads.max(1),
            game,
        }
    }

    /// Defaults `threads` to the number of logical CPUs available.
    #[cfg(feature = "cli")]
    pub fn with_detected_threads(sandbox_path: impl Into<PathBuf>, memlimit_bytes: u64, game: Arc<dyn Game>) -> Self {
        Self::new(sandbox_path, memlimit_bytes, num_cpus::get(), game)
    }
}

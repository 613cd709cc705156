//! Tier-DAG retrograde solver and bit-perfect record database core.
//!
//! Given a game expressed as a decomposition of its position space into
//! tiers (a DAG of position classes, supplied through the [`game::Game`]
//! trait), this crate computes the game-theoretic value and remoteness of
//! every legal position and persists the result as a random-access,
//! block-compressed database (see [`database::Database`]).
//!
//! Control flow: [`driver::Driver`] topologically drives tiers and hands
//! each canonical one to [`worker::Worker`], which pulls solved child-tier
//! records through the [`database::Database`] and writes results into a
//! [`record::RecordArray`] (or [`record::AtomicRecordArray`] under
//! `parallel`), repacked on flush through a [`bparray::BpArray`] and
//! block-compressed by [`block`].

pub mod block;
pub mod bparray;
pub mod bpdict;
pub mod database;
pub mod driver;
pub mod engine;
pub mod error;
pub mod frontier;
pub mod game;
pub mod record;
pub mod reverse_graph;
pub mod tier;
pub mod worker;

#[cfg(any(test, feature = "cli"))]
pub mod tictactoe;

pub use engine::Engine;
pub use error::{EngineError, Result};
pub use game::Game;
pub use tier::{Position, Tier, TierPosition};

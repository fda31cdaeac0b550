//! A minesweeper-playing agent that reasons about hidden mines with
//! constraints of the form "exactly `count` of these cells are mines".
//!
//! Every revealed cell becomes a [`Constraint`] over its unresolved
//! neighbors. The [`KnowledgeEngine`] resolves known cells out of its
//! constraints, harvests the ones that became certain, and combines pairs
//! where one cell set contains the other, repeating until nothing new
//! follows. The [`Game`] session wires an agent to a ground-truth
//! [`Minefield`] so it can play whole games.

mod board;
mod cell;
mod constraint;
mod engine;
mod error;
mod game;
mod sat;

pub use board::Minefield;
pub use cell::Cell;
pub use constraint::{Constraint, Contradiction};
pub use engine::{InferenceReport, KnowledgeEngine, Strategy};
pub use error::{Error, Result};
pub use game::{Game, GameState, Move, MoveKind, Tile};
pub use sat::{DeducedState, SatOracle, analyze_observations};

//! Error types for the minesweeper agent.

use thiserror::Error;

use crate::Cell;

/// Errors surfaced to callers of the engine, board and game session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("cell {cell} is outside the {height}x{width} board")]
    OutOfBounds {
        cell: Cell,
        height: usize,
        width: usize,
    },

    #[error("count {count} at {cell} exceeds its {neighbors} neighbors")]
    CountTooLarge {
        cell: Cell,
        count: usize,
        neighbors: usize,
    },

    #[error("count {count} at {cell} contradicts known state: {reason}")]
    Inconsistent {
        cell: Cell,
        count: usize,
        reason: String,
    },

    #[error("total mines ({mines}) must be less than the number of cells ({cells})")]
    TooManyMines { mines: usize, cells: usize },

    #[error("agent plays a {agent_height}x{agent_width} board but the field is {height}x{width}")]
    DimensionMismatch {
        height: usize,
        width: usize,
        agent_height: usize,
        agent_width: usize,
    },

    #[error("game already over")]
    GameEnded,

    #[error("failed to {operation} game state: {message}")]
    Codec {
        operation: &'static str,
        message: String,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::fmt;

use rand::{Rng, RngCore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::{Cell, Error, KnowledgeEngine, Minefield, Result, Strategy};

/// The visible state of a single cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Tile {
    Hidden,
    Revealed(u8), // The u8 is the number of adjacent mines.
    Flagged,      // The agent has proven this cell is a mine.
}

/// Represents the current state of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GameState {
    Playing,
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// The cell was proven safe.
    Safe,
    /// No cell was proven safe, so the agent guessed.
    Guess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub cell: Cell,
    pub kind: MoveKind,
}

/// One game session: the hidden minefield, what the player sees, and the
/// agent reasoning about it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Game<S = KnowledgeEngine> {
    field: Minefield,
    /// The visible state of the board.
    pub board: Vec<Vec<Tile>>,
    /// Tracks the current status of the game (playing, won, lost).
    pub game_state: GameState,
    agent: S,
}

impl Game<KnowledgeEngine> {
    /// A random board with a fresh [`KnowledgeEngine`] playing it.
    pub fn new<R: Rng + ?Sized>(
        height: usize,
        width: usize,
        mines: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let field = Minefield::random(height, width, mines, rng)?;
        let agent = KnowledgeEngine::new(height, width);
        Game::with_agent(field, agent)
    }
}

impl<S: Strategy> Game<S> {
    /// Fails if the agent reasons about a board of a different size.
    pub fn with_agent(field: Minefield, agent: S) -> Result<Self> {
        if (agent.height(), agent.width()) != (field.height, field.width) {
            return Err(Error::DimensionMismatch {
                height: field.height,
                width: field.width,
                agent_height: agent.height(),
                agent_width: agent.width(),
            });
        }

        Ok(Game {
            board: vec![vec![Tile::Hidden; field.width]; field.height],
            field,
            game_state: GameState::Playing,
            agent,
        })
    }

    pub fn field(&self) -> &Minefield {
        &self.field
    }

    pub fn agent(&self) -> &S {
        &self.agent
    }

    pub fn height(&self) -> usize {
        self.field.height
    }

    pub fn width(&self) -> usize {
        self.field.width
    }

    /// Reveals `at`, feeds its count to the agent and flags whatever mines
    /// the agent can now prove.
    ///
    /// Returns `Ok(false)` if `at` was a mine, which loses the game. If the
    /// agent rejects the count, the tile stays hidden.
    pub fn reveal(&mut self, at: Cell) -> Result<bool> {
        if !self.field.contains(at) {
            return Err(Error::OutOfBounds {
                cell: at,
                height: self.field.height,
                width: self.field.width,
            });
        }
        if matches!(self.board[at.row][at.col], Tile::Revealed(_)) {
            return Ok(true);
        }
        if self.game_state != GameState::Playing {
            return Err(Error::GameEnded);
        }

        if self.field.is_mine(at) {
            info!(cell = %at, "hit a mine");
            self.game_state = GameState::Lost;
            return Ok(false);
        }

        let count = self.field.nearby_mines(at);
        let report = self.agent.observe(at, count as usize).inspect_err(|e| {
            warn!(cell = %at, count, error = %e, "agent rejected observation");
        })?;
        self.board[at.row][at.col] = Tile::Revealed(count);
        info!(
            cell = %at,
            count,
            safes_found = report.safes_found,
            mines_found = report.mines_found,
            passes = report.passes,
            "revealed"
        );

        for &mine in self.agent.mines() {
            let tile = &mut self.board[mine.row][mine.col];
            if *tile == Tile::Hidden {
                *tile = Tile::Flagged;
            }
        }

        if self.check_win_condition() {
            info!("all safe cells revealed");
            self.game_state = GameState::Won;
        }

        Ok(true)
    }

    /// The game is won once every cell that is not a mine has been revealed.
    pub fn check_win_condition(&self) -> bool {
        let revealed = self
            .board
            .iter()
            .flatten()
            .filter(|tile| matches!(tile, Tile::Revealed(_)))
            .count();
        revealed == self.field.height * self.field.width - self.field.mine_count()
    }

    /// Lets the agent make one move: a proven-safe cell if it knows one,
    /// otherwise a random guess among cells not known to be mines.
    ///
    /// Returns `None` when the agent has nothing left to play.
    pub fn step(&mut self, rng: &mut dyn RngCore) -> Result<Option<Move>> {
        if self.game_state != GameState::Playing {
            return Err(Error::GameEnded);
        }

        let mv = if let Some(cell) = self.agent.safe_move() {
            Move {
                cell,
                kind: MoveKind::Safe,
            }
        } else if let Some(cell) = self.agent.random_move(rng) {
            Move {
                cell,
                kind: MoveKind::Guess,
            }
        } else {
            return Ok(None);
        };

        self.reveal(mv.cell)?;
        Ok(Some(mv))
    }

    /// Steps until the game is over or the agent runs out of moves.
    pub fn play(&mut self, rng: &mut dyn RngCore) -> Result<GameState> {
        while self.game_state == GameState::Playing {
            if self.step(rng)?.is_none() {
                break;
            }
        }
        Ok(self.game_state)
    }
}

/// Draws the visible board: `#` hidden, `F` flagged, `.` an empty revealed
/// cell, otherwise the count.
impl<S> fmt::Display for Game<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.field.width;
        write!(f, "    ")?;
        for col in 0..width {
            write!(f, "{:>2}", col % 10)?;
        }
        writeln!(f)?;
        writeln!(f, "    {}", "--".repeat(width))?;

        for (row, tiles) in self.board.iter().enumerate() {
            write!(f, "{row:>3}|")?;
            for tile in tiles {
                let glyph = match tile {
                    Tile::Hidden => '#',
                    Tile::Flagged => 'F',
                    Tile::Revealed(0) => '.',
                    Tile::Revealed(n) => char::from(b'0' + n),
                };
                write!(f, " {glyph}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<S: Serialize> Game<S> {
    /// Serializes the game state to bytes.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bcs::to_bytes(self).map_err(|e| Error::Codec {
            operation: "encode",
            message: e.to_string(),
        })
    }
}

impl<S: DeserializeOwned> Game<S> {
    /// Deserializes a game state from bytes.
    pub fn deserialize(bts: &[u8]) -> Result<Self> {
        bcs::from_bytes(bts).map_err(|e| Error::Codec {
            operation: "decode",
            message: e.to_string(),
        })
    }
}

use std::collections::{BTreeSet, HashSet};

use rand::prelude::IndexedRandom;
use rand::{Rng, RngCore};
use tracing::{debug, trace, warn};

use crate::{Cell, Constraint, Contradiction, Error, Result};

/// A minesweeper-playing agent: consumes revealed counts, proposes moves.
///
/// Implemented by the constraint-resolution [`KnowledgeEngine`] and by the
/// exhaustive [`SatOracle`](crate::SatOracle).
pub trait Strategy {
    /// Records that `cell` was revealed safe with `count` adjacent mines and
    /// updates the agent's beliefs. A rejected observation changes nothing.
    fn observe(&mut self, cell: Cell, count: usize) -> Result<InferenceReport>;

    /// A cell proven safe that has not been played yet.
    fn safe_move(&self) -> Option<Cell>;

    /// A uniformly random unplayed cell not proven to be a mine.
    fn random_move(&self, rng: &mut dyn RngCore) -> Option<Cell>;

    fn height(&self) -> usize;

    fn width(&self) -> usize;

    /// Cells proven to be mines.
    fn mines(&self) -> &BTreeSet<Cell>;

    /// Cells proven to be safe, played or not.
    fn safes(&self) -> &BTreeSet<Cell>;

    fn moves_made(&self) -> &BTreeSet<Cell>;
}

/// What a single observation taught the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceReport {
    /// Fixpoint passes run, including the final pass that changed nothing.
    pub passes: usize,
    pub safes_found: usize,
    pub mines_found: usize,
    pub constraints_derived: usize,
}

/// The agent's belief state about one board, built from constraints.
///
/// Invariants:
/// - `safes` and `mines` are disjoint, and all three cell sets only grow.
/// - no constraint in `knowledge` mentions a cell in `safes` or `mines`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KnowledgeEngine {
    height: usize,
    width: usize,
    moves_made: BTreeSet<Cell>,
    safes: BTreeSet<Cell>,
    mines: BTreeSet<Cell>,
    knowledge: Vec<Constraint>,
}

impl KnowledgeEngine {
    pub fn new(height: usize, width: usize) -> Self {
        KnowledgeEngine {
            height,
            width,
            moves_made: BTreeSet::new(),
            safes: BTreeSet::new(),
            mines: BTreeSet::new(),
            knowledge: Vec::new(),
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn moves_made(&self) -> &BTreeSet<Cell> {
        &self.moves_made
    }

    pub fn safes(&self) -> &BTreeSet<Cell> {
        &self.safes
    }

    pub fn mines(&self) -> &BTreeSet<Cell> {
        &self.mines
    }

    pub fn knowledge(&self) -> &[Constraint] {
        &self.knowledge
    }

    /// Marks `cell` as a mine and resolves it out of every constraint.
    ///
    /// On failure some constraints may already have been resolved, so callers
    /// that need to back out work on a copy.
    pub fn mark_mine(&mut self, cell: Cell) -> Result<(), Contradiction> {
        if self.safes.contains(&cell) {
            return Err(Contradiction(format!("{cell} is already known to be safe")));
        }
        self.mines.insert(cell);
        for constraint in &mut self.knowledge {
            constraint.resolve_as_mine(cell)?;
        }
        Ok(())
    }

    /// Marks `cell` as safe and resolves it out of every constraint.
    pub fn mark_safe(&mut self, cell: Cell) -> Result<(), Contradiction> {
        if self.mines.contains(&cell) {
            return Err(Contradiction(format!("{cell} is already known to be a mine")));
        }
        self.safes.insert(cell);
        for constraint in &mut self.knowledge {
            constraint.resolve_as_safe(cell)?;
        }
        Ok(())
    }

    /// Called when the board reveals that the safe `cell` has `count` mines
    /// among its neighbors.
    ///
    /// The observation is first checked against the board and the beliefs
    /// about its neighbors. Inference then runs on a copy of the beliefs that
    /// only replaces them once it finishes, so a rejected call, including one
    /// whose contradiction only shows up during inference, leaves the engine
    /// untouched.
    pub fn observe(&mut self, cell: Cell, count: usize) -> Result<InferenceReport> {
        let unknown = self.validate(cell, count)?;
        debug!(%cell, count, "observe");

        let mut next = self.clone();
        let report = next.absorb(cell, count, unknown).map_err(|contradiction| {
            warn!(%cell, count, %contradiction, "observation contradicts knowledge");
            Error::Inconsistent {
                cell,
                count,
                reason: contradiction.to_string(),
            }
        })?;

        *self = next;
        Ok(report)
    }

    fn absorb(
        &mut self,
        cell: Cell,
        count: usize,
        unknown: Vec<Cell>,
    ) -> Result<InferenceReport, Contradiction> {
        self.moves_made.insert(cell);
        self.mark_safe(cell)?;

        // Known mines are already accounted for; known safes contribute nothing.
        let known_adjacent = cell
            .neighbors(self.height, self.width)
            .filter(|n| self.mines.contains(n))
            .count();
        if !unknown.is_empty() {
            let constraint = Constraint::new(unknown, count - known_adjacent);
            if !self.knowledge.contains(&constraint) {
                trace!(%constraint, "new constraint");
                self.knowledge.push(constraint);
            }
        }

        self.infer()
    }

    /// Returns the unresolved neighbors of `cell` if `count` is consistent
    /// with the board and with what is already known.
    fn validate(&self, cell: Cell, count: usize) -> Result<Vec<Cell>> {
        if !cell.in_bounds(self.height, self.width) {
            return Err(Error::OutOfBounds {
                cell,
                height: self.height,
                width: self.width,
            });
        }

        let neighbors: Vec<Cell> = cell.neighbors(self.height, self.width).collect();
        if count > neighbors.len() {
            return Err(Error::CountTooLarge {
                cell,
                count,
                neighbors: neighbors.len(),
            });
        }

        if self.mines.contains(&cell) {
            return Err(Error::Inconsistent {
                cell,
                count,
                reason: "the cell is a known mine".to_string(),
            });
        }

        let known_adjacent = neighbors.iter().filter(|n| self.mines.contains(n)).count();
        let unknown: Vec<Cell> = neighbors
            .into_iter()
            .filter(|n| !self.mines.contains(n) && !self.safes.contains(n))
            .collect();

        if count < known_adjacent {
            return Err(Error::Inconsistent {
                cell,
                count,
                reason: format!("{known_adjacent} adjacent mines are already known"),
            });
        }
        if count - known_adjacent > unknown.len() {
            return Err(Error::Inconsistent {
                cell,
                count,
                reason: format!(
                    "only {} unresolved neighbors remain beside {known_adjacent} known mines",
                    unknown.len()
                ),
            });
        }

        Ok(unknown)
    }

    /// Runs inference until a full pass adds no certainty and no constraint.
    fn infer(&mut self) -> Result<InferenceReport, Contradiction> {
        let mut report = InferenceReport::default();

        loop {
            report.passes += 1;
            let mut changed = false;

            self.discard_resolved();

            let mut safes = BTreeSet::new();
            let mut mines = BTreeSet::new();
            for constraint in &self.knowledge {
                safes.extend(constraint.derive_known_safes());
                mines.extend(constraint.derive_known_mines());
            }

            for cell in safes {
                if !self.safes.contains(&cell) {
                    self.mark_safe(cell)?;
                    report.safes_found += 1;
                    changed = true;
                }
            }
            for cell in mines {
                if !self.mines.contains(&cell) {
                    self.mark_mine(cell)?;
                    report.mines_found += 1;
                    changed = true;
                }
            }

            // Marking can empty constraints out.
            self.discard_resolved();

            let derived = self.resolve_subsets()?;
            if !derived.is_empty() {
                report.constraints_derived += derived.len();
                self.knowledge.extend(derived);
                changed = true;
            }

            debug!(
                pass = report.passes,
                constraints = self.knowledge.len(),
                safes = self.safes.len(),
                mines = self.mines.len(),
                changed,
                "inference pass"
            );

            if !changed {
                return Ok(report);
            }
        }
    }

    /// Drops constraints with no cells left, and constraints that resolved
    /// into a copy of an earlier one.
    fn discard_resolved(&mut self) {
        let mut seen = HashSet::new();
        self.knowledge
            .retain(|constraint| !constraint.is_empty() && seen.insert(constraint.clone()));
    }

    /// Applies subset resolution to every ordered pair of constraints and
    /// returns the constraints not already known.
    fn resolve_subsets(&self) -> Result<Vec<Constraint>, Contradiction> {
        let known: HashSet<&Constraint> = self.knowledge.iter().collect();
        let mut staged: Vec<Constraint> = Vec::new();

        for (i, s1) in self.knowledge.iter().enumerate() {
            for (j, s2) in self.knowledge.iter().enumerate() {
                if i == j {
                    continue;
                }
                let Some(inferred) = s1.subtract_from(s2)? else {
                    continue;
                };
                if known.contains(&inferred) || staged.contains(&inferred) {
                    continue;
                }
                trace!(%s1, %s2, %inferred, "subset resolution");
                staged.push(inferred);
            }
        }

        Ok(staged)
    }

    /// Any known-safe cell not yet played. Which one is unspecified.
    pub fn safe_move(&self) -> Option<Cell> {
        self.safes.difference(&self.moves_made).next().copied()
    }

    /// Picks uniformly among cells that are neither played nor known mines.
    pub fn random_move<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Cell> {
        let choices: Vec<Cell> = (0..self.height)
            .flat_map(|row| (0..self.width).map(move |col| Cell::new(row, col)))
            .filter(|cell| !self.moves_made.contains(cell) && !self.mines.contains(cell))
            .collect();

        choices.choose(rng).copied()
    }
}

impl Strategy for KnowledgeEngine {
    fn observe(&mut self, cell: Cell, count: usize) -> Result<InferenceReport> {
        KnowledgeEngine::observe(self, cell, count)
    }

    fn safe_move(&self) -> Option<Cell> {
        KnowledgeEngine::safe_move(self)
    }

    fn random_move(&self, rng: &mut dyn RngCore) -> Option<Cell> {
        KnowledgeEngine::random_move(self, rng)
    }

    fn height(&self) -> usize {
        self.height
    }

    fn width(&self) -> usize {
        self.width
    }

    fn mines(&self) -> &BTreeSet<Cell> {
        &self.mines
    }

    fn safes(&self) -> &BTreeSet<Cell> {
        &self.safes
    }

    fn moves_made(&self) -> &BTreeSet<Cell> {
        &self.moves_made
    }
}

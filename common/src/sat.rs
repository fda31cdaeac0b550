use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use rand::RngCore;
use rand::prelude::IndexedRandom;
use tracing::debug;
use varisat::{CnfFormula, ExtendFormula, Lit, Solver, Var};

use crate::{Cell, Error, InferenceReport, Result, Strategy};

/// The possible outcomes of the solver's analysis for a single hidden cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeducedState {
    ForcedMine,   // All valid layouts require this cell to be a mine.
    ForcedSafe,   // All valid layouts require this cell to be safe.
    Undetermined, // Valid layouts exist for this cell being either a mine or safe.
}

/// An agent that decides every cell exactly by SAT solving over all the
/// observations seen so far.
///
/// Much slower than [`KnowledgeEngine`](crate::KnowledgeEngine), but complete:
/// a cell is reported certain if and only if every mine layout consistent
/// with the observations agrees on it. Useful as a reference for what the
/// constraint engine could have concluded.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SatOracle {
    height: usize,
    width: usize,
    observations: BTreeMap<Cell, usize>,
    moves_made: BTreeSet<Cell>,
    safes: BTreeSet<Cell>,
    mines: BTreeSet<Cell>,
}

impl SatOracle {
    pub fn new(height: usize, width: usize) -> Self {
        SatOracle {
            height,
            width,
            observations: BTreeMap::new(),
            moves_made: BTreeSet::new(),
            safes: BTreeSet::new(),
            mines: BTreeSet::new(),
        }
    }

    pub fn observe(&mut self, cell: Cell, count: usize) -> Result<InferenceReport> {
        if !cell.in_bounds(self.height, self.width) {
            return Err(Error::OutOfBounds {
                cell,
                height: self.height,
                width: self.width,
            });
        }
        let neighbors = cell.neighbors(self.height, self.width).count();
        if count > neighbors {
            return Err(Error::CountTooLarge {
                cell,
                count,
                neighbors,
            });
        }
        match self.observations.get(&cell) {
            Some(&seen) if seen == count => return Ok(InferenceReport::default()),
            Some(&seen) => {
                return Err(Error::Inconsistent {
                    cell,
                    count,
                    reason: format!("the cell was already observed with count {seen}"),
                });
            }
            None => {}
        }

        self.observations.insert(cell, count);
        let deductions = match analyze_observations(self.height, self.width, &self.observations)
        {
            Ok(deductions) => deductions,
            Err(e) => {
                self.observations.remove(&cell);
                return Err(Error::Inconsistent {
                    cell,
                    count,
                    reason: e.to_string(),
                });
            }
        };

        self.moves_made.insert(cell);
        let mut report = InferenceReport {
            passes: 1,
            ..InferenceReport::default()
        };
        if self.safes.insert(cell) {
            report.safes_found += 1;
        }
        for (point, state) in deductions {
            match state {
                DeducedState::ForcedSafe if self.safes.insert(point) => report.safes_found += 1,
                DeducedState::ForcedMine if self.mines.insert(point) => report.mines_found += 1,
                _ => {}
            }
        }

        debug!(%cell, count, safes = report.safes_found, mines = report.mines_found, "sat analysis");
        Ok(report)
    }
}

impl Strategy for SatOracle {
    fn observe(&mut self, cell: Cell, count: usize) -> Result<InferenceReport> {
        SatOracle::observe(self, cell, count)
    }

    fn safe_move(&self) -> Option<Cell> {
        self.safes.difference(&self.moves_made).next().copied()
    }

    fn random_move(&self, rng: &mut dyn RngCore) -> Option<Cell> {
        let choices: Vec<Cell> = (0..self.height)
            .flat_map(|row| (0..self.width).map(move |col| Cell::new(row, col)))
            .filter(|cell| !self.moves_made.contains(cell) && !self.mines.contains(cell))
            .collect();

        choices.choose(rng).copied()
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

/// Decides every unobserved cell of a `height` x `width` board given the
/// revealed `(cell, count)` observations.
///
/// Each observed cell is encoded as safe and each count as an "exactly k of
/// these neighbors" constraint. Every unobserved cell is then tested under
/// both assumptions with incremental solving. Fails if the observations admit
/// no mine layout at all.
pub fn analyze_observations(
    height: usize,
    width: usize,
    observations: &BTreeMap<Cell, usize>,
) -> anyhow::Result<BTreeMap<Cell, DeducedState>> {
    let mut solver = Solver::new();

    // 1. Allocate a SAT variable per cell, row-major
    let vars: Vec<Var> = (0..height * width).map(|_| solver.new_var()).collect();
    let mine_lit = |cell: Cell| Lit::from_var(vars[cell.row * width + cell.col], true);

    // 2. Encode the observations as CNF
    let mut formula = CnfFormula::new();
    for (&cell, &count) in observations {
        formula.add_clause(&[!mine_lit(cell)]);

        let lits: Vec<Lit> = cell.neighbors(height, width).map(mine_lit).collect();
        encode_exactly_k_to_formula(&mut formula, &lits, count);
    }
    solver.add_formula(&formula);

    // 3. Check that some layout fits at all
    if !solver.solve()? {
        anyhow::bail!("observations admit no mine layout");
    }

    // 4. Test each unobserved cell both ways
    let mut deductions = BTreeMap::new();
    for row in 0..height {
        for col in 0..width {
            let cell = Cell::new(row, col);
            if observations.contains_key(&cell) {
                continue;
            }
            let lit_mine = mine_lit(cell);

            solver.assume(&[lit_mine]);
            let mine_possible = solver.solve()?;

            solver.assume(&[!lit_mine]);
            let safe_possible = solver.solve()?;

            solver.assume(&[]);

            let state = match (mine_possible, safe_possible) {
                (true, true) => DeducedState::Undetermined,
                (true, false) => DeducedState::ForcedMine,
                (false, true) => DeducedState::ForcedSafe,
                (false, false) => anyhow::bail!("state_collision at {cell}"),
            };
            deductions.insert(cell, state);
        }
    }

    Ok(deductions)
}

/// Encodes "exactly k of `vars` are true". Neighbor sets hold at most eight
/// cells, so the naive combination encoding stays small.
fn encode_exactly_k_to_formula(formula: &mut CnfFormula, vars: &[Lit], k: usize) {
    // Unsatisfiable - add empty clause.
    if k > vars.len() {
        formula.add_clause(&[]);
        return;
    }

    // At most k: no k+1 of them are all true.
    if k < vars.len() {
        for combo in vars.iter().copied().combinations(k + 1) {
            let clause: Vec<Lit> = combo.iter().map(|&lit| !lit).collect();
            formula.add_clause(&clause);
        }
    }

    // At least k: every n-k+1 of them contain a true one.
    if k > 0 {
        for combo in vars.iter().copied().combinations(vars.len() - k + 1) {
            formula.add_clause(&combo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(row: usize, col: usize) -> Cell {
        Cell::new(row, col)
    }

    #[test]
    fn test_simple_analysis() {
        // Exactly 1 mine between (0,0) and (0,2): both undetermined
        let observations = BTreeMap::from([(c(0, 1), 1)]);
        let deductions = analyze_observations(1, 3, &observations).unwrap();

        assert_eq!(deductions.get(&c(0, 0)), Some(&DeducedState::Undetermined));
        assert_eq!(deductions.get(&c(0, 2)), Some(&DeducedState::Undetermined));
        assert_eq!(deductions.get(&c(0, 1)), None);
    }

    #[test]
    fn test_forced_cells() {
        let observations = BTreeMap::from([(c(0, 0), 0), (c(0, 2), 1)]);
        let deductions = analyze_observations(1, 4, &observations).unwrap();

        assert_eq!(deductions.get(&c(0, 1)), Some(&DeducedState::ForcedSafe));
        assert_eq!(deductions.get(&c(0, 3)), Some(&DeducedState::ForcedMine));
    }

    #[test]
    fn test_contradiction_is_an_error() {
        // (0,0) claims (0,1) is a mine, (0,2) claims it is not
        let observations = BTreeMap::from([(c(0, 0), 1), (c(0, 2), 0)]);
        assert!(analyze_observations(1, 3, &observations).is_err());
    }

    #[test]
    fn test_oracle_rolls_back_inconsistent_observation() {
        let mut oracle = SatOracle::new(1, 3);
        oracle.observe(c(0, 0), 1).unwrap();
        assert!(oracle.mines().contains(&c(0, 1)));

        let err = oracle.observe(c(0, 2), 0).unwrap_err();
        assert!(matches!(err, Error::Inconsistent { .. }));
        assert!(!oracle.safes().contains(&c(0, 2)));
        assert_eq!(oracle.safe_move(), None);
    }

    #[test]
    fn test_oracle_moves() {
        let mut oracle = SatOracle::new(2, 2);
        oracle.observe(c(0, 0), 0).unwrap();

        let safe = oracle.safe_move().unwrap();
        assert_ne!(safe, c(0, 0));

        let mut rng = rand::rng();
        let guess = oracle.random_move(&mut rng).unwrap();
        assert_ne!(guess, c(0, 0));
    }
}

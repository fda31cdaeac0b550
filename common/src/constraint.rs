use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::Cell;

/// A logical statement about the board: exactly `count` of `cells` are mines.
///
/// `cells` only ever holds cells whose status is still unknown. As the engine
/// learns that a cell is a mine or safe, it resolves that cell out of every
/// constraint, so a constraint shrinks over its lifetime until it is either
/// certain (all mines / all safe) or empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Constraint {
    /// The unresolved cells this constraint ranges over.
    pub cells: BTreeSet<Cell>,
    /// The exact number of mines among `cells`.
    pub count: usize,
}

/// Resolving or combining constraints produced a statement no mine layout
/// can satisfy. Only contradictory observations lead here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct Contradiction(pub String);

impl Constraint {
    /// Panics if `count` exceeds the number of cells. Such a constraint can
    /// only come from broken inference, never from a validated observation.
    pub fn new(cells: impl IntoIterator<Item = Cell>, count: usize) -> Self {
        let cells: BTreeSet<Cell> = cells.into_iter().collect();
        assert!(
            count <= cells.len(),
            "constraint claims {count} mines among {} cells",
            cells.len()
        );
        Constraint { cells, count }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Every remaining cell is a mine when the count covers all of them.
    pub fn derive_known_mines(&self) -> BTreeSet<Cell> {
        if !self.cells.is_empty() && self.count == self.cells.len() {
            self.cells.clone()
        } else {
            BTreeSet::new()
        }
    }

    /// Every remaining cell is safe when no mines are left to place.
    pub fn derive_known_safes(&self) -> BTreeSet<Cell> {
        if !self.cells.is_empty() && self.count == 0 {
            self.cells.clone()
        } else {
            BTreeSet::new()
        }
    }

    /// The caller guarantees `cell` is a mine. Fails if this constraint had
    /// no mines left to give.
    pub fn resolve_as_mine(&mut self, cell: Cell) -> Result<(), Contradiction> {
        if !self.cells.contains(&cell) {
            return Ok(());
        }
        if self.count == 0 {
            return Err(Contradiction(format!("{cell} is a mine but {self} has none left")));
        }
        self.cells.remove(&cell);
        self.count -= 1;
        Ok(())
    }

    /// Fails if every remaining cell had to be a mine.
    pub fn resolve_as_safe(&mut self, cell: Cell) -> Result<(), Contradiction> {
        if !self.cells.contains(&cell) {
            return Ok(());
        }
        if self.count == self.cells.len() {
            return Err(Contradiction(format!("{cell} is safe but {self} needs it to be a mine")));
        }
        self.cells.remove(&cell);
        Ok(())
    }

    /// Subset resolution: when `self.cells ⊆ other.cells`, the cells `other`
    /// has beyond `self` hold exactly `other.count - self.count` mines.
    ///
    /// Returns `None` when `self` is not a subset of `other`, or when the
    /// difference carries no cells.
    pub fn subtract_from(&self, other: &Constraint) -> Result<Option<Constraint>, Contradiction> {
        if !self.cells.is_subset(&other.cells) {
            return Ok(None);
        }

        let cells: BTreeSet<Cell> = other.cells.difference(&self.cells).copied().collect();
        let count = other
            .count
            .checked_sub(self.count)
            .filter(|&count| count <= cells.len())
            .ok_or_else(|| Contradiction(format!("{self} cannot sit inside {other}")))?;

        if cells.is_empty() {
            return Ok(None);
        }
        Ok(Some(Constraint { cells, count }))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{cell}")?;
        }
        write!(f, "}} = {}", self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(row: usize, col: usize) -> Cell {
        Cell::new(row, col)
    }

    #[test]
    fn test_known_mines_when_count_covers_all_cells() {
        let constraint = Constraint::new([c(0, 0), c(0, 1)], 2);
        assert_eq!(constraint.derive_known_mines(), BTreeSet::from([c(0, 0), c(0, 1)]));
        assert!(constraint.derive_known_safes().is_empty());
    }

    #[test]
    fn test_known_safes_when_count_is_zero() {
        let constraint = Constraint::new([c(0, 0), c(0, 1), c(1, 0)], 0);
        assert_eq!(constraint.derive_known_safes().len(), 3);
        assert!(constraint.derive_known_mines().is_empty());
    }

    #[test]
    fn test_undetermined_constraint_derives_nothing() {
        let constraint = Constraint::new([c(0, 0), c(0, 1)], 1);
        assert!(constraint.derive_known_mines().is_empty());
        assert!(constraint.derive_known_safes().is_empty());
    }

    #[test]
    fn test_empty_constraint_derives_nothing() {
        let constraint = Constraint::new([], 0);
        assert!(constraint.is_empty());
        assert!(constraint.derive_known_mines().is_empty());
        assert!(constraint.derive_known_safes().is_empty());
    }

    #[test]
    fn test_resolve_as_mine_decrements_count() {
        let mut constraint = Constraint::new([c(0, 0), c(0, 1), c(1, 1)], 2);
        constraint.resolve_as_mine(c(0, 1)).unwrap();
        assert_eq!(constraint, Constraint::new([c(0, 0), c(1, 1)], 1));

        // A cell the constraint does not mention is a no-op
        constraint.resolve_as_mine(c(2, 2)).unwrap();
        assert_eq!(constraint, Constraint::new([c(0, 0), c(1, 1)], 1));
    }

    #[test]
    fn test_resolve_as_safe_keeps_count() {
        let mut constraint = Constraint::new([c(0, 0), c(0, 1)], 1);
        constraint.resolve_as_safe(c(0, 0)).unwrap();
        assert_eq!(constraint, Constraint::new([c(0, 1)], 1));
        assert_eq!(constraint.derive_known_mines(), BTreeSet::from([c(0, 1)]));
    }

    #[test]
    fn test_subtract_from_superset() {
        let small = Constraint::new([c(0, 0), c(0, 1)], 1);
        let large = Constraint::new([c(0, 0), c(0, 1), c(0, 2)], 2);
        assert_eq!(
            small.subtract_from(&large),
            Ok(Some(Constraint::new([c(0, 2)], 1)))
        );
        assert_eq!(large.subtract_from(&small), Ok(None));
    }

    #[test]
    fn test_resolving_mine_out_of_zero_count_fails() {
        let mut constraint = Constraint::new([c(1, 0), c(1, 1)], 0);
        assert!(constraint.resolve_as_mine(c(1, 1)).is_err());
        assert_eq!(constraint, Constraint::new([c(1, 0), c(1, 1)], 0));
    }

    #[test]
    fn test_resolving_safe_out_of_all_mines_fails() {
        let mut constraint = Constraint::new([c(0, 1)], 1);
        assert!(constraint.resolve_as_safe(c(0, 1)).is_err());
        assert_eq!(constraint.count, 1);
    }

    #[test]
    fn test_subtract_with_more_mines_in_subset_fails() {
        let small = Constraint::new([c(0, 0), c(0, 1)], 2);
        let large = Constraint::new([c(0, 0), c(0, 1), c(0, 2)], 1);
        assert!(small.subtract_from(&large).is_err());

        // Same cells, different counts
        let other = Constraint::new([c(0, 0), c(0, 1)], 1);
        assert!(small.subtract_from(&other).is_err());

        // Remainder too small for the difference
        let wide = Constraint::new([c(0, 0), c(0, 1), c(0, 2)], 3);
        assert!(Constraint::new([c(0, 0), c(0, 1)], 0).subtract_from(&wide).is_err());
    }

    #[test]
    fn test_subtract_equal_sets_yields_nothing() {
        let a = Constraint::new([c(0, 0), c(0, 1)], 1);
        assert_eq!(a.subtract_from(&a.clone()), Ok(None));
    }

    #[test]
    #[should_panic(expected = "constraint claims 3 mines among 2 cells")]
    fn test_overfull_constraint_panics() {
        Constraint::new([c(0, 0), c(0, 1)], 3);
    }

    #[test]
    fn test_display() {
        let constraint = Constraint::new([c(1, 0), c(0, 1)], 1);
        assert_eq!(constraint.to_string(), "{(0, 1), (1, 0)} = 1");
    }
}

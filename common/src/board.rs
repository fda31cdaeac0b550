use std::collections::BTreeSet;

use rand::Rng;

use crate::{Cell, Error, Result};

/// The ground truth of a board: its size and where the mines are.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Minefield {
    pub height: usize,
    pub width: usize,
    mines: BTreeSet<Cell>,
}

impl Minefield {
    /// Places exactly `mines` mines uniformly at random.
    pub fn random<R: Rng + ?Sized>(
        height: usize,
        width: usize,
        mines: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let cells = height * width;
        if mines >= cells {
            return Err(Error::TooManyMines { mines, cells });
        }

        let mut placed = BTreeSet::new();
        while placed.len() != mines {
            placed.insert(Cell::new(rng.random_range(0..height), rng.random_range(0..width)));
        }

        Ok(Minefield {
            height,
            width,
            mines: placed,
        })
    }

    /// A board with mines at exactly the given cells.
    pub fn with_mines(
        height: usize,
        width: usize,
        mines: impl IntoIterator<Item = Cell>,
    ) -> Result<Self> {
        let mines: BTreeSet<Cell> = mines.into_iter().collect();
        if let Some(&cell) = mines.iter().find(|cell| !cell.in_bounds(height, width)) {
            return Err(Error::OutOfBounds {
                cell,
                height,
                width,
            });
        }
        let cells = height * width;
        if mines.len() >= cells {
            return Err(Error::TooManyMines {
                mines: mines.len(),
                cells,
            });
        }

        Ok(Minefield {
            height,
            width,
            mines,
        })
    }

    pub fn mines(&self) -> &BTreeSet<Cell> {
        &self.mines
    }

    pub fn mine_count(&self) -> usize {
        self.mines.len()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.in_bounds(self.height, self.width)
    }

    pub fn is_mine(&self, cell: Cell) -> bool {
        self.mines.contains(&cell)
    }

    /// Number of mines within one row and column of `cell`, not counting
    /// the cell itself.
    pub fn nearby_mines(&self, cell: Cell) -> u8 {
        cell.neighbors(self.height, self.width)
            .filter(|n| self.mines.contains(n))
            .count() as u8
    }

    /// Every cell of the board, row-major.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + use<> {
        let width = self.width;
        (0..self.height).flat_map(move |row| (0..width).map(move |col| Cell::new(row, col)))
    }

    /// True when `found` is exactly the set of mines.
    pub fn all_flagged(&self, found: &BTreeSet<Cell>) -> bool {
        *found == self.mines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_places_exact_mine_count() {
        let mut rng = StdRng::seed_from_u64(42);
        let field = Minefield::random(8, 8, 10, &mut rng).unwrap();

        assert_eq!(field.mine_count(), 10);
        assert!(field.mines().iter().all(|&m| field.contains(m)));
    }

    #[test]
    fn test_too_many_mines() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            Minefield::random(3, 3, 9, &mut rng).unwrap_err(),
            Error::TooManyMines { mines: 9, cells: 9 }
        );
    }

    #[test]
    fn test_with_mines_rejects_out_of_bounds() {
        let err = Minefield::with_mines(3, 3, [Cell::new(3, 3)]).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { .. }));
    }

    #[test]
    fn test_nearby_mines() {
        let field = Minefield::with_mines(3, 3, [Cell::new(0, 0), Cell::new(2, 2)]).unwrap();

        assert_eq!(field.nearby_mines(Cell::new(1, 1)), 2);
        assert_eq!(field.nearby_mines(Cell::new(0, 1)), 1);
        assert_eq!(field.nearby_mines(Cell::new(2, 0)), 0);
        // A mine does not count itself
        assert_eq!(field.nearby_mines(Cell::new(0, 0)), 0);
    }

    #[test]
    fn test_all_flagged() {
        let field = Minefield::with_mines(2, 2, [Cell::new(1, 1)]).unwrap();

        assert!(field.all_flagged(&BTreeSet::from([Cell::new(1, 1)])));
        assert!(!field.all_flagged(&BTreeSet::new()));
        assert!(!field.all_flagged(&BTreeSet::from([Cell::new(1, 1), Cell::new(0, 0)])));
    }

    #[test]
    fn test_cells_row_major() {
        let field = Minefield::with_mines(2, 3, []).unwrap();
        let cells: Vec<Cell> = field.cells().collect();

        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], Cell::new(0, 0));
        assert_eq!(cells[3], Cell::new(1, 0));
    }
}

use std::fmt;

/// A (row, column) coordinate on the board, 0-indexed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Cell { row, col }
    }

    pub fn in_bounds(self, height: usize, width: usize) -> bool {
        self.row < height && self.col < width
    }

    /// All in-bounds grid neighbors of this cell, excluding the cell itself.
    /// Handles board edges and corners, so a corner yields 3 cells and an
    /// interior cell yields 8.
    pub fn neighbors(self, height: usize, width: usize) -> impl Iterator<Item = Cell> {
        (-1..=1isize).flat_map(move |dr| {
            (-1..=1isize).filter_map(move |dc| {
                if dr == 0 && dc == 0 {
                    return None;
                }

                let r = self.row as isize + dr;
                let c = self.col as isize + dc;

                if r >= 0 && r < height as isize && c >= 0 && c < width as isize {
                    Some(Cell::new(r as usize, c as usize))
                } else {
                    None
                }
            })
        })
    }
}

impl From<(usize, usize)> for Cell {
    fn from((row, col): (usize, usize)) -> Self {
        Cell { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

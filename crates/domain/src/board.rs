//! Connect-four board value and the pure move rules over it.
//!
//! A `Board` is never mutated after construction: `drop_disc` returns a fresh
//! board, so any snapshot handed to another component stays valid.
//!
//! Row 0 is the top row; discs fall toward the highest row index.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default board height.
pub const DEFAULT_ROWS: usize = 6;

/// Default board width.
pub const DEFAULT_COLS: usize = 7;

/// Largest accepted board side.
pub const MAX_DIMENSION: usize = 16;

/// Number of aligned discs needed to win.
const CONNECT: usize = 4;

/// (row delta, column delta) for horizontal, vertical and both diagonals.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

// ============================================================================
// Errors
// ============================================================================

/// Reasons a single disc drop is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("invalid column")]
    InvalidColumn,
    #[error("invalid player")]
    InvalidPlayer,
    #[error("column is full")]
    ColumnFull,
}

/// Reasons a board cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("board dimensions must be between 1x1 and {MAX_DIMENSION}x{MAX_DIMENSION}, got {rows}x{cols}")]
    Dimensions { rows: usize, cols: usize },
    #[error("row {row} has {len} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("cell ({row}, {col}) holds unknown mark {value}")]
    UnknownMark { row: usize, col: usize, value: u8 },
    #[error("cell ({row}, {col}) sits above an empty cell")]
    Floating { row: usize, col: usize },
}

// ============================================================================
// Seat
// ============================================================================

/// One of the two player marks. Serialized as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Seat {
    One,
    Two,
}

impl Seat {
    /// The opposing seat.
    pub fn other(self) -> Self {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }

    /// Wire number of this seat (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            Seat::One => 1,
            Seat::Two => 2,
        }
    }
}

impl TryFrom<u8> for Seat {
    type Error = MoveError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Seat::One),
            2 => Ok(Seat::Two),
            _ => Err(MoveError::InvalidPlayer),
        }
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> u8 {
        seat.number()
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

// ============================================================================
// BoardDimensions
// ============================================================================

/// Validated board size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoardDimensions {
    rows: usize,
    cols: usize,
}

impl BoardDimensions {
    pub fn new(rows: usize, cols: usize) -> Result<Self, BoardError> {
        if rows == 0 || cols == 0 || rows > MAX_DIMENSION || cols > MAX_DIMENSION {
            return Err(BoardError::Dimensions { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

impl Default for BoardDimensions {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

// ============================================================================
// Board
// ============================================================================

/// Immutable grid of cells, each empty or holding a seat's disc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    dims: BoardDimensions,
    cells: Vec<Option<Seat>>,
}

impl Board {
    /// An empty board of the given size.
    pub fn empty(dims: BoardDimensions) -> Self {
        Self {
            dims,
            cells: vec![None; dims.rows * dims.cols],
        }
    }

    /// An empty 6x7 board.
    pub fn standard() -> Self {
        Self::empty(BoardDimensions::default())
    }

    /// Build a board from wire rows (0 empty, 1/2 discs), top row first.
    ///
    /// Rejects ragged rows, unknown marks and discs that float above an
    /// empty cell, so every board in the system obeys gravity.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, BoardError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let dims = BoardDimensions::new(height, width)?;

        let mut cells = Vec::with_capacity(height * width);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != width {
                return Err(BoardError::RaggedRow {
                    row,
                    len: values.len(),
                    expected: width,
                });
            }
            for (col, &value) in values.iter().enumerate() {
                let cell = match value {
                    0 => None,
                    other => Some(Seat::try_from(other).map_err(|_| BoardError::UnknownMark {
                        row,
                        col,
                        value,
                    })?),
                };
                cells.push(cell);
            }
        }

        let board = Self { dims, cells };
        for col in 0..width {
            for row in 0..height.saturating_sub(1) {
                if board.at(row, col).is_some() && board.at(row + 1, col).is_none() {
                    return Err(BoardError::Floating { row, col });
                }
            }
        }
        Ok(board)
    }

    pub fn dimensions(&self) -> BoardDimensions {
        self.dims
    }

    pub fn rows(&self) -> usize {
        self.dims.rows
    }

    pub fn cols(&self) -> usize {
        self.dims.cols
    }

    /// Contents of a cell; `None` for empty or out-of-range cells.
    pub fn cell(&self, row: usize, col: usize) -> Option<Seat> {
        if row >= self.dims.rows || col >= self.dims.cols {
            return None;
        }
        self.at(row, col)
    }

    fn at(&self, row: usize, col: usize) -> Option<Seat> {
        self.cells[row * self.dims.cols + col]
    }

    /// Convert an untrusted column number into an index on this board.
    pub fn column_index(&self, column: i64) -> Result<usize, MoveError> {
        usize::try_from(column)
            .ok()
            .filter(|&col| col < self.dims.cols)
            .ok_or(MoveError::InvalidColumn)
    }

    /// Whether the topmost cell of a column is occupied.
    pub fn is_column_full(&self, col: usize) -> bool {
        col >= self.dims.cols || self.at(0, col).is_some()
    }

    /// Columns that can still accept a disc, left to right.
    pub fn playable_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.dims.cols).filter(move |&col| !self.is_column_full(col))
    }

    /// Drop a disc into `column`, returning the new board and the landing row.
    pub fn drop_disc(&self, column: usize, seat: Seat) -> Result<(Board, usize), MoveError> {
        if column >= self.dims.cols {
            return Err(MoveError::InvalidColumn);
        }

        let row = (0..self.dims.rows)
            .rev()
            .find(|&row| self.at(row, column).is_none())
            .ok_or(MoveError::ColumnFull)?;

        let mut next = self.clone();
        next.cells[row * self.dims.cols + column] = Some(seat);
        Ok((next, row))
    }

    /// True iff `seat` holds four aligned discs anywhere on the board.
    pub fn check_win(&self, seat: Seat) -> bool {
        (0..self.dims.rows).any(|row| {
            (0..self.dims.cols).any(|col| {
                DIRECTIONS
                    .iter()
                    .any(|&(dr, dc)| self.line_from(row, col, dr, dc, seat))
            })
        })
    }

    fn line_from(&self, row: usize, col: usize, dr: isize, dc: isize, seat: Seat) -> bool {
        (0..CONNECT).all(|step| {
            let step = step as isize;
            let r = row as isize + dr * step;
            let c = col as isize + dc * step;
            r >= 0
                && c >= 0
                && (r as usize) < self.dims.rows
                && (c as usize) < self.dims.cols
                && self.at(r as usize, c as usize) == Some(seat)
        })
    }

    /// True iff every cell is occupied.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Wire form: rows top to bottom, 0 for empty, 1/2 for discs.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(self.dims.cols)
            .map(|row| row.iter().map(|cell| cell.map_or(0, Seat::number)).collect())
            .collect()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

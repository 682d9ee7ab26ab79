// holocron-parsers/src/grid/placement.rs
//! Placement grid value and its mutators
//!
//! The mutators keep every invariant intact: rows are rectangular, the
//! center lies inside the grid and sizes stay within their limits. Undo
//! history is left to callers, who can clone the grid before a change.

use serde::{Deserialize, Serialize};

use crate::traits::{ParseError, ParseResult};

/// Smallest and largest number of cells along either axis
pub const MIN_GRID_SIZE: usize = 1;
pub const MAX_GRID_SIZE: usize = 50;

/// Limits for the size of one cell in meters
pub const MIN_CHUNK_SIZE: f32 = 0.5;
pub const MAX_CHUNK_SIZE: f32 = 100.0;

/// State of one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    /// `'H'`
    Occupied,
    /// `'F'`
    Free,
}

impl CellState {
    pub const fn as_byte(self) -> u8 {
        match self {
            CellState::Occupied => b'H',
            CellState::Free => b'F',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'H' => Some(CellState::Occupied),
            b'F' => Some(CellState::Free),
            _ => None,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            CellState::Occupied => CellState::Free,
            CellState::Free => CellState::Occupied,
        }
    }
}

/// A small rectangular occupancy grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPlacementGrid")]
pub struct PlacementGrid {
    col_size: usize,
    row_size: usize,
    center_x: usize,
    center_y: usize,
    col_chunk_size: f32,
    row_chunk_size: f32,
    cells: Vec<Vec<CellState>>,
}

/// Serialized shape of a grid, before its invariants are checked
#[derive(Deserialize)]
struct RawPlacementGrid {
    col_size: usize,
    row_size: usize,
    center_x: usize,
    center_y: usize,
    col_chunk_size: f32,
    row_chunk_size: f32,
    cells: Vec<Vec<CellState>>,
}

impl TryFrom<RawPlacementGrid> for PlacementGrid {
    type Error = ParseError;

    fn try_from(raw: RawPlacementGrid) -> ParseResult<Self> {
        Self::from_parts(
            raw.col_size,
            raw.row_size,
            raw.center_x,
            raw.center_y,
            raw.col_chunk_size,
            raw.row_chunk_size,
            raw.cells,
        )
    }
}

impl PlacementGrid {
    /// Create an all-free grid with 1 m cells, centered
    pub fn new(cols: usize, rows: usize) -> Self {
        let cols = cols.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
        let rows = rows.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
        Self {
            col_size: cols,
            row_size: rows,
            center_x: cols / 2,
            center_y: rows / 2,
            col_chunk_size: 1.0,
            row_chunk_size: 1.0,
            cells: vec![vec![CellState::Free; cols]; rows],
        }
    }

    /// Build a grid from rows of `'H'`/`'F'` characters
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> ParseResult<Self> {
        let cells = rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                row.as_ref()
                    .bytes()
                    .map(|b| {
                        CellState::from_byte(b).ok_or_else(|| {
                            ParseError::invalid_value(format!("row {r} has unknown cell code {:?}", b as char))
                        })
                    })
                    .collect::<ParseResult<Vec<_>>>()
            })
            .collect::<ParseResult<Vec<_>>>()?;

        let row_size = cells.len();
        let col_size = cells.first().map(Vec::len).unwrap_or(0);
        let mut grid = Self::new(col_size, row_size);
        grid.set_cells(cells)?;
        Ok(grid)
    }

    /// Assemble a grid from raw parts, checking every invariant
    pub(crate) fn from_parts(
        col_size: usize,
        row_size: usize,
        center_x: usize,
        center_y: usize,
        col_chunk_size: f32,
        row_chunk_size: f32,
        cells: Vec<Vec<CellState>>,
    ) -> ParseResult<Self> {
        let grid = Self {
            col_size,
            row_size,
            center_x,
            center_y,
            col_chunk_size,
            row_chunk_size,
            cells,
        };
        grid.check()?;
        Ok(grid)
    }

    fn set_cells(&mut self, cells: Vec<Vec<CellState>>) -> ParseResult<()> {
        self.cells = cells;
        self.check()
    }

    /// Verify sizes, center, chunk sizes and the shape of the cell rows
    pub fn check(&self) -> ParseResult<()> {
        for (name, size) in [("column count", self.col_size), ("row count", self.row_size)] {
            if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&size) {
                return Err(ParseError::invalid_value(format!(
                    "{name} {size} is outside {MIN_GRID_SIZE}..={MAX_GRID_SIZE}"
                )));
            }
        }
        if self.center_x >= self.col_size || self.center_y >= self.row_size {
            return Err(ParseError::invalid_value(format!(
                "center ({}, {}) is outside a {}x{} grid",
                self.center_x, self.center_y, self.col_size, self.row_size
            )));
        }
        for (name, size) in [("column chunk size", self.col_chunk_size), ("row chunk size", self.row_chunk_size)] {
            if !size.is_finite() || size <= 0.0 {
                return Err(ParseError::invalid_value(format!("{name} {size} must be positive")));
            }
        }
        if self.cells.len() != self.row_size || self.cells.iter().any(|row| row.len() != self.col_size) {
            return Err(ParseError::invalid_value(format!(
                "cells must form {} rows of {} columns",
                self.row_size, self.col_size
            )));
        }
        Ok(())
    }

    pub fn col_size(&self) -> usize {
        self.col_size
    }

    pub fn row_size(&self) -> usize {
        self.row_size
    }

    pub fn center_x(&self) -> usize {
        self.center_x
    }

    pub fn center_y(&self) -> usize {
        self.center_y
    }

    pub fn col_chunk_size(&self) -> f32 {
        self.col_chunk_size
    }

    pub fn row_chunk_size(&self) -> f32 {
        self.row_chunk_size
    }

    /// Width in meters
    pub fn total_width(&self) -> f32 {
        self.col_size as f32 * self.col_chunk_size
    }

    /// Height in meters
    pub fn total_height(&self) -> f32 {
        self.row_size as f32 * self.row_chunk_size
    }

    /// Rows of cells, top to bottom
    pub fn rows(&self) -> &[Vec<CellState>] {
        &self.cells
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<CellState> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|&&c| c == CellState::Occupied)
            .count()
    }

    /// Rows rendered as `'H'`/`'F'` strings
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|c| c.as_byte() as char).collect())
            .collect()
    }

    /// Flip one cell and return its new state
    pub fn toggle_cell(&mut self, row: usize, col: usize) -> ParseResult<CellState> {
        let (rows, cols) = (self.row_size, self.col_size);
        let cell = self
            .cells
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or_else(|| ParseError::invalid_value(format!("cell ({row}, {col}) is outside a {cols}x{rows} grid")))?;
        *cell = cell.toggled();
        Ok(*cell)
    }

    /// Change the grid dimensions
    ///
    /// Sizes are clamped to `1..=50`. Cells in the overlap keep their
    /// state, new cells are free, and the center is pulled back inside.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
        let rows = rows.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);

        let cells = (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| self.cell(r, c).unwrap_or(CellState::Free))
                    .collect()
            })
            .collect();

        self.cells = cells;
        self.col_size = cols;
        self.row_size = rows;
        self.center_x = self.center_x.min(cols - 1);
        self.center_y = self.center_y.min(rows - 1);
    }

    /// Move the center cell
    pub fn set_center(&mut self, col: usize, row: usize) -> ParseResult<()> {
        if col >= self.col_size || row >= self.row_size {
            return Err(ParseError::invalid_value(format!(
                "center ({col}, {row}) is outside a {}x{} grid",
                self.col_size, self.row_size
            )));
        }
        self.center_x = col;
        self.center_y = row;
        Ok(())
    }

    /// Set the cell size in meters, clamped to `0.5..=100`
    pub fn set_chunk_size(&mut self, col_size: f32, row_size: f32) -> ParseResult<()> {
        if col_size.is_nan() || row_size.is_nan() {
            return Err(ParseError::invalid_value("chunk size is not a number"));
        }
        self.col_chunk_size = col_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        self.row_chunk_size = row_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        Ok(())
    }
}

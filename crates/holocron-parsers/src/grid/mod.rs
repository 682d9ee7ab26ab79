// holocron-parsers/src/grid/mod.rs
//! Placement Grid Parser
//!
//! Structure footprints mark which cells of a small grid a placed object
//! occupies.
//!
//! # Format Structure
//! ```text
//! FORM FOOT
//! └── FORM 0000
//!     ├── INFO   col size, row size, center x, center y (4 × i32)
//!     │          col chunk size, row chunk size (2 × f32), little-endian
//!     └── PRNT   row size rows of col size cell codes + '\0'
//! ```

mod placement;

pub use placement::{CellState, PlacementGrid, MAX_CHUNK_SIZE, MAX_GRID_SIZE, MIN_CHUNK_SIZE, MIN_GRID_SIZE};

use bytes::Bytes;
use holocron_core::Tag;

use crate::binary::{len_i32, ByteReader, ByteWriter, LittleEndian};
use crate::iff::{self, ChildCursor, ChunkNode};
use crate::logging::instrument_parse;
use crate::traits::{ParseError, ParseOptions, ParseResult, Parser, Serializer};

pub const FOOT: Tag = Tag::new(*b"FOOT");
pub const VERSION_0000: Tag = Tag::new(*b"0000");
const INFO: Tag = Tag::new(*b"INFO");
const PRNT: Tag = Tag::new(*b"PRNT");

const INFO_SIZE: usize = 24;

/// Parse a placement grid with default options
pub fn parse_grid(data: &[u8]) -> ParseResult<PlacementGrid> {
    parse_grid_with_options(data, &ParseOptions::default())
}

/// Parse a placement grid
pub fn parse_grid_with_options(data: &[u8], options: &ParseOptions) -> ParseResult<PlacementGrid> {
    let tree = iff::parse_container_with_options(data, options)?;
    let version = iff::open_versioned(&tree, FOOT, &[VERSION_0000])?;

    let mut cursor = ChildCursor::new(version, "FORM FOOT/FORM 0000");
    let info = &cursor.expect_leaf(INFO)?.data;
    let rows = &cursor.expect_leaf(PRNT)?.data;
    cursor.finish()?;

    if info.len() != INFO_SIZE {
        return Err(ParseError::invalid_data(
            0,
            format!("INFO holds {} bytes, expected {INFO_SIZE}", info.len()),
        ));
    }
    let mut reader = ByteReader::new(info);
    let col_size = read_index(&mut reader, "column count")?;
    let row_size = read_index(&mut reader, "row count")?;
    let center_x = read_index(&mut reader, "center x")?;
    let center_y = read_index(&mut reader, "center y")?;
    let col_chunk_size = reader.f32::<LittleEndian>()?;
    let row_chunk_size = reader.f32::<LittleEndian>()?;

    if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&col_size) || !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&row_size) {
        return Err(ParseError::invalid_data(
            0,
            format!("grid of {col_size}x{row_size} cells is outside {MIN_GRID_SIZE}..={MAX_GRID_SIZE}"),
        ));
    }
    tracing::debug!(col_size, row_size, center_x, center_y, "placement grid");

    let mut reader = ByteReader::new(rows);
    let mut cells = Vec::with_capacity(row_size);
    for row in 0..row_size {
        let raw = reader.take(col_size)?;
        let offset = reader.absolute_offset();
        if reader.u8()? != 0 {
            return Err(ParseError::invalid_data(offset, format!("row {row} is not null-terminated")));
        }
        let states = raw
            .iter()
            .enumerate()
            .map(|(col, &b)| {
                CellState::from_byte(b).ok_or_else(|| {
                    ParseError::invalid_data(offset - col_size + col, format!("unknown cell code {:?}", b as char))
                })
            })
            .collect::<ParseResult<Vec<_>>>()?;
        cells.push(states);
    }
    reader.expect_end("PRNT")?;

    PlacementGrid::from_parts(col_size, row_size, center_x, center_y, col_chunk_size, row_chunk_size, cells)
        .map_err(|e| e.with_context("FORM FOOT/FORM 0000 INFO"))
}

fn read_index(reader: &mut ByteReader<'_>, what: &str) -> ParseResult<usize> {
    let offset = reader.absolute_offset();
    let value = reader.i32::<LittleEndian>()?;
    usize::try_from(value).map_err(|_| ParseError::invalid_data(offset, format!("{what} {value} is negative")))
}

/// Build the container tree for a grid
pub fn grid_to_tree(grid: &PlacementGrid) -> ParseResult<ChunkNode> {
    grid.check()?;

    let mut info = ByteWriter::with_capacity(INFO_SIZE);
    info.i32::<LittleEndian>(len_i32(grid.col_size(), "column count")?)
        .i32::<LittleEndian>(len_i32(grid.row_size(), "row count")?)
        .i32::<LittleEndian>(len_i32(grid.center_x(), "center x")?)
        .i32::<LittleEndian>(len_i32(grid.center_y(), "center y")?)
        .f32::<LittleEndian>(grid.col_chunk_size())
        .f32::<LittleEndian>(grid.row_chunk_size());

    let mut rows = ByteWriter::with_capacity(grid.row_size() * (grid.col_size() + 1));
    for row in grid.rows() {
        for cell in row {
            rows.u8(cell.as_byte());
        }
        rows.u8(0);
    }

    Ok(ChunkNode::form(
        FOOT,
        vec![ChunkNode::form(
            VERSION_0000,
            vec![
                ChunkNode::leaf(INFO, Bytes::from(info.into_inner())),
                ChunkNode::leaf(PRNT, Bytes::from(rows.into_inner())),
            ],
        )],
    ))
}

/// Encode a placement grid
pub fn serialize_grid(grid: &PlacementGrid) -> ParseResult<Vec<u8>> {
    iff::serialize_container(&grid_to_tree(grid)?)
}

/// Placement grid codec
#[derive(Debug, Default)]
pub struct GridParser;

impl GridParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for GridParser {
    type Output = PlacementGrid;

    fn extensions(&self) -> &[&str] {
        &["sfp"]
    }

    fn name(&self) -> &str {
        "Placement Grid Parser"
    }

    fn parse_with_options(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Self::Output> {
        instrument_parse(self.name(), data.len(), || parse_grid_with_options(data, options))
    }
}

impl Serializer for GridParser {
    fn serialize(&self, value: &Self::Output) -> ParseResult<Vec<u8>> {
        serialize_grid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(values: [i32; 4], chunks: [f32; 2]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for c in chunks {
            out.extend_from_slice(&c.to_le_bytes());
        }
        out
    }

    fn file(info: Vec<u8>, rows: &[u8]) -> Vec<u8> {
        let tree = ChunkNode::form(
            FOOT,
            vec![ChunkNode::form(
                VERSION_0000,
                vec![ChunkNode::leaf(INFO, info), ChunkNode::leaf(PRNT, rows.to_vec())],
            )],
        );
        iff::serialize_container(&tree).unwrap()
    }

    #[test]
    fn test_parse_known_bytes() {
        let bytes = file(info([3, 2, 1, 0], [2.0, 4.0]), b"HFH\0FFF\0");
        let grid = parse_grid(&bytes).unwrap();
        assert_eq!(grid.col_size(), 3);
        assert_eq!(grid.row_size(), 2);
        assert_eq!(grid.center_x(), 1);
        assert_eq!(grid.to_rows(), vec!["HFH", "FFF"]);
        assert_eq!(grid.total_width(), 6.0);
        assert_eq!(grid.total_height(), 8.0);
        assert_eq!(grid.occupied_count(), 2);

        assert_eq!(serialize_grid(&grid).unwrap(), bytes);
    }

    #[test]
    fn test_roundtrip_after_edits() {
        let mut grid = PlacementGrid::new(4, 3);
        grid.toggle_cell(0, 3).unwrap();
        grid.resize(5, 2);
        grid.set_chunk_size(8.0, 8.0).unwrap();
        grid.set_center(4, 1).unwrap();

        let parsed = parse_grid(&serialize_grid(&grid).unwrap()).unwrap();
        assert_eq!(parsed, grid);
    }

    #[test]
    fn test_missing_terminator() {
        let bytes = file(info([2, 1, 0, 0], [1.0, 1.0]), b"HFX");
        assert!(matches!(parse_grid(&bytes), Err(ParseError::InvalidData { .. })));
    }

    #[test]
    fn test_unknown_cell_code() {
        let bytes = file(info([2, 1, 0, 0], [1.0, 1.0]), b"HZ\0");
        assert!(matches!(parse_grid(&bytes), Err(ParseError::InvalidData { .. })));
    }

    #[test]
    fn test_short_rows() {
        let bytes = file(info([3, 2, 0, 0], [1.0, 1.0]), b"HFH\0");
        assert!(matches!(parse_grid(&bytes), Err(ParseError::TruncatedData { .. })));
    }

    #[test]
    fn test_out_of_range_dimensions() {
        let bytes = file(info([0, 1, 0, 0], [1.0, 1.0]), b"\0");
        assert!(matches!(parse_grid(&bytes), Err(ParseError::InvalidData { .. })));

        let bytes = file(info([-2, 1, 0, 0], [1.0, 1.0]), b"");
        assert!(matches!(parse_grid(&bytes), Err(ParseError::InvalidData { .. })));
    }

    #[test]
    fn test_center_outside_grid() {
        let bytes = file(info([2, 1, 2, 0], [1.0, 1.0]), b"FF\0");
        let err = parse_grid(&bytes).unwrap_err();
        assert!(matches!(err.root_cause(), ParseError::InvalidValue(_)));
    }

    #[test]
    fn test_wrong_info_size() {
        let bytes = file(vec![0u8; 20], b"F\0");
        assert!(matches!(parse_grid(&bytes), Err(ParseError::InvalidData { .. })));
    }

    #[test]
    fn test_wrong_form() {
        let tree = ChunkNode::form(FOOT, vec![ChunkNode::form(Tag::new(*b"0001"), vec![])]);
        assert!(matches!(
            parse_grid(&iff::serialize_container(&tree).unwrap()),
            Err(ParseError::UnrecognizedFormat { .. })
        ));
    }
}

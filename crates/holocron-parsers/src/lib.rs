//! holocron-parsers
//!
//! Binary codecs for chunked game asset formats.
//!
//! # Supported Formats
//!
//! | Format | Extension | Description |
//! |--------|-----------|-------------|
//! | Container | `.iff` | Generic `FORM` chunk tree |
//! | Archive catalog | `.tre` | Table of contents of a compressed archive |
//! | String table | `.stf` | Localized UTF-16 strings |
//! | CRC string table | `.iff` (`FORM CSTB`) | Sorted CRC to path map |
//! | Floor mesh | `.flr` (`FORM FLOR`) | Collision mesh and path graph |
//! | Placement grid | `.sfp` (`FORM FOOT`) | Structure footprint |
//!
//! Codecs work on in-memory buffers only. Parsing is all-or-nothing;
//! every structural problem surfaces as a [`ParseError`].
//!
//! # Example
//!
//! ```rust,ignore
//! use holocron_parsers::{lookup, SortedLookupTable};
//!
//! let mut table = SortedLookupTable::new();
//! table.add_entry("object/tangible/chair.iff")?;
//! let bytes = lookup::serialize_table(&table)?;
//! assert_eq!(lookup::parse_table(&bytes)?, table);
//! ```

pub mod binary;
pub mod crc;
pub mod floor;
pub mod grid;
pub mod iff;
pub mod logging;
pub mod lookup;
pub mod registry;
pub mod stf;
pub mod traits;
pub mod tre;

pub use traits::{ParseError, ParseOptions, ParseResult, Parser, Serializer};

pub use registry::{detect_format, FileFormat, FormatInfo, FORMATS};

pub use crc::engine_crc;
pub use floor::{FloorMesh, FloorParser, GraphType, MeshVersion, PathEdge, PathGraph, PathNode, PathNodeType, Triangle};
pub use grid::{CellState, GridParser, PlacementGrid};
pub use iff::{ChildCursor, ChunkNode, Form, IffParser, Leaf};
pub use lookup::{CrcTableParser, LookupEntry, SortedLookupTable};
pub use stf::{StfParser, StringEntry, StringTable};
pub use tre::{ArchiveCatalog, CatalogHeader, CompressionType, Decompressor, FileRecord, TreParser, ZlibDecompressor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// holocron-parsers/src/iff/mod.rs
//! Container Model
//!
//! Every chunked asset format is wrapped in the same recursive envelope:
//! a four-character tag and a big-endian size, followed either by a
//! form tag and nested children (for `FORM`) or by an opaque payload.
//!
//! # Format Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ "FORM" │ size (u32 BE) │ form tag │ children ...            │
//! │                                  ┌────────────────────────┐ │
//! │                                  │ tag │ size │ payload   │ │
//! │                                  └────────────────────────┘ │
//! │                                  ┌────────────────────────┐ │
//! │                                  │ "FORM" │ size │ tag │ ..│ │
//! │                                  └────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The size field of a container covers its form tag plus every encoded
//! child; there is no padding between chunks. Numeric fields *inside*
//! leaf payloads are interpreted by the owning codec, usually as
//! little-endian.

mod cursor;
mod node;

pub use cursor::ChildCursor;
pub use node::{ChunkNode, Form, Leaf};

use bytes::Bytes;
use holocron_core::Tag;

use crate::binary::{BigEndian, ByteReader, ByteWriter};
use crate::logging::instrument_parse;
use crate::traits::{ParseError, ParseOptions, ParseResult, Parser, Serializer};

/// Container marker
pub const FORM: Tag = Tag::new(*b"FORM");

/// Tags that introduce a nested container
const CONTAINER_MARKERS: &[Tag] = &[FORM];

/// Tag plus size field
pub const HEADER_SIZE: usize = 8;

fn is_container_marker(tag: Tag) -> bool {
    CONTAINER_MARKERS.contains(&tag)
}

/// Parse a complete container tree with default options
pub fn parse_container(data: &[u8]) -> ParseResult<ChunkNode> {
    parse_container_with_options(data, &ParseOptions::default())
}

/// Parse a complete container tree
///
/// The buffer must hold exactly one top-level `FORM`; trailing bytes are
/// rejected.
pub fn parse_container_with_options(data: &[u8], options: &ParseOptions) -> ParseResult<ChunkNode> {
    if data.len() < HEADER_SIZE {
        return Err(ParseError::TruncatedData {
            offset: 0,
            requested: HEADER_SIZE,
            available: data.len(),
        });
    }

    let first = ByteReader::new(data).tag()?;
    if !is_container_marker(first) {
        return Err(ParseError::malformed("offset 0", "FORM", format!("tag {first}")));
    }

    let buffer = Bytes::copy_from_slice(data);
    let (root, end) = parse_node(&buffer, 0, buffer.len(), 0, options)?;
    if end != buffer.len() {
        return Err(ParseError::malformed(
            format!("offset {end}"),
            "end of data",
            format!("{} trailing bytes", buffer.len() - end),
        ));
    }
    Ok(root)
}

/// Parse the node starting at `offset`, which must end at or before `limit`
fn parse_node(
    buffer: &Bytes,
    offset: usize,
    limit: usize,
    depth: u32,
    options: &ParseOptions,
) -> ParseResult<(ChunkNode, usize)> {
    let mut header = ByteReader::with_base(&buffer[offset..limit], offset);
    let tag = header.tag()?;
    let size = header.u32::<BigEndian>()? as usize;

    let start = offset + HEADER_SIZE;
    let available = limit - start;
    if size > available {
        return Err(ParseError::TruncatedData {
            offset: offset + 4,
            requested: size,
            available,
        });
    }
    let end = start + size;

    if !is_container_marker(tag) {
        tracing::trace!(%tag, offset, size, "leaf chunk");
        return Ok((ChunkNode::leaf(tag, buffer.slice(start..end)), end));
    }

    if depth >= options.max_nesting_depth {
        return Err(ParseError::invalid_data(
            offset,
            format!("container nesting exceeds {} levels", options.max_nesting_depth),
        ));
    }
    if size < 4 {
        return Err(ParseError::malformed(
            format!("offset {offset}"),
            "FORM size of at least 4",
            format!("size {size}"),
        ));
    }

    let form_tag = ByteReader::with_base(&buffer[start..end], start).tag()?;
    tracing::trace!(%form_tag, offset, size, "container");

    let mut children = Vec::new();
    let mut cursor = start + 4;
    while cursor < end {
        let (child, next) = parse_node(buffer, cursor, end, depth + 1, options)?;
        children.push(child);
        cursor = next;
    }

    Ok((ChunkNode::form(form_tag, children), end))
}

/// Encode a container tree
///
/// Sizes are computed for the whole tree first (children before their
/// parent), then headers are written outside-in using those sizes.
pub fn serialize_container(node: &ChunkNode) -> ParseResult<Vec<u8>> {
    let mut sizes = Vec::new();
    let payload = measure(node, &mut sizes)?;

    let mut writer = ByteWriter::with_capacity(HEADER_SIZE + payload);
    let mut sizes = sizes.into_iter();
    emit(node, &mut sizes, &mut writer);
    Ok(writer.into_inner())
}

/// Record each node's size field in pre-order; returns this node's size
fn measure(node: &ChunkNode, sizes: &mut Vec<u32>) -> ParseResult<usize> {
    let slot = sizes.len();
    sizes.push(0);

    let size = match node {
        ChunkNode::Leaf(leaf) => leaf.data.len(),
        ChunkNode::Form(form) => {
            let mut total = 4usize;
            for child in &form.children {
                total += HEADER_SIZE + measure(child, sizes)?;
            }
            total
        }
    };

    sizes[slot] = u32::try_from(size).map_err(|_| {
        ParseError::invalid_value(format!("{} is too large to encode ({size} bytes)", node.label()))
    })?;
    Ok(size)
}

fn emit(node: &ChunkNode, sizes: &mut std::vec::IntoIter<u32>, writer: &mut ByteWriter) {
    let size = sizes.next().unwrap_or_default();
    writer.tag(node.tag()).u32::<BigEndian>(size);
    match node {
        ChunkNode::Leaf(leaf) => {
            writer.bytes(&leaf.data);
        }
        ChunkNode::Form(form) => {
            writer.tag(form.form_tag);
            for child in &form.children {
                emit(child, sizes, writer);
            }
        }
    }
}

/// Require `node` to be a `FORM` with the given form tag
pub fn expect_root(node: &ChunkNode, form_tag: Tag) -> ParseResult<&Form> {
    match node {
        ChunkNode::Form(form) if form.form_tag == form_tag => Ok(form),
        other => Err(ParseError::UnrecognizedFormat {
            form: match other {
                ChunkNode::Form(form) => form.form_tag,
                ChunkNode::Leaf(leaf) => leaf.tag,
            },
            version: Tag::new(*b"????"),
        }),
    }
}

/// Open `FORM <form_tag> { FORM <version> { .. } }` and return the version form
///
/// The version form must be the only child of the root and its tag must be
/// one of `known`.
pub fn open_versioned<'a>(node: &'a ChunkNode, form_tag: Tag, known: &[Tag]) -> ParseResult<&'a Form> {
    let root = expect_root(node, form_tag)?;
    let mut cursor = ChildCursor::new(root, format!("FORM {form_tag}"));
    let version = cursor.expect_any_form()?;
    if !known.contains(&version.form_tag) {
        return Err(ParseError::UnrecognizedFormat {
            form: form_tag,
            version: version.form_tag,
        });
    }
    cursor.finish()?;
    tracing::debug!(form = %form_tag, version = %version.form_tag, "schema version");
    Ok(version)
}

/// Generic container parser
///
/// Produces the raw tree for any `FORM`-based file without interpreting
/// leaf payloads.
pub struct IffParser;

impl IffParser {
    /// Create a new container parser
    pub fn new() -> Self {
        Self
    }
}

impl Default for IffParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for IffParser {
    type Output = ChunkNode;

    fn extensions(&self) -> &[&str] {
        &["iff"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&b"FORM"[..])
    }

    fn name(&self) -> &str {
        "Container Parser"
    }

    fn parse_with_options(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Self::Output> {
        instrument_parse(self.name(), data.len(), || parse_container_with_options(data, options))
    }
}

impl Serializer for IffParser {
    fn serialize(&self, value: &Self::Output) -> ParseResult<Vec<u8>> {
        serialize_container(value)
    }
}

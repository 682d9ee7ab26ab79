// holocron-parsers/src/floor/mod.rs
//! Floor Mesh Parser
//!
//! Floor meshes describe the walkable surface of an interior cell as a
//! triangle soup with adjacency, optionally followed by the cell's path
//! graph.
//!
//! # Format Structure
//! ```text
//! FORM FLOR
//! └── FORM 0003 | 0005 | 0006
//!     ├── VERT        vertices, 12 bytes each (3 × f32)
//!     ├── TRIS        triangles, 60 bytes each
//!     ├── FORM BTRE   optional spatial index (kept verbatim)
//!     ├── BEDG        optional boundary edges (kept verbatim)
//!     └── FORM PGRF   optional path graph, 0005 and 0006 only
//! ```
//!
//! In `0006` the `VERT` and `TRIS` payloads begin with an i32 element
//! count. Older versions derive the count from the payload length.
//!
//! Triangle record (little-endian):
//! ```text
//! corners 3×i32 │ index i32 │ neighbours 3×i32 │ normal 3×f32 │
//! edge types 3×u8 │ fallthrough u8 │ part tag i32 │ portal ids 3×i32
//! ```

mod graph;
mod mesh;

pub use graph::{GraphType, PathEdge, PathGraph, PathNode, PathNodeType, DEFAULT_NODE_RADIUS};
pub use mesh::{FloorMesh, MeshVersion, Triangle, EMPTY_MESH_BOUNDS, NO_INDEX};

use bytes::Bytes;
use holocron_core::{Tag, Vec3};

use crate::binary::{len_i32, ByteReader, ByteWriter, LittleEndian};
use crate::iff::{self, ChildCursor, ChunkNode};
use crate::logging::instrument_parse;
use crate::traits::{ParseError, ParseOptions, ParseResult, Parser, Serializer};

pub const FLOR: Tag = Tag::new(*b"FLOR");
const VERT: Tag = Tag::new(*b"VERT");
const TRIS: Tag = Tag::new(*b"TRIS");
const BTRE: Tag = Tag::new(*b"BTRE");
const BEDG: Tag = Tag::new(*b"BEDG");

const VERTEX_SIZE: usize = 12;
const TRIANGLE_SIZE: usize = 60;

/// Parse a floor mesh with default options
pub fn parse_mesh(data: &[u8]) -> ParseResult<FloorMesh> {
    parse_mesh_with_options(data, &ParseOptions::default())
}

/// Parse a floor mesh
pub fn parse_mesh_with_options(data: &[u8], options: &ParseOptions) -> ParseResult<FloorMesh> {
    let tree = iff::parse_container_with_options(data, options)?;
    let known = MeshVersion::ALL.map(MeshVersion::tag);
    let version_form = iff::open_versioned(&tree, FLOR, &known)?;
    let version = MeshVersion::from_tag(version_form.form_tag).ok_or(ParseError::UnrecognizedFormat {
        form: FLOR,
        version: version_form.form_tag,
    })?;

    let path = format!("FORM FLOR/FORM {version}");
    let mut cursor = ChildCursor::new(version_form, path.clone());

    let vertices = read_vertices(&cursor.expect_leaf(VERT)?.data, version).map_err(|e| e.with_context("VERT"))?;
    let triangles =
        read_triangles(&cursor.expect_leaf(TRIS)?.data, version).map_err(|e| e.with_context("TRIS"))?;

    let box_tree = if cursor.next_is_form(BTRE) {
        Some(cursor.expect_form(BTRE)?.clone())
    } else {
        None
    };
    let boundary_edges = if cursor.next_is_leaf(BEDG) {
        Some(cursor.expect_leaf(BEDG)?.data.clone())
    } else {
        None
    };
    // Anything left in an 0003 mesh, a graph included, is rejected by finish()
    let path_graph = if version.supports_path_graph() && cursor.next_is_form(graph::PGRF) {
        Some(graph::read_graph(cursor.expect_form(graph::PGRF)?, options)?)
    } else {
        None
    };
    cursor.finish()?;

    let mesh = FloorMesh {
        version,
        vertices,
        triangles,
        box_tree,
        boundary_edges,
        path_graph,
    };
    tracing::debug!(
        %version,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        graph = mesh.path_graph.is_some(),
        "floor mesh"
    );

    if options.strict_validation {
        mesh.validate().map_err(|e| e.with_context(path))?;
    }
    Ok(mesh)
}

/// Number of fixed-size records in a `VERT`/`TRIS` payload
fn record_count(reader: &mut ByteReader<'_>, version: MeshVersion, record_size: usize) -> ParseResult<usize> {
    if version.has_count_prefix() {
        return reader.count::<LittleEndian>(record_size);
    }
    let len = reader.remaining();
    if len % record_size != 0 {
        return Err(ParseError::invalid_data(
            0,
            format!("{len} bytes is not a whole number of {record_size}-byte records"),
        ));
    }
    Ok(len / record_size)
}

fn read_vec3(reader: &mut ByteReader<'_>) -> ParseResult<Vec3> {
    Ok(Vec3::new(
        reader.f32::<LittleEndian>()?,
        reader.f32::<LittleEndian>()?,
        reader.f32::<LittleEndian>()?,
    ))
}

fn read_i32x3(reader: &mut ByteReader<'_>) -> ParseResult<[i32; 3]> {
    Ok([
        reader.i32::<LittleEndian>()?,
        reader.i32::<LittleEndian>()?,
        reader.i32::<LittleEndian>()?,
    ])
}

fn read_vertices(data: &[u8], version: MeshVersion) -> ParseResult<Vec<Vec3>> {
    let mut reader = ByteReader::new(data);
    let count = record_count(&mut reader, version, VERTEX_SIZE)?;
    let vertices = (0..count).map(|_| read_vec3(&mut reader)).collect::<ParseResult<Vec<_>>>()?;
    reader.expect_end("vertices")?;
    Ok(vertices)
}

fn read_triangles(data: &[u8], version: MeshVersion) -> ParseResult<Vec<Triangle>> {
    let mut reader = ByteReader::new(data);
    let count = record_count(&mut reader, version, TRIANGLE_SIZE)?;
    let mut triangles = Vec::with_capacity(count);

    for _ in 0..count {
        let corners = read_i32x3(&mut reader)?;
        let index = reader.i32::<LittleEndian>()?;
        let neighbors = read_i32x3(&mut reader)?;
        let normal = read_vec3(&mut reader)?;
        let edge_types = [reader.u8()?, reader.u8()?, reader.u8()?];

        let flag_offset = reader.absolute_offset();
        let fallthrough = match reader.u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(ParseError::invalid_data(
                    flag_offset,
                    format!("fallthrough flag must be 0 or 1, found {other}"),
                ))
            }
        };

        triangles.push(Triangle {
            corners,
            index,
            neighbors,
            normal,
            edge_types,
            fallthrough,
            part_tag: reader.i32::<LittleEndian>()?,
            portal_ids: read_i32x3(&mut reader)?,
        });
    }

    reader.expect_end("triangles")?;
    Ok(triangles)
}

/// Build the container tree for a mesh using its version's layout rules
pub fn mesh_to_tree(mesh: &FloorMesh) -> ParseResult<ChunkNode> {
    if mesh.path_graph.is_some() && !mesh.version.supports_path_graph() {
        return Err(ParseError::invalid_value(format!(
            "version {} cannot carry a path graph",
            mesh.version
        )));
    }
    let prefixed = mesh.version.has_count_prefix();

    let mut vert = ByteWriter::with_capacity(4 + mesh.vertices.len() * VERTEX_SIZE);
    if prefixed {
        vert.i32::<LittleEndian>(len_i32(mesh.vertices.len(), "vertex count")?);
    }
    for v in &mesh.vertices {
        vert.f32::<LittleEndian>(v.x).f32::<LittleEndian>(v.y).f32::<LittleEndian>(v.z);
    }

    let mut tris = ByteWriter::with_capacity(4 + mesh.triangles.len() * TRIANGLE_SIZE);
    if prefixed {
        tris.i32::<LittleEndian>(len_i32(mesh.triangles.len(), "triangle count")?);
    }
    for t in &mesh.triangles {
        for corner in t.corners {
            tris.i32::<LittleEndian>(corner);
        }
        tris.i32::<LittleEndian>(t.index);
        for neighbor in t.neighbors {
            tris.i32::<LittleEndian>(neighbor);
        }
        tris.f32::<LittleEndian>(t.normal.x)
            .f32::<LittleEndian>(t.normal.y)
            .f32::<LittleEndian>(t.normal.z)
            .bytes(&t.edge_types)
            .u8(u8::from(t.fallthrough))
            .i32::<LittleEndian>(t.part_tag);
        for portal in t.portal_ids {
            tris.i32::<LittleEndian>(portal);
        }
    }

    let mut children = vec![
        ChunkNode::leaf(VERT, Bytes::from(vert.into_inner())),
        ChunkNode::leaf(TRIS, Bytes::from(tris.into_inner())),
    ];
    if let Some(box_tree) = &mesh.box_tree {
        children.push(ChunkNode::Form(box_tree.clone()));
    }
    if let Some(edges) = &mesh.boundary_edges {
        children.push(ChunkNode::leaf(BEDG, edges.clone()));
    }
    if let Some(path_graph) = &mesh.path_graph {
        children.push(graph::graph_to_tree(path_graph)?);
    }

    Ok(ChunkNode::form(FLOR, vec![ChunkNode::form(mesh.version.tag(), children)]))
}

/// Encode a floor mesh
pub fn serialize_mesh(mesh: &FloorMesh) -> ParseResult<Vec<u8>> {
    iff::serialize_container(&mesh_to_tree(mesh)?)
}

/// Floor mesh codec
#[derive(Debug, Default)]
pub struct FloorParser;

impl FloorParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for FloorParser {
    type Output = FloorMesh;

    fn extensions(&self) -> &[&str] {
        &["flr"]
    }

    fn name(&self) -> &str {
        "Floor Mesh Parser"
    }

    fn parse_with_options(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Self::Output> {
        instrument_parse(self.name(), data.len(), || parse_mesh_with_options(data, options))
    }
}

impl Serializer for FloorParser {
    fn serialize(&self, value: &Self::Output) -> ParseResult<Vec<u8>> {
        serialize_mesh(value)
    }
}

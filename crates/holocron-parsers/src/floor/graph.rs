// holocron-parsers/src/floor/graph.rs
//! Navigation graph embedded in floor meshes
//!
//! ```text
//! FORM PGRF
//! └── FORM 0001
//!     ├── META   graph type (i32)
//!     ├── PNOD   count (i32) + count × 32-byte nodes
//!     ├── PEDG   count (i32) + count × 16-byte edges
//!     ├── ECNT   count (i32) + count × edge count (i32)
//!     └── ESTR   count (i32) + count × first edge (i32)
//! ```
//!
//! Edges are stored grouped by source node; `ECNT`/`ESTR` give each
//! node's slice of the edge array.

use bytes::Bytes;
use holocron_core::{Tag, Vec3};
use serde::{Deserialize, Serialize};

use crate::binary::{len_i32, ByteReader, ByteWriter, LittleEndian};
use crate::iff::{ChildCursor, ChunkNode, Form};
use crate::traits::{ParseError, ParseOptions, ParseResult};

pub const PGRF: Tag = Tag::new(*b"PGRF");
const VERSION_0001: Tag = Tag::new(*b"0001");
const META: Tag = Tag::new(*b"META");
const PNOD: Tag = Tag::new(*b"PNOD");
const PEDG: Tag = Tag::new(*b"PEDG");
const ECNT: Tag = Tag::new(*b"ECNT");
const ESTR: Tag = Tag::new(*b"ESTR");

const NODE_SIZE: usize = 32;
const EDGE_SIZE: usize = 16;

/// Radius given to nodes stored with radius 0
pub const DEFAULT_NODE_RADIUS: f32 = 0.5;

/// Scope of a path graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphType {
    Cell,
    Building,
    City,
    None,
}

impl GraphType {
    pub const fn code(self) -> i32 {
        match self {
            GraphType::Cell => 0,
            GraphType::Building => 1,
            GraphType::City => 2,
            GraphType::None => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(GraphType::Cell),
            1 => Some(GraphType::Building),
            2 => Some(GraphType::City),
            3 => Some(GraphType::None),
            _ => None,
        }
    }
}

/// Role of a node; which roles make sense depends on the graph type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathNodeType {
    CellPortal = 0,
    CellWaypoint = 1,
    CellPoi = 2,
    BuildingEntrance = 3,
    BuildingCell = 4,
    BuildingPortal = 5,
    CityBuildingEntrance = 6,
    CityWaypoint = 7,
    CityPoi = 8,
    CityBuilding = 9,
    CityEntrance = 10,
    BuildingCellPart = 11,
}

impl PathNodeType {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => PathNodeType::CellPortal,
            1 => PathNodeType::CellWaypoint,
            2 => PathNodeType::CellPoi,
            3 => PathNodeType::BuildingEntrance,
            4 => PathNodeType::BuildingCell,
            5 => PathNodeType::BuildingPortal,
            6 => PathNodeType::CityBuildingEntrance,
            7 => PathNodeType::CityWaypoint,
            8 => PathNodeType::CityPoi,
            9 => PathNodeType::CityBuilding,
            10 => PathNodeType::CityEntrance,
            11 => PathNodeType::BuildingCellPart,
            _ => return None,
        })
    }

    /// Graph type this node role belongs to
    pub fn graph_type(self) -> GraphType {
        match self {
            PathNodeType::CellPortal | PathNodeType::CellWaypoint | PathNodeType::CellPoi => GraphType::Cell,
            PathNodeType::BuildingEntrance
            | PathNodeType::BuildingCell
            | PathNodeType::BuildingPortal
            | PathNodeType::BuildingCellPart => GraphType::Building,
            PathNodeType::CityBuildingEntrance
            | PathNodeType::CityWaypoint
            | PathNodeType::CityPoi
            | PathNodeType::CityBuilding
            | PathNodeType::CityEntrance => GraphType::City,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    /// Position in the node list
    pub id: i32,
    /// Secondary id, e.g. the portal or cell this node stands for
    pub secondary_id: i32,
    pub global_id: i32,
    pub node_type: PathNodeType,
    pub position: Vec3,
    /// Radius in meters
    ///
    /// A stored radius of 0 reads back as [`DEFAULT_NODE_RADIUS`], so a node
    /// built with radius 0 does not survive a write and reload unchanged.
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathEdge {
    pub from: i32,
    pub to: i32,
    pub lane_width_right: f32,
    pub lane_width_left: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathGraph {
    pub graph_type: GraphType,
    pub nodes: Vec<PathNode>,
    pub edges: Vec<PathEdge>,
    /// Outgoing edge count per node
    pub edge_counts: Vec<i32>,
    /// Index of each node's first outgoing edge
    pub edge_starts: Vec<i32>,
}

impl PathGraph {
    pub fn new(graph_type: GraphType) -> Self {
        Self {
            graph_type,
            nodes: Vec::new(),
            edges: Vec::new(),
            edge_counts: Vec::new(),
            edge_starts: Vec::new(),
        }
    }

    /// Outgoing edges of `node`; empty when the index or its adjacency
    /// entry is out of range
    pub fn edges_of(&self, node: usize) -> &[PathEdge] {
        let (Some(&start), Some(&count)) = (self.edge_starts.get(node), self.edge_counts.get(node)) else {
            return &[];
        };
        let (Ok(start), Ok(count)) = (usize::try_from(start), usize::try_from(count)) else {
            return &[];
        };
        start
            .checked_add(count)
            .and_then(|end| self.edges.get(start..end))
            .unwrap_or(&[])
    }

    /// Rebuild `edge_counts`/`edge_starts` from the edge list
    ///
    /// Edges must already be grouped by source node in ascending order.
    pub fn rebuild_adjacency(&mut self) -> ParseResult<()> {
        let mut counts = vec![0i32; self.nodes.len()];
        let mut starts = vec![0i32; self.nodes.len()];
        let mut last_from = -1;

        for (idx, edge) in self.edges.iter().enumerate() {
            let from = usize::try_from(edge.from)
                .ok()
                .filter(|&f| f < counts.len())
                .ok_or_else(|| ParseError::invalid_value(format!("edge {idx} starts at unknown node {}", edge.from)))?;
            if edge.from < last_from {
                return Err(ParseError::invalid_value(format!("edge {idx} is not grouped by source node")));
            }
            if edge.from != last_from {
                starts[from] = len_i32(idx, "edge index")?;
                last_from = edge.from;
            }
            counts[from] += 1;
        }

        self.edge_counts = counts;
        self.edge_starts = starts;
        Ok(())
    }

    /// Check array lengths and, when `strict`, every cross-reference
    pub fn validate(&self, strict: bool) -> ParseResult<()> {
        if self.edge_counts.len() != self.nodes.len() || self.edge_starts.len() != self.nodes.len() {
            return Err(ParseError::invalid_value(format!(
                "adjacency arrays have {} counts and {} starts for {} nodes",
                self.edge_counts.len(),
                self.edge_starts.len(),
                self.nodes.len()
            )));
        }
        if !strict {
            return Ok(());
        }

        let node_count = self.nodes.len() as i64;
        for (idx, edge) in self.edges.iter().enumerate() {
            for end in [edge.from, edge.to] {
                if !(0..node_count).contains(&i64::from(end)) {
                    return Err(ParseError::invalid_value(format!(
                        "edge {idx} refers to node {end} of {node_count}"
                    )));
                }
            }
        }

        let edge_count = self.edges.len() as i64;
        for (node, (&start, &count)) in self.edge_starts.iter().zip(&self.edge_counts).enumerate() {
            let (start, count) = (i64::from(start), i64::from(count));
            if start < 0 || count < 0 || start + count > edge_count {
                return Err(ParseError::invalid_value(format!(
                    "node {node} edge range {start}+{count} exceeds {edge_count} edges"
                )));
            }
        }
        Ok(())
    }
}

/// Decode a `FORM PGRF`
pub(crate) fn read_graph(form: &Form, options: &ParseOptions) -> ParseResult<PathGraph> {
    let mut outer = ChildCursor::new(form, "FORM PGRF");
    let version = outer.expect_any_form()?;
    if version.form_tag != VERSION_0001 {
        return Err(ParseError::UnrecognizedFormat {
            form: PGRF,
            version: version.form_tag,
        });
    }
    outer.finish()?;

    let mut cursor = ChildCursor::new(version, "FORM PGRF/FORM 0001");

    let mut meta = ByteReader::new(&cursor.expect_leaf(META)?.data);
    let code = meta.i32::<LittleEndian>()?;
    meta.expect_end("META")?;
    let graph_type =
        GraphType::from_code(code).ok_or_else(|| ParseError::invalid_data(0, format!("unknown graph type {code}")))?;

    let nodes = read_nodes(&cursor.expect_leaf(PNOD)?.data)?;
    let edges = read_edges(&cursor.expect_leaf(PEDG)?.data)?;
    let edge_counts = read_i32_array(&cursor.expect_leaf(ECNT)?.data, "ECNT")?;
    let edge_starts = read_i32_array(&cursor.expect_leaf(ESTR)?.data, "ESTR")?;
    cursor.finish()?;

    let graph = PathGraph {
        graph_type,
        nodes,
        edges,
        edge_counts,
        edge_starts,
    };
    tracing::debug!(
        graph_type = ?graph.graph_type,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "path graph"
    );

    graph.validate(options.strict_validation).map_err(|e| e.with_context("FORM PGRF"))?;
    Ok(graph)
}

fn read_nodes(data: &[u8]) -> ParseResult<Vec<PathNode>> {
    let mut reader = ByteReader::new(data);
    let count = reader.count::<LittleEndian>(NODE_SIZE)?;
    let mut nodes = Vec::with_capacity(count);

    for _ in 0..count {
        let offset = reader.absolute_offset();
        let id = reader.i32::<LittleEndian>()?;
        let secondary_id = reader.i32::<LittleEndian>()?;
        let global_id = reader.i32::<LittleEndian>()?;
        let code = reader.i32::<LittleEndian>()?;
        let node_type = PathNodeType::from_code(code)
            .ok_or_else(|| ParseError::invalid_data(offset, format!("unknown path node type {code}")))?;
        let position = Vec3::new(
            reader.f32::<LittleEndian>()?,
            reader.f32::<LittleEndian>()?,
            reader.f32::<LittleEndian>()?,
        );
        let radius = match reader.f32::<LittleEndian>()? {
            r if r == 0.0 => DEFAULT_NODE_RADIUS,
            r => r,
        };

        nodes.push(PathNode {
            id,
            secondary_id,
            global_id,
            node_type,
            position,
            radius,
        });
    }

    reader.expect_end("PNOD")?;
    Ok(nodes)
}

fn read_edges(data: &[u8]) -> ParseResult<Vec<PathEdge>> {
    let mut reader = ByteReader::new(data);
    let count = reader.count::<LittleEndian>(EDGE_SIZE)?;
    let mut edges = Vec::with_capacity(count);

    for _ in 0..count {
        edges.push(PathEdge {
            from: reader.i32::<LittleEndian>()?,
            to: reader.i32::<LittleEndian>()?,
            lane_width_right: reader.f32::<LittleEndian>()?,
            lane_width_left: reader.f32::<LittleEndian>()?,
        });
    }

    reader.expect_end("PEDG")?;
    Ok(edges)
}

fn read_i32_array(data: &[u8], what: &str) -> ParseResult<Vec<i32>> {
    let mut reader = ByteReader::new(data);
    let count = reader.count::<LittleEndian>(4)?;
    let values = (0..count)
        .map(|_| reader.i32::<LittleEndian>())
        .collect::<ParseResult<Vec<_>>>()?;
    reader.expect_end(what)?;
    Ok(values)
}

/// Encode a graph as `FORM PGRF`
pub(crate) fn graph_to_tree(graph: &PathGraph) -> ParseResult<ChunkNode> {
    graph.validate(false)?;

    let mut meta = ByteWriter::with_capacity(4);
    meta.i32::<LittleEndian>(graph.graph_type.code());

    let mut nodes = ByteWriter::with_capacity(4 + graph.nodes.len() * NODE_SIZE);
    nodes.i32::<LittleEndian>(len_i32(graph.nodes.len(), "node count")?);
    for node in &graph.nodes {
        nodes
            .i32::<LittleEndian>(node.id)
            .i32::<LittleEndian>(node.secondary_id)
            .i32::<LittleEndian>(node.global_id)
            .i32::<LittleEndian>(node.node_type.code())
            .f32::<LittleEndian>(node.position.x)
            .f32::<LittleEndian>(node.position.y)
            .f32::<LittleEndian>(node.position.z)
            .f32::<LittleEndian>(node.radius);
    }

    let mut edges = ByteWriter::with_capacity(4 + graph.edges.len() * EDGE_SIZE);
    edges.i32::<LittleEndian>(len_i32(graph.edges.len(), "edge count")?);
    for edge in &graph.edges {
        edges
            .i32::<LittleEndian>(edge.from)
            .i32::<LittleEndian>(edge.to)
            .f32::<LittleEndian>(edge.lane_width_right)
            .f32::<LittleEndian>(edge.lane_width_left);
    }

    Ok(ChunkNode::form(
        PGRF,
        vec![ChunkNode::form(
            VERSION_0001,
            vec![
                ChunkNode::leaf(META, Bytes::from(meta.into_inner())),
                ChunkNode::leaf(PNOD, Bytes::from(nodes.into_inner())),
                ChunkNode::leaf(PEDG, Bytes::from(edges.into_inner())),
                ChunkNode::leaf(ECNT, write_i32_array(&graph.edge_counts)?),
                ChunkNode::leaf(ESTR, write_i32_array(&graph.edge_starts)?),
            ],
        )],
    ))
}

fn write_i32_array(values: &[i32]) -> ParseResult<Bytes> {
    let mut writer = ByteWriter::with_capacity(4 + values.len() * 4);
    writer.i32::<LittleEndian>(len_i32(values.len(), "array length")?);
    for &value in values {
        writer.i32::<LittleEndian>(value);
    }
    Ok(Bytes::from(writer.into_inner()))
}

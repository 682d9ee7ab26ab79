// holocron-parsers/src/floor/mesh.rs
//! Floor mesh data structures

use bytes::Bytes;
use holocron_core::{Bounds, Tag, Vec3};
use serde::{Deserialize, Serialize};

use super::graph::PathGraph;
use crate::iff::Form;
use crate::traits::{ParseError, ParseResult};

/// Index value meaning "no neighbour" or "no portal"
pub const NO_INDEX: i32 = -1;

/// Bounds reported for a mesh without vertices
pub const EMPTY_MESH_BOUNDS: Bounds = Bounds::new(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(10.0, 0.0, 10.0));

/// Known floor mesh schema versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshVersion {
    V0003,
    V0005,
    V0006,
}

impl MeshVersion {
    pub const ALL: [MeshVersion; 3] = [MeshVersion::V0003, MeshVersion::V0005, MeshVersion::V0006];

    pub const fn tag(self) -> Tag {
        match self {
            MeshVersion::V0003 => Tag::new(*b"0003"),
            MeshVersion::V0005 => Tag::new(*b"0005"),
            MeshVersion::V0006 => Tag::new(*b"0006"),
        }
    }

    pub fn from_tag(tag: Tag) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.tag() == tag)
    }

    /// Whether `VERT`/`TRIS` start with an explicit element count
    pub const fn has_count_prefix(self) -> bool {
        matches!(self, MeshVersion::V0006)
    }

    /// Whether a path graph may follow the geometry
    pub const fn supports_path_graph(self) -> bool {
        matches!(self, MeshVersion::V0005 | MeshVersion::V0006)
    }
}

impl std::fmt::Display for MeshVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One collision triangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    /// Vertex indices
    pub corners: [i32; 3],
    /// Face index
    pub index: i32,
    /// Adjacent triangle across each edge, or [`NO_INDEX`]
    pub neighbors: [i32; 3],
    pub normal: Vec3,
    pub edge_types: [u8; 3],
    pub fallthrough: bool,
    pub part_tag: i32,
    /// Portal crossed by each edge, or [`NO_INDEX`]
    pub portal_ids: [i32; 3],
}

impl Triangle {
    /// Triangle over three vertices with no neighbours or portals
    pub fn new(corners: [i32; 3], index: i32) -> Self {
        Self {
            corners,
            index,
            neighbors: [NO_INDEX; 3],
            normal: Vec3::UP,
            edge_types: [0; 3],
            fallthrough: false,
            part_tag: NO_INDEX,
            portal_ids: [NO_INDEX; 3],
        }
    }
}

/// A floor collision mesh with its optional navigation graph
#[derive(Debug, Clone, PartialEq)]
pub struct FloorMesh {
    pub version: MeshVersion,
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<Triangle>,
    /// `FORM BTRE` spatial index, kept as read
    pub box_tree: Option<Form>,
    /// `BEDG` boundary edge payload, kept as read
    pub boundary_edges: Option<Bytes>,
    pub path_graph: Option<PathGraph>,
}

impl FloorMesh {
    /// Create an empty mesh
    pub fn new(version: MeshVersion) -> Self {
        Self {
            version,
            vertices: Vec::new(),
            triangles: Vec::new(),
            box_tree: None,
            boundary_edges: None,
            path_graph: None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Axis-aligned bounds of all vertices
    ///
    /// A mesh without vertices reports [`EMPTY_MESH_BOUNDS`].
    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&self.vertices).unwrap_or(EMPTY_MESH_BOUNDS)
    }

    /// Check triangle indices against the vertex and triangle lists
    pub fn validate(&self) -> ParseResult<()> {
        let vertex_count = self.vertices.len() as i64;
        let triangle_count = self.triangles.len() as i64;

        for (idx, triangle) in self.triangles.iter().enumerate() {
            for &corner in &triangle.corners {
                if !(0..vertex_count).contains(&i64::from(corner)) {
                    return Err(ParseError::invalid_value(format!(
                        "triangle {idx} uses vertex {corner} of {vertex_count}"
                    )));
                }
            }
            for &neighbor in &triangle.neighbors {
                if neighbor != NO_INDEX && !(0..triangle_count).contains(&i64::from(neighbor)) {
                    return Err(ParseError::invalid_value(format!(
                        "triangle {idx} has neighbour {neighbor} of {triangle_count}"
                    )));
                }
            }
        }

        if let Some(graph) = &self.path_graph {
            if !self.version.supports_path_graph() {
                return Err(ParseError::invalid_value(format!(
                    "version {} cannot carry a path graph",
                    self.version
                )));
            }
            graph.validate(true)?;
        }
        Ok(())
    }
}

//! Integration tests for the holocron codecs
//!
//! These tests exercise the public API end to end:
//! - Container trees survive an encode/decode cycle
//! - Archive catalogs with zlib-compressed blocks
//! - String table numbering and byte-exact reserialization
//! - CRC lookup table ordering under edits
//! - Floor meshes and path graphs
//! - Placement grid editing

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use holocron_core::{Tag, Vec3};
use holocron_parsers::floor::{self, NO_INDEX};
use holocron_parsers::stf::DEFAULT_KEY;
use holocron_parsers::traits::{ParseError, ParseOptions};
use holocron_parsers::tre::{self, CompressionType, Decompressor};
use holocron_parsers::{
    engine_crc, grid, iff, lookup, stf, CellState, ChunkNode, FloorMesh, GraphType, MeshVersion, PathEdge, PathGraph,
    PathNode, PathNodeType, PlacementGrid, SortedLookupTable, StringEntry, StringTable, Triangle,
};

fn tag(text: &str) -> Tag {
    text.parse().unwrap()
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Build an archive whose record and name blocks are zlib-compressed
fn compressed_archive(paths: &[&str]) -> Vec<u8> {
    let mut names = Vec::new();
    let mut records = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        let name_offset = names.len() as u32;
        names.extend_from_slice(path.as_bytes());
        names.push(0);
        let compressed = if i % 2 == 0 { 2 } else { 0 };
        for value in [engine_crc(path), 100 + i as u32, 36, compressed, 40, name_offset] {
            records.extend_from_slice(&value.to_le_bytes());
        }
    }
    let packed_records = zlib(&records);
    let packed_names = zlib(&names);

    let mut data = Vec::new();
    data.extend_from_slice(b"EERT5000");
    for value in [
        paths.len() as u32,
        36,
        2,
        packed_records.len() as u32,
        2,
        packed_names.len() as u32,
        names.len() as u32,
    ] {
        data.extend_from_slice(&value.to_le_bytes());
    }
    data.extend_from_slice(&packed_records);
    data.extend_from_slice(&packed_names);
    data
}

mod container_tests {
    use super::*;

    #[test]
    fn test_nested_sizes() {
        let tree = ChunkNode::form(
            tag("TEST"),
            vec![
                ChunkNode::form(tag("0001"), vec![ChunkNode::leaf(tag("DATA"), vec![1u8, 2, 3, 4, 5])]),
                ChunkNode::leaf(tag("NAME"), b"abc".to_vec()),
            ],
        );
        let bytes = iff::serialize_container(&tree).unwrap();

        assert_eq!(&bytes[0..4], b"FORM");
        assert_eq!(u32::from_be_bytes(bytes[4..8].try_into().unwrap()), 40);
        assert_eq!(&bytes[12..16], b"FORM");
        assert_eq!(u32::from_be_bytes(bytes[16..20].try_into().unwrap()), 17);
        assert_eq!(bytes.len(), 48);
        assert_eq!(iff::parse_container(&bytes).unwrap(), tree);
    }

    #[test]
    fn test_child_overrun_is_truncation() {
        let tree = ChunkNode::form(tag("TEST"), vec![ChunkNode::leaf(tag("DATA"), vec![0u8; 8])]);
        let mut bytes = iff::serialize_container(&tree).unwrap();
        // inflate the leaf size past the end of its parent
        bytes[16..20].copy_from_slice(&64u32.to_be_bytes());
        assert!(matches!(
            iff::parse_container(&bytes),
            Err(ParseError::TruncatedData { .. })
        ));
    }

    #[test]
    fn test_leaf_root_rejected() {
        let bytes = [b'D', b'A', b'T', b'A', 0, 0, 0, 0];
        assert!(matches!(
            iff::parse_container(&bytes),
            Err(ParseError::MalformedContainer { .. })
        ));
    }
}

mod archive_tests {
    use super::*;

    #[test]
    fn test_compressed_catalog() {
        let paths = ["object/b.iff", "appearance/a.msh", "object/c.iff"];
        let catalog = tre::read_catalog(&compressed_archive(&paths)).unwrap();

        assert_eq!(catalog.header.version, "0005");
        assert_eq!(catalog.header.records.compression, CompressionType::Zlib);
        assert_eq!(catalog.len(), 3);
        for (record, path) in catalog.records().iter().zip(paths) {
            assert_eq!(record.path, path);
            assert!(record.crc_matches_path());
        }
        assert_eq!(catalog.records()[0].compression, CompressionType::Zlib);
        assert_eq!(catalog.records()[1].compression, CompressionType::None);

        let sorted: Vec<_> = catalog.records_sorted_by_path().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(sorted, ["appearance/a.msh", "object/b.iff", "object/c.iff"]);
        assert_eq!(catalog.find("object/*.iff").len(), 2);
    }

    #[test]
    fn test_injected_decompressor() {
        let calls = AtomicUsize::new(0);
        let counting = |data: &[u8], expected: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
            tre::ZlibDecompressor.inflate(data, expected)
        };
        let catalog = tre::read_catalog_with(&compressed_archive(&["a.iff"]), &counting, &ParseOptions::default())
            .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_size_mismatch_is_decompression_failure() {
        let mut data = compressed_archive(&["a.iff", "b.iff"]);
        // claim a longer name block than the stream inflates to
        data[32..36].copy_from_slice(&99u32.to_le_bytes());
        let err = tre::read_catalog(&data).unwrap_err();
        assert!(matches!(err.root_cause(), ParseError::DecompressionFailed(_)));
    }
}

mod string_table_tests {
    use super::*;

    /// Two entries with preserved numbering, laid out by hand
    fn two_entry_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0xABCDu32.to_le_bytes());
        data.push(1);
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        for (index, key, value) in [(1u32, 7u32, "Hi"), (2, 8, "Yo")] {
            data.extend_from_slice(&index.to_le_bytes());
            data.extend_from_slice(&key.to_le_bytes());
            data.extend_from_slice(&(value.len() as u32).to_le_bytes());
            for unit in value.encode_utf16() {
                data.extend_from_slice(&unit.to_le_bytes());
            }
        }
        for (index, id) in [(1u32, "greeting"), (2, "farewell")] {
            data.extend_from_slice(&index.to_le_bytes());
            data.extend_from_slice(&(id.len() as u32).to_le_bytes());
            data.extend_from_slice(id.as_bytes());
        }
        data
    }

    #[test]
    fn test_exact_reserialization() {
        let data = two_entry_bytes();
        let table = stf::parse_table(&data).unwrap();
        assert_eq!(table.next_uid, 3);
        assert_eq!(table.get("farewell").unwrap().value, "Yo");
        assert_eq!(table.get("greeting").unwrap().original_key, Some(7));
        assert_eq!(stf::serialize_table(&table).unwrap(), data);
    }

    #[test]
    fn test_added_entries_numbered_after_existing() {
        let mut table = stf::parse_table(&two_entry_bytes()).unwrap();
        let added = table.add_entries([StringEntry::new("extra", "More"), StringEntry::new("greeting", "dup")]);
        assert_eq!(added, 1);

        let reparsed = stf::parse_table(&stf::serialize_table(&table).unwrap()).unwrap();
        let extra = reparsed.get("extra").unwrap();
        assert_eq!(extra.original_index, Some(3));
        assert_eq!(extra.original_key, Some(DEFAULT_KEY));
        assert_eq!(reparsed.get("greeting").unwrap().value, "Hi");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut data = two_entry_bytes();
        let len = data.len();
        data[len - 8..].copy_from_slice(b"greeting");
        assert!(stf::parse_table(&data).unwrap_err().is_duplicate_key());
    }
}

mod lookup_tests {
    use super::*;

    #[test]
    fn test_literal_layout() {
        let mut table = SortedLookupTable::new();
        table.insert_entry(0x10, "b.iff".into()).unwrap();
        table.insert_entry(0x05, "a.iff".into()).unwrap();

        let tree = lookup::table_to_tree(&table).unwrap();
        let body = tree.as_form().unwrap().find_form(lookup::VERSION_0000).unwrap();
        let crct = body.find_leaf(tag("CRCT")).unwrap();
        assert_eq!(&crct.data[..], &[0x05, 0, 0, 0, 0x10, 0, 0, 0]);
        let strt = body.find_leaf(tag("STRT")).unwrap();
        assert_eq!(&strt.data[..], &[0, 0, 0, 0, 6, 0, 0, 0]);
        let stng = body.find_leaf(tag("STNG")).unwrap();
        assert_eq!(&stng.data[..], b"a.iff\0b.iff\0");
    }

    #[test]
    fn test_duplicate_insert_leaves_table_unchanged() {
        let mut table = SortedLookupTable::new();
        table.add_entry("object/a.iff").unwrap();
        let before = table.clone();

        let err = table.add_entry("object/a.iff").unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(table, before);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut table = SortedLookupTable::new();
        table.add_entry("x.iff").unwrap();
        assert!(table.delete_entry(engine_crc("y.iff")).is_none());
        assert_eq!(table.len(), 1);
    }
}

mod floor_tests {
    use super::*;

    fn graph() -> PathGraph {
        let mut graph = PathGraph::new(GraphType::Building);
        graph.nodes = (0..3)
            .map(|i| PathNode {
                id: i,
                secondary_id: NO_INDEX,
                global_id: 100 + i,
                node_type: PathNodeType::BuildingEntrance,
                position: Vec3::new(i as f32, 0.0, 0.0),
                radius: 1.5,
            })
            .collect();
        graph.edges = vec![
            PathEdge { from: 0, to: 1, lane_width_right: 0.5, lane_width_left: 0.25 },
            PathEdge { from: 1, to: 0, lane_width_right: 0.5, lane_width_left: 0.25 },
            PathEdge { from: 1, to: 2, lane_width_right: 1.0, lane_width_left: 1.0 },
        ];
        graph.rebuild_adjacency().unwrap();
        graph
    }

    #[test]
    fn test_mesh_with_graph() {
        let mut mesh = FloorMesh::new(MeshVersion::V0005);
        mesh.vertices = vec![Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 4.0)];
        mesh.triangles = vec![Triangle::new([0, 1, 2], 0)];
        mesh.path_graph = Some(graph());

        let parsed = floor::parse_mesh(&floor::serialize_mesh(&mesh).unwrap()).unwrap();
        assert_eq!(parsed, mesh);

        let graph = parsed.path_graph.unwrap();
        assert_eq!(graph.edges_of(1).len(), 2);
        assert_eq!(graph.edges_of(2).len(), 0);
        assert_eq!(graph.edge_counts, vec![1, 2, 0]);
        assert_eq!(graph.edge_starts[..2], [0, 1]);
    }

    #[test]
    fn test_dangling_edge_only_rejected_when_strict() {
        let mut mesh = FloorMesh::new(MeshVersion::V0006);
        let mut graph = graph();
        graph.edges[2].to = 9;
        mesh.path_graph = Some(graph);
        let bytes = floor::serialize_mesh(&mesh).unwrap();

        assert!(floor::parse_mesh(&bytes).is_err());
        let lenient = ParseOptions {
            strict_validation: false,
            ..ParseOptions::default()
        };
        assert!(floor::parse_mesh_with_options(&bytes, &lenient).is_ok());
    }
}

mod grid_tests {
    use super::*;

    #[test]
    fn test_edit_and_reload() {
        let mut grid = PlacementGrid::new(3, 3);
        assert_eq!(grid.toggle_cell(0, 0).unwrap(), CellState::Occupied);
        grid.resize(2, 4);
        grid.set_chunk_size(200.0, 0.1).unwrap();

        let reloaded = grid::parse_grid(&grid::serialize_grid(&grid).unwrap()).unwrap();
        assert_eq!(reloaded, grid);
        assert_eq!(reloaded.to_rows(), ["HF", "FF", "FF", "FF"]);
        assert_eq!(reloaded.col_chunk_size(), 100.0);
        assert_eq!(reloaded.row_chunk_size(), 0.5);
        assert_eq!(reloaded.total_width(), 200.0);
    }

    #[test]
    fn test_center_pulled_inside() {
        let mut grid = PlacementGrid::new(11, 11);
        assert_eq!(grid.center_x(), 5);
        grid.resize(4, 4);
        assert_eq!((grid.center_x(), grid.center_y()), (3, 3));
        assert!(grid.set_center(4, 0).is_err());

        let mut grid = PlacementGrid::new(9, 9);
        assert_eq!(grid.center_x(), 4);
        grid.resize(3, 9);
        assert_eq!((grid.center_x(), grid.center_y()), (2, 4));
    }
}

// Property-based tests using proptest
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::sample::Index;

    fn tag_strategy() -> impl Strategy<Value = Tag> {
        "[A-Z0-9]{4}"
            .prop_filter("FORM marks a container", |text| text != "FORM")
            .prop_map(|text| tag(&text))
    }

    fn node_strategy() -> impl Strategy<Value = ChunkNode> {
        let leaf = (tag_strategy(), prop::collection::vec(any::<u8>(), 0..24))
            .prop_map(|(tag, data)| ChunkNode::leaf(tag, data));
        leaf.prop_recursive(3, 24, 4, |inner| {
            (tag_strategy(), prop::collection::vec(inner, 0..4))
                .prop_map(|(form_tag, children)| ChunkNode::form(form_tag, children))
        })
    }

    fn root_strategy() -> impl Strategy<Value = ChunkNode> {
        (tag_strategy(), prop::collection::vec(node_strategy(), 0..4))
            .prop_map(|(form_tag, children)| ChunkNode::form(form_tag, children))
    }

    /// A table whose entries all carry preserved numbering, in shuffled order
    fn preserved_table_strategy() -> impl Strategy<Value = StringTable> {
        prop::collection::btree_set("[a-z_]{1,12}", 0..8).prop_flat_map(|ids| {
            let n = ids.len();
            (
                Just(ids),
                prop::collection::btree_set(1u32..100_000, n..=n),
                prop::collection::vec(("\\PC{0,16}", any::<u32>()), n..=n),
            )
                .prop_flat_map(|(ids, indices, values)| {
                    let entries: Vec<StringEntry> = ids
                        .into_iter()
                        .zip(indices)
                        .zip(values)
                        .map(|((id, index), (value, key))| StringEntry {
                            id,
                            value,
                            original_index: Some(index),
                            original_key: Some(key),
                        })
                        .collect();
                    Just(entries).prop_shuffle()
                })
                .prop_map(|entries| {
                    let max = entries.iter().filter_map(|e| e.original_index).max().unwrap_or(0);
                    let mut table = StringTable::new(1);
                    table.next_uid = max + 1;
                    table.entries = entries;
                    table
                })
        })
    }

    fn finite() -> impl Strategy<Value = f32> {
        -1000.0f32..1000.0
    }

    fn vec3_strategy() -> impl Strategy<Value = Vec3> {
        (finite(), finite(), finite()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    fn mesh_strategy() -> impl Strategy<Value = FloorMesh> {
        (
            prop::sample::select(MeshVersion::ALL.to_vec()),
            prop::collection::vec(vec3_strategy(), 1..12),
        )
            .prop_flat_map(|(version, vertices)| {
                let n = vertices.len() as i32;
                let triangle = (
                    [0..n, 0..n, 0..n],
                    vec3_strategy(),
                    any::<[u8; 3]>(),
                    any::<bool>(),
                    any::<i32>(),
                    any::<[i32; 3]>(),
                );
                (Just(version), Just(vertices), prop::collection::vec(triangle, 0..8))
            })
            .prop_map(|(version, vertices, raw)| {
                let mut mesh = FloorMesh::new(version);
                mesh.vertices = vertices;
                mesh.triangles = raw
                    .into_iter()
                    .enumerate()
                    .map(|(i, (corners, normal, edge_types, fallthrough, part_tag, portal_ids))| {
                        let mut triangle = Triangle::new(corners, i as i32);
                        triangle.normal = normal;
                        triangle.edge_types = edge_types;
                        triangle.fallthrough = fallthrough;
                        triangle.part_tag = part_tag;
                        triangle.portal_ids = portal_ids;
                        triangle
                    })
                    .collect();
                mesh
            })
    }

    fn graph_strategy() -> impl Strategy<Value = PathGraph> {
        prop::collection::vec((0i32..12, vec3_strategy(), 0.1f32..5.0), 1..6).prop_flat_map(|raw| {
            let n = raw.len();
            let targets = prop::collection::vec(prop::collection::vec(0..n as i32, 0..3), n..=n);
            (Just(raw), targets).prop_map(|(raw, targets)| {
                let nodes: Vec<PathNode> = raw
                    .into_iter()
                    .enumerate()
                    .map(|(i, (code, position, radius))| PathNode {
                        id: i as i32,
                        secondary_id: NO_INDEX,
                        global_id: i as i32,
                        node_type: PathNodeType::from_code(code).unwrap(),
                        position,
                        radius,
                    })
                    .collect();
                let edges = targets
                    .into_iter()
                    .enumerate()
                    .flat_map(|(from, tos)| {
                        tos.into_iter().map(move |to| PathEdge {
                            from: from as i32,
                            to,
                            lane_width_right: 1.0,
                            lane_width_left: 2.0,
                        })
                    })
                    .collect();
                let mut graph = PathGraph::new(GraphType::Cell);
                graph.nodes = nodes;
                graph.edges = edges;
                graph.rebuild_adjacency().unwrap();
                graph
            })
        })
    }

    fn grid_strategy() -> impl Strategy<Value = PlacementGrid> {
        (1usize..=10, 1usize..=10).prop_flat_map(|(cols, rows)| {
            prop::collection::vec("[HF]", cols * rows).prop_map(move |codes| {
                let rows: Vec<String> = codes.chunks(cols).map(|chunk| chunk.concat()).collect();
                PlacementGrid::from_rows(&rows).unwrap()
            })
        })
    }

    proptest! {
        #[test]
        fn test_container_roundtrip(tree in root_strategy()) {
            let bytes = iff::serialize_container(&tree).unwrap();
            prop_assert_eq!(bytes.len(), tree.total_size());
            prop_assert_eq!(iff::parse_container(&bytes).unwrap(), tree);
        }

        #[test]
        fn test_preserved_string_table_roundtrip(table in preserved_table_strategy()) {
            let bytes = stf::serialize_table(&table).unwrap();
            let parsed = stf::parse_table(&bytes).unwrap();
            prop_assert_eq!(&parsed, &table);
            prop_assert_eq!(stf::serialize_table(&parsed).unwrap(), bytes);
        }

        #[test]
        fn test_fresh_entries_numbered_in_order(ids in prop::collection::btree_set("[a-z]{1,8}", 1..10)) {
            let mut table = StringTable::default();
            table.add_entries(ids.iter().map(|id| StringEntry::new(id.clone(), id.to_uppercase())));
            let parsed = stf::parse_table(&stf::serialize_table(&table).unwrap()).unwrap();

            prop_assert_eq!(parsed.len(), ids.len());
            for (i, entry) in parsed.entries.iter().enumerate() {
                prop_assert_eq!(entry.original_index, Some(i as u32 + 1));
                prop_assert_eq!(entry.original_key, Some(DEFAULT_KEY));
                prop_assert_eq!(&entry.value, &entry.id.to_uppercase());
            }
        }

        #[test]
        fn test_lookup_stays_sorted(
            ops in prop::collection::vec((any::<bool>(), "[a-z/]{1,12}\\.iff", any::<Index>()), 0..40)
        ) {
            let mut table = SortedLookupTable::new();
            for (add, path, pick) in ops {
                if add {
                    let before = table.clone();
                    if table.add_entry(&path).is_err() {
                        prop_assert_eq!(&table, &before);
                    }
                } else if !table.is_empty() {
                    let crc = pick.get(table.entries()).crc;
                    prop_assert!(table.delete_entry(crc).is_some());
                }
                prop_assert!(table.entries().windows(2).all(|w| w[0].crc < w[1].crc));
            }

            let parsed = lookup::parse_table(&lookup::serialize_table(&table).unwrap()).unwrap();
            prop_assert_eq!(parsed, table);
        }

        #[test]
        fn test_mesh_roundtrip(mesh in mesh_strategy()) {
            let parsed = floor::parse_mesh(&floor::serialize_mesh(&mesh).unwrap()).unwrap();
            prop_assert_eq!(parsed, mesh);
        }

        #[test]
        fn test_graph_roundtrip(graph in graph_strategy()) {
            let mut mesh = FloorMesh::new(MeshVersion::V0006);
            mesh.path_graph = Some(graph.clone());
            let parsed = floor::parse_mesh(&floor::serialize_mesh(&mesh).unwrap()).unwrap();
            let parsed_graph = parsed.path_graph.unwrap();
            prop_assert_eq!(&parsed_graph, &graph);

            let total: usize = (0..graph.nodes.len()).map(|n| parsed_graph.edges_of(n).len()).sum();
            prop_assert_eq!(total, graph.edges.len());
        }

        #[test]
        fn test_grid_roundtrip(grid in grid_strategy()) {
            let parsed = grid::parse_grid(&grid::serialize_grid(&grid).unwrap()).unwrap();
            prop_assert_eq!(parsed, grid);
        }

        #[test]
        fn test_resize_keeps_overlap(grid in grid_strategy(), cols in 0usize..60, rows in 0usize..60) {
            let mut resized = grid.clone();
            resized.resize(cols, rows);

            prop_assert_eq!(resized.col_size(), cols.clamp(1, 50));
            prop_assert_eq!(resized.row_size(), rows.clamp(1, 50));
            prop_assert!(resized.center_x() < resized.col_size());
            prop_assert!(resized.center_y() < resized.row_size());
            prop_assert!(resized.check().is_ok());

            for row in 0..resized.row_size() {
                for col in 0..resized.col_size() {
                    let expected = grid.cell(row, col).unwrap_or(CellState::Free);
                    prop_assert_eq!(resized.cell(row, col), Some(expected));
                }
            }
        }
    }
}

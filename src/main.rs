//! Holocron CLI
//!
//! Command-line inspection and light editing of chunked game asset files:
//! containers, archive catalogs, string tables, CRC tables, floor meshes
//! and placement grids.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use holocron_parsers::logging::{self, TracingConfig};
use holocron_parsers::traits::{ParseOptions, Parser as _, Serializer};
use holocron_parsers::{
    detect_format, engine_crc, ChunkNode, CrcTableParser, FloorParser, GridParser, IffParser, PlacementGrid,
    SortedLookupTable, StfParser, TreParser,
};

/// Holocron - inspect and edit chunked game asset files
#[derive(Parser)]
#[command(name = "holocron")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the format of a file
    Info(InfoArgs),

    /// Dump the chunk tree of a container file
    Tree(TreeArgs),

    /// List the entries of an archive catalog
    Catalog(CatalogArgs),

    /// Dump a string table
    Strings(StringsArgs),

    /// Compute CRCs and edit CRC string tables
    #[command(subcommand)]
    Crc(CrcCommand),

    /// Summarize a floor mesh
    Mesh(MeshArgs),

    /// Show or edit a placement grid
    #[command(subcommand)]
    Grid(GridCommand),
}

#[derive(Args)]
struct InfoArgs {
    /// File to inspect
    path: PathBuf,
}

#[derive(Args)]
struct TreeArgs {
    /// Container file
    path: PathBuf,

    /// Stop descending below this depth
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Args)]
struct CatalogArgs {
    /// Archive file
    path: PathBuf,

    /// Filter by path pattern (glob-style, `*` wildcards)
    #[arg(short, long)]
    pattern: Option<String>,

    /// Sort by: name, size, offset
    #[arg(long, default_value = "offset")]
    sort: String,

    /// Print totals instead of entries
    #[arg(long)]
    stats: bool,
}

#[derive(Args)]
struct StringsArgs {
    /// String table file
    path: PathBuf,

    /// Show only ids containing this text
    #[arg(long)]
    filter: Option<String>,
}

#[derive(Subcommand)]
enum CrcCommand {
    /// Print the engine CRC of each string
    Compute {
        /// Strings to hash
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// List the entries of a CRC string table
    List {
        /// Table file
        path: PathBuf,
    },

    /// Add paths to a CRC string table
    Add {
        /// Table file
        path: PathBuf,

        /// Paths to add
        #[arg(required = true)]
        entries: Vec<String>,

        /// Start a new table when the file does not exist
        #[arg(long)]
        create: bool,
    },

    /// Delete entries by CRC (`0x...`) or by path
    Delete {
        /// Table file
        path: PathBuf,

        /// CRCs or paths to remove
        #[arg(required = true)]
        entries: Vec<String>,
    },
}

#[derive(Args)]
struct MeshArgs {
    /// Floor mesh file
    path: PathBuf,

    /// Skip index validation
    #[arg(long)]
    lenient: bool,

    /// Also list path graph nodes
    #[arg(long)]
    nodes: bool,
}

#[derive(Subcommand)]
enum GridCommand {
    /// Print the grid
    Show {
        /// Grid file
        path: PathBuf,
    },

    /// Flip the state of one cell
    Toggle {
        /// Grid file
        path: PathBuf,
        row: usize,
        col: usize,
    },

    /// Change the grid dimensions (clamped to 1..=50)
    Resize {
        /// Grid file
        path: PathBuf,
        cols: usize,
        rows: usize,
    },

    /// Move the center cell
    Center {
        /// Grid file
        path: PathBuf,
        col: usize,
        row: usize,
    },

    /// Set the cell size in meters (clamped to 0.5..=100)
    ChunkSize {
        /// Grid file
        path: PathBuf,
        col: f32,
        row: f32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_config(TracingConfig::for_verbosity(cli.verbose));

    match cli.command {
        Commands::Info(args) => cmd_info(&args, cli.format),
        Commands::Tree(args) => cmd_tree(&args, cli.format),
        Commands::Catalog(args) => cmd_catalog(&args, cli.format),
        Commands::Strings(args) => cmd_strings(&args, cli.format),
        Commands::Crc(command) => cmd_crc(command, cli.format),
        Commands::Mesh(args) => cmd_mesh(&args, cli.format),
        Commands::Grid(command) => cmd_grid(command, cli.format),
    }
}

/// Parse a file with logging around it
fn load<P: holocron_parsers::Parser>(parser: &P, path: &Path, options: &ParseOptions) -> Result<P::Output> {
    holocron_parsers::log_parse_start!(parser.name(), path);
    let start = Instant::now();

    match parser.parse_file_with_options(path, options) {
        Ok(output) => {
            holocron_parsers::log_parse_complete!(parser.name(), path, start.elapsed());
            Ok(output)
        }
        Err(e) => {
            holocron_parsers::log_parse_error!(parser.name(), path, e);
            Err(e).with_context(|| format!("Failed to parse {}", path.display()))
        }
    }
}

/// Serialize a value and write it over `path`
fn store<S: Serializer>(serializer: &S, value: &S::Output, path: &Path) -> Result<()> {
    let bytes = serializer
        .serialize(value)
        .with_context(|| format!("Failed to encode {}", path.display()))?;
    fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_info(args: &InfoArgs, format: OutputFormat) -> Result<()> {
    let path = &args.path;
    let mut file = fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let size = file.metadata()?.len();

    let mut head = Vec::with_capacity(12);
    file.by_ref()
        .take(12)
        .read_to_end(&mut head)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let detected = detect_format(path, &head);

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "path": path,
            "size": size,
            "format": detected,
            "description": detected.map(|f| f.info().description),
        })),
        OutputFormat::Text => {
            println!("File:    {}", path.display());
            println!("Size:    {}", format_size(size));
            match detected {
                Some(found) => {
                    println!("Format:  {found}");
                    println!("         {}", found.info().description);
                }
                None => println!("Format:  unknown"),
            }
            Ok(())
        }
    }
}

fn cmd_tree(args: &TreeArgs, format: OutputFormat) -> Result<()> {
    let tree = load(&IffParser::new(), &args.path, &ParseOptions::default())?;

    match format {
        OutputFormat::Json => print_json(&tree_json(&tree, 0, args.max_depth)),
        OutputFormat::Text => {
            let mut count = 0usize;
            tree.walk(&mut |depth, node: &ChunkNode| {
                count += 1;
                if args.max_depth.is_some_and(|max| depth > max) {
                    return;
                }
                match node {
                    ChunkNode::Form(form) => {
                        println!("{:indent$}FORM {} ({} bytes)", "", form.form_tag, node.encoded_size(), indent = depth * 2);
                    }
                    ChunkNode::Leaf(_) => println!("{:indent$}{}", "", node.label(), indent = depth * 2),
                }
            });
            println!("\nTotal: {count} chunks");
            Ok(())
        }
    }
}

fn tree_json(node: &ChunkNode, depth: usize, max_depth: Option<usize>) -> serde_json::Value {
    match node {
        ChunkNode::Form(form) => {
            let children: Vec<_> = if max_depth.is_some_and(|max| depth >= max) {
                Vec::new()
            } else {
                form.children
                    .iter()
                    .map(|child| tree_json(child, depth + 1, max_depth))
                    .collect()
            };
            serde_json::json!({
                "form": form.form_tag.to_string(),
                "size": node.encoded_size(),
                "children": children,
            })
        }
        ChunkNode::Leaf(leaf) => serde_json::json!({
            "tag": leaf.tag.to_string(),
            "size": leaf.data.len(),
        }),
    }
}

fn cmd_catalog(args: &CatalogArgs, format: OutputFormat) -> Result<()> {
    let catalog = load(&TreParser::new(), &args.path, &ParseOptions::default())?;

    if args.stats {
        let stats = catalog.statistics();
        return match format {
            OutputFormat::Json => print_json(&serde_json::to_value(&stats)?),
            OutputFormat::Text => {
                println!("Archive:            {}", args.path.display());
                println!("  Version:          {}", catalog.header.version);
                println!("  Records:          {}", stats.record_count);
                println!("  Uncompressed:     {}", format_size(stats.total_uncompressed));
                println!("  Stored:           {}", format_size(stats.total_stored));
                println!("  Ratio:            {:.2}%", stats.compression_ratio * 100.0);
                println!("\nCompression:");
                for (kind, count) in &stats.by_compression {
                    println!("  {kind:<10} {count}");
                }
                println!("\nExtensions:");
                for (ext, count) in &stats.extensions {
                    println!("  {ext:<10} {count}");
                }
                Ok(())
            }
        };
    }

    let mut records = match &args.pattern {
        Some(pattern) => catalog.find(pattern),
        None => catalog.records().iter().collect(),
    };
    match args.sort.as_str() {
        "name" => records.sort_by(|a, b| a.path.cmp(&b.path)),
        "size" => records.sort_by_key(|r| std::cmp::Reverse(r.uncompressed_size)),
        _ => records.sort_by_key(|r| r.file_offset),
    }

    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&records)?),
        OutputFormat::Text => {
            println!("{:<10} {:<12} {:<12} {:<6} {}", "CRC", "Size", "Stored", "Comp", "Path");
            println!("{:-<10} {:-<12} {:-<12} {:-<6} {:-<50}", "", "", "", "", "");
            for record in &records {
                println!(
                    "{:08x}   {:<12} {:<12} {:<6} {}",
                    record.crc,
                    format_size(u64::from(record.uncompressed_size)),
                    format_size(u64::from(record.stored_size())),
                    record.compression.to_string(),
                    record.path
                );
            }
            println!("\nTotal: {} of {} entries", records.len(), catalog.len());
            Ok(())
        }
    }
}

fn cmd_strings(args: &StringsArgs, format: OutputFormat) -> Result<()> {
    let table = load(&StfParser::new(), &args.path, &ParseOptions::default())?;
    let entries: Vec<_> = table
        .entries
        .iter()
        .filter(|e| args.filter.as_ref().map_or(true, |f| e.id.contains(f.as_str())))
        .collect();

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "version": table.version,
            "next_uid": table.next_uid,
            "entries": entries,
        })),
        OutputFormat::Text => {
            println!("String table v{} (next uid {})", table.version, table.next_uid);
            for entry in &entries {
                println!("  {} = {:?}", entry.id, entry.value);
            }
            println!("\nTotal: {} of {} strings", entries.len(), table.len());
            Ok(())
        }
    }
}

/// Accept `0x`-prefixed hex as a CRC; anything else is a path to hash
fn crc_or_path(text: &str) -> Result<u32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).with_context(|| format!("Invalid CRC: {text}")),
        None => Ok(engine_crc(text)),
    }
}

fn print_lookup_table(table: &SortedLookupTable, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(table.entries())?),
        OutputFormat::Text => {
            for entry in table {
                println!("0x{:08x}  {}", entry.crc, entry.path);
            }
            println!("\nTotal: {} entries", table.len());
            Ok(())
        }
    }
}

fn cmd_crc(command: CrcCommand, format: OutputFormat) -> Result<()> {
    let parser = CrcTableParser::new();
    let options = ParseOptions::default();

    match command {
        CrcCommand::Compute { text } => {
            let crcs: Vec<_> = text.iter().map(|t| (t, engine_crc(t))).collect();
            match format {
                OutputFormat::Json => print_json(&serde_json::json!(crcs
                    .iter()
                    .map(|(t, crc)| serde_json::json!({ "text": t, "crc": crc }))
                    .collect::<Vec<_>>())),
                OutputFormat::Text => {
                    for (t, crc) in crcs {
                        println!("0x{crc:08x}  {t}");
                    }
                    Ok(())
                }
            }
        }
        CrcCommand::List { path } => {
            let table = load(&parser, &path, &options)?;
            print_lookup_table(&table, format)
        }
        CrcCommand::Add { path, entries, create } => {
            let mut table = if create && !path.exists() {
                info!(path = %path.display(), "creating new table");
                SortedLookupTable::new()
            } else {
                load(&parser, &path, &options)?
            };

            let mut added = 0usize;
            for entry in &entries {
                match table.add_entry(entry) {
                    Ok(new) => {
                        println!("added   0x{:08x}  {}", new.crc, new.path);
                        added += 1;
                    }
                    Err(e) if e.is_duplicate_key() => warn!(path = %entry, "skipping: {e}"),
                    Err(e) => return Err(e).with_context(|| format!("Failed to add {entry}")),
                }
            }

            if added > 0 {
                store(&parser, &table, &path)?;
            }
            println!("{added} added, {} total", table.len());
            Ok(())
        }
        CrcCommand::Delete { path, entries } => {
            let mut table = load(&parser, &path, &options)?;

            let mut removed = 0usize;
            for entry in &entries {
                let crc = crc_or_path(entry)?;
                match table.delete_entry(crc) {
                    Some(old) => {
                        println!("removed 0x{:08x}  {}", old.crc, old.path);
                        removed += 1;
                    }
                    None => warn!(crc = format_args!("0x{crc:08x}"), "no such entry"),
                }
            }

            if removed > 0 {
                store(&parser, &table, &path)?;
            }
            println!("{removed} removed, {} total", table.len());
            Ok(())
        }
    }
}

fn cmd_mesh(args: &MeshArgs, format: OutputFormat) -> Result<()> {
    let options = ParseOptions {
        strict_validation: !args.lenient,
        ..ParseOptions::default()
    };
    let mesh = load(&FloorParser::new(), &args.path, &options)?;
    let bounds = mesh.bounds();

    match format {
        OutputFormat::Json => {
            let graph = match &mesh.path_graph {
                Some(g) => {
                    let nodes = if args.nodes {
                        serde_json::to_value(&g.nodes)?
                    } else {
                        g.nodes.len().into()
                    };
                    Some(serde_json::json!({
                        "type": g.graph_type,
                        "nodes": nodes,
                        "edges": g.edges.len(),
                    }))
                }
                None => None,
            };
            print_json(&serde_json::json!({
                "version": mesh.version.to_string(),
                "vertices": mesh.vertex_count(),
                "triangles": mesh.triangle_count(),
                "bounds": {
                    "min": [bounds.min.x, bounds.min.y, bounds.min.z],
                    "max": [bounds.max.x, bounds.max.y, bounds.max.z],
                },
                "box_tree": mesh.box_tree.is_some(),
                "boundary_edges": mesh.boundary_edges.as_ref().map(|b| b.len()),
                "path_graph": graph,
            }))
        }
        OutputFormat::Text => {
            println!("Floor mesh:         {}", args.path.display());
            println!("  Version:          {}", mesh.version);
            println!("  Vertices:         {}", mesh.vertex_count());
            println!("  Triangles:        {}", mesh.triangle_count());
            println!(
                "  Bounds:           ({:.2}, {:.2}, {:.2}) .. ({:.2}, {:.2}, {:.2})",
                bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
            );
            println!("  Size:             {:.2} x {:.2} x {:.2}", bounds.width(), bounds.height(), bounds.depth());
            if let Some(tree) = &mesh.box_tree {
                println!("  Box tree:         {} children", tree.children.len());
            }
            if let Some(edges) = &mesh.boundary_edges {
                println!("  Boundary edges:   {}", format_size(edges.len() as u64));
            }
            match &mesh.path_graph {
                Some(graph) => {
                    println!("  Path graph:       {:?}, {} nodes, {} edges", graph.graph_type, graph.nodes.len(), graph.edges.len());
                    if args.nodes {
                        for (idx, node) in graph.nodes.iter().enumerate() {
                            println!(
                                "    #{:<4} {:?} at ({:.2}, {:.2}, {:.2}) r={:.2}, {} edges",
                                node.id,
                                node.node_type,
                                node.position.x,
                                node.position.y,
                                node.position.z,
                                node.radius,
                                graph.edges_of(idx).len()
                            );
                        }
                    }
                }
                None => println!("  Path graph:       none"),
            }
            Ok(())
        }
    }
}

fn print_grid(grid: &PlacementGrid, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "cols": grid.col_size(),
            "rows": grid.row_size(),
            "center": [grid.center_x(), grid.center_y()],
            "chunk_size": [grid.col_chunk_size(), grid.row_chunk_size()],
            "cells": grid.to_rows(),
        })),
        OutputFormat::Text => {
            println!(
                "{}x{} cells of {:.2} x {:.2} m ({:.2} x {:.2} m), center ({}, {})",
                grid.col_size(),
                grid.row_size(),
                grid.col_chunk_size(),
                grid.row_chunk_size(),
                grid.total_width(),
                grid.total_height(),
                grid.center_x(),
                grid.center_y()
            );
            for (r, row) in grid.to_rows().iter().enumerate() {
                let marked: String = row
                    .chars()
                    .enumerate()
                    .map(|(c, ch)| if (c, r) == (grid.center_x(), grid.center_y()) { ch.to_ascii_lowercase() } else { ch })
                    .collect();
                println!("  {marked}");
            }
            println!("{} occupied", grid.occupied_count());
            Ok(())
        }
    }
}

fn cmd_grid(command: GridCommand, format: OutputFormat) -> Result<()> {
    let parser = GridParser::new();
    let options = ParseOptions::default();

    let (path, edit): (PathBuf, Box<dyn FnOnce(&mut PlacementGrid) -> Result<()>>) = match command {
        GridCommand::Show { path } => {
            let grid = load(&parser, &path, &options)?;
            return print_grid(&grid, format);
        }
        GridCommand::Toggle { path, row, col } => (
            path,
            Box::new(move |grid: &mut PlacementGrid| {
                let state = grid.toggle_cell(row, col)?;
                info!(row, col, ?state, "toggled cell");
                Ok(())
            }),
        ),
        GridCommand::Resize { path, cols, rows } => (
            path,
            Box::new(move |grid: &mut PlacementGrid| {
                grid.resize(cols, rows);
                Ok(())
            }),
        ),
        GridCommand::Center { path, col, row } => (path, Box::new(move |grid: &mut PlacementGrid| Ok(grid.set_center(col, row)?))),
        GridCommand::ChunkSize { path, col, row } => (path, Box::new(move |grid: &mut PlacementGrid| Ok(grid.set_chunk_size(col, row)?))),
    };

    let mut grid = load(&parser, &path, &options)?;
    edit(&mut grid).with_context(|| format!("Failed to edit {}", path.display()))?;
    if let Err(e) = grid.check() {
        bail!("Edit left {} invalid: {e}", path.display());
    }
    store(&parser, &grid, &path)?;
    print_grid(&grid, format)
}

/// Format a byte count as a human-readable size
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

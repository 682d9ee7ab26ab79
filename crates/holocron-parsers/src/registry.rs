// holocron-parsers/src/registry.rs
//! Format discovery
//!
//! The set of supported formats is fixed at compile time. Detection
//! looks at leading magic bytes first, then at the form tag of a
//! container file, and only then at the file extension.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use holocron_core::Tag;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{floor, grid, iff, lookup};

/// Formats this crate can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    /// Any `FORM` file without a dedicated codec
    Container,
    ArchiveCatalog,
    StringTable,
    LookupTable,
    FloorMesh,
    PlacementGrid,
}

impl FileFormat {
    /// Static description of this format
    pub fn info(self) -> &'static FormatInfo {
        // Every variant has exactly one table row
        FORMATS
            .iter()
            .find(|info| info.format == self)
            .unwrap_or(&FORMATS[0])
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

/// Description of one supported format
#[derive(Debug, Clone, Copy)]
pub struct FormatInfo {
    pub format: FileFormat,
    pub name: &'static str,
    pub description: &'static str,
    /// Lowercase extensions without the dot
    pub extensions: &'static [&'static str],
    /// Leading bytes for flat formats
    pub magic: Option<&'static [u8]>,
    /// Root form tag for container formats
    pub form_tag: Option<Tag>,
}

/// Every supported format; the generic container comes first
pub const FORMATS: &[FormatInfo] = &[
    FormatInfo {
        format: FileFormat::Container,
        name: "Container",
        description: "Generic FORM chunk tree",
        extensions: &["iff"],
        magic: None,
        form_tag: None,
    },
    FormatInfo {
        format: FileFormat::ArchiveCatalog,
        name: "Archive Catalog",
        description: "Table of contents of a compressed asset archive",
        extensions: &["tre"],
        magic: Some(b"EERT"),
        form_tag: None,
    },
    FormatInfo {
        format: FileFormat::StringTable,
        name: "String Table",
        description: "Localized UTF-16 strings keyed by ASCII ids",
        extensions: &["stf"],
        magic: Some(&[0xCD, 0xAB]),
        form_tag: None,
    },
    FormatInfo {
        format: FileFormat::LookupTable,
        name: "CRC String Table",
        description: "Sorted map from engine CRC to path",
        extensions: &[],
        magic: None,
        form_tag: Some(lookup::CSTB),
    },
    FormatInfo {
        format: FileFormat::FloorMesh,
        name: "Floor Mesh",
        description: "Floor collision mesh with optional path graph",
        extensions: &["flr"],
        magic: None,
        form_tag: Some(floor::FLOR),
    },
    FormatInfo {
        format: FileFormat::PlacementGrid,
        name: "Placement Grid",
        description: "Structure footprint occupancy grid",
        extensions: &["sfp"],
        magic: None,
        form_tag: Some(grid::FOOT),
    },
];

static EXTENSION_MAP: Lazy<HashMap<&'static str, FileFormat>> = Lazy::new(|| {
    FORMATS
        .iter()
        .flat_map(|info| info.extensions.iter().map(move |ext| (*ext, info.format)))
        .collect()
});

/// Guess the format of a file from its name and first bytes
///
/// `head` should hold at least the first 12 bytes when available.
pub fn detect_format(path: &Path, head: &[u8]) -> Option<FileFormat> {
    if let Some(info) = FORMATS
        .iter()
        .find(|info| info.magic.is_some_and(|magic| head.starts_with(magic)))
    {
        return Some(info.format);
    }

    if head.starts_with(iff::FORM.as_bytes()) {
        let form_tag = head.get(8..12).and_then(Tag::from_slice);
        let known = form_tag.and_then(|tag| FORMATS.iter().find(|info| info.form_tag == Some(tag)));
        return Some(known.map_or(FileFormat::Container, |info| info.format));
    }

    let ext = path.extension()?.to_string_lossy().to_lowercase();
    EXTENSION_MAP.get(ext.as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container_head(form_tag: &[u8; 4]) -> Vec<u8> {
        let mut head = b"FORM".to_vec();
        head.extend_from_slice(&100u32.to_be_bytes());
        head.extend_from_slice(form_tag);
        head
    }

    #[test]
    fn test_magic_wins_over_extension() {
        assert_eq!(
            detect_format(Path::new("strings.iff"), &[0xCD, 0xAB, 0, 0, 1]),
            Some(FileFormat::StringTable)
        );
        assert_eq!(
            detect_format(Path::new("data.bin"), b"EERT5000"),
            Some(FileFormat::ArchiveCatalog)
        );
    }

    #[test]
    fn test_form_tag_detection() {
        let path = Path::new("misc/object_template_crc_string_table.iff");
        assert_eq!(detect_format(path, &container_head(b"CSTB")), Some(FileFormat::LookupTable));
        assert_eq!(detect_format(path, &container_head(b"FLOR")), Some(FileFormat::FloorMesh));
        assert_eq!(detect_format(path, &container_head(b"FOOT")), Some(FileFormat::PlacementGrid));
        assert_eq!(detect_format(path, &container_head(b"SHOT")), Some(FileFormat::Container));
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(detect_format(Path::new("cell.FLR"), &[]), Some(FileFormat::FloorMesh));
        assert_eq!(detect_format(Path::new("patch_00.tre"), b"xx"), Some(FileFormat::ArchiveCatalog));
        assert_eq!(detect_format(Path::new("readme.txt"), b"hello"), None);
        assert_eq!(detect_format(Path::new("noext"), b""), None);
    }

    #[test]
    fn test_every_format_has_info() {
        for info in FORMATS {
            assert_eq!(info.format.info().name, info.name);
        }
        assert_eq!(FileFormat::FloorMesh.to_string(), "Floor Mesh");
    }
}

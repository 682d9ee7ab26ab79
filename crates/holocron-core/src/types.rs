//! Common types used across holocron
//!
//! This module provides shared type definitions used by multiple crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Four-character chunk identifier (`FORM`, `VERT`, `0006`, ...)
///
/// Tags are stored exactly as they appear on disk. Bytes outside the
/// printable ASCII range are kept as-is and only escaped for display.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Tag([u8; 4]);

impl Tag {
    /// Create a tag from its raw bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Create a tag from the first four bytes of a slice
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self(raw))
    }

    /// Raw on-disk bytes
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Whether every byte is printable ASCII
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
    }

    /// Interpret a numeric version tag such as `0005`
    pub fn version_number(&self) -> Option<u32> {
        if !self.0.iter().all(u8::is_ascii_digit) {
            return None;
        }
        std::str::from_utf8(&self.0).ok()?.parse().ok()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_printable() {
            for b in self.0 {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{:08X}", u32::from_be_bytes(self.0))
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if !s.is_ascii() {
            return Err(Error::invalid_tag(s, "must be ASCII"));
        }
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| Error::invalid_tag(s, "must be exactly 4 characters"))?;
        Ok(Self(bytes))
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.to_string()
    }
}

impl TryFrom<String> for Tag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// 3D vector (position, normal, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };
    pub const UP: Self = Self { x: 0.0, y: 1.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Component-wise minimum
    pub fn min(&self, other: &Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum
    pub fn max(&self, other: &Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tightest box around a set of points, `None` when there are none
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Vec3>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self::new(first, first), |acc, p| {
            Self::new(acc.min.min(p), acc.max.max(p))
        }))
    }

    /// Extent along X
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Extent along Y
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Extent along Z
    pub fn depth(&self) -> f32 {
        self.max.z - self.min.z
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_from_str() {
        let tag: Tag = "FORM".parse().unwrap();
        assert_eq!(tag.as_bytes(), b"FORM");
        assert_eq!(tag.to_string(), "FORM");
    }

    #[test]
    fn test_tag_rejects_wrong_length() {
        assert!("FOR".parse::<Tag>().is_err());
        assert!("FORMS".parse::<Tag>().is_err());
    }

    #[test]
    fn test_tag_display_unprintable() {
        let tag = Tag::new([0x00, 0x01, 0x02, 0x03]);
        assert_eq!(tag.to_string(), "0x00010203");
    }

    #[test]
    fn test_tag_version_number() {
        assert_eq!(Tag::new(*b"0006").version_number(), Some(6));
        assert_eq!(Tag::new(*b"FLOR").version_number(), None);
    }

    #[test]
    fn test_tag_from_slice() {
        assert_eq!(Tag::from_slice(b"VERTxyz"), Some(Tag::new(*b"VERT")));
        assert_eq!(Tag::from_slice(b"VE"), None);
    }

    #[test]
    fn test_bounds_from_points() {
        let points = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, -1.0, 3.0)];
        let bounds = Bounds::from_points(&points).unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(2.0, 0.0, 3.0));
        assert_eq!(bounds.width(), 2.0);
        assert_eq!(bounds.height(), 1.0);
        assert_eq!(bounds.depth(), 3.0);
    }

    #[test]
    fn test_bounds_empty() {
        let points: [Vec3; 0] = [];
        assert!(Bounds::from_points(&points).is_none());
    }
}

//! Holocron Core Library
//!
//! This crate provides the small value types shared by the holocron
//! codecs and the command-line tool: four-character chunk tags and the
//! vector/bounds types used by geometry formats.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::*;
}

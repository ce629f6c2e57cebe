//! Dataset container core
//!
//! This module implements the container engine: the file header and index
//! protocol, the sequential single-pass writer, and the validating
//! memory-mapped reader. Section encodings live in [`crate::section`].

pub mod header;
pub mod index;
pub mod reader;
pub mod writer;

pub use header::{MmdHeader, HEADER_SIZE, MMD_MAGIC, MMD_VERSION};
pub use index::SectionInfo;
pub use reader::Dataset;
pub use writer::DatasetWriter;

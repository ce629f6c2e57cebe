//! Dataset file header
//!
//! This module defines the fixed-size binary header at the start of every
//! dataset file. The header identifies the format, detects byte-order
//! mismatches, and locates the serialized section index.

use crate::section::pod::SectionPod;

/// Dataset magic number to identify valid files ("Dset" in little-endian
/// byte order). Written natively, so a file produced on a machine with the
/// opposite byte order fails the magic check instead of being misread.
pub const MMD_MAGIC: u32 = 0x7465_7344;

/// Container format version; increment on incompatible layout changes.
/// Independent of the caller-supplied dataset format version stored in the
/// index.
pub const MMD_VERSION: u32 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 24;

/// Fixed-size file header
///
/// The index (and every section) can live at an arbitrary offset within the
/// file; usually the index is the last region, written when the dataset
/// writer closes.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MmdHeader {
    /// Magic number, must equal [`MMD_MAGIC`]
    pub magic: u32,
    /// Container format version, must equal [`MMD_VERSION`]
    pub version: u32,
    /// File offset of the serialized section index (0 until close)
    pub index_offset: u64,
    /// Length in bytes of the serialized section index (0 until close)
    pub index_length: u64,
}

// Ensure the header layout never drifts
const _: () = assert!(std::mem::size_of::<MmdHeader>() == HEADER_SIZE);

impl MmdHeader {
    /// Placeholder header written when the dataset file is created; the
    /// index offset and length are patched in at close time.
    pub fn placeholder() -> Self {
        MmdHeader {
            magic: MMD_MAGIC,
            version: MMD_VERSION,
            index_offset: 0,
            index_length: 0,
        }
    }
}

// SAFETY: repr(C), 24 bytes with no padding, no indirection, all-zero valid.
unsafe impl SectionPod for MmdHeader {}

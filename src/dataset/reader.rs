//! Memory-mapped dataset reader
//!
//! This module provides zero-copy access to an on-disk dataset via memory
//! mapping. The file is mapped read-only; section views hand out references
//! directly into the mapped memory without any deserialization pass.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::slice;

use memmap2::Mmap;
use tracing::debug;

use super::header::{MmdHeader, HEADER_SIZE, MMD_MAGIC, MMD_VERSION};
use super::index::{DatasetIndex, SectionInfo};
use crate::section::pod::SectionPod;
use crate::utils::{DatasetError, Result};

/// Page size used when warming the mapping cache
const WARM_PAGE_SIZE: usize = 4096;

/// A memory-mapped dataset
///
/// Owns the mapping for its whole lifetime; every section view borrows it,
/// so views cannot outlive the mapped memory. Thread-safe: the mapping is
/// immutable once established, so a `Dataset` can be shared freely (e.g. via
/// `Arc`) and queried from any number of threads without synchronization.
pub struct Dataset {
    path: String,
    format: String,
    mmap: Mmap,
    sections: BTreeMap<String, SectionInfo>,
}

impl Dataset {
    /// Map an existing dataset file into memory and validate it.
    ///
    /// Checks the header magic and container version, locates and decodes
    /// the section index, and verifies the stored dataset name and format
    /// version against the caller's expectations. All format errors are
    /// fatal; a file that fails any check here is never partially usable.
    pub fn open<P: AsRef<Path>>(path: P, dataset_name: &str, format_version: u32) -> Result<Self> {
        let path_str = path.as_ref().display().to_string();

        let file = File::open(path.as_ref()).map_err(|e| DatasetError::OpenFailed {
            path: path_str.clone(),
            source: e,
        })?;

        // SAFETY: the file is mapped read-only and never modified through
        // this mapping
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| DatasetError::OpenFailed {
            path: path_str.clone(),
            source: e,
        })?;

        if mmap.len() < HEADER_SIZE {
            return Err(DatasetError::FileTooSmall {
                path: path_str,
                size: mmap.len() as u64,
                minimum: HEADER_SIZE as u64,
            });
        }

        // SAFETY: at least HEADER_SIZE bytes are mapped
        let header: MmdHeader =
            unsafe { std::ptr::read_unaligned(mmap.as_ptr() as *const MmdHeader) };

        if header.magic != MMD_MAGIC {
            return Err(DatasetError::InvalidMagic {
                path: path_str,
                expected: MMD_MAGIC,
                actual: header.magic,
            });
        }
        if header.version != MMD_VERSION {
            return Err(DatasetError::UnsupportedVersion {
                path: path_str,
                expected: MMD_VERSION,
                actual: header.version,
            });
        }
        if header.index_offset == 0 || header.index_length == 0 {
            return Err(DatasetError::CorruptIndex { path: path_str });
        }

        let index_end = header
            .index_offset
            .checked_add(header.index_length)
            .filter(|&end| end <= mmap.len() as u64)
            .ok_or(DatasetError::OutOfBounds {
                offset: header.index_offset,
                len: header.index_length,
                mapped: mmap.len() as u64,
            })?;

        let index_bytes = &mmap[header.index_offset as usize..index_end as usize];
        let index: DatasetIndex =
            bincode::deserialize(index_bytes).map_err(|e| DatasetError::IndexDecode {
                path: path_str.clone(),
                source: e,
            })?;

        if index.dataset_name != dataset_name {
            return Err(DatasetError::DatasetNameMismatch {
                path: path_str,
                expected: dataset_name.to_owned(),
                actual: index.dataset_name,
            });
        }
        if index.format_version != format_version {
            return Err(DatasetError::FormatVersionMismatch {
                path: path_str,
                expected: format_version,
                actual: index.format_version,
            });
        }

        debug!(
            path = %path_str,
            sections = index.sections.len(),
            mapped = mmap.len(),
            "dataset mapped"
        );

        Ok(Dataset {
            path: path_str,
            format: dataset_name.to_owned(),
            mmap,
            sections: index.sections,
        })
    }

    /// Human-readable "dataset-name (file-path)" string for diagnostics
    pub fn description(&self) -> String {
        format!("{} ({})", self.format, self.path)
    }

    /// Path of the mapped file
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Total mapped size in bytes
    pub fn mapped_len(&self) -> usize {
        self.mmap.len()
    }

    /// Look up a section descriptor by name and expected type.
    ///
    /// Fails if the name is absent, the section was never committed, or the
    /// stored type tag differs from `type_tag`.
    pub fn find(&self, section: &str, type_tag: &str) -> Result<&SectionInfo> {
        let info = self
            .sections
            .get(section)
            .ok_or_else(|| DatasetError::NoSuchSection(section.to_owned()))?;

        if info.offset() == 0 {
            return Err(DatasetError::SectionNotWritten(section.to_owned()));
        }
        if info.type_tag() != type_tag {
            return Err(DatasetError::WrongSectionType {
                section: section.to_owned(),
                expected: type_tag.to_owned(),
                actual: info.type_tag().to_owned(),
            });
        }

        Ok(info)
    }

    /// Reinterpret `count` elements of `T` at `offset` within the mapping.
    ///
    /// The byte range is bounds-checked against the mapped length; offsets
    /// and counts come from the (untrusted) index, so this check is what
    /// stands between a corrupted file and out-of-bounds reads. The offset
    /// must also satisfy `T`'s alignment; sections are aligned by
    /// construction, so a violation means the file is corrupt.
    pub fn data<T: SectionPod>(&self, offset: u64, count: usize) -> Result<&[T]> {
        let len = (count as u64)
            .checked_mul(std::mem::size_of::<T>() as u64)
            .ok_or(DatasetError::OutOfBounds {
                offset,
                len: u64::MAX,
                mapped: self.mmap.len() as u64,
            })?;

        let in_bounds = offset
            .checked_add(len)
            .map(|end| end <= self.mmap.len() as u64)
            .unwrap_or(false);
        if !in_bounds {
            return Err(DatasetError::OutOfBounds {
                offset,
                len,
                mapped: self.mmap.len() as u64,
            });
        }

        // SAFETY: range checked above; mmap base is page-aligned, so offset
        // alignment implies pointer alignment
        let ptr = unsafe { self.mmap.as_ptr().add(offset as usize) };
        if (ptr as usize) % std::mem::align_of::<T>() != 0 {
            return Err(DatasetError::Misaligned {
                offset,
                align: std::mem::align_of::<T>() as u64,
            });
        }

        // SAFETY: in bounds, aligned, and T is SectionPod (any bytes valid)
        Ok(unsafe { slice::from_raw_parts(ptr.cast::<T>(), count) })
    }

    /// Touch every page of `data` to fault it into the OS page cache.
    ///
    /// Useful only when the structure has a chance of fitting in memory and
    /// is randomly accessed at high frequency (thousands of lookups per
    /// second). Makes no assumption about the page alignment of the start
    /// of `data`.
    pub fn warm_cache(data: &[u8]) {
        let mut buf = [0u8; WARM_PAGE_SIZE];
        let mut pos = 0;

        let page_off = (data.as_ptr() as usize) % WARM_PAGE_SIZE;
        if page_off != 0 {
            let len = (WARM_PAGE_SIZE - page_off).min(data.len());
            buf[..len].copy_from_slice(&data[..len]);
            pos = len;
        }

        while pos < data.len() {
            let len = WARM_PAGE_SIZE.min(data.len() - pos);
            buf[..len].copy_from_slice(&data[pos..pos + len]);
            pos += len;
        }

        // keep the copies from being optimized out
        std::hint::black_box(&buf);
    }
}

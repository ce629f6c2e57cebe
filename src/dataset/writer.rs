//! Dataset writer
//!
//! Owns the output file, the section index, and alignment bookkeeping.
//! Sections may be created in any order, but each section's bytes must be
//! written in one uninterrupted span; switching back to a section whose
//! offset is already fixed is an "interleaved write" error. Closing the
//! writer serializes the index at the end of the file and patches the
//! header with its location.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, warn};

use super::header::{MmdHeader, MMD_MAGIC, MMD_VERSION};
use super::index::{DatasetIndex, SectionInfo};
use crate::section::pod;
use crate::utils::{DatasetError, Result};

/// Sequential, single-pass dataset file writer
///
/// Most methods are meant to be called through the section writer types in
/// [`crate::section`]; the raw byte interface is public so custom section
/// encodings can be built on top of the same lifecycle.
pub struct DatasetWriter {
    out: Option<BufWriter<File>>,
    path: String,
    index: DatasetIndex,
    active_section: Option<String>,
}

impl DatasetWriter {
    /// Create a dataset file and write a placeholder header.
    ///
    /// `dataset_name` and `format_version` are stored in the index and
    /// re-checked by [`super::Dataset::open`] as an application-level
    /// compatibility gate on top of the container format version.
    pub fn new<P: AsRef<Path>>(path: P, dataset_name: &str, format_version: u32) -> Result<Self> {
        if dataset_name.is_empty() {
            return Err(DatasetError::EmptyDatasetName);
        }

        let path_str = path.as_ref().display().to_string();
        let file = File::create(path.as_ref()).map_err(|e| DatasetError::OpenFailed {
            path: path_str.clone(),
            source: e,
        })?;

        let mut writer = DatasetWriter {
            out: Some(BufWriter::new(file)),
            path: path_str,
            index: DatasetIndex {
                dataset_name: dataset_name.to_owned(),
                format_version,
                sections: BTreeMap::new(),
            },
            active_section: None,
        };

        writer.out()?.write_all(pod::as_bytes(&MmdHeader::placeholder()))?;
        Ok(writer)
    }

    /// Path of the file being written
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Register a new, empty section descriptor.
    ///
    /// Fails on an empty name or type, a non-power-of-two alignment, or a
    /// duplicate section name.
    pub fn create_section(&mut self, name: &str, type_tag: &str, alignment: u64) -> Result<()> {
        if name.is_empty() {
            return Err(DatasetError::EmptySectionName);
        }
        if type_tag.is_empty() {
            return Err(DatasetError::EmptySectionType);
        }
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(DatasetError::BadAlignment(alignment));
        }
        if self.index.sections.contains_key(name) {
            return Err(DatasetError::DuplicateSection(name.to_owned()));
        }

        self.index
            .sections
            .insert(name.to_owned(), SectionInfo::new(type_tag, alignment));
        Ok(())
    }

    /// Remove a just-created section that has not been written to yet.
    ///
    /// Used by section writer constructors to roll back on validation
    /// failure so the name stays available.
    pub fn uncreate_section(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(DatasetError::EmptySectionName);
        }

        let info = self
            .index
            .sections
            .get(name)
            .ok_or_else(|| DatasetError::NoSuchSection(name.to_owned()))?;

        if info.offset() > 0 {
            return Err(DatasetError::UncreateAfterWrite(name.to_owned()));
        }

        self.index.sections.remove(name);
        Ok(())
    }

    /// Append raw bytes to a section's region.
    ///
    /// The first write to a section pads the stream to the section's
    /// alignment and fixes its offset at the current position.
    pub fn write(&mut self, section: &str, bytes: &[u8]) -> Result<()> {
        self.set_active_section(section)?;
        self.out()?.write_all(bytes)?;
        Ok(())
    }

    /// Mark a section finished, fixing its offset even if it is empty.
    pub fn commit_section(&mut self, section: &str) -> Result<()> {
        self.set_active_section(section)
    }

    /// Record a metadata attribute on a section descriptor.
    pub fn set_attribute<T: Display>(&mut self, section: &str, attr: &str, value: T) -> Result<()> {
        self.index
            .sections
            .get_mut(section)
            .ok_or_else(|| DatasetError::NoSuchSection(section.to_owned()))?
            .set_attribute(attr, value);
        Ok(())
    }

    /// Serialize the index, patch the header, and flush the file.
    ///
    /// Idempotent. Also invoked on drop, where errors are logged and
    /// swallowed; call this explicitly to observe failures.
    pub fn close(&mut self) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };

        let index_offset = out.stream_position()?;
        let index_bytes = bincode::serialize(&self.index).map_err(DatasetError::IndexEncode)?;
        out.write_all(&index_bytes)?;

        let header = MmdHeader {
            magic: MMD_MAGIC,
            version: MMD_VERSION,
            index_offset,
            index_length: index_bytes.len() as u64,
        };
        out.seek(SeekFrom::Start(0))?;
        out.write_all(pod::as_bytes(&header))?;
        out.flush()?;
        out.get_ref().sync_all()?;

        // only now is the writer considered closed; a failure above keeps
        // the handle so a retry does not report success on a broken file
        self.out = None;

        debug!(
            path = %self.path,
            sections = self.index.sections.len(),
            index_offset,
            index_length = index_bytes.len(),
            "dataset closed"
        );
        Ok(())
    }

    fn out(&mut self) -> Result<&mut BufWriter<File>> {
        self.out.as_mut().ok_or(DatasetError::WriterClosed)
    }

    /// Switch the active section, padding the stream to the new section's
    /// alignment and fixing its offset. Only one section may be written at
    /// a time.
    fn set_active_section(&mut self, section: &str) -> Result<()> {
        // Slightly inefficient string compare, but this only runs at
        // dataset creation time.
        if self.active_section.as_deref() == Some(section) {
            return Ok(());
        }

        let info = self
            .index
            .sections
            .get(section)
            .ok_or_else(|| DatasetError::NoSuchSection(section.to_owned()))?;

        if info.offset() > 0 {
            return Err(DatasetError::InterleavedWrite(section.to_owned()));
        }

        let alignment = info.alignment();
        self.align_stream(alignment)?;
        let offset = self.out()?.stream_position()?;
        self.index
            .sections
            .get_mut(section)
            .expect("section vanished while being activated")
            .set_offset(offset);
        self.active_section = Some(section.to_owned());
        Ok(())
    }

    fn align_stream(&mut self, alignment: u64) -> Result<()> {
        let out = self.out()?;
        while out.stream_position()? % alignment != 0 {
            out.write_all(&[0])?;
        }
        Ok(())
    }
}

impl Drop for DatasetWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path, error = %e, "failed to close dataset writer");
        }
    }
}

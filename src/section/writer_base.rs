//! Shared section writer lifecycle
//!
//! Every section encoding writes into a named, typed, aligned region of the
//! dataset file through the same lifecycle: create the descriptor, set
//! attributes, write bytes, commit exactly once. Constructors that fail
//! validation roll the descriptor back so the name stays available.

use std::fmt::Display;

use super::pod::{self, SectionPod};
use crate::dataset::DatasetWriter;
use crate::utils::{DatasetError, Result};

/// Handle tying a section writer to its dataset writer.
///
/// Holding the dataset writer by `&mut` means only one section writer can
/// exist at a time, which makes the one-section-at-a-time write discipline
/// structural rather than a runtime check.
pub(crate) struct SectionHandle<'w> {
    writer: &'w mut DatasetWriter,
    name: String,
    committed: bool,
}

impl<'w> SectionHandle<'w> {
    pub fn new(
        writer: &'w mut DatasetWriter,
        name: &str,
        type_tag: &str,
        alignment: u64,
    ) -> Result<Self> {
        writer.create_section(name, type_tag, alignment)?;
        Ok(SectionHandle {
            writer,
            name: name.to_owned(),
            committed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.committed {
            return Err(DatasetError::WriteAfterCommit(self.name.clone()));
        }
        self.writer.write(&self.name, bytes)
    }

    pub fn write_pod<T: SectionPod>(&mut self, value: &T) -> Result<()> {
        self.write_bytes(pod::as_bytes(value))
    }

    pub fn write_slice<T: SectionPod>(&mut self, values: &[T]) -> Result<()> {
        self.write_bytes(pod::slice_as_bytes(values))
    }

    pub fn set_attribute<T: Display>(&mut self, attr: &str, value: T) -> Result<()> {
        self.writer.set_attribute(&self.name, attr, value)
    }

    /// Finish the section, fixing its offset (even for empty sections).
    /// Idempotent.
    pub fn commit(&mut self) -> Result<()> {
        if !self.committed {
            self.writer.commit_section(&self.name)?;
            self.committed = true;
        }
        Ok(())
    }

    /// Undo section creation; only legal before the first write.
    pub fn rollback(self) -> Result<()> {
        self.writer.uncreate_section(&self.name)
    }
}

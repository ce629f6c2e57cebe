//! Opaque archive section
//!
//! Escape hatch for metadata that has no fixed layout: values are run
//! through a serializer into an opaque byte blob. The one section type that
//! is not zero-copy; reading deserializes into owned values. Reads must
//! happen in the same order and with the same types as the writes.

use std::io::Cursor;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::writer_base::SectionHandle;
use crate::dataset::{Dataset, DatasetWriter};
use crate::utils::{DatasetError, Result};

/// Section type tag for archives
pub const ARCHIVE_TYPE_TAG: &str = "archive";

/// Archives are plain bytes, no alignment requirement
pub const ARCHIVE_ALIGNMENT: u64 = 1;

/// Writer for an archive section
pub struct ArchiveWriter<'w> {
    handle: SectionHandle<'w>,
    buf: Vec<u8>,
}

impl<'w> ArchiveWriter<'w> {
    pub fn new(writer: &'w mut DatasetWriter, name: &str) -> Result<Self> {
        let handle = SectionHandle::new(writer, name, ARCHIVE_TYPE_TAG, ARCHIVE_ALIGNMENT)?;
        Ok(ArchiveWriter {
            handle,
            buf: Vec::new(),
        })
    }

    /// Serialize one value onto the end of the archive.
    pub fn append<T: Serialize>(&mut self, value: &T) -> Result<()> {
        bincode::serialize_into(&mut self.buf, value).map_err(DatasetError::ArchiveEncode)
    }

    /// Serialized size so far in bytes
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write the blob and finalize the section. Idempotent; also invoked on
    /// drop with the error logged and swallowed.
    pub fn commit(&mut self) -> Result<()> {
        if self.handle.is_committed() {
            return Ok(());
        }
        self.handle.write_bytes(&self.buf)?;
        self.handle.set_attribute("size", self.buf.len())?;
        self.handle.commit()
    }
}

impl Drop for ArchiveWriter<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            warn!(section = %self.handle.name(), error = %e, "archive section commit failed on drop");
        }
    }
}

/// Sequential reader for an archive section
///
/// Holds a private copy of the blob and a read position, so unlike the
/// zero-copy views it does not borrow the dataset.
pub struct Archive {
    cursor: Cursor<Vec<u8>>,
}

impl Archive {
    pub fn open(dataset: &Dataset, name: &str) -> Result<Self> {
        let info = dataset.find(name, ARCHIVE_TYPE_TAG)?;
        let size: usize = info.attribute("size")?;
        let bytes = dataset.data::<u8>(info.offset(), size)?;
        Ok(Archive {
            cursor: Cursor::new(bytes.to_vec()),
        })
    }

    /// Deserialize the next value from the archive.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T> {
        bincode::deserialize_from(&mut self.cursor).map_err(DatasetError::ArchiveDecode)
    }

    /// Bytes remaining past the read position
    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len() - self.cursor.position() as usize
    }
}

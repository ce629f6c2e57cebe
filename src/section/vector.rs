//! Flat vector section
//!
//! The workhorse section type: a contiguous array of fixed-layout elements,
//! usable at sizes far beyond available heap because elements are read
//! straight out of the mapping.

use tracing::warn;

use super::pod::{self, SectionPod};
use super::writer_base::SectionHandle;
use crate::dataset::{Dataset, DatasetWriter};
use crate::utils::{DatasetError, Result};

/// Section type tag for flat vectors
pub const VECTOR_TYPE_TAG: &str = "vector";

/// Default section alignment
pub const VECTOR_ALIGNMENT: u64 = 16;

/// Append-only writer for a flat vector section
pub struct VectorWriter<'w, T: SectionPod> {
    handle: SectionHandle<'w>,
    len: u64,
    _marker: std::marker::PhantomData<T>,
}

impl<'w, T: SectionPod> VectorWriter<'w, T> {
    pub fn new(writer: &'w mut DatasetWriter, name: &str) -> Result<Self> {
        Self::with_alignment(writer, name, VECTOR_ALIGNMENT)
    }

    pub fn with_alignment(
        writer: &'w mut DatasetWriter,
        name: &str,
        alignment: u64,
    ) -> Result<Self> {
        let mut handle = SectionHandle::new(writer, name, VECTOR_TYPE_TAG, alignment)?;

        // an alignment below the element's would commit a file the mapped
        // view then rejects as misaligned
        let required = std::mem::align_of::<T>() as u64;
        if alignment < required {
            handle.rollback()?;
            return Err(DatasetError::InsufficientAlignment {
                alignment,
                required,
            });
        }

        handle.set_attribute("elem_size", std::mem::size_of::<T>())?;
        Ok(VectorWriter {
            handle,
            len: 0,
            _marker: std::marker::PhantomData,
        })
    }

    /// Append one element to the section.
    pub fn push(&mut self, value: &T) -> Result<()> {
        self.handle.write_pod(value)?;
        self.len += 1;
        Ok(())
    }

    /// Append a batch of elements.
    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<()> {
        self.handle.write_slice(values)?;
        self.len += values.len() as u64;
        Ok(())
    }

    /// Number of elements written so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finalize the section. Idempotent; also invoked on drop with the
    /// error logged and swallowed, so call this explicitly to observe
    /// failures.
    pub fn commit(&mut self) -> Result<()> {
        if self.handle.is_committed() {
            return Ok(());
        }
        // count is stored for the reader's convenience; the element size is
        // what gets validated on open
        self.handle.set_attribute("size", self.len)?;
        self.handle.commit()
    }
}

impl<T: SectionPod> Drop for VectorWriter<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            warn!(section = %self.handle.name(), error = %e, "vector section commit failed on drop");
        }
    }
}

/// Zero-copy read-only view of a flat vector section
///
/// Borrows the dataset's mapping; indexing is plain pointer arithmetic into
/// mapped memory.
pub struct MappedVector<'a, T: SectionPod> {
    elems: &'a [T],
}

impl<'a, T: SectionPod> MappedVector<'a, T> {
    pub fn open(dataset: &'a Dataset, name: &str) -> Result<Self> {
        let info = dataset.find(name, VECTOR_TYPE_TAG)?;

        let elem_size: usize = info.attribute("elem_size")?;
        if elem_size != std::mem::size_of::<T>() {
            return Err(DatasetError::SizeMismatch {
                what: "element size",
                section: name.to_owned(),
                dataset: dataset.description(),
                expected: std::mem::size_of::<T>(),
                actual: elem_size,
            });
        }

        let size: usize = info.attribute("size")?;
        let elems = dataset.data::<T>(info.offset(), size)?;
        Ok(MappedVector { elems })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, index: usize) -> Option<&'a T> {
        self.elems.get(index)
    }

    /// The whole section as a slice of mapped memory
    #[inline(always)]
    pub fn as_slice(&self) -> &'a [T] {
        self.elems
    }

    pub fn iter(&self) -> std::slice::Iter<'a, T> {
        self.elems.iter()
    }

    /// Fault the section's pages into the OS cache.
    pub fn warm_cache(&self) {
        Dataset::warm_cache(pod::slice_as_bytes(self.elems));
    }
}

impl<T: SectionPod> std::ops::Index<usize> for MappedVector<'_, T> {
    type Output = T;

    #[inline(always)]
    fn index(&self, index: usize) -> &T {
        &self.elems[index]
    }
}

impl<'a, T: SectionPod> IntoIterator for &MappedVector<'a, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elems.iter()
    }
}

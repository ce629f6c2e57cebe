//! Section encodings
//!
//! Each encoding comes as a writer half (used while building a dataset) and
//! a zero-copy view half (used against a mapped dataset). The hashed
//! encodings take a pluggable `BuildHasher`; the default is deterministic
//! so that files written on one machine resolve on another.

use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

use crate::dataset::{Dataset, SectionInfo};
use crate::utils::{DatasetError, Result};

pub mod archive;
pub mod dense_hash_map;
pub mod hash_multimap;
pub mod pod;
pub mod vector;
pub(crate) mod writer_base;

pub use archive::{Archive, ArchiveWriter};
pub use dense_hash_map::{DenseHashMap, DenseHashMapWriter};
pub use hash_multimap::{HashMultimap, HashMultimapWriter};
pub use pod::{PodPair, SectionPod};
pub use vector::{MappedVector, VectorWriter};

/// Deterministic default hash for the hashed section encodings.
///
/// The std `RandomState` is seeded per process and would make writer and
/// reader disagree on slot placement.
pub type DefaultHashBuilder = BuildHasherDefault<FxHasher>;

/// Compare a stored size attribute against the compiled-in type's size.
pub(crate) fn check_size_attr(
    dataset: &Dataset,
    section: &str,
    info: &SectionInfo,
    attr: &str,
    what: &'static str,
    expected: usize,
) -> Result<()> {
    let actual: usize = info.attribute(attr)?;
    if actual != expected {
        return Err(DatasetError::SizeMismatch {
            what,
            section: section.to_owned(),
            dataset: dataset.description(),
            expected,
            actual,
        });
    }
    Ok(())
}

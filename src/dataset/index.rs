//! Section index
//!
//! The index is an ordered map from section name to section descriptor,
//! serialized into the file as one more region and located via the header.
//! Descriptors carry a free-form string attribute map that each section
//! encoding uses to describe and re-validate its own layout.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::{DatasetError, Result};

/// Descriptor for a single named section
///
/// Created empty (offset 0, meaning "not yet written") when a section writer
/// is constructed; the offset is fixed exactly once, when the first bytes of
/// the section are written. Immutable after commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionInfo {
    type_tag: String,
    offset: u64,
    /// Required alignment (power of two). Only meaningful on the write side;
    /// once the offset is fixed the alignment has done its job, so it is not
    /// serialized.
    #[serde(skip)]
    alignment: u64,
    attributes: BTreeMap<String, String>,
}

impl SectionInfo {
    pub(crate) fn new(type_tag: &str, alignment: u64) -> Self {
        SectionInfo {
            type_tag: type_tag.to_owned(),
            offset: 0,
            alignment,
            attributes: BTreeMap::new(),
        }
    }

    /// Byte offset of the section within the file (0 = never written)
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Required section alignment (write side only)
    #[inline]
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Type tag identifying the encoding that owns this section
    #[inline]
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub(crate) fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    pub(crate) fn set_attribute<T: Display>(&mut self, name: &str, value: T) {
        self.attributes.insert(name.to_owned(), value.to_string());
    }

    /// Look up and parse an attribute set by the section's writer
    pub fn attribute<T: FromStr>(&self, name: &str) -> Result<T> {
        let raw = self
            .attributes
            .get(name)
            .ok_or_else(|| DatasetError::NoSuchAttribute(name.to_owned()))?;

        raw.parse().map_err(|_| DatasetError::BadAttributeValue {
            attr: name.to_owned(),
            value: raw.clone(),
        })
    }
}

/// The serialized index region: dataset name and format version for
/// application-level compatibility checks, plus the section map.
#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetIndex {
    pub dataset_name: String,
    pub format_version: u32,
    pub sections: BTreeMap<String, SectionInfo>,
}

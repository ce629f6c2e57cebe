//! Error types for mapped-dataset

use std::io;
use thiserror::Error;

/// Dataset container errors
///
/// Every failure condition is a distinct variant so callers can decide
/// whether to abort, log, or refuse to serve the affected section.
/// Nothing in this crate retries internally.
#[derive(Error, Debug)]
pub enum DatasetError {
    // === Format errors (detected once, at open time) ===
    #[error("{path}: failed to open dataset: {source}")]
    OpenFailed { path: String, source: io::Error },

    #[error("{path}: file too small: {size} bytes, minimum {minimum} bytes")]
    FileTooSmall { path: String, size: u64, minimum: u64 },

    #[error("{path}: invalid magic: expected 0x{expected:08X}, got 0x{actual:08X}")]
    InvalidMagic { path: String, expected: u32, actual: u32 },

    #[error("{path}: unsupported container version {actual} (expected {expected})")]
    UnsupportedVersion { path: String, expected: u32, actual: u32 },

    #[error("{path}: corrupted file (missing section index)")]
    CorruptIndex { path: String },

    #[error("{path}: failed to decode section index: {source}")]
    IndexDecode { path: String, source: bincode::Error },

    #[error("{path}: unexpected dataset name {actual:?} (expected {expected:?})")]
    DatasetNameMismatch { path: String, expected: String, actual: String },

    #[error("{path}: unsupported format version {actual} (expected {expected})")]
    FormatVersionMismatch { path: String, expected: u32, actual: u32 },

    // === Schema errors (detected at section view construction) ===
    #[error("no such section {0}")]
    NoSuchSection(String),

    #[error("section {0} was never written")]
    SectionNotWritten(String),

    #[error("invalid section type {actual} (expected {expected}) for section {section}")]
    WrongSectionType { section: String, expected: String, actual: String },

    #[error("wrong {what} for section {section} in {dataset}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        section: String,
        dataset: String,
        expected: usize,
        actual: usize,
    },

    #[error("no such attribute {0}")]
    NoSuchAttribute(String),

    #[error("invalid value {value:?} for attribute {attr}")]
    BadAttributeValue { attr: String, value: String },

    // === Writer discipline errors ===
    #[error("empty dataset name")]
    EmptyDatasetName,

    #[error("invalid empty section name")]
    EmptySectionName,

    #[error("invalid empty section type")]
    EmptySectionType,

    #[error("alignment must be a power of two, got {0}")]
    BadAlignment(u64),

    #[error("alignment {alignment} too small for section elements (need {required})")]
    InsufficientAlignment { alignment: u64, required: u64 },

    #[error("attempt to create duplicate section {0}")]
    DuplicateSection(String),

    #[error("cannot uncreate section {0} after data has been written")]
    UncreateAfterWrite(String),

    #[error("interleaved write access to section {0}")]
    InterleavedWrite(String),

    #[error("write access to committed section {0}")]
    WriteAfterCommit(String),

    #[error("dataset writer is closed")]
    WriterClosed,

    #[error("attempt to insert empty key into section {0}")]
    EmptyKeyInsert(String),

    #[error("duplicate key detected in section {0}")]
    DuplicateKey(String),

    #[error("invalid max load factor {0} (must be in [0.01, 0.99])")]
    BadLoadFactor(f64),

    #[error("invalid value for hash_bits: {0}")]
    BadHashBits(u32),

    #[error("failed to encode section index: {0}")]
    IndexEncode(#[source] bincode::Error),

    #[error("archive serialization failed: {0}")]
    ArchiveEncode(#[source] bincode::Error),

    #[error("archive deserialization failed: {0}")]
    ArchiveDecode(#[source] bincode::Error),

    // === Bounds errors (defend against corrupted or truncated files) ===
    #[error("access beyond end of mapping: offset {offset} + {len} bytes exceeds {mapped}")]
    OutOfBounds { offset: u64, len: u64, mapped: u64 },

    #[error("misaligned access at offset {offset} (required alignment {align})")]
    Misaligned { offset: u64, align: u64 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, DatasetError>;

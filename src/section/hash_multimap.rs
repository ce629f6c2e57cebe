//! Bucketed sorted multimap section
//!
//! Any number of values per key. Entries are routed into `2^hash_bits`
//! buckets by the low bits of the key hash; each bucket is sorted by key at
//! commit time and located through a cumulative offset index, so a lookup is
//! one hash plus a binary search over a single bucket. Iteration order
//! within one key's run is the insertion order (the sort is stable).

use std::hash::{BuildHasher, Hash};

use tracing::warn;

use super::pod::{self, PodPair, SectionPod};
use super::writer_base::SectionHandle;
use super::{check_size_attr, DefaultHashBuilder};
use crate::dataset::{Dataset, DatasetWriter};
use crate::utils::{DatasetError, Result};

/// Section type tag for bucketed multimaps
pub const MULTIMAP_TYPE_TAG: &str = "bucket-multimap";

/// Default section alignment
pub const MULTIMAP_ALIGNMENT: u64 = 16;

/// Default number of hash bits; pick this larger for huge tables.
pub const MULTIMAP_HASH_BITS: u32 = 10;

/// Index entries are element counts, cumulative per bucket
type IndexElem = u64;

fn index_offset(data_offset: u64, data_len: u64) -> u64 {
    // the cumulative index follows the entries, padded to its own alignment
    let end = data_offset + data_len;
    let align = std::mem::align_of::<IndexElem>() as u64;
    (end + align - 1) & !(align - 1)
}

/// Writer for a bucketed multimap section
///
/// Buffers entries per bucket in memory; sorting and all file writes happen
/// at commit time.
pub struct HashMultimapWriter<'w, K, V, S = DefaultHashBuilder>
where
    K: SectionPod + Hash + Ord,
    V: SectionPod,
    S: BuildHasher,
{
    handle: SectionHandle<'w>,
    size: u64,
    hash_mask: u64,
    buckets: Vec<Vec<PodPair<K, V>>>,
    hash_builder: S,
}

impl<'w, K, V> HashMultimapWriter<'w, K, V, DefaultHashBuilder>
where
    K: SectionPod + Hash + Ord,
    V: SectionPod,
{
    /// Create a multimap section with the default bucket count, alignment,
    /// and hash function.
    pub fn new(writer: &'w mut DatasetWriter, name: &str) -> Result<Self> {
        Self::with_options(
            writer,
            name,
            MULTIMAP_HASH_BITS,
            MULTIMAP_ALIGNMENT,
            DefaultHashBuilder::default(),
        )
    }
}

impl<'w, K, V, S> HashMultimapWriter<'w, K, V, S>
where
    K: SectionPod + Hash + Ord,
    V: SectionPod,
    S: BuildHasher,
{
    pub fn with_options(
        writer: &'w mut DatasetWriter,
        name: &str,
        hash_bits: u32,
        alignment: u64,
        hash_builder: S,
    ) -> Result<Self> {
        let mut handle = SectionHandle::new(writer, name, MULTIMAP_TYPE_TAG, alignment)?;

        // the index padding is computed relative to the section start, so
        // the section offset itself must satisfy both element alignments
        let required = std::mem::align_of::<PodPair<K, V>>()
            .max(std::mem::align_of::<IndexElem>()) as u64;
        if alignment < required {
            handle.rollback()?;
            return Err(DatasetError::InsufficientAlignment {
                alignment,
                required,
            });
        }

        if !(1..=32).contains(&hash_bits) {
            handle.rollback()?;
            return Err(DatasetError::BadHashBits(hash_bits));
        }

        handle.set_attribute("key_size", std::mem::size_of::<K>())?;
        handle.set_attribute("mapped_size", std::mem::size_of::<V>())?;
        handle.set_attribute("elem_size", std::mem::size_of::<PodPair<K, V>>())?;
        handle.set_attribute("index_elem_size", std::mem::size_of::<IndexElem>())?;
        handle.set_attribute("hash_bits", hash_bits)?;

        Ok(HashMultimapWriter {
            handle,
            size: 0,
            hash_mask: (1u64 << hash_bits) - 1,
            buckets: vec![Vec::new(); 1usize << hash_bits],
            hash_builder,
        })
    }

    /// Buffer one entry. Duplicate keys are fine; all their values are kept.
    pub fn insert(&mut self, key: K, value: V) {
        let bucket = (self.hash_builder.hash_one(&key) & self.hash_mask) as usize;
        self.buckets[bucket].push(PodPair::new(key, value));
        self.size += 1;
    }

    /// Number of entries buffered so far
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Sort the buckets, write entries and cumulative index, finalize the
    /// section. Idempotent; also invoked on drop with the error logged and
    /// swallowed.
    pub fn commit(&mut self) -> Result<()> {
        if self.handle.is_committed() {
            return Ok(());
        }

        let mut index: Vec<IndexElem> = Vec::with_capacity(self.buckets.len() + 1);
        index.push(0);

        let mut written = 0u64;
        for bucket in &mut self.buckets {
            bucket.sort_by(|a, b| a.first.cmp(&b.first));
            self.handle.write_slice(bucket)?;
            written += pod::slice_as_bytes(bucket.as_slice()).len() as u64;
            index.push(index.last().copied().unwrap_or(0) + bucket.len() as u64);
        }

        let padding = index_offset(0, written) - written;
        if padding > 0 {
            self.handle.write_bytes(&vec![0u8; padding as usize])?;
        }

        self.handle.write_slice(&index)?;
        self.handle.set_attribute("size", self.size)?;
        self.handle.commit()
    }
}

impl<K, V, S> Drop for HashMultimapWriter<'_, K, V, S>
where
    K: SectionPod + Hash + Ord,
    V: SectionPod,
    S: BuildHasher,
{
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            warn!(section = %self.handle.name(), error = %e, "multimap commit failed on drop");
        }
    }
}

/// Zero-copy read-only view of a bucketed multimap section
pub struct HashMultimap<'a, K, V, S = DefaultHashBuilder>
where
    K: SectionPod + Hash + Ord,
    V: SectionPod,
    S: BuildHasher,
{
    entries: &'a [PodPair<K, V>],
    index: &'a [IndexElem],
    hash_mask: u64,
    hash_bits: u32,
    hash_builder: S,
}

impl<'a, K, V> HashMultimap<'a, K, V, DefaultHashBuilder>
where
    K: SectionPod + Hash + Ord,
    V: SectionPod,
{
    pub fn open(dataset: &'a Dataset, name: &str) -> Result<Self> {
        Self::with_hasher(dataset, name, DefaultHashBuilder::default())
    }
}

impl<'a, K, V, S> HashMultimap<'a, K, V, S>
where
    K: SectionPod + Hash + Ord,
    V: SectionPod,
    S: BuildHasher,
{
    /// Open the section with a custom hash function. It must match the one
    /// the file was written with.
    pub fn with_hasher(dataset: &'a Dataset, name: &str, hash_builder: S) -> Result<Self> {
        let info = dataset.find(name, MULTIMAP_TYPE_TAG)?;

        check_size_attr(dataset, name, info, "key_size", "key size", std::mem::size_of::<K>())?;
        check_size_attr(
            dataset,
            name,
            info,
            "mapped_size",
            "value size",
            std::mem::size_of::<V>(),
        )?;
        check_size_attr(
            dataset,
            name,
            info,
            "elem_size",
            "element size",
            std::mem::size_of::<PodPair<K, V>>(),
        )?;
        check_size_attr(
            dataset,
            name,
            info,
            "index_elem_size",
            "index element size",
            std::mem::size_of::<IndexElem>(),
        )?;

        let hash_bits: u32 = info.attribute("hash_bits")?;
        if !(1..=32).contains(&hash_bits) {
            return Err(DatasetError::BadHashBits(hash_bits));
        }

        let size: u64 = info.attribute("size")?;
        let elem_size = std::mem::size_of::<PodPair<K, V>>() as u64;

        let entries = dataset.data::<PodPair<K, V>>(info.offset(), size as usize)?;
        let index = dataset.data::<IndexElem>(
            index_offset(info.offset(), elem_size * size),
            (1usize << hash_bits) + 1,
        )?;

        Ok(HashMultimap {
            entries,
            index,
            hash_mask: (1u64 << hash_bits) - 1,
            hash_bits,
            hash_builder,
        })
    }

    /// Total number of entries across all keys
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of hash bits the section was built with
    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    /// All entries in bucket order; entries with equal keys are adjacent.
    pub fn iter(&self) -> std::slice::Iter<'a, PodPair<K, V>> {
        self.entries.iter()
    }

    /// Tail of the entry array starting at the first entry whose key is not
    /// less than `key` within its bucket.
    ///
    /// Callers that scan from here must check keys themselves; the run for
    /// `key` ends at the first entry with a different key.
    pub fn lower_bound(&self, key: &K) -> &'a [PodPair<K, V>] {
        let bucket = (self.hash_builder.hash_one(key) & self.hash_mask) as usize;
        let lo = self.index[bucket] as usize;
        let hi = self.index[bucket + 1] as usize;
        let within = self.entries[lo..hi].partition_point(|e| e.first < *key);
        &self.entries[lo + within..]
    }

    /// Iterate over all values stored under `key`, in insertion order.
    pub fn get(&self, key: &K) -> impl Iterator<Item = &'a V> {
        let key = *key;
        self.lower_bound(&key)
            .iter()
            .take_while(move |e| e.first == key)
            .map(|e| &e.second)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.lower_bound(key).first().map_or(false, |e| e.first == *key)
    }

    /// Fault the entry pages into the OS cache.
    pub fn warm_cache(&self) {
        Dataset::warm_cache(pod::slice_as_bytes(self.entries));
    }
}

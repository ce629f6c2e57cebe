//! Open-addressed unique map section
//!
//! At most one value per key, optimized for raw lookup speed at the cost of
//! memory. The table is built once at commit time; the reader performs
//! lookups with the identical probe sequence against mapped memory, so the
//! hash function must be the same on both sides (the default is
//! deterministic across processes).

use std::hash::{BuildHasher, Hash};

use tracing::warn;

use super::pod::{self, PodPair, SectionPod};
use super::writer_base::SectionHandle;
use super::{check_size_attr, DefaultHashBuilder};
use crate::dataset::{Dataset, DatasetWriter};
use crate::utils::{DatasetError, Result};

/// Section type tag for dense hash maps
pub const DENSE_MAP_TYPE_TAG: &str = "dense-map";

/// Default section alignment
pub const DENSE_MAP_ALIGNMENT: u64 = 16;

/// Default maximum load factor; lower values trade memory for faster
/// lookups.
pub const DENSE_MAP_MAX_LOAD_FACTOR: f64 = 0.8;

/// Probe sequence shared by table construction and lookup.
///
/// Starts at `hash & (size - 1)` and advances by an incrementing step:
/// `index = (index + iter) & (size - 1)`. On a power-of-two table this
/// walks triangular-number offsets and visits every slot exactly once per
/// sweep; after a full sweep the index parks at `size`. Writer and reader
/// must agree bit-for-bit on slot placement, so this sequence is part of
/// the on-disk format.
struct Probe {
    size: u64,
    mask: u64,
    index: u64,
    iter: u64,
}

impl Probe {
    fn new(hash: u64, size: u64) -> Self {
        let mask = size.wrapping_sub(1);
        Probe {
            size,
            mask,
            index: hash & mask,
            iter: 0,
        }
    }

    #[inline(always)]
    fn index(&self) -> u64 {
        self.index
    }

    #[inline(always)]
    fn advance(&mut self) {
        self.iter += 1;
        if self.iter < self.size {
            self.index = (self.index + self.iter) & self.mask;
        } else {
            self.index = self.size;
        }
    }
}

/// Writer for a dense hash map section
///
/// Collects pairs in memory and builds the open-addressed table at commit
/// time; duplicate keys are therefore detected at commit, not at insert.
pub struct DenseHashMapWriter<'w, K, V, S = DefaultHashBuilder>
where
    K: SectionPod + Hash + Eq,
    V: SectionPod,
    S: BuildHasher,
{
    handle: SectionHandle<'w>,
    empty_key: K,
    max_load_factor: f64,
    pairs: Vec<PodPair<K, V>>,
    hash_builder: S,
}

impl<'w, K, V> DenseHashMapWriter<'w, K, V, DefaultHashBuilder>
where
    K: SectionPod + Hash + Eq,
    V: SectionPod,
{
    /// Create a dense hash map section with the default load factor,
    /// alignment, and hash function.
    ///
    /// `empty_key` is the caller-chosen sentinel marking unoccupied slots;
    /// it must never be inserted as a real key.
    pub fn new(writer: &'w mut DatasetWriter, name: &str, empty_key: K) -> Result<Self> {
        Self::with_options(
            writer,
            name,
            empty_key,
            DENSE_MAP_MAX_LOAD_FACTOR,
            DENSE_MAP_ALIGNMENT,
            DefaultHashBuilder::default(),
        )
    }
}

impl<'w, K, V, S> DenseHashMapWriter<'w, K, V, S>
where
    K: SectionPod + Hash + Eq,
    V: SectionPod,
    S: BuildHasher,
{
    pub fn with_options(
        writer: &'w mut DatasetWriter,
        name: &str,
        empty_key: K,
        max_load_factor: f64,
        alignment: u64,
        hash_builder: S,
    ) -> Result<Self> {
        let mut handle = SectionHandle::new(writer, name, DENSE_MAP_TYPE_TAG, alignment)?;

        let required = std::mem::align_of::<PodPair<K, V>>() as u64;
        if alignment < required {
            handle.rollback()?;
            return Err(DatasetError::InsufficientAlignment {
                alignment,
                required,
            });
        }

        // tolerances allow 0.01 and 0.99 to survive float rounding
        if !(0.009999..=0.990001).contains(&max_load_factor) {
            handle.rollback()?;
            return Err(DatasetError::BadLoadFactor(max_load_factor));
        }

        handle.set_attribute("key_size", std::mem::size_of::<K>())?;
        handle.set_attribute("mapped_size", std::mem::size_of::<V>())?;
        handle.set_attribute("elem_size", std::mem::size_of::<PodPair<K, V>>())?;

        Ok(DenseHashMapWriter {
            handle,
            empty_key,
            max_load_factor,
            pairs: Vec::new(),
            hash_builder,
        })
    }

    /// Buffer one pair for the table.
    ///
    /// Inserting the sentinel key fails immediately; a duplicate real key
    /// is only detected at commit, when the table is built.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        if key == self.empty_key {
            return Err(DatasetError::EmptyKeyInsert(self.handle.name().to_owned()));
        }
        self.pairs.push(PodPair::new(key, value));
        Ok(())
    }

    /// Number of pairs buffered so far
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Build and write the table, then finalize the section.
    ///
    /// The sentinel pair is appended as one extra trailing slot so the
    /// reader can recover the empty key without a separate attribute.
    /// Idempotent; also invoked on drop with the error logged and
    /// swallowed, so call this explicitly to observe duplicate-key
    /// failures.
    pub fn commit(&mut self) -> Result<()> {
        if self.handle.is_committed() {
            return Ok(());
        }

        self.handle.set_attribute("population", self.pairs.len())?;

        let table = self.build_table()?;
        self.handle.write_slice(&table)?;
        self.handle
            .write_pod(&PodPair::new(self.empty_key, V::zeroed()))?;
        self.handle.set_attribute("size", table.len())?;
        self.handle.commit()
    }

    /// Smallest power of two holding the population below the load factor.
    ///
    /// The division truncates, so e.g. 16 entries at 0.99 yield a capacity
    /// of exactly 16 (a table that ends up 100% full; lookups still
    /// terminate because the probe parks after a full sweep).
    fn table_capacity(&self) -> u64 {
        let population = self.pairs.len() as u64;
        if population <= 1 {
            return population;
        }

        let target = (population as f64 / self.max_load_factor) as u64;
        let mut capacity = 1u64;
        while capacity < target {
            capacity <<= 1;
        }
        capacity
    }

    fn build_table(&self) -> Result<Vec<PodPair<K, V>>> {
        // TODO: priority ordering; inserting hot keys first would let the
        // reader find them with fewer probes
        let capacity = self.table_capacity();
        let mut table = vec![PodPair::new(self.empty_key, V::zeroed()); capacity as usize];

        for pair in &self.pairs {
            let slot = self.probe_free_slot(&table, &pair.first)?;
            table[slot] = *pair;
        }

        Ok(table)
    }

    /// Find the slot where `key` belongs, or fail if it is already present.
    fn probe_free_slot(&self, table: &[PodPair<K, V>], key: &K) -> Result<usize> {
        let mut probe = Probe::new(self.hash_builder.hash_one(key), table.len() as u64);

        loop {
            // the table is never past 100% load during construction, so a
            // free slot turns up within one sweep
            let target = &table[probe.index() as usize];
            if target.first == self.empty_key {
                return Ok(probe.index() as usize);
            }
            if target.first == *key {
                return Err(DatasetError::DuplicateKey(self.handle.name().to_owned()));
            }
            probe.advance();
        }
    }
}

impl<K, V, S> Drop for DenseHashMapWriter<'_, K, V, S>
where
    K: SectionPod + Hash + Eq,
    V: SectionPod,
    S: BuildHasher,
{
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            warn!(section = %self.handle.name(), error = %e, "dense map commit failed on drop");
        }
    }
}

/// Zero-copy read-only view of a dense hash map section
///
/// Lookups are lock-free pointer arithmetic against the mapping; any number
/// of threads may query one view (or independent views) concurrently.
pub struct DenseHashMap<'a, K, V, S = DefaultHashBuilder>
where
    K: SectionPod + Hash + Eq,
    V: SectionPod,
    S: BuildHasher,
{
    /// `capacity + 1` slots; the last one is the sentinel pair
    table: &'a [PodPair<K, V>],
    capacity: usize,
    population: usize,
    empty_key: K,
    hash_builder: S,
}

impl<'a, K, V> DenseHashMap<'a, K, V, DefaultHashBuilder>
where
    K: SectionPod + Hash + Eq,
    V: SectionPod,
{
    pub fn open(dataset: &'a Dataset, name: &str) -> Result<Self> {
        Self::with_hasher(dataset, name, DefaultHashBuilder::default())
    }
}

impl<'a, K, V, S> DenseHashMap<'a, K, V, S>
where
    K: SectionPod + Hash + Eq,
    V: SectionPod,
    S: BuildHasher,
{
    /// Open the section with a custom hash function. It must match the one
    /// the file was written with.
    pub fn with_hasher(dataset: &'a Dataset, name: &str, hash_builder: S) -> Result<Self> {
        let info = dataset.find(name, DENSE_MAP_TYPE_TAG)?;

        check_size_attr(dataset, name, info, "key_size", "key size", std::mem::size_of::<K>())?;
        check_size_attr(dataset, name, info, "mapped_size", "value size", std::mem::size_of::<V>())?;
        check_size_attr(
            dataset,
            name,
            info,
            "elem_size",
            "element size",
            std::mem::size_of::<PodPair<K, V>>(),
        )?;

        let capacity: usize = info.attribute("size")?;
        let population: usize = info.attribute("population")?;

        let table = dataset.data::<PodPair<K, V>>(info.offset(), capacity + 1)?;
        let empty_key = table[capacity].first;

        Ok(DenseHashMap {
            table,
            capacity,
            population,
            empty_key,
            hash_builder,
        })
    }

    /// Number of entries in the map
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.population
    }

    pub fn is_empty(&self) -> bool {
        self.population == 0
    }

    /// Number of table slots (always a power of two, except 0 and 1)
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The sentinel key marking unoccupied slots
    pub fn empty_key(&self) -> &K {
        &self.empty_key
    }

    /// Look up the value for `key`.
    pub fn get(&self, key: &K) -> Option<&'a V> {
        if self.capacity == 0 {
            return None;
        }

        let mut probe = Probe::new(self.hash_builder.hash_one(key), self.capacity as u64);
        loop {
            let slot = probe.index() as usize;
            if slot >= self.capacity {
                // full sweep of a 100% loaded table without a match
                return None;
            }

            let target = &self.table[slot];
            if target.first == *key {
                return Some(&target.second);
            }
            if target.first == self.empty_key {
                return None;
            }
            probe.advance();
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Iterate over occupied slots. The order is a property of the hash
    /// function and table size; treat it as unordered.
    pub fn iter(&self) -> impl Iterator<Item = &'a PodPair<K, V>> {
        let empty_key = self.empty_key;
        self.table[..self.capacity]
            .iter()
            .filter(move |e| e.first != empty_key)
    }

    /// Fault the table's pages into the OS cache.
    pub fn warm_cache(&self) {
        Dataset::warm_cache(pod::slice_as_bytes(self.table));
    }
}

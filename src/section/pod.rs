//! Fixed-layout element types
//!
//! Everything stored in a vector, map, or multimap section is reinterpreted
//! directly from mapped memory, so element types must have a fixed,
//! self-describing binary layout with no internal indirection. This module
//! defines the marker trait expressing that constraint and the
//! binary-compatible pair used by the map sections.

use std::slice;

/// Marker for types that can live inside a dataset section.
///
/// # Safety
///
/// Implementors must guarantee:
/// - a fixed size and `#[repr(C)]` (or primitive) layout that is identical
///   between the process writing the dataset and any process reading it;
/// - no pointers, references, or other indirection;
/// - every bit pattern the writer can produce is valid to reinterpret, and
///   the all-zero bit pattern is a valid value (zeroed bytes are used for
///   alignment padding and sentinel slots).
///
/// `usize`/`isize` deliberately have no impl: their size differs across
/// machine word sizes, which would silently change the on-disk layout.
pub unsafe trait SectionPod: Copy + 'static {
    /// An all-zero value, used for sentinel slots and table initialization.
    fn zeroed() -> Self {
        // SAFETY: all-zero is valid per the trait contract
        unsafe { std::mem::zeroed() }
    }
}

macro_rules! impl_section_pod {
    ($($t:ty),* $(,)?) => {
        $(
            // SAFETY: fixed-width primitive, no indirection, zero-valid
            unsafe impl SectionPod for $t {}
        )*
    };
}

impl_section_pod!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

// SAFETY: arrays of pod elements have no padding and no indirection
unsafe impl<T: SectionPod, const N: usize> SectionPod for [T; N] {}

/// Binary-compatible (key, value) pair for the map section types.
///
/// `(K, V)` tuples have no layout guarantee, so the on-disk pair is an
/// explicit `#[repr(C)]` struct. Any padding between or after the fields is
/// zero-filled by [`PodPair::new`] so identical pairs are byte-identical on
/// disk.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PodPair<K, V> {
    pub first: K,
    pub second: V,
}

// SAFETY: repr(C) of two pod fields; padding is zeroed at construction
unsafe impl<K: SectionPod, V: SectionPod> SectionPod for PodPair<K, V> {}

impl<K: SectionPod, V: SectionPod> PodPair<K, V> {
    pub fn new(first: K, second: V) -> Self {
        let mut pair = Self::zeroed();
        pair.first = first;
        pair.second = second;
        pair
    }
}

impl<K: SectionPod, V: SectionPod> From<(K, V)> for PodPair<K, V> {
    fn from((first, second): (K, V)) -> Self {
        PodPair::new(first, second)
    }
}

/// View a pod value as raw bytes for writing.
pub(crate) fn as_bytes<T: SectionPod>(value: &T) -> &[u8] {
    // SAFETY: T is SectionPod, so every byte of the value is initialized
    unsafe { slice::from_raw_parts((value as *const T).cast::<u8>(), std::mem::size_of::<T>()) }
}

/// View a pod slice as raw bytes for writing.
pub(crate) fn slice_as_bytes<T: SectionPod>(values: &[T]) -> &[u8] {
    // SAFETY: as above; len * size_of::<T>() cannot overflow for a live slice
    unsafe {
        slice::from_raw_parts(
            values.as_ptr().cast::<u8>(),
            values.len() * std::mem::size_of::<T>(),
        )
    }
}

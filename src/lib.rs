//! mapped-dataset library
//!
//! Read-optimized binary container for large immutable datasets. A dataset
//! file holds named, typed, aligned sections plus a serialized index; a
//! writer builds the file in one sequential pass, and readers memory-map it
//! and hand out zero-copy views into the mapped sections.
//!
//! ```no_run
//! use mapped_dataset::{Dataset, DatasetWriter, MappedVector, VectorWriter};
//!
//! # fn main() -> mapped_dataset::Result<()> {
//! let mut writer = DatasetWriter::new("scores.mmd", "scores", 1)?;
//! let mut vec = VectorWriter::<u64>::new(&mut writer, "values")?;
//! for i in 0..10 {
//!     vec.push(&(3 * i))?;
//! }
//! vec.commit()?;
//! drop(vec);
//! writer.close()?;
//!
//! let dataset = Dataset::open("scores.mmd", "scores", 1)?;
//! let values = MappedVector::<u64>::open(&dataset, "values")?;
//! assert_eq!(values[4], 12);
//! # Ok(())
//! # }
//! ```

pub mod dataset;
pub mod section;
pub mod utils;

pub use dataset::{Dataset, DatasetWriter, SectionInfo};
pub use section::{
    Archive, ArchiveWriter, DefaultHashBuilder, DenseHashMap, DenseHashMapWriter, HashMultimap,
    HashMultimapWriter, MappedVector, PodPair, SectionPod, VectorWriter,
};
pub use utils::{DatasetError, Result};

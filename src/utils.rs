//! Utilities for implementers of sparse, stable-index, collections.

mod chunk;
mod chunk_iter;
mod chunk_store;
mod error;
mod occupancy;
mod raw_slots;
mod vacancy;

pub mod alloc;

pub use chunk::{BitChunkRaw, IndexInChunkRaw, IndexOfChunkRaw};
pub use chunk_iter::{BitInChunkIter, BitIter};
pub use chunk_store::DynamicBitChunkStore;
pub use error::{AllocationError, EmplaceError};
pub use occupancy::{Occupancy, Truncation};
pub use raw_slots::RawSlots;
pub use vacancy::VacancyIndex;

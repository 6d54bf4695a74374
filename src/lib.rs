//! Stable-index sparse vector.
//!
//! #   Organization
//!
//! This crate is composed of two top modules:
//!
//! -   The `collections` module contains the `SparseVec` container, and its iterators.
//! -   The `utils` module contains a selection of low-level types upon which the container is built: bit chunks,
//!     occupancy maps, and raw storage.
//!
//!
//! #   Stable indexes
//!
//! A `SparseVec` hands out an index on insertion. The index refers to the same slot, and thus the same value, until
//! the value is removed: elements are never shifted, and freed slots are reused by later insertions, lowest first.
//!
//! ```
//! #   use sparse_vector::SparseVec;
//! let mut vec = SparseVec::new();
//!
//! let a = vec.push("a");
//! let b = vec.push("b");
//! let c = vec.push("c");
//!
//! assert_eq!(Some("b"), vec.remove(b));
//!
//! assert_eq!("a", vec[a]);
//! assert_eq!("c", vec[c]);
//!
//! //  The hole left by `b` is filled first.
//! assert_eq!(b, vec.push("d"));
//! ```
//!
//!
//! #   Occupancy
//!
//! The liveness of each slot is tracked by a single bit, in chunks of 64 bits. Looking up a free slot, and stepping
//! from one live slot to the next, both rely on bit-scan instructions, rather than bit-by-bit loops, so that sparse
//! regions cost O(1) per chunk, not O(1) per slot.
//!
//! #### Why `usize`?
//!
//! Unlike bit-keyed collections, which may index far more bits than there are bytes, each index of a `SparseVec`
//! designates a slot in memory. `usize` is therefore always sufficient, and is the natural index type of slices.

#![cfg_attr(not(test), no_std)]
//  Features (language)
//  Features (library)
#![cfg_attr(feature = "allocator_api", feature(allocator_api))]
//  Lints
#![deny(missing_docs)]
//  This author prefers to keep its test modules close to what they are testing.
#![allow(clippy::items_after_test_module)]

extern crate alloc;

pub mod collections;
pub mod utils;

pub use collections::SparseVec;
pub use utils::{AllocationError, EmplaceError};

#[cfg(test)]
mod proptests;

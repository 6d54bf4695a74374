//! Implementations of sparse, stable-index, collections.

pub mod iter;
pub mod sparse_vec;

pub use iter::{Indices, IntoIter, Iter, IterMut, Values, ValuesMut};
pub use sparse_vec::SparseVec;

//! Iterators over a `SparseVec`.
//!
//! All iterators yield live slots only, in ascending index order. Stepping from one live slot to the next uses
//! bit-scans over the occupancy bits, so that holes are skipped a chunk at a time.

use core::{
    fmt,
    iter::FusedIterator,
    marker::PhantomData,
    ptr::{self, NonNull},
};

use crate::{
    collections::SparseVec,
    utils::{
        BitIter,
        alloc::{Allocator, Global},
    },
};

/// Iterator over the live slots of a `SparseVec`, yielding `(index, &value)`.
///
/// Created by `SparseVec::iter` or `SparseVec::iter_from`.
pub struct Iter<'a, T> {
    live: BitIter<'a>,
    base: NonNull<T>,
    remaining: usize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Iter<'a, T> {
    //  #   Safety
    //
    //  -   Liveness: every index yielded by `live` is a slot of `base` holding a value, valid for reads for `'a`.
    //  -   Count: `remaining` is the number of indexes `live` will yield.
    pub(crate) unsafe fn new(live: BitIter<'a>, base: NonNull<T>, remaining: usize) -> Self {
        Self {
            live,
            base,
            remaining,
            _marker: PhantomData,
        }
    }

    /// Returns the index of the next live slot, or the capacity of the `SparseVec` if there is none.
    ///
    /// ```
    /// #   use sparse_vector::SparseVec;
    /// let mut vec = SparseVec::new();
    ///
    /// vec.insert(3, 'a');
    /// vec.insert(7, 'b');
    ///
    /// let mut iter = vec.iter();
    ///
    /// assert_eq!(3, iter.position());
    ///
    /// iter.next();
    ///
    /// assert_eq!(7, iter.position());
    ///
    /// iter.next();
    ///
    /// assert_eq!(vec.capacity(), iter.position());
    /// ```
    pub fn position(&self) -> usize {
        self.live.position()
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (usize, &'a T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let index = self.live.next()?;

        self.remaining -= 1;

        //  Safety:
        //  -   `index` is live, as per Liveness invariant.
        let value = unsafe { &*self.base.as_ptr().add(index) };

        Some((index, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            live: self.live,
            base: self.base,
            remaining: self.remaining,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Iter")
            .field("position", &self.position())
            .field("remaining", &self.remaining)
            .finish()
    }
}

/// Two iterators are equal if they iterate over the same storage, and are at the same position.
///
/// The storage is identified by the address of its occupancy bits, as well as its values, since values of zero-sized
/// types all share the same address.
impl<T> PartialEq for Iter<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.live.chunks(), other.live.chunks())
            && self.base == other.base
            && self.position() == other.position()
    }
}

impl<T> Eq for Iter<'_, T> {}

//  Safety:
//  -   Just like a `&[T]`.
unsafe impl<T> Send for Iter<'_, T> where T: Sync {}

unsafe impl<T> Sync for Iter<'_, T> where T: Sync {}

/// Iterator over the live slots of a `SparseVec`, yielding `(index, &mut value)`.
///
/// Created by `SparseVec::iter_mut`.
pub struct IterMut<'a, T> {
    live: BitIter<'a>,
    base: NonNull<T>,
    remaining: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> IterMut<'a, T> {
    //  #   Safety
    //
    //  -   Liveness: every index yielded by `live` is a slot of `base` holding a value, valid for reads and writes for
    //      `'a`, and not otherwise accessed for `'a`.
    //  -   Count: `remaining` is the number of indexes `live` will yield.
    pub(crate) unsafe fn new(live: BitIter<'a>, base: NonNull<T>, remaining: usize) -> Self {
        Self {
            live,
            base,
            remaining,
            _marker: PhantomData,
        }
    }

    /// Returns the index of the next live slot, or the capacity of the `SparseVec` if there is none.
    pub fn position(&self) -> usize {
        self.live.position()
    }
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = (usize, &'a mut T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let index = self.live.next()?;

        self.remaining -= 1;

        //  Safety:
        //  -   `index` is live, as per Liveness invariant.
        //  -   `index` is yielded at most once, hence no aliasing.
        let value = unsafe { &mut *self.base.as_ptr().add(index) };

        Some((index, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}

impl<T> FusedIterator for IterMut<'_, T> {}

impl<T> fmt::Debug for IterMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("IterMut")
            .field("position", &self.position())
            .field("remaining", &self.remaining)
            .finish()
    }
}

//  Safety:
//  -   Just like a `&mut [T]`.
unsafe impl<T> Send for IterMut<'_, T> where T: Send {}

unsafe impl<T> Sync for IterMut<'_, T> where T: Sync {}

/// Owning iterator over the live slots of a `SparseVec`, yielding `(index, value)`.
///
/// Created by `SparseVec::into_iter`. Values not yielded are dropped along with the iterator.
pub struct IntoIter<T, A = Global>
where
    A: Allocator,
{
    vec: SparseVec<T, A>,
    next: usize,
}

impl<T, A> IntoIter<T, A>
where
    A: Allocator,
{
    pub(crate) fn new(vec: SparseVec<T, A>) -> Self {
        Self { vec, next: 0 }
    }
}

impl<T, A> Iterator for IntoIter<T, A>
where
    A: Allocator,
{
    type Item = (usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.vec.next_live(self.next)?;

        self.next = index + 1;

        let value = self.vec.remove(index)?;

        Some((index, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.vec.len(), Some(self.vec.len()))
    }
}

impl<T, A> ExactSizeIterator for IntoIter<T, A> where A: Allocator {}

impl<T, A> FusedIterator for IntoIter<T, A> where A: Allocator {}

impl<T, A> fmt::Debug for IntoIter<T, A>
where
    T: fmt::Debug,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_tuple("IntoIter").field(&self.vec).finish()
    }
}

/// Iterator over the indexes of the live slots of a `SparseVec`.
///
/// Created by `SparseVec::indices`.
#[derive(Clone, Debug)]
pub struct Indices<'a> {
    live: BitIter<'a>,
    remaining: usize,
}

impl<'a> Indices<'a> {
    pub(crate) fn new(live: BitIter<'a>, remaining: usize) -> Self {
        Self { live, remaining }
    }
}

impl Iterator for Indices<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let index = self.live.next()?;

        self.remaining -= 1;

        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Indices<'_> {}

impl FusedIterator for Indices<'_> {}

/// Iterator over the values of the live slots of a `SparseVec`.
///
/// Created by `SparseVec::values`.
#[derive(Clone, Debug)]
pub struct Values<'a, T>(Iter<'a, T>);

impl<'a, T> Values<'a, T> {
    pub(crate) fn new(iter: Iter<'a, T>) -> Self {
        Self(iter)
    }
}

impl<'a, T> Iterator for Values<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<T> ExactSizeIterator for Values<'_, T> {}

impl<T> FusedIterator for Values<'_, T> {}

/// Iterator over the values of the live slots of a `SparseVec`, mutably.
///
/// Created by `SparseVec::values_mut`.
#[derive(Debug)]
pub struct ValuesMut<'a, T>(IterMut<'a, T>);

impl<'a, T> ValuesMut<'a, T> {
    pub(crate) fn new(iter: IterMut<'a, T>) -> Self {
        Self(iter)
    }
}

impl<'a, T> Iterator for ValuesMut<'a, T> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<T> ExactSizeIterator for ValuesMut<'_, T> {}

impl<T> FusedIterator for ValuesMut<'_, T> {}

// mod iter_tests

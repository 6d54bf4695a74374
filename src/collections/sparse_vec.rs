//! Stable-index sparse vector.

use core::{
    cmp, fmt,
    hash::{Hash, Hasher},
    mem,
    ops::{Index, IndexMut},
};

use crate::{
    collections::iter::{Indices, IntoIter, Iter, IterMut, Values, ValuesMut},
    utils::{
        AllocationError, BitChunkRaw, BitInChunkIter, EmplaceError, IndexOfChunkRaw, Occupancy, RawSlots,
        alloc::{Allocator, Global},
    },
};

/// A growable array of slots, handing out a stable index on insertion.
///
/// An index refers to the same slot, and thus the same value, until the value is removed: values are never shifted,
/// and free slots are reused by later insertions, lowest index first. Growing or shrinking the storage changes the
/// address of the values, never their index.
///
/// The capacity is always a multiple of `SparseVec::CHUNK`.
///
/// #   Complexity
///
/// -   `push`, `emplace_with`: O(1) amortized.
/// -   `remove`, `erase`, `get`: O(1).
/// -   Iteration: O(1) amortized per live slot, holes being skipped a chunk at a time.
///
/// #   Example
///
/// ```
/// #   use sparse_vector::SparseVec;
/// let mut vec = SparseVec::with_capacity(10);
///
/// assert_eq!(SparseVec::<u32>::CHUNK, vec.capacity());
///
/// let one = vec.push(1);
/// let two = vec.push(2);
///
/// vec.erase(one);
///
/// assert_eq!(1, vec.len());
/// assert_eq!(None, vec.get(one));
/// assert_eq!(Some(&2), vec.get(two));
/// ```
pub struct SparseVec<T, A = Global>
where
    A: Allocator,
{
    //  Invariants:
    //  -   Capacity: `self.slots.capacity() == self.occupancy.chunks() * Self::CHUNK`.
    //  -   Liveness: a slot holds a value if and only if its occupancy bit is set.
    //  -   Length: `self.len` is the number of set occupancy bits.
    slots: RawSlots<T, A>,
    occupancy: Occupancy,
    len: usize,
}

//
//  Creation
//

impl<T> SparseVec<T, Global> {
    /// Creates a new, empty, vector with a capacity of one chunk, `SparseVec::CHUNK`.
    ///
    /// #   Panics
    ///
    /// If the allocation fails.
    #[track_caller]
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates a new, empty, vector with a capacity of 0.
    ///
    /// Does not allocate, the first insertion allocates the first chunk.
    pub const fn new_unallocated() -> Self {
        Self::new_unallocated_in(Global)
    }

    /// Creates a new, empty, vector with a capacity of at least `capacity`, and at least one chunk.
    ///
    /// #   Panics
    ///
    /// If the allocation fails.
    #[track_caller]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Global)
    }
}

impl<T, A> SparseVec<T, A>
where
    A: Allocator,
{
    /// The number of slots in a chunk, the capacity is always a multiple of it.
    pub const CHUNK: usize = BitChunkRaw::BITS;

    /// Creates a new, empty, vector with a capacity of one chunk, `SparseVec::CHUNK`.
    ///
    /// #   Panics
    ///
    /// If the allocation fails.
    #[track_caller]
    pub fn new_in(allocator: A) -> Self {
        Self::with_capacity_in(Self::CHUNK, allocator)
    }

    /// Creates a new, empty, vector with a capacity of 0.
    ///
    /// Does not allocate, the first insertion allocates the first chunk.
    pub const fn new_unallocated_in(allocator: A) -> Self {
        Self {
            slots: RawSlots::new_in(allocator),
            occupancy: Occupancy::new(),
            len: 0,
        }
    }

    /// Creates a new, empty, vector with a capacity of at least `capacity`, and at least one chunk.
    ///
    /// #   Panics
    ///
    /// If the allocation fails.
    #[track_caller]
    pub fn with_capacity_in(capacity: usize, allocator: A) -> Self {
        Self::try_with_capacity_in(capacity, allocator).unwrap_or_else(|error| allocation_failure(error))
    }

    /// Creates a new, empty, vector with a capacity of at least `capacity`, and at least one chunk.
    pub fn try_with_capacity_in(capacity: usize, allocator: A) -> Result<Self, AllocationError> {
        let mut this = Self::new_unallocated_in(allocator);

        this.try_reserve(cmp::max(capacity, Self::CHUNK))?;

        Ok(this)
    }
}

//
//  Queries
//

impl<T, A> SparseVec<T, A>
where
    A: Allocator,
{
    /// Returns the number of live slots.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns whether there is no live slot.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots, live or free.
    pub const fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Returns a reference to the allocator.
    pub const fn allocator(&self) -> &A {
        self.slots.allocator()
    }

    /// Returns a pointer to the first slot.
    ///
    /// The pointer is only valid until the storage is reallocated, and only live slots may be read through it.
    pub const fn as_ptr(&self) -> *const T {
        self.slots.as_ptr()
    }

    /// Returns a pointer to the first slot.
    ///
    /// The pointer is only valid until the storage is reallocated, and only live slots may be read through it.
    pub const fn as_mut_ptr(&mut self) -> *mut T {
        self.slots.as_mut_ptr()
    }

    /// Returns whether the slot at `index` is live.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.occupancy.is_live(index)
    }

    /// Returns the index the next call to `push` would use, or `None` if it would need to grow first.
    ///
    /// ```
    /// #   use sparse_vector::SparseVec;
    /// let mut vec = SparseVec::new();
    ///
    /// assert_eq!(None, vec.next_index());
    ///
    /// vec.push('a');
    ///
    /// assert_eq!(Some(1), vec.next_index());
    /// assert_eq!(1, vec.push('b'));
    /// ```
    #[inline]
    pub fn next_index(&self) -> Option<usize> {
        self.occupancy.vacant()
    }

    //  Returns the index of the first live slot at or after `start`, if any.
    pub(crate) fn next_live(&self, start: usize) -> Option<usize> {
        self.occupancy.live_from(start).next()
    }
}

//
//  Access
//

impl<T, A> SparseVec<T, A>
where
    A: Allocator,
{
    /// Returns a reference to the value at `index`, if the slot is live.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if !self.occupancy.is_live(index) {
            return None;
        }

        //  Safety:
        //  -   `index` is live.
        Some(unsafe { self.get_unchecked(index) })
    }

    /// Returns a mutable reference to the value at `index`, if the slot is live.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if !self.occupancy.is_live(index) {
            return None;
        }

        //  Safety:
        //  -   `index` is live.
        Some(unsafe { self.get_unchecked_mut(index) })
    }

    /// Returns a reference to the value at `index`, without checking.
    ///
    /// #   Safety
    ///
    /// -   Liveness: the slot at `index` must be live.
    #[inline]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(self.occupancy.is_live(index), "{index} is not live");

        //  Safety:
        //  -   Bounds: `index` is live, hence within capacity.
        //  -   Initialized: `index` is live, as per Liveness pre-condition.
        unsafe { self.slots.get(index) }
    }

    /// Returns a mutable reference to the value at `index`, without checking.
    ///
    /// #   Safety
    ///
    /// -   Liveness: the slot at `index` must be live.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(self.occupancy.is_live(index), "{index} is not live");

        //  Safety:
        //  -   Bounds: `index` is live, hence within capacity.
        //  -   Initialized: `index` is live, as per Liveness pre-condition.
        unsafe { self.slots.get_mut(index) }
    }
}

impl<T, A> Index<usize> for SparseVec<T, A>
where
    A: Allocator,
{
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        self.get(index).unwrap_or_else(|| not_live(index))
    }
}

impl<T, A> IndexMut<usize> for SparseVec<T, A>
where
    A: Allocator,
{
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.get_mut(index).unwrap_or_else(|| not_live(index))
    }
}

// mod access_tests

//
//  Insertion & Removal
//

impl<T, A> SparseVec<T, A>
where
    A: Allocator,
{
    /// Moves `value` into the lowest free slot, growing if there is none, and returns its index.
    ///
    /// #   Panics
    ///
    /// If growing is necessary, and the allocation fails.
    #[track_caller]
    pub fn push(&mut self, value: T) -> usize {
        self.try_push(value).unwrap_or_else(|error| allocation_failure(error))
    }

    /// Moves `value` into the lowest free slot, growing if there is none, and returns its index.
    ///
    /// On error, `self` is left unchanged, and `value` is dropped.
    pub fn try_push(&mut self, value: T) -> Result<usize, AllocationError> {
        let index = self.try_vacant()?;

        //  Safety:
        //  -   `index` is free, and within capacity.
        unsafe { self.occupy(index, value) };

        Ok(index)
    }

    /// Constructs a value into the lowest free slot, growing if there is none, and returns its index.
    ///
    /// The constructor is passed the index of the slot the value will live in.
    ///
    /// ```
    /// #   use sparse_vector::SparseVec;
    /// let mut vec = SparseVec::new();
    ///
    /// let index = vec.emplace_with(|index| format!("#{index}"));
    ///
    /// assert_eq!("#0", vec[index]);
    /// ```
    ///
    /// #   Panics
    ///
    /// If growing is necessary, and the allocation fails.
    #[track_caller]
    pub fn emplace_with<F>(&mut self, constructor: F) -> usize
    where
        F: FnOnce(usize) -> T,
    {
        let index = self.try_vacant().unwrap_or_else(|error| allocation_failure(error));

        let value = constructor(index);

        //  Safety:
        //  -   `index` is free, and within capacity, as `constructor` could not access `self`.
        unsafe { self.occupy(index, value) };

        index
    }

    /// Constructs a value into the lowest free slot, growing if there is none, and returns its index.
    ///
    /// The constructor is passed the index of the slot the value will live in. If the constructor fails, no slot is
    /// occupied, though the storage may have grown.
    ///
    /// ```
    /// #   use sparse_vector::{EmplaceError, SparseVec};
    /// let mut vec = SparseVec::<u8>::new();
    ///
    /// let result = vec.try_emplace_with(|index| u8::try_from(index + 300).map_err(|_| "too large"));
    ///
    /// assert_eq!(Err(EmplaceError::Construction("too large")), result);
    /// assert!(vec.is_empty());
    /// assert_eq!(Some(0), vec.next_index());
    /// ```
    pub fn try_emplace_with<F, E>(&mut self, constructor: F) -> Result<usize, EmplaceError<E>>
    where
        F: FnOnce(usize) -> Result<T, E>,
    {
        let index = self.try_vacant()?;

        let value = constructor(index).map_err(EmplaceError::Construction)?;

        //  Safety:
        //  -   `index` is free, and within capacity, as `constructor` could not access `self`.
        unsafe { self.occupy(index, value) };

        Ok(index)
    }

    /// Moves `value` into the slot at `index`, growing if `index` is beyond the capacity.
    ///
    /// Returns the previous value, if the slot was live.
    ///
    /// ```
    /// #   use sparse_vector::SparseVec;
    /// let mut vec = SparseVec::new();
    ///
    /// assert_eq!(None, vec.insert(100, 'a'));
    /// assert_eq!(Some('a'), vec.insert(100, 'b'));
    ///
    /// assert_eq!(1, vec.len());
    /// assert_eq!(128, vec.capacity());
    /// assert_eq!('b', vec[100]);
    /// ```
    ///
    /// #   Panics
    ///
    /// If growing is necessary, and the allocation fails.
    #[track_caller]
    pub fn insert(&mut self, index: usize, value: T) -> Option<T> {
        self.try_insert(index, value).unwrap_or_else(|error| allocation_failure(error))
    }

    /// Moves `value` into the slot at `index`, growing if `index` is beyond the capacity.
    ///
    /// Returns the previous value, if the slot was live. On error, `self` is left unchanged, and `value` is dropped.
    pub fn try_insert(&mut self, index: usize, value: T) -> Result<Option<T>, AllocationError> {
        if let Some(slot) = self.get_mut(index) {
            return Ok(Some(mem::replace(slot, value)));
        }

        if index >= self.capacity() {
            self.try_grow_amortized(index.saturating_add(1))?;
        }

        //  Safety:
        //  -   `index` is free, and within capacity.
        unsafe { self.occupy(index, value) };

        Ok(None)
    }

    /// Removes the value at `index`, if the slot is live, and returns it.
    ///
    /// The slot becomes free, and may be reused by later insertions.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if !self.occupancy.is_live(index) {
            return None;
        }

        self.occupancy.vacate(index);
        self.len -= 1;

        //  Safety:
        //  -   Bounds: `index` was live, hence within capacity.
        //  -   Initialized: `index` was live, and its bit only just cleared.
        Some(unsafe { self.slots.read(index) })
    }

    /// Drops the value at `index`, if the slot is live, and returns whether it was.
    ///
    /// The slot becomes free, and may be reused by later insertions.
    pub fn erase(&mut self, index: usize) -> bool {
        if !self.occupancy.is_live(index) {
            return false;
        }

        //  The bit is cleared first, should `drop` panic.
        self.occupancy.vacate(index);
        self.len -= 1;

        //  Safety:
        //  -   Bounds: `index` was live, hence within capacity.
        //  -   Initialized: `index` was live, and its bit only just cleared.
        unsafe { self.slots.drop_in_place(index) };

        true
    }

    //  Returns the lowest free slot, growing if there is none.
    fn try_vacant(&mut self) -> Result<usize, AllocationError> {
        if let Some(index) = self.occupancy.vacant() {
            return Ok(index);
        }

        self.try_grow_amortized(self.capacity().saturating_add(1))?;

        self.occupancy.vacant().ok_or(AllocationError)
    }

    //  Writes `value` in the slot at `index`, then marks it live.
    //
    //  #   Safety
    //
    //  -   Bounds: `index < self.capacity()`.
    //  -   Free: the slot at `index` is free.
    unsafe fn occupy(&mut self, index: usize, value: T) {
        debug_assert!(!self.occupancy.is_live(index), "{index} is live");

        //  Safety:
        //  -   Bounds: as per Bounds pre-condition.
        unsafe { self.slots.write(index, value) };

        self.occupancy.occupy(index);
        self.len += 1;
    }
}

#[cfg(test)]
mod insertion_tests {
    use super::{test_utils::DropCounter, *};

    #[test]
    fn push_lowest_first() {
        let mut vec = SparseVec::new();

        for expected in 0..64 {
            assert_eq!(expected, vec.push(expected));
        }

        assert_eq!(64, vec.capacity());
    }

    #[test]
    fn reuse_lowest() {
        let mut vec = SparseVec::new();

        for i in 0..64 {
            vec.push(i);
        }

        assert_eq!(Some(5), vec.remove(5));
        assert_eq!(5, vec.push(100));
        assert_eq!(64, vec.capacity());
        assert_eq!(100, vec[5]);
    }

    #[test]
    fn reuse_across_chunks() {
        let mut vec = SparseVec::new();

        for i in 0..192 {
            vec.push(i);
        }

        vec.erase(150);
        vec.erase(70);

        assert_eq!(70, vec.push(0));
        assert_eq!(150, vec.push(0));
        assert_eq!(192, vec.push(0));
    }

    #[test]
    fn growth() {
        let mut vec = SparseVec::with_capacity(SparseVec::<usize>::CHUNK);

        assert_eq!(64, vec.capacity());

        let indexes: Vec<_> = (0..(64 * 2 + 1)).map(|i| (vec.push(i * 7), i * 7)).collect();

        assert_eq!(64 * 2 + 1, vec.len());
        assert_eq!(256, vec.capacity());

        let mut distinct: Vec<_> = indexes.iter().map(|(index, _)| *index).collect();
        distinct.sort_unstable();
        distinct.dedup();

        assert_eq!(indexes.len(), distinct.len());

        for (index, value) in indexes {
            assert_eq!(value, vec[index]);
        }
    }

    #[test]
    fn index_stability() {
        let mut vec = SparseVec::new();

        let kept: Vec<_> = (0..10).map(|i| (vec.push(format!("kept-{i}")), i)).collect();

        for round in 0..5 {
            let others: Vec<_> = (0..100).map(|i| vec.push(format!("other-{round}-{i}"))).collect();

            for index in others.into_iter().step_by(2) {
                vec.erase(index);
            }
        }

        vec.shrink_to_fit();

        for (index, i) in kept {
            assert_eq!(format!("kept-{i}"), vec[index]);
        }
    }

    #[test]
    fn size() {
        let mut vec = SparseVec::new();

        let indexes: Vec<_> = (0..100).map(|i| vec.push(i)).collect();

        for index in indexes.iter().copied().filter(|i| i % 3 == 0) {
            assert!(vec.erase(index));
        }

        assert_eq!(100 - 34, vec.len());

        assert!(!vec.erase(0));
        assert_eq!(None, vec.remove(3));
        assert_eq!(100 - 34, vec.len());
    }

    #[test]
    fn emplace_index() {
        let mut vec = SparseVec::new();

        vec.push(0);
        vec.push(1);
        vec.erase(0);

        let index = vec.emplace_with(|index| index * 10);

        assert_eq!(0, index);
        assert_eq!(0, vec[0]);

        let index = vec.emplace_with(|index| index * 10);

        assert_eq!(2, index);
        assert_eq!(20, vec[2]);
    }

    #[test]
    fn emplace_construction_failure() {
        let mut vec = SparseVec::new();

        for i in 0..64 {
            vec.push(i);
        }

        let result = vec.try_emplace_with(|_| Err::<usize, _>("failed"));

        assert_eq!(Err(EmplaceError::Construction("failed")), result);
        assert_eq!(64, vec.len());
        assert!(!vec.contains(64));
        assert_eq!(Some(64), vec.next_index());
        assert_eq!(Ok(64), vec.try_emplace_with(|i| Ok::<_, ()>(i)));
    }

    #[test]
    fn emplace_panic() {
        use std::panic::{AssertUnwindSafe, catch_unwind};

        let mut vec = SparseVec::new();

        vec.push(String::from("a"));

        let result = catch_unwind(AssertUnwindSafe(|| vec.emplace_with(|_| -> String { panic!("boom") })));

        assert!(result.is_err());
        assert_eq!(1, vec.len());
        assert!(!vec.contains(1));
        assert_eq!(1, vec.push(String::from("b")));
    }

    #[test]
    fn insert_beyond_capacity() {
        let mut vec = SparseVec::new();

        assert_eq!(None, vec.insert(1_000, 'a'));

        assert_eq!(1_024, vec.capacity());
        assert_eq!(1, vec.len());
        assert_eq!(Some(0), vec.next_index());
        assert_eq!(vec![(1_000, &'a')], vec.iter().collect::<Vec<_>>());
    }

    #[test]
    fn insert_live_replaces() {
        let counter = DropCounter::default();

        let mut vec = SparseVec::new();

        let index = vec.push(counter.track("a"));

        let previous = vec.insert(index, counter.track("b")).expect("live");

        assert_eq!("a", previous.0);
        assert_eq!(1, vec.len());
        assert_eq!(0, counter.dropped());

        drop(previous);

        assert_eq!(1, counter.dropped());
        assert_eq!("b", vec[index].0);
    }

    #[test]
    fn insert_then_push_fills() {
        let mut vec = SparseVec::new();

        vec.insert(1, 'b');

        assert_eq!(0, vec.push('a'));
        assert_eq!(2, vec.push('c'));
    }

    #[test]
    fn insert_overflow() {
        let mut vec = SparseVec::new();

        assert_eq!(Err(AllocationError), vec.try_insert(usize::MAX, 1u64));
        assert_eq!(64, vec.capacity());
        assert!(vec.is_empty());
    }

    #[test]
    fn remove_moves_out() {
        let counter = DropCounter::default();

        let mut vec = SparseVec::new();

        let index = vec.push(counter.track("a"));

        let value = vec.remove(index).expect("live");

        assert_eq!(0, counter.dropped());
        assert!(vec.is_empty());

        drop(value);

        assert_eq!(1, counter.dropped());
    }

    #[test]
    fn erase_drops() {
        let counter = DropCounter::default();

        let mut vec = SparseVec::new();

        let index = vec.push(counter.track("a"));

        assert!(vec.erase(index));
        assert_eq!(1, counter.dropped());
        assert!(!vec.erase(index));
        assert_eq!(1, counter.dropped());
    }

    #[test]
    fn zero_sized() {
        let mut vec = SparseVec::new();

        for _ in 0..100 {
            vec.push(());
        }

        assert_eq!(100, vec.len());
        assert_eq!(128, vec.capacity());
        assert_eq!(Some(()), vec.remove(42));
        assert_eq!(42, vec.push(()));
        assert_eq!(100, vec.iter().count());
    }
} // mod insertion_tests

//
//  Capacity
//

impl<T, A> SparseVec<T, A>
where
    A: Allocator,
{
    /// Ensures that the capacity is at least `capacity`, rounded up to a multiple of `SparseVec::CHUNK`.
    ///
    /// Unlike `Vec::reserve`, `capacity` is a total, not an increment over the length, since the live slots may be
    /// scattered anywhere below the capacity.
    ///
    /// #   Panics
    ///
    /// If the allocation fails.
    #[track_caller]
    pub fn reserve(&mut self, capacity: usize) {
        self.try_reserve(capacity).unwrap_or_else(|error| allocation_failure(error));
    }

    /// Ensures that the capacity is at least `capacity`, rounded up to a multiple of `SparseVec::CHUNK`.
    ///
    /// On error, `self` is left unchanged.
    pub fn try_reserve(&mut self, capacity: usize) -> Result<(), AllocationError> {
        if capacity <= self.capacity() {
            return Ok(());
        }

        self.try_grow_to(BitChunkRaw::chunks_for(capacity))
    }

    /// Releases the trailing chunks without any live slot, keeping at least one chunk, if any.
    ///
    /// ```
    /// #   use sparse_vector::SparseVec;
    /// let mut vec = SparseVec::new();
    ///
    /// for i in 0..128 {
    ///     vec.push(i);
    /// }
    ///
    /// for i in 64..128 {
    ///     vec.erase(i);
    /// }
    ///
    /// vec.shrink_to_fit();
    ///
    /// assert_eq!(64, vec.capacity());
    /// ```
    ///
    /// #   Panics
    ///
    /// If the allocation fails.
    #[track_caller]
    pub fn shrink_to_fit(&mut self) {
        self.try_shrink_to_fit().unwrap_or_else(|error| allocation_failure(error));
    }

    /// Releases the trailing chunks without any live slot, keeping at least one chunk, if any.
    ///
    /// On error, `self` is left unchanged.
    pub fn try_shrink_to_fit(&mut self) -> Result<(), AllocationError> {
        let current = self.occupancy.chunks();
        let chunks = cmp::max(self.occupancy.used_chunks(), cmp::min(current, 1));

        if chunks == current {
            return Ok(());
        }

        let truncation = self.occupancy.prepare_truncate(chunks)?;

        //  No overflow, as it is less than the current capacity.
        self.slots.try_shrink(chunks * Self::CHUNK)?;

        self.occupancy.commit_truncate(truncation);

        Ok(())
    }

    /// Drops all values, and releases the memory beyond the first chunk.
    ///
    /// The capacity is `SparseVec::CHUNK` afterwards, unless it was 0. Should re-allocating the first chunk fail, the
    /// capacity is 0 instead.
    pub fn clear(&mut self) {
        for of_chunk in 0..self.occupancy.chunks() {
            let of_chunk = IndexOfChunkRaw(of_chunk);

            //  The bits are cleared first, should `drop` panic.
            let live = self.occupancy.vacate_chunk(of_chunk);

            self.len -= live.count();

            for in_chunk in BitInChunkIter::new(live) {
                //  No overflow, as it is less than the capacity.
                let index = of_chunk.0 * Self::CHUNK + in_chunk.0 as usize;

                //  Safety:
                //  -   Bounds: `index` is within capacity, as `of_chunk` is covered.
                //  -   Initialized: `index` was live, and its bit only just cleared.
                unsafe { self.slots.drop_in_place(index) };
            }
        }

        debug_assert_eq!(0, self.len);

        if self.occupancy.chunks() <= 1 {
            return;
        }

        self.occupancy.clear();
        self.slots.release();

        //  An unallocated vector is still valid, should the allocation fail.
        let _ = self.try_grow_to(1);
    }

    //  Grows to at least `capacity`, and at least twice the current capacity.
    #[inline(never)]
    fn try_grow_amortized(&mut self, capacity: usize) -> Result<(), AllocationError> {
        let doubled = self.occupancy.chunks().checked_mul(2).ok_or(AllocationError)?;

        let chunks = cmp::max(cmp::max(BitChunkRaw::chunks_for(capacity), doubled), 1);

        self.try_grow_to(chunks)
    }

    //  Grows to exactly `chunks` chunks.
    //
    //  All fallible steps are performed before any observable change, so that on error `self` is left unchanged.
    fn try_grow_to(&mut self, chunks: usize) -> Result<(), AllocationError> {
        debug_assert!(chunks > self.occupancy.chunks());

        let capacity = chunks.checked_mul(Self::CHUNK).ok_or(AllocationError)?;

        self.occupancy.try_reserve(chunks)?;
        self.slots.try_grow(capacity)?;
        self.occupancy.extend(chunks);

        Ok(())
    }
}

#[cfg(test)]
mod capacity_tests {
    use super::{test_utils::DropCounter, *};

    #[test]
    fn with_capacity_rounds_up() {
        assert_eq!(64, SparseVec::<u8>::with_capacity(0).capacity());
        assert_eq!(64, SparseVec::<u8>::with_capacity(1).capacity());
        assert_eq!(64, SparseVec::<u8>::with_capacity(64).capacity());
        assert_eq!(128, SparseVec::<u8>::with_capacity(65).capacity());
    }

    #[test]
    fn try_with_capacity_overflow() {
        let result = SparseVec::<u64>::try_with_capacity_in(usize::MAX, Global);

        assert_eq!(Some(AllocationError), result.err());
    }

    #[test]
    fn reserve() {
        let mut vec = SparseVec::new();

        vec.push('a');
        vec.reserve(10);

        assert_eq!(64, vec.capacity());

        vec.reserve(300);

        assert_eq!(320, vec.capacity());
        assert_eq!(Some(1), vec.next_index());
        assert_eq!('a', vec[0]);
    }

    #[test]
    fn reserve_overflow() {
        let mut vec = SparseVec::new();

        vec.push(1u64);

        assert_eq!(Err(AllocationError), vec.try_reserve(usize::MAX));
        assert_eq!(64, vec.capacity());
        assert_eq!(1, vec[0]);
    }

    #[test]
    fn shrink() {
        let mut vec = SparseVec::new();

        for i in 0..128 {
            vec.push(i);
        }

        for i in 64..128 {
            vec.erase(i);
        }

        vec.shrink_to_fit();

        assert_eq!(64, vec.capacity());
        assert_eq!(64, vec.len());

        for i in 0..64 {
            assert_eq!(i, vec[i]);
        }

        assert_eq!(None, vec.next_index());
        assert_eq!(64, vec.push(64));
    }

    #[test]
    fn shrink_keeps_inner_holes() {
        let mut vec = SparseVec::new();

        vec.insert(300, 'z');
        vec.insert(70, 'a');
        vec.erase(300);

        vec.shrink_to_fit();

        assert_eq!(128, vec.capacity());
        assert_eq!(Some(0), vec.next_index());
        assert_eq!('a', vec[70]);
    }

    #[test]
    fn shrink_noop() {
        let mut vec = SparseVec::new();

        vec.insert(127, 'z');

        vec.shrink_to_fit();

        assert_eq!(128, vec.capacity());
    }

    #[test]
    fn shrink_empty_keeps_one_chunk() {
        let mut vec = SparseVec::new();

        vec.insert(300, 'a');
        vec.erase(300);

        assert_eq!(320, vec.capacity());

        vec.shrink_to_fit();

        assert_eq!(64, vec.capacity());
        assert_eq!(0, vec.push('b'));

        vec.assert_invariants();

        let mut unallocated = SparseVec::<char>::new_unallocated();

        unallocated.shrink_to_fit();

        assert_eq!(0, unallocated.capacity());
    }

    #[test]
    fn clear() {
        let counter = DropCounter::default();

        let mut vec = SparseVec::new();

        for _ in 0..100 {
            vec.push(counter.track("x"));
        }

        vec.erase(10);

        assert_eq!(1, counter.dropped());

        vec.clear();

        assert_eq!(100, counter.dropped());
        assert!(vec.is_empty());
        assert_eq!(64, vec.capacity());
        assert_eq!(0, vec.iter().count());
        assert_eq!(Some(0), vec.next_index());
        assert_eq!(0, vec.push(counter.track("y")));

        vec.assert_invariants();
    }

    #[test]
    fn clear_single_chunk() {
        let mut vec = SparseVec::new();

        vec.push(1);
        vec.push(2);

        let ptr = vec.as_ptr();

        vec.clear();

        assert_eq!(64, vec.capacity());
        assert_eq!(ptr, vec.as_ptr());
        assert_eq!(0, vec.push(3));

        vec.assert_invariants();
    }

    #[test]
    fn clear_unallocated() {
        let mut vec = SparseVec::<u8>::new_unallocated();

        vec.clear();

        assert_eq!(0, vec.capacity());
        assert_eq!(0, vec.push(1));
    }

    #[test]
    fn clear_panicking_drop() {
        use std::panic::{AssertUnwindSafe, catch_unwind};

        struct Bomb(bool);

        impl Drop for Bomb {
            fn drop(&mut self) {
                if self.0 {
                    panic!("boom");
                }
            }
        }

        let mut vec = SparseVec::new();

        vec.push(Bomb(false));
        vec.push(Bomb(true));
        vec.push(Bomb(false));

        let result = catch_unwind(AssertUnwindSafe(|| vec.clear()));

        assert!(result.is_err());
        assert!(vec.is_empty());
        assert_eq!(None, vec.iter().next().map(|(index, _)| index));
        assert_eq!(0, vec.push(Bomb(false)));
    }
} // mod capacity_tests

// mod allocation_failure_tests

//
//  Iteration
//

impl<T, A> SparseVec<T, A>
where
    A: Allocator,
{
    /// Returns an iterator over the live slots, in ascending index order.
    pub fn iter(&self) -> Iter<'_, T> {
        //  Safety:
        //  -   Liveness: yields live indexes only, as per Liveness invariant.
        //  -   Count: all `self.len` live slots are yielded, as per Length invariant.
        unsafe { Iter::new(self.occupancy.live_from(0), self.slots.as_non_null(), self.len) }
    }

    /// Returns an iterator over the live slots at, or after, `start`, in ascending index order.
    ///
    /// ```
    /// #   use sparse_vector::SparseVec;
    /// let vec: SparseVec<_> = ['a', 'b', 'c', 'd'].into_iter().collect();
    ///
    /// let tail: Vec<_> = vec.iter_from(2).collect();
    ///
    /// assert_eq!(vec![(2, &'c'), (3, &'d')], tail);
    /// ```
    pub fn iter_from(&self, start: usize) -> Iter<'_, T> {
        let remaining = self.occupancy.count_from(start, self.len);

        //  Safety:
        //  -   Liveness: yields live indexes only, as per Liveness invariant.
        //  -   Count: `remaining` is the number of live slots at or after `start`.
        unsafe { Iter::new(self.occupancy.live_from(start), self.slots.as_non_null(), remaining) }
    }

    /// Returns an iterator over the live slots, in ascending index order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        //  Safety:
        //  -   Liveness: yields live indexes only, as per Liveness invariant, and `self` is borrowed mutably.
        //  -   Count: all `self.len` live slots are yielded, as per Length invariant.
        unsafe { IterMut::new(self.occupancy.live_from(0), self.slots.as_non_null(), self.len) }
    }

    /// Returns an iterator over the indexes of the live slots, in ascending order.
    pub fn indices(&self) -> Indices<'_> {
        Indices::new(self.occupancy.live_from(0), self.len)
    }

    /// Returns an iterator over the values of the live slots, in ascending index order.
    pub fn values(&self) -> Values<'_, T> {
        Values::new(self.iter())
    }

    /// Returns an iterator over the values of the live slots, in ascending index order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, T> {
        ValuesMut::new(self.iter_mut())
    }
}

impl<T, A> IntoIterator for SparseVec<T, A>
where
    A: Allocator,
{
    type Item = (usize, T);
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self)
    }
}

impl<'a, T, A> IntoIterator for &'a SparseVec<T, A>
where
    A: Allocator,
{
    type Item = (usize, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A> IntoIterator for &'a mut SparseVec<T, A>
where
    A: Allocator,
{
    type Item = (usize, &'a mut T);
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T, A> Extend<T> for SparseVec<T, A>
where
    A: Allocator,
{
    #[track_caller]
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T> FromIterator<T> for SparseVec<T, Global> {
    #[track_caller]
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let iter = iter.into_iter();

        let mut vec = Self::with_capacity(iter.size_hint().0);
        vec.extend(iter);

        vec
    }
}

#[cfg(test)]
mod iteration_tests {
    use super::*;

    #[test]
    fn ascending_once() {
        let mut vec = SparseVec::new();

        for i in 0..300 {
            vec.push(i);
        }

        for i in (0..300).filter(|i| i % 7 != 0) {
            vec.erase(i);
        }

        let indexes: Vec<_> = vec.indices().collect();
        let expected: Vec<_> = (0..300).filter(|i| i % 7 == 0).collect();

        assert_eq!(expected, indexes);
        assert_eq!(expected.len(), vec.iter().len());
    }

    #[test]
    fn never_yields_erased() {
        let mut vec: SparseVec<_> = (0..10).collect();

        vec.erase(0);
        vec.erase(4);

        assert!(vec.iter().all(|(index, _)| index != 0 && index != 4));
        assert_eq!(Some(1), vec.iter().next().map(|(index, _)| index));
    }

    #[test]
    fn sparse_regions() {
        let mut vec = SparseVec::new();

        vec.insert(5, 'a');
        vec.insert(64 * 40 + 3, 'b');

        assert_eq!(vec![(5, &'a'), (64 * 40 + 3, &'b')], vec.iter().collect::<Vec<_>>());
    }

    #[test]
    fn for_loops() {
        let mut vec: SparseVec<usize> = (0..3).collect();

        for (_, value) in &mut vec {
            *value *= 2;
        }

        let mut sum = 0;

        for (index, value) in &vec {
            sum += index * value;
        }

        assert_eq!(2 + 2 * 4, sum);

        let owned: Vec<_> = vec.into_iter().collect();

        assert_eq!(vec![(0, 0), (1, 2), (2, 4)], owned);
    }

    #[test]
    fn extend() {
        let mut vec: SparseVec<_> = (0..3).collect();

        vec.erase(1);
        vec.extend([10, 11]);

        assert_eq!(vec![0, 10, 2, 11], vec.values().copied().collect::<Vec<_>>());
    }
} // mod iteration_tests

//
//  Common traits
//

impl<T, A> Clone for SparseVec<T, A>
where
    T: Clone,
    A: Allocator + Clone,
{
    /// Clones the vector, preserving the index of each value, and the capacity.
    #[track_caller]
    fn clone(&self) -> Self {
        let mut clone = Self::with_capacity_in(self.capacity(), self.allocator().clone());

        for (index, value) in self {
            //  Safety:
            //  -   Bounds: `index` is live in `self`, hence within the capacity of `clone`, which is equal.
            //  -   Free: `index` is yielded once, and `clone` started empty.
            unsafe { clone.occupy(index, value.clone()) };
        }

        clone
    }
}

impl<T, A> fmt::Debug for SparseVec<T, A>
where
    T: fmt::Debug,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T, A> Default for SparseVec<T, A>
where
    A: Allocator + Default,
{
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T, A> Drop for SparseVec<T, A>
where
    A: Allocator,
{
    fn drop(&mut self) {
        if !mem::needs_drop::<T>() {
            return;
        }

        for index in self.occupancy.live_from(0) {
            //  Safety:
            //  -   Bounds: `index` is live, hence within capacity.
            //  -   Initialized: `index` is live.
            unsafe { self.slots.drop_in_place(index) };
        }
    }
}

impl<T, A> Eq for SparseVec<T, A>
where
    T: Eq,
    A: Allocator,
{
}

impl<T, A> Hash for SparseVec<T, A>
where
    T: Hash,
    A: Allocator,
{
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.len.hash(state);

        for (index, value) in self {
            index.hash(state);
            value.hash(state);
        }
    }
}

/// Two vectors are equal if the same slots are live, with equal values; the capacity is ignored.
impl<T, U, A, B> PartialEq<SparseVec<U, B>> for SparseVec<T, A>
where
    T: PartialEq<U>,
    A: Allocator,
    B: Allocator,
{
    fn eq(&self, other: &SparseVec<U, B>) -> bool {
        self.len == other.len
            && self
                .iter()
                .zip(other.iter())
                .all(|((index, value), (other_index, other_value))| index == other_index && value == other_value)
    }
}

// mod common_tests

//
//  Implementation
//

impl<T, A> SparseVec<T, A>
where
    A: Allocator,
{
    //  Checks the invariants, in tests.
    #[cfg(test)]
    #[track_caller]
    pub(crate) fn assert_invariants(&self) {
        assert_eq!(0, self.capacity() % Self::CHUNK, "{}", self.capacity());
        assert_eq!(self.occupancy.chunks() * Self::CHUNK, self.capacity());

        let live: usize = self.occupancy.live_chunks().iter().map(BitChunkRaw::count).sum();

        assert_eq!(live, self.len);

        self.occupancy.assert_invariants();
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn allocation_failure(error: AllocationError) -> ! {
    panic!("{error}: SparseVec failed to allocate");
}

#[cold]
#[inline(never)]
#[track_caller]
fn not_live(index: usize) -> ! {
    panic!("No live slot at index {index} in SparseVec");
}

// mod test_utils

//  See `DynamicBitChunkStore`.

//  #   Why not a `Vec`?
//
//  The store must be able to reserve memory ahead of time, fallibly, so that the occupancy maps can be extended after
//  the slots have been allocated without any possibility of failure. `Vec::try_reserve` would do, but the store also
//  relies on fresh chunks being zeroed -- ie, all free -- which a zeroed allocation provides for free.

use core::{alloc::Layout, cmp, fmt, ptr::NonNull};

use crate::utils::{
    AllocationError, BitChunkRaw, IndexOfChunkRaw,
    alloc::{Allocator, Global},
};

/// Heap allocated, growable, array of `BitChunkRaw`.
///
/// All chunks beyond those explicitly written to are `ALL_ZEROS`, including the chunks of freshly reserved memory.
///
/// The chunks are always allocated by `Global`: they are internal bookkeeping, one bit per slot.
pub struct DynamicBitChunkStore {
    //  Safety Invariants:
    //  -   Empty Dangling: if an empty slice, it is dangling.
    //  -   Self-Allocated: if not empty, it is allocated by `Self::allocate`.
    //  -   Initialized: if not empty, all `self.0.len()` items of the slice are initialized.
    ptr: NonNull<[BitChunkRaw]>,
}

//
//  Creation
//

impl DynamicBitChunkStore {
    /// Returns a new, empty, instance.
    pub const fn new() -> Self {
        //  Safety Invariant:
        //  -   Empty Dangling: create an empty slice, with a dangling pointer.
        let ptr = NonNull::slice_from_raw_parts(NonNull::dangling(), 0);

        Self { ptr }
    }

    /// Returns a new instance holding a copy of the first `n` chunks of `self`, and `ALL_ZEROS` beyond.
    ///
    /// On error, `self` is left unchanged.
    ///
    /// #   Panics
    ///
    /// If `n` is beyond the allocated chunks.
    pub fn try_clone_prefix(&self, n: usize) -> Result<Self, AllocationError> {
        assert!(n <= self.ptr.len(), "{n} > {}", self.ptr.len());

        //  Safety:
        //  -   `self.ptr` satisfies the Safety Invariants.
        //  -   `n` <= `self.ptr.len()`.
        let ptr = unsafe { Self::clone_raw(self.ptr, n)? };

        Ok(Self { ptr })
    }
}

//
//  Access
//

impl DynamicBitChunkStore {
    /// Returns the number of chunks currently allocated.
    #[inline]
    pub const fn len(&self) -> usize {
        self.ptr.len()
    }

    /// Returns whether no chunk is currently allocated.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.ptr.is_empty()
    }

    /// Returns a reference to the underlying slice of chunks.
    #[inline]
    pub const fn chunks(&self) -> &[BitChunkRaw] {
        if self.ptr.is_empty() {
            &[]
        } else {
            //  Safety:
            //  -   The pointer is sufficiently aligned, as per the Safety Invariants.
            //  -   The pointer is currently allocated, as the slice is non-empty, as per the Safety Invariants.
            //  -   No mutable borrow is accessible, as `self` could be borrowed.
            unsafe { self.ptr.as_ref() }
        }
    }

    /// Returns a mutable reference to the underlying slice of chunks.
    #[inline]
    pub const fn chunks_mut(&mut self) -> &mut [BitChunkRaw] {
        if self.ptr.is_empty() {
            &mut []
        } else {
            //  Safety:
            //  -   The pointer is sufficiently aligned, as per the Safety Invariants.
            //  -   The pointer is currently allocated, as the slice is non-empty, as per the Safety Invariants.
            //  -   No borrow is accessible, as `self` could be mutably borrowed.
            unsafe { self.ptr.as_mut() }
        }
    }

    /// Returns the `BitChunkRaw` at the given index.
    ///
    /// If `index` is beyond the allocated chunks, an `ALL_ZEROS` chunk is returned.
    #[inline]
    pub fn get(&self, index: IndexOfChunkRaw) -> BitChunkRaw {
        self.chunks().get(index.0).copied().unwrap_or(BitChunkRaw::ALL_ZEROS)
    }

    /// Returns a mutable reference to the `BitChunkRaw` at the given index.
    ///
    /// #   Panics
    ///
    /// If `index` is beyond the allocated chunks; reserve first.
    #[inline]
    #[track_caller]
    pub fn get_mut(&mut self, index: IndexOfChunkRaw) -> &mut BitChunkRaw {
        let len = self.ptr.len();

        match self.chunks_mut().get_mut(index.0) {
            Some(chunk) => chunk,
            None => panic!("chunk {} out of {len} reserved chunks", index.0),
        }
    }
}

//
//  Capacity
//

impl DynamicBitChunkStore {
    /// Ensures that at least `n` chunks are allocated.
    ///
    /// On success, all chunks up to `n` can be accessed mutably. On error, `self` is left unchanged.
    pub fn try_reserve(&mut self, n: usize) -> Result<(), AllocationError> {
        if n <= self.ptr.len() {
            return Ok(());
        }

        //  Safety:
        //  -   `self.ptr` satisfies the Safety Invariants.
        //  -   `n` >= `self.ptr.len()`.
        self.ptr = unsafe { Self::grow(self.ptr, n)? };

        Ok(())
    }
}

// mod capacity_tests

//
//  Common traits
//

impl Drop for DynamicBitChunkStore {
    fn drop(&mut self) {
        //  Safety:
        //  -   Liveness: `ptr` is currently allocated, unless it's empty, as per Safety Invariants.
        //  -   Allocator: `ptr` was allocated by `Self::allocate`, unless it empty, as per Safety Invariants.
        unsafe { Self::deallocate(self.ptr) }
    }
}

impl fmt::Debug for DynamicBitChunkStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_tuple("DynamicBitChunkStore").field(&self.chunks()).finish()
    }
}

impl Default for DynamicBitChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

//  Safety:
//  -   Just like a `Vec<BitChunkRaw>`.
unsafe impl Send for DynamicBitChunkStore {}

unsafe impl Sync for DynamicBitChunkStore {}

// mod prefix_tests

//
//  Allocation implementation.
//

impl DynamicBitChunkStore {
    //  Creates a copy of the first `n` chunks of `old`.
    //
    //  #   Safety
    //
    //  -   `old` must satisfy the Safety Invariants.
    //  -   `n` must be less than or equal to `old.len()`.
    //  -   On success, the resulting pointer satisfies the Safety Invariants.
    #[inline(never)]
    unsafe fn clone_raw(old: NonNull<[BitChunkRaw]>, n: usize) -> Result<NonNull<[BitChunkRaw]>, AllocationError> {
        debug_assert!(n <= old.len());

        if n == 0 {
            return Ok(NonNull::slice_from_raw_parts(NonNull::dangling(), 0));
        }

        let new = Self::allocate(n)?;

        debug_assert!(new.len() >= n);

        let dst = as_non_null_ptr(new);
        let src = as_non_null_ptr(old);

        //  Safety:
        //  -   `src` is valid for reads of `n` items, as per Initialized Invariant, and `n <= old.len()`.
        //  -   `dst` is valid for writes of `new.len()` items, as per Initialized Invariant, and `new.len() >= n`.
        //  -   `src` and `dst` are properly aligned, as per Self-Allocated Invariant.
        //  -   `src` and `dst` do not overlap, as `dst` is a fresh allocation.
        unsafe { dst.copy_from_nonoverlapping(src, n) };

        //  Safety:
        //  -   `new` satisfies the Safety Invariants, the chunks beyond `n` being zeroed by `allocate`.
        Ok(new)
    }

    fn layout(n: usize) -> Result<Layout, AllocationError> {
        debug_assert!(n > 0);

        Layout::array::<BitChunkRaw>(n).map_err(|_| AllocationError)
    }

    //  #   Safety
    //
    //  -   On success, the resulting pointer satisfies the Safety Invariants.
    fn allocate(n: usize) -> Result<NonNull<[BitChunkRaw]>, AllocationError> {
        let n = n.checked_next_power_of_two().ok_or(AllocationError)?;

        let layout = Self::layout(n)?;

        let ptr = Global.allocate_zeroed(layout)?;

        let ptr = as_non_null_ptr(ptr);

        Ok(NonNull::slice_from_raw_parts(ptr.cast(), n))
    }

    //  #   Safety
    //
    //  -   `old` must satisfy the Safety Invariants.
    //  -   `n` must be greater than or equal to `old.len()`.
    //
    //  On success, the resulting pointer satisfies the Safety Invariants.
    unsafe fn grow(
        old: NonNull<[BitChunkRaw]>,
        n: usize,
    ) -> Result<NonNull<[BitChunkRaw]>, AllocationError> {
        if old.is_empty() {
            return Self::allocate(n);
        }

        debug_assert!(n >= old.len());

        let n = cmp::max(n, old.len())
            .checked_next_power_of_two()
            .ok_or(AllocationError)?;

        let old_layout = Self::layout(old.len())?;
        let new_layout = Self::layout(n)?;

        let ptr = {
            let old = as_non_null_ptr(old);

            //  Safety:
            //  -   Liveness: `old` is live, as it satifies the Safety Invariants and is non-empty.
            //  -   Selfness: `old` was allocated by `Global`, as per Self-Allocated Invariant.
            //  -   Layout: `old_layout` matches the layout of `old`, as per the Safety Invariants.
            //  -   Growth: `new_layout.size()` >= `old_layout.size()`, as `n` >= `old.len()`,
            //      `checked_next_power_of_two` result is >= to its argument, and `layout` is monotonically growing.
            unsafe { Global.grow_zeroed(old.cast(), old_layout, new_layout)? }
        };

        let ptr = as_non_null_ptr(ptr);

        Ok(NonNull::slice_from_raw_parts(ptr.cast(), n))
    }

    //  #   Safety
    //
    //  -   Liveness: `ptr` is currently allocated, unless it's empty.
    //  -   Allocator: `ptr` was allocated by `Self::allocate`, unless it empty.
    unsafe fn deallocate(ptr: NonNull<[BitChunkRaw]>) {
        if ptr.is_empty() {
            return;
        }

        let layout = Self::layout(ptr.len());

        //  Valid since `ptr` was allocated by `Self::allocate` as per the Allocator pre-condition, which cannot succeed
        //  without `Self::layout`, a pure function, succeeding.
        let Ok(layout) = layout else {
            debug_assert!(false, "invalid layout for {} chunks", ptr.len());
            return;
        };

        let ptr = as_non_null_ptr(ptr).cast();

        //  Safety:
        //  -   `ptr` is currently allocated, as per Liveness pre-condition.
        //  -   `layout` is the same as used for allocation, as per Allocator pre-condition.
        unsafe { Global.deallocate(ptr, layout) }
    }
}

//  FIXME: use `NonNull<[T]>::as_non_null_ptr` when stable.
fn as_non_null_ptr<T>(ptr: NonNull<[T]>) -> NonNull<T> {
    ptr.cast()
}

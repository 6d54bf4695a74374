//  See `RawSlots`.

use core::{alloc::Layout, marker::PhantomData, mem, ptr::NonNull};

use crate::utils::{
    AllocationError,
    alloc::{Allocator, Global},
};

/// Heap allocated buffer of possibly uninitialized slots.
///
/// The buffer does not track which slots are initialized, this is left to its owner. As such, dropping the buffer only
/// releases its memory, and never drops any value.
pub struct RawSlots<T, A = Global>
where
    A: Allocator,
{
    //  Safety Invariants:
    //  -   Dangling: if `self.capacity` is 0, or `T` is zero-sized, `self.ptr` is dangling.
    //  -   Self-Allocated: otherwise, `self.ptr` is allocated by `self.allocator`, with `Self::layout(self.capacity)`.
    ptr: NonNull<T>,
    capacity: usize,
    allocator: A,
    _marker: PhantomData<T>,
}

//
//  Creation
//

impl<T> RawSlots<T, Global> {
    /// Returns a new, empty, instance.
    pub const fn new() -> Self {
        Self::new_in(Global)
    }
}

impl<T, A> RawSlots<T, A>
where
    A: Allocator,
{
    /// Returns a new, empty, instance.
    pub const fn new_in(allocator: A) -> Self {
        Self {
            ptr: NonNull::dangling(),
            capacity: 0,
            allocator,
            _marker: PhantomData,
        }
    }
}

//
//  Access
//

impl<T, A> RawSlots<T, A>
where
    A: Allocator,
{
    /// Returns the number of slots.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a reference to the allocator.
    pub const fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Returns a pointer to the first slot.
    ///
    /// The pointer is dangling if the capacity is 0.
    pub const fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Returns a pointer to the first slot.
    ///
    /// The pointer is dangling if the capacity is 0.
    pub const fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Returns a pointer to the first slot.
    pub const fn as_non_null(&self) -> NonNull<T> {
        self.ptr
    }

    /// Returns a reference to the value in the slot.
    ///
    /// #   Safety
    ///
    /// -   Bounds: `index < self.capacity()`.
    /// -   Initialized: the slot at `index` holds a value.
    #[inline]
    pub unsafe fn get(&self, index: usize) -> &T {
        debug_assert!(index < self.capacity);

        //  Safety:
        //  -   In bounds, as per Bounds pre-condition.
        //  -   Initialized, as per Initialized pre-condition.
        unsafe { &*self.ptr.as_ptr().add(index) }
    }

    /// Returns a mutable reference to the value in the slot.
    ///
    /// #   Safety
    ///
    /// -   Bounds: `index < self.capacity()`.
    /// -   Initialized: the slot at `index` holds a value.
    #[inline]
    pub unsafe fn get_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.capacity);

        //  Safety:
        //  -   In bounds, as per Bounds pre-condition.
        //  -   Initialized, as per Initialized pre-condition.
        unsafe { &mut *self.ptr.as_ptr().add(index) }
    }

    /// Writes the value in the slot, without dropping any previous value.
    ///
    /// #   Safety
    ///
    /// -   Bounds: `index < self.capacity()`.
    #[inline]
    pub unsafe fn write(&mut self, index: usize, value: T) {
        debug_assert!(index < self.capacity);

        //  Safety:
        //  -   In bounds, as per Bounds pre-condition, and thus valid for writes.
        unsafe { self.ptr.as_ptr().add(index).write(value) }
    }

    /// Moves the value out of the slot, leaving it uninitialized.
    ///
    /// #   Safety
    ///
    /// -   Bounds: `index < self.capacity()`.
    /// -   Initialized: the slot at `index` holds a value.
    #[inline]
    pub unsafe fn read(&mut self, index: usize) -> T {
        debug_assert!(index < self.capacity);

        //  Safety:
        //  -   In bounds, as per Bounds pre-condition.
        //  -   Initialized, as per Initialized pre-condition.
        unsafe { self.ptr.as_ptr().add(index).read() }
    }

    /// Drops the value in the slot, leaving it uninitialized.
    ///
    /// #   Safety
    ///
    /// -   Bounds: `index < self.capacity()`.
    /// -   Initialized: the slot at `index` holds a value.
    #[inline]
    pub unsafe fn drop_in_place(&mut self, index: usize) {
        debug_assert!(index < self.capacity);

        //  Safety:
        //  -   In bounds, as per Bounds pre-condition.
        //  -   Initialized, as per Initialized pre-condition.
        unsafe { self.ptr.as_ptr().add(index).drop_in_place() }
    }
}

//
//  Capacity
//

impl<T, A> RawSlots<T, A>
where
    A: Allocator,
{
    /// Grows the buffer to exactly `capacity` slots, preserving the content of the existing slots.
    ///
    /// On error, `self` is left unchanged.
    ///
    /// #   Panics
    ///
    /// In Debug, if `capacity` is less than the current capacity.
    pub fn try_grow(&mut self, capacity: usize) -> Result<(), AllocationError> {
        debug_assert!(capacity >= self.capacity, "{capacity} < {}", self.capacity);

        if capacity <= self.capacity {
            return Ok(());
        }

        let new_layout = Self::layout(capacity)?;

        if new_layout.size() == 0 {
            self.capacity = capacity;
            return Ok(());
        }

        let ptr = if self.is_allocated() {
            let old_layout = Self::layout(self.capacity)?;

            //  Safety:
            //  -   Liveness: `self.ptr` is allocated, as per Self-Allocated invariant.
            //  -   Selfness: `self.ptr` was allocated by `self.allocator`, as per Self-Allocated invariant.
            //  -   Layout: `old_layout` matches, as per Self-Allocated invariant.
            //  -   Growth: `new_layout.size()` >= `old_layout.size()`, as `capacity` > `self.capacity`.
            unsafe { self.allocator.grow(self.ptr.cast(), old_layout, new_layout)? }
        } else {
            self.allocator.allocate(new_layout)?
        };

        self.ptr = ptr.cast();
        self.capacity = capacity;

        Ok(())
    }

    /// Shrinks the buffer to exactly `capacity` slots, preserving the content of the retained slots.
    ///
    /// The caller is responsible for dropping any value in the discarded slots beforehand. On error, `self` is left
    /// unchanged.
    ///
    /// #   Panics
    ///
    /// In Debug, if `capacity` is greater than the current capacity.
    pub fn try_shrink(&mut self, capacity: usize) -> Result<(), AllocationError> {
        debug_assert!(capacity <= self.capacity, "{capacity} > {}", self.capacity);

        if capacity >= self.capacity {
            return Ok(());
        }

        if capacity == 0 {
            self.release();
            return Ok(());
        }

        if !self.is_allocated() {
            self.capacity = capacity;
            return Ok(());
        }

        let old_layout = Self::layout(self.capacity)?;
        let new_layout = Self::layout(capacity)?;

        //  Safety:
        //  -   Liveness: `self.ptr` is allocated, as per Self-Allocated invariant.
        //  -   Selfness: `self.ptr` was allocated by `self.allocator`, as per Self-Allocated invariant.
        //  -   Layout: `old_layout` matches, as per Self-Allocated invariant.
        //  -   Shrinkage: `new_layout.size()` <= `old_layout.size()`, as `capacity` < `self.capacity`.
        let ptr = unsafe { self.allocator.shrink(self.ptr.cast(), old_layout, new_layout)? };

        self.ptr = ptr.cast();
        self.capacity = capacity;

        Ok(())
    }

    /// Releases the buffer, leaving 0 slots.
    ///
    /// The caller is responsible for dropping any value beforehand.
    pub fn release(&mut self) {
        if self.is_allocated() {
            //  Layout computation cannot fail, as it succeeded on allocation.
            if let Ok(layout) = Self::layout(self.capacity) {
                //  Safety:
                //  -   Liveness, Selfness, Layout: as per Self-Allocated invariant.
                unsafe { self.allocator.deallocate(self.ptr.cast(), layout) };
            } else {
                debug_assert!(false, "invalid layout for {} slots", self.capacity);
            }
        }

        self.ptr = NonNull::dangling();
        self.capacity = 0;
    }

    fn is_allocated(&self) -> bool {
        self.capacity > 0 && mem::size_of::<T>() > 0
    }

    fn layout(capacity: usize) -> Result<Layout, AllocationError> {
        Layout::array::<T>(capacity).map_err(|_| AllocationError)
    }
}

impl<T, A> Drop for RawSlots<T, A>
where
    A: Allocator,
{
    fn drop(&mut self) {
        self.release();
    }
}

impl<T, A> Default for RawSlots<T, A>
where
    A: Allocator + Default,
{
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

//  Safety:
//  -   Just like a `Vec<T, A>`, only values are ever accessed through the buffer.
unsafe impl<T, A> Send for RawSlots<T, A> where T: Send, A: Allocator + Send {}

unsafe impl<T, A> Sync for RawSlots<T, A> where T: Sync, A: Allocator + Sync {}

// mod slots_tests

//! Allocator collaborator of the storage buffer.
//!
//! -   By default, exposes a stable subset of the standard allocator API, implemented for the global allocator.
//! -   If `allocator_api` is used, then forwards the standard allocator API, so any `Allocator` may be plugged in.

#[cfg(feature = "allocator_api")]
pub use alloc::alloc::{AllocError, Allocator, Global};

#[cfg(not(feature = "allocator_api"))]
pub use shim::{AllocError, Allocator, Global};

#[cfg(not(feature = "allocator_api"))]
pub(super) mod shim {
    use core::{
        alloc::Layout,
        error, fmt,
        ptr::{self, NonNull},
    };

    use alloc::alloc;

    /// The AllocError error indicates an allocation failure that may be due to resource exhaustion or to something
    /// wrong when combining the given input arguments with this allocator.
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub struct AllocError;

    impl fmt::Display for AllocError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
            f.write_str("memory allocation failed")
        }
    }

    impl error::Error for AllocError {}

    /// An implementation of Allocator can allocate, grow, shrink, and deallocate arbitrary blocks of data described via
    /// Layout.
    ///
    /// Only `allocate` and `deallocate` are required; growing and shrinking default to allocate-copy-deallocate, which
    /// preserves the old block untouched should the new allocation fail.
    ///
    /// #   Safety
    ///
    /// -   Liveness: memory blocks that are currently allocated by an allocator must point to valid memory until either
    ///     they are deallocated or the `Allocator` and all its clones are dropped.
    /// -   Independence: moving an allocator must not invalidate memory blocks returned from it.
    /// -   Shallowness: a copied or cloned allocator must behave like the original allocator.
    pub unsafe trait Allocator {
        /// Attempts to allocate a block of memory.
        fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError>;

        /// Behaves like allocate, but also ensures that the returned memory is zero-initialized.
        fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
            let ptr = self.allocate(layout)?;

            //  Safety:
            //  -   `ptr` is valid for writes of `ptr.len()` bytes, as it was just allocated.
            //  -   `ptr` is trivially properly aligned, given its alignment of 1.
            unsafe { ptr.cast::<u8>().as_ptr().write_bytes(0, ptr.len()) }

            Ok(ptr)
        }

        /// Deallocates the memory referenced by ptr.
        ///
        /// #   Safety
        ///
        /// -   Liveness: `ptr` must still be allocated.
        /// -   Selfness: `ptr` must have been allocated by `self`.
        /// -   Layout: `layout` must match the layout passed to `self.allocate(...)` or `self.allocate_zeroed(...)`
        ///     when allocating `ptr`.
        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

        /// Attempts to extend the memory block.
        ///
        /// On error, the memory block is left untouched.
        ///
        /// #   Safety
        ///
        /// -   Liveness: `ptr` must still be allocated.
        /// -   Selfness: `ptr` must have been allocated by `self`.
        /// -   Layout: `old_layout` must match the layout passed to `self.allocate(...)` or `self.allocate_zeroed(...)`
        ///     when allocating `ptr`.
        /// -   Growth: `new_layout.size()` must be greater than or equal to `old_layout.size()`.
        unsafe fn grow(
            &self,
            ptr: NonNull<u8>,
            old_layout: Layout,
            new_layout: Layout,
        ) -> Result<NonNull<[u8]>, AllocError> {
            debug_assert!(new_layout.size() >= old_layout.size());

            let new_ptr = self.allocate(new_layout)?;

            //  Safety:
            //  -   Forwarded pre-conditions, `old_layout.size()` bytes are both readable and writable.
            unsafe { relocate(self, ptr, old_layout, new_ptr, old_layout.size()) };

            Ok(new_ptr)
        }

        /// Attempts to extend the memory block, zeroing the extension.
        ///
        /// On error, the memory block is left untouched.
        ///
        /// #   Safety
        ///
        /// -   Liveness: `ptr` must still be allocated.
        /// -   Selfness: `ptr` must have been allocated by `self`.
        /// -   Layout: `old_layout` must match the layout passed to `self.allocate(...)` or `self.allocate_zeroed(...)`
        ///     when allocating `ptr`.
        /// -   Growth: `new_layout.size()` must be greater than or equal to `old_layout.size()`.
        unsafe fn grow_zeroed(
            &self,
            ptr: NonNull<u8>,
            old_layout: Layout,
            new_layout: Layout,
        ) -> Result<NonNull<[u8]>, AllocError> {
            debug_assert!(new_layout.size() >= old_layout.size());

            let new_ptr = self.allocate_zeroed(new_layout)?;

            //  Safety:
            //  -   Forwarded pre-conditions, `old_layout.size()` bytes are both readable and writable.
            unsafe { relocate(self, ptr, old_layout, new_ptr, old_layout.size()) };

            Ok(new_ptr)
        }

        /// Attempts to shrink the memory block.
        ///
        /// On error, the memory block is left untouched.
        ///
        /// #   Safety
        ///
        /// -   Liveness: `ptr` must still be allocated.
        /// -   Selfness: `ptr` must have been allocated by `self`.
        /// -   Layout: `old_layout` must match the layout passed to `self.allocate(...)` or `self.allocate_zeroed(...)`
        ///     when allocating `ptr`.
        /// -   Shrinkage: `new_layout.size()` must be less than or equal to `old_layout.size()`.
        unsafe fn shrink(
            &self,
            ptr: NonNull<u8>,
            old_layout: Layout,
            new_layout: Layout,
        ) -> Result<NonNull<[u8]>, AllocError> {
            debug_assert!(new_layout.size() <= old_layout.size());

            let new_ptr = self.allocate(new_layout)?;

            //  Safety:
            //  -   Forwarded pre-conditions, `new_layout.size()` bytes are both readable and writable.
            unsafe { relocate(self, ptr, old_layout, new_ptr, new_layout.size()) };

            Ok(new_ptr)
        }
    }

    //  Copies `size` bytes from `old` to `new`, then deallocates `old`.
    //
    //  #   Safety
    //
    //  -   Liveness, Selfness, Layout: as per `deallocate`, for `old` and `old_layout`.
    //  -   Size: `old` is readable for `size` bytes, and `new` is writable for `size` bytes.
    //  -   Fresh: `new` was freshly allocated, and does not overlap `old`.
    unsafe fn relocate<A>(allocator: &A, old: NonNull<u8>, old_layout: Layout, new: NonNull<[u8]>, size: usize)
    where
        A: ?Sized + Allocator,
    {
        //  Safety:
        //  -   `old` is valid for `size` reads, as per Size pre-condition.
        //  -   `new` is valid for `size` writes, as per Size pre-condition.
        //  -   `old` and `new` point to non-overlapping blocks, as per Fresh pre-condition.
        unsafe { ptr::copy_nonoverlapping(old.as_ptr(), new.cast::<u8>().as_ptr(), size) };

        //  Safety:
        //  -   Liveness: as per Liveness pre-condition.
        //  -   Selfness: as per Selfness pre-condition.
        //  -   Layout: as per Layout pre-condition.
        unsafe { allocator.deallocate(old, old_layout) };
    }

    /// The global memory allocator.
    #[derive(Copy, Clone, Default, Debug)]
    pub struct Global;

    //  Safety:
    //  -   Liveness, Independence, Shallowness: guaranteed by implementation.
    unsafe impl Allocator for Global {
        #[inline]
        fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
            self.alloc_impl(layout, false)
        }

        #[inline]
        fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
            self.alloc_impl(layout, true)
        }

        #[inline]
        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            if layout.size() == 0 {
                return;
            }

            //  Safety:
            //  -   `ptr.as_ptr()` is currently allocated, as per Liveness pre-condition.
            //  -   `ptr.as_ptr()` was allocated by `self`, as per Selfness pre-condition.
            //  -   `layout` matches the layout of `ptr.as_ptr()` as per Layout pre-condition.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }

    //
    //  Implementation
    //

    impl Global {
        #[inline]
        fn alloc_impl(&self, layout: Layout, zeroed: bool) -> Result<NonNull<[u8]>, AllocError> {
            if layout.size() == 0 {
                return Ok(NonNull::slice_from_raw_parts(NonNull::dangling(), 0));
            }

            //  Safety:
            //  -   `layout` has a non-zero size.
            let raw_ptr = unsafe {
                if zeroed {
                    alloc::alloc_zeroed(layout)
                } else {
                    alloc::alloc(layout)
                }
            };

            let ptr = NonNull::new(raw_ptr).ok_or(AllocError)?;

            Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
        }
    }
} // mod shim

#[cfg(all(test, not(feature = "allocator_api")))]
mod shim_tests {
    use core::alloc::Layout;

    use super::*;

    #[test]
    fn zero_sized() {
        let layout = Layout::new::<()>();

        let ptr = Global.allocate(layout).expect("success");

        assert_eq!(0, ptr.len());

        //  Safety:
        //  -   `ptr` was allocated by `Global`, with `layout`.
        unsafe { Global.deallocate(ptr.cast(), layout) };
    }

    #[test]
    fn grow_preserves() {
        let old_layout = Layout::array::<u32>(2).expect("valid");
        let new_layout = Layout::array::<u32>(8).expect("valid");

        let ptr = Global.allocate(old_layout).expect("success").cast::<u32>();

        //  Safety:
        //  -   `ptr` is valid for 2 writes, and aligned for `u32`.
        unsafe {
            ptr.write(7);
            ptr.add(1).write(11);
        }

        //  Safety:
        //  -   `ptr` was allocated by `Global`, with `old_layout`, and `new_layout` is larger.
        let ptr = unsafe { Global.grow_zeroed(ptr.cast(), old_layout, new_layout) }.expect("success");

        assert_eq!(new_layout.size(), ptr.len());

        let ptr = ptr.cast::<u32>();

        //  Safety:
        //  -   `ptr` is valid for 8 reads, all initialized.
        let values: Vec<u32> = (0..8).map(|i| unsafe { ptr.add(i).read() }).collect();

        assert_eq!(vec![7, 11, 0, 0, 0, 0, 0, 0], values);

        //  Safety:
        //  -   `ptr` was allocated by `Global`, with `new_layout`.
        unsafe { Global.deallocate(ptr.cast(), new_layout) };
    }

    #[test]
    fn shrink_preserves() {
        let old_layout = Layout::array::<u32>(8).expect("valid");
        let new_layout = Layout::array::<u32>(1).expect("valid");

        let ptr = Global.allocate_zeroed(old_layout).expect("success").cast::<u32>();

        //  Safety:
        //  -   `ptr` is valid for 1 write, and aligned for `u32`.
        unsafe { ptr.write(42) };

        //  Safety:
        //  -   `ptr` was allocated by `Global`, with `old_layout`, and `new_layout` is smaller.
        let ptr = unsafe { Global.shrink(ptr.cast(), old_layout, new_layout) }.expect("success");

        let ptr = ptr.cast::<u32>();

        //  Safety:
        //  -   `ptr` is valid for 1 read, initialized.
        assert_eq!(42, unsafe { ptr.read() });

        //  Safety:
        //  -   `ptr` was allocated by `Global`, with `new_layout`.
        unsafe { Global.deallocate(ptr.cast(), new_layout) };
    }
} // mod shim_tests

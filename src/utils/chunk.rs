//  See `BitChunkRaw` type.
//
//  #   Why a dedicated type?
//
//  Bundling methods on an existing type is possible only by "extension" traits, which then require the user to have
//  these traits in scope to invoke them.
//
//  A dedicated type, on top of avoiding type confusion, is more ergonomic as inherent methods can just be called
//  without any hassle.
//
//
//  #   Why `u64`?
//
//  The chunk width fixes the granularity of the occupancy map: one chunk covers 64 slots. A smaller type would mean
//  more chunks to step over when iterating sparse regions, a larger type may not have native bit-scan instructions.
//
//  Since 32-bits & 64-bits CPUs tend to support `u64` natively, and those compose the bulk of platforms targetted by
//  Rust developers, `u64` is therefore the largest well supported type.

/// A chunk of occupancy bits.
///
/// Each bit records whether the matching slot is live (set) or free (unset). `BitChunkRaw` offers bit-scan based
/// queries, so that finding the next live, or free, slot of a chunk never requires iterating bit by bit.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct BitChunkRaw(pub u64);

/// The index of a chunk, in a sequence of chunks.
///
/// #   Why `usize`?
///
/// In Rust, all slices are indexed by a `usize`, and the `IndexOfChunkRaw` will be used nigh exclusively as an index in
/// slices.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct IndexOfChunkRaw(pub usize);

/// The index of a bit in a chunk.
///
/// The index of a bit in a chunk is expected to always be strictly less than 64. No index created by `BitChunkRaw::split`
/// will ever violate this invariant.
///
/// #   Panics
///
/// In Debug, most operations taking an `IndexInChunkRaw` will panic if its value is strictly greater than 63.
///
/// In Release, any high bit will be ignored (masked away).
///
/// #   Why `u32`?
///
/// In Rust, all shift operations take a `u32` as their right-hand argument, and the `IndexInChunkRaw` will be used nigh
/// exclusively with shift operations.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct IndexInChunkRaw(pub u32);

//
//  Constants.
//

impl BitChunkRaw {
    /// Number of bits in a chunk, and thus of slots covered by a chunk.
    pub const BITS: usize = 64;

    /// An all-zeros bit chunk: all slots are free.
    pub const ALL_ZEROS: Self = Self(0);

    /// An all-ones bit chunk: all slots are live.
    pub const ALL_ONES: Self = Self(!0);
}

//
//  Static operations.
//

impl BitChunkRaw {
    /// Splits a slot index into an index-of-chunk/index-in-chunk pair.
    ///
    /// #   Examples
    ///
    /// ```
    /// #   use sparse_vector::utils::BitChunkRaw;
    /// let (of_chunk, in_chunk) = BitChunkRaw::split(133);
    ///
    /// assert_eq!(2, of_chunk.0);
    /// assert_eq!(5, in_chunk.0);
    /// ```
    #[inline]
    pub const fn split(index: usize) -> (IndexOfChunkRaw, IndexInChunkRaw) {
        //  Compute both / and % close together, so the optimizer fuses both in a single instruction.
        let of_chunk = index / Self::BITS;
        let in_chunk = index % Self::BITS;

        (IndexOfChunkRaw(of_chunk), IndexInChunkRaw(in_chunk as _))
    }

    /// Fuses a pair of index-of-chunk/index-in-chunk pair into a slot index.
    ///
    /// Returns None if the resulting index overflows. This will never happen for pairs obtained from `Self::split`,
    /// nor for chunks covering allocated slots.
    ///
    /// #   Panics
    ///
    /// See `IndexInChunkRaw`.
    ///
    /// #   Examples
    ///
    /// ```
    /// #   use sparse_vector::utils::{BitChunkRaw, IndexInChunkRaw, IndexOfChunkRaw};
    /// let of_chunk = IndexOfChunkRaw(2);
    /// let in_chunk = IndexInChunkRaw(5);
    ///
    /// assert_eq!(Some(133), BitChunkRaw::fuse(of_chunk, in_chunk));
    /// ```
    #[inline]
    pub const fn fuse(of_chunk: IndexOfChunkRaw, in_chunk: IndexInChunkRaw) -> Option<usize> {
        debug_assert!(in_chunk.0 < Self::BITS as _);

        //  FIXME: convert to `?` when it is const.
        let Some(index) = of_chunk.0.checked_mul(Self::BITS) else {
            return None;
        };

        //  Mask to ensure the addition doesn't overflow.
        let in_chunk = in_chunk.0 as usize % Self::BITS;

        Some(index + in_chunk)
    }

    /// Returns the number of chunks needed to cover `slots` slots.
    ///
    /// ```
    /// #   use sparse_vector::utils::BitChunkRaw;
    /// assert_eq!(0, BitChunkRaw::chunks_for(0));
    /// assert_eq!(1, BitChunkRaw::chunks_for(1));
    /// assert_eq!(1, BitChunkRaw::chunks_for(64));
    /// assert_eq!(2, BitChunkRaw::chunks_for(65));
    /// ```
    #[inline]
    pub const fn chunks_for(slots: usize) -> usize {
        slots.div_ceil(Self::BITS)
    }
}

// mod static_tests

//
//  Bit operations.
//

impl BitChunkRaw {
    /// Returns the number of bits set.
    ///
    /// #   Examples
    ///
    /// ```
    /// #   use sparse_vector::utils::BitChunkRaw;
    ///
    /// assert_eq!(0, BitChunkRaw::ALL_ZEROS.count());
    /// assert_eq!(64, BitChunkRaw::ALL_ONES.count());
    /// ```
    #[inline]
    pub const fn count(&self) -> usize {
        self.0.count_ones() as _
    }

    /// Returns whether no bit is set, ie all slots are free.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns whether all bits are set, ie all slots are live.
    #[inline]
    pub const fn is_full(&self) -> bool {
        self.0 == !0
    }

    /// Returns whether the given bit is set.
    ///
    /// #   Panics
    ///
    /// See `IndexInChunkRaw`.
    ///
    /// #   Examples
    ///
    /// ```
    /// #   use sparse_vector::utils::{BitChunkRaw, IndexInChunkRaw};
    /// let chunk = BitChunkRaw(0b1001);
    ///
    /// assert!(chunk.is_set(IndexInChunkRaw(0)));
    /// assert!(chunk.is_set(IndexInChunkRaw(3)));
    ///
    /// for i in (1..=2).chain(4..=63) {
    ///     assert!(!chunk.is_set(IndexInChunkRaw(i)));
    /// }
    /// ```
    #[inline]
    pub const fn is_set(&self, bit: IndexInChunkRaw) -> bool {
        let mask = Self::bit_mask(bit);

        (self.0 & mask) != 0
    }

    /// Sets a bit.
    ///
    /// Returns whether the bit is newly set, or not.
    ///
    /// #   Panics
    ///
    /// See `IndexInChunkRaw`.
    ///
    /// #   Examples
    ///
    /// ```
    /// #   use sparse_vector::utils::{BitChunkRaw, IndexInChunkRaw};
    /// let mut chunk = BitChunkRaw(0b1001);
    ///
    /// assert!(!chunk.set(IndexInChunkRaw(0)));
    /// assert!(chunk.set(IndexInChunkRaw(2)));
    ///
    /// assert_eq!(0b1101, chunk.0);
    /// ```
    #[inline]
    pub const fn set(&mut self, bit: IndexInChunkRaw) -> bool {
        let mask = Self::bit_mask(bit);

        let result = (self.0 & mask) == 0;

        self.0 |= mask;

        result
    }

    /// Resets a bit.
    ///
    /// Returns whether the bit was set, or not.
    ///
    /// #   Panics
    ///
    /// See `IndexInChunkRaw`.
    ///
    /// #   Examples
    ///
    /// ```
    /// #   use sparse_vector::utils::{BitChunkRaw, IndexInChunkRaw};
    /// let mut chunk = BitChunkRaw(0b1001);
    ///
    /// assert!(chunk.reset(IndexInChunkRaw(0)));
    /// assert!(!chunk.reset(IndexInChunkRaw(2)));
    ///
    /// assert_eq!(0b1000, chunk.0);
    /// ```
    #[inline]
    pub const fn reset(&mut self, bit: IndexInChunkRaw) -> bool {
        let mask = Self::bit_mask(bit);

        let result = (self.0 & mask) != 0;

        self.0 &= !mask;

        result
    }
}

#[cfg(test)]
mod bit_tests {
    use super::*;

    const BITS: u32 = BitChunkRaw::BITS as u32;

    #[test]
    fn is_set_empty() {
        for i in 0..BITS {
            assert!(!BitChunkRaw::ALL_ZEROS.is_set(IndexInChunkRaw(i)), "{i}");
        }
    }

    #[test]
    fn is_set_full() {
        for i in 0..BITS {
            assert!(BitChunkRaw::ALL_ONES.is_set(IndexInChunkRaw(i)), "{i}");
        }
    }

    #[test]
    fn set_empty() {
        for i in 0..BITS {
            let mut chunk = BitChunkRaw::ALL_ZEROS;

            assert!(chunk.set(IndexInChunkRaw(i)), "{i}");
            assert!(chunk.is_set(IndexInChunkRaw(i)), "{i}");
            assert!(!chunk.is_empty(), "{i}");
        }
    }

    #[test]
    fn reset_full() {
        for i in 0..BITS {
            let mut chunk = BitChunkRaw::ALL_ONES;

            assert!(chunk.reset(IndexInChunkRaw(i)), "{i}");
            assert!(!chunk.is_set(IndexInChunkRaw(i)), "{i}");
            assert!(!chunk.is_full(), "{i}");
        }
    }

    #[test]
    fn fill_one_by_one() {
        let mut chunk = BitChunkRaw::ALL_ZEROS;

        for i in 0..BITS {
            assert!(!chunk.is_full(), "{i}");

            chunk.set(IndexInChunkRaw(i));
        }

        assert!(chunk.is_full());
        assert_eq!(BitChunkRaw::ALL_ONES, chunk);
    }
} // mod bit_tests

//
//  Query operations.
//

impl BitChunkRaw {
    /// Returns the number of bits set that are at, or after, the given index.
    ///
    /// #   Examples
    ///
    /// ```
    /// #   use sparse_vector::utils::{BitChunkRaw, IndexInChunkRaw};
    /// assert_eq!(0, BitChunkRaw::ALL_ZEROS.count_after(IndexInChunkRaw(0)));
    ///
    /// assert_eq!(64, BitChunkRaw::ALL_ONES.count_after(IndexInChunkRaw(0)));
    /// assert_eq!(1, BitChunkRaw::ALL_ONES.count_after(IndexInChunkRaw(63)));
    /// ```
    #[inline]
    pub const fn count_after(&self, bit: IndexInChunkRaw) -> usize {
        let mask = Self::mask_after(bit);

        (self.0 & mask).count_ones() as _
    }

    /// Returns the chunk with all bits strictly before the given index reset.
    ///
    /// ```
    /// #   use sparse_vector::utils::{BitChunkRaw, IndexInChunkRaw};
    /// assert_eq!(BitChunkRaw(0b1000), BitChunkRaw(0b1011).retain_after(IndexInChunkRaw(2)));
    /// ```
    #[inline]
    pub const fn retain_after(&self, bit: IndexInChunkRaw) -> Self {
        Self(self.0 & Self::mask_after(bit))
    }

    /// Returns the index of the lowest set bit, if any.
    ///
    /// In occupancy terms, the first live slot of the chunk.
    ///
    /// ```
    /// #   use sparse_vector::utils::{BitChunkRaw, IndexInChunkRaw};
    /// assert_eq!(None, BitChunkRaw::ALL_ZEROS.first_set());
    /// assert_eq!(Some(IndexInChunkRaw(3)), BitChunkRaw(0b1000).first_set());
    /// ```
    #[inline]
    pub const fn first_set(&self) -> Option<IndexInChunkRaw> {
        let zeros = self.0.trailing_zeros();

        //  FIXME: convert to `.then_some` when it is const.
        if zeros < Self::BITS as _ {
            Some(IndexInChunkRaw(zeros))
        } else {
            None
        }
    }

    /// Returns the index of the lowest unset bit, if any.
    ///
    /// In occupancy terms, the first free slot of the chunk.
    ///
    /// ```
    /// #   use sparse_vector::utils::{BitChunkRaw, IndexInChunkRaw};
    /// assert_eq!(None, BitChunkRaw::ALL_ONES.first_unset());
    /// assert_eq!(Some(IndexInChunkRaw(2)), BitChunkRaw(0b1011).first_unset());
    /// ```
    #[inline]
    pub const fn first_unset(&self) -> Option<IndexInChunkRaw> {
        let ones = self.0.trailing_ones();

        if ones < Self::BITS as _ {
            Some(IndexInChunkRaw(ones))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod query_tests {
    use super::*;

    const BITS: u32 = BitChunkRaw::BITS as u32;

    #[test]
    fn count_after_empty() {
        for i in 0..BITS {
            assert_eq!(0, compute_count_after(0, i), "{i}");
        }
    }

    #[test]
    fn count_after_full() {
        for i in 0..BITS {
            assert_eq!(BITS - i, compute_count_after(!0, i), "{i}");
        }
    }

    #[test]
    fn first_set_single() {
        for i in 0..BITS {
            assert_eq!(Some(i), BitChunkRaw(1 << i).first_set().map(|i| i.0), "{i}");
        }
    }

    #[test]
    fn first_unset_single() {
        for i in 0..BITS {
            assert_eq!(Some(i), BitChunkRaw(!(1 << i)).first_unset().map(|i| i.0), "{i}");
        }
    }

    #[test]
    fn first_unset_lowest() {
        //  Bits 5 and 40 are free, 5 wins.
        let chunk = BitChunkRaw(!((1 << 5) | (1 << 40)));

        assert_eq!(Some(IndexInChunkRaw(5)), chunk.first_unset());
    }

    fn compute_count_after(chunk: u64, bit: u32) -> u32 {
        BitChunkRaw(chunk).count_after(IndexInChunkRaw(bit)) as _
    }
} // mod query_tests

//
//  Implementation details
//

impl BitChunkRaw {
    //  Mask of the bit.
    #[inline]
    const fn bit_mask(bit: IndexInChunkRaw) -> u64 {
        debug_assert!(bit.0 < Self::BITS as _);

        //  Mask to ensure the shift doesn't overflow.
        let shift = bit.0 % Self::BITS as u32;

        1 << shift
    }

    //  Mask including `bit` and all bits after.
    #[inline]
    const fn mask_after(bit: IndexInChunkRaw) -> u64 {
        let mask = Self::bit_mask(bit) - 1;

        !mask
    }
}

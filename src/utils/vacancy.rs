//  See `VacancyIndex`.
//
//  #   Why a hierarchy of bitmaps?
//
//  An ordered set of chunk indexes would do, but a balanced tree only offers O(log N) access to its first element,
//  and costs an allocation per node. A hierarchy of bitmaps offers the same "lowest vacant chunk" query with one
//  bit-scan per level, and there are at most `LEVELS` levels.

use crate::utils::{AllocationError, BitChunkRaw, DynamicBitChunkStore, IndexInChunkRaw, IndexOfChunkRaw};

//  Number of bits per level: 64^LEVELS must cover all `usize::MAX / 64` chunks.
const LEVELS: usize = 10;

/// Registry of the chunks which have at least one vacant -- ie, free -- slot.
///
/// Only the first `chunks()` chunks are registered; any chunk beyond is unknown, and reported as neither vacant nor
/// full.
///
/// #   Structure
///
/// -   Level 0 holds one bit per registered chunk, set if the chunk has a vacant slot.
/// -   Level `k + 1` holds one bit per chunk of level `k`, set if the latter has any bit set.
///
/// The number of levels in use, the depth, is the smallest such that the top level fits in a single chunk.
#[derive(Debug, Default)]
pub struct VacancyIndex {
    levels: [DynamicBitChunkStore; LEVELS],
    depth: usize,
    chunks: usize,
}

impl VacancyIndex {
    /// Creates a new, empty, registry.
    pub const fn new() -> Self {
        Self {
            levels: [const { DynamicBitChunkStore::new() }; LEVELS],
            depth: 0,
            chunks: 0,
        }
    }

    /// Returns the number of registered chunks.
    pub const fn chunks(&self) -> usize {
        self.chunks
    }

    /// Returns the index of the lowest chunk with a vacant slot, if any.
    ///
    /// Descends from the top level, following the lowest set bit at each level.
    pub fn first(&self) -> Option<IndexOfChunkRaw> {
        let mut index = 0;

        for store in self.levels[..self.depth].iter().rev() {
            let in_chunk = store.get(IndexOfChunkRaw(index)).first_set()?;

            index = BitChunkRaw::fuse(IndexOfChunkRaw(index), in_chunk)?;
        }

        (self.depth > 0).then_some(IndexOfChunkRaw(index))
    }

    /// Returns whether the chunk is registered, and has a vacant slot.
    pub fn is_vacant(&self, chunk: IndexOfChunkRaw) -> bool {
        let (of_chunk, in_chunk) = BitChunkRaw::split(chunk.0);

        chunk.0 < self.chunks && self.levels[0].get(of_chunk).is_set(in_chunk)
    }

    /// Ensures that up to `chunks` chunks can be registered without allocating.
    ///
    /// On error, `self` is left unchanged, though some memory may have been reserved.
    pub fn try_reserve(&mut self, chunks: usize) -> Result<(), AllocationError> {
        let mut bits = chunks;

        for store in &mut self.levels[..Self::depth_for(chunks)] {
            let words = BitChunkRaw::chunks_for(bits);

            store.try_reserve(words)?;

            bits = words;
        }

        Ok(())
    }

    /// Registers all chunks up to `chunks`, the new ones as full.
    ///
    /// #   Panics
    ///
    /// If `chunks` is less than the number of registered chunks, or if the memory was not reserved beforehand.
    pub fn extend(&mut self, chunks: usize) {
        assert!(chunks >= self.chunks, "{chunks} < {}", self.chunks);

        let depth = Self::depth_for(chunks);

        //  A new top level summarizes the former top level, which fits in a single chunk.
        for level in self.depth.max(1)..depth {
            if !self.levels[level - 1].get(IndexOfChunkRaw(0)).is_empty() {
                self.levels[level].get_mut(IndexOfChunkRaw(0)).set(IndexInChunkRaw(0));
            }
        }

        self.depth = depth;
        self.chunks = chunks;

        debug_assert!(
            self.levels[..depth]
                .iter()
                .all(|store| !store.is_empty()),
            "extend without reserve"
        );
    }

    /// Marks the chunk as having a vacant slot.
    ///
    /// #   Panics
    ///
    /// If the chunk is not registered.
    pub fn mark_vacant(&mut self, chunk: IndexOfChunkRaw) {
        assert!(chunk.0 < self.chunks, "{} >= {}", chunk.0, self.chunks);

        let mut bit = chunk.0;

        for store in &mut self.levels[..self.depth] {
            let (of_chunk, in_chunk) = BitChunkRaw::split(bit);

            let word = store.get_mut(of_chunk);
            let was_empty = word.is_empty();

            word.set(in_chunk);

            if !was_empty {
                break;
            }

            bit = of_chunk.0;
        }
    }

    /// Marks the chunk as being full.
    ///
    /// #   Panics
    ///
    /// If the chunk is not registered.
    pub fn mark_full(&mut self, chunk: IndexOfChunkRaw) {
        assert!(chunk.0 < self.chunks, "{} >= {}", chunk.0, self.chunks);

        let mut bit = chunk.0;

        for store in &mut self.levels[..self.depth] {
            let (of_chunk, in_chunk) = BitChunkRaw::split(bit);

            let word = store.get_mut(of_chunk);

            word.reset(in_chunk);

            if !word.is_empty() {
                break;
            }

            bit = of_chunk.0;
        }
    }

    //  Returns the number of levels needed to register `chunks` chunks.
    fn depth_for(chunks: usize) -> usize {
        if chunks == 0 {
            return 0;
        }

        let mut depth = 1;
        let mut bits = chunks;

        while bits > BitChunkRaw::BITS {
            bits = BitChunkRaw::chunks_for(bits);
            depth += 1;
        }

        debug_assert!(depth <= LEVELS, "{depth} > {LEVELS}");

        depth
    }
}

// mod registry_tests

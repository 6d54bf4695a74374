//  See `Occupancy`.

use crate::utils::{AllocationError, BitChunkRaw, BitIter, DynamicBitChunkStore, IndexOfChunkRaw, VacancyIndex};

/// Truncated occupancy index, as prepared by `Occupancy::prepare_truncate`.
#[derive(Debug)]
pub struct Truncation {
    live: DynamicBitChunkStore,
    vacancy: VacancyIndex,
}

/// Occupancy index of a sequence of slots.
///
/// Tracks, with one bit per slot, which slots are live (set) and which are free (unset), in chunks of 64 slots, and
/// registers which chunks have a free slot so that the lowest free slot is found in O(1).
///
/// #   Invariants
///
/// -   Chunks at or beyond `self.chunks()` have no live bit.
/// -   A chunk below `self.chunks()` is registered as vacant in the `VacancyIndex` if and only if it is not full.
#[derive(Debug, Default)]
pub struct Occupancy {
    live: DynamicBitChunkStore,
    vacancy: VacancyIndex,
}

impl Occupancy {
    /// Creates a new occupancy index, covering no slot.
    pub const fn new() -> Self {
        Self {
            live: DynamicBitChunkStore::new(),
            vacancy: VacancyIndex::new(),
        }
    }

    /// Returns the number of chunks covered.
    pub const fn chunks(&self) -> usize {
        self.vacancy.chunks()
    }

    /// Returns the occupancy bits of the chunks covered.
    pub fn live_chunks(&self) -> &[BitChunkRaw] {
        let chunks = self.chunks();

        &self.live.chunks()[..chunks]
    }

    /// Returns an iterator over the live slots, at or after `start`, in ascending order.
    pub fn live_from(&self, start: usize) -> BitIter<'_> {
        BitIter::starting_at(self.live_chunks(), start)
    }

    /// Returns the number of live slots at or after `start`, out of `total` live slots.
    ///
    /// Counts the live slots on whichever side of `start` holds fewer chunks.
    pub fn count_from(&self, start: usize, total: usize) -> usize {
        let chunks = self.live_chunks();

        let (of_chunk, in_chunk) = BitChunkRaw::split(start);

        let Some(chunk) = chunks.get(of_chunk.0) else {
            return 0;
        };

        let after = chunk.count_after(in_chunk);

        if of_chunk.0 < chunks.len() / 2 {
            let before = chunks[..of_chunk.0].iter().map(BitChunkRaw::count).sum::<usize>() + chunk.count() - after;

            debug_assert!(before <= total, "{before} > {total}");

            total - before
        } else {
            after + chunks[of_chunk.0 + 1..].iter().map(BitChunkRaw::count).sum::<usize>()
        }
    }

    /// Returns whether the slot is live.
    ///
    /// Slots beyond the covered chunks are never live.
    #[inline]
    pub fn is_live(&self, index: usize) -> bool {
        let (of_chunk, in_chunk) = BitChunkRaw::split(index);

        self.live.get(of_chunk).is_set(in_chunk)
    }

    /// Returns the lowest free slot, if any.
    ///
    /// Looks up the lowest chunk with a free slot, then the lowest free slot of this chunk: two bit-scan searches.
    #[inline]
    pub fn vacant(&self) -> Option<usize> {
        let of_chunk = self.vacancy.first()?;

        //  A chunk is only registered as vacant if not full.
        let in_chunk = self.live.get(of_chunk).first_unset()?;

        BitChunkRaw::fuse(of_chunk, in_chunk)
    }

    /// Marks a free slot as live.
    ///
    /// #   Panics
    ///
    /// If `index` is not covered. In Debug, if `index` is already live.
    pub fn occupy(&mut self, index: usize) {
        let (of_chunk, in_chunk) = BitChunkRaw::split(index);

        assert!(of_chunk.0 < self.chunks(), "{index} is not covered");

        let chunk = self.live.get_mut(of_chunk);

        let newly = chunk.set(in_chunk);

        debug_assert!(newly, "{index} is already live");

        if chunk.is_full() {
            self.vacancy.mark_full(of_chunk);
        }
    }

    /// Marks a live slot as free.
    ///
    /// #   Panics
    ///
    /// If `index` is not covered. In Debug, if `index` is already free.
    pub fn vacate(&mut self, index: usize) {
        let (of_chunk, in_chunk) = BitChunkRaw::split(index);

        assert!(of_chunk.0 < self.chunks(), "{index} is not covered");

        let chunk = self.live.get_mut(of_chunk);

        let was_full = chunk.is_full();
        let was_set = chunk.reset(in_chunk);

        debug_assert!(was_set, "{index} is already free");

        if was_full {
            self.vacancy.mark_vacant(of_chunk);
        }
    }

    /// Marks all slots of the chunk as free, returning the previous occupancy bits of the chunk.
    ///
    /// #   Panics
    ///
    /// If `of_chunk` is not covered.
    pub fn vacate_chunk(&mut self, of_chunk: IndexOfChunkRaw) -> BitChunkRaw {
        assert!(of_chunk.0 < self.chunks(), "chunk {} is not covered", of_chunk.0);

        let previous = core::mem::take(self.live.get_mut(of_chunk));

        if previous.is_full() {
            self.vacancy.mark_vacant(of_chunk);
        }

        previous
    }

    /// Returns the number of chunks needed to cover all live slots, scanning from the highest chunk downward.
    pub fn used_chunks(&self) -> usize {
        self.live_chunks()
            .iter()
            .rposition(|chunk| !chunk.is_empty())
            .map_or(0, |last| last + 1)
    }

    /// Ensures that up to `chunks` chunks can be covered without allocating.
    ///
    /// On error, `self` is left unchanged, though some memory may have been reserved.
    pub fn try_reserve(&mut self, chunks: usize) -> Result<(), AllocationError> {
        self.live.try_reserve(chunks)?;
        self.vacancy.try_reserve(chunks)
    }

    /// Covers up to `chunks` chunks, the new ones entirely free.
    ///
    /// #   Panics
    ///
    /// If `chunks` is less than the number of covered chunks, or if the memory was not reserved beforehand.
    pub fn extend(&mut self, chunks: usize) {
        let old = self.chunks();

        self.vacancy.extend(chunks);

        for of_chunk in old..chunks {
            debug_assert!(self.live.get(IndexOfChunkRaw(of_chunk)).is_empty());

            self.vacancy.mark_vacant(IndexOfChunkRaw(of_chunk));
        }
    }

    /// Prepares the bitmap and registry needed to cover only the first `chunks` chunks, sized for them.
    ///
    /// The truncation is only effective once the result is passed to `commit_truncate`, this split allows performing
    /// all fallible operations before modifying anything.
    ///
    /// #   Panics
    ///
    /// If `chunks` is greater than the number of covered chunks.
    pub fn prepare_truncate(&self, chunks: usize) -> Result<Truncation, AllocationError> {
        assert!(chunks <= self.chunks(), "{chunks} > {}", self.chunks());

        let live = self.live.try_clone_prefix(chunks)?;

        let mut vacancy = VacancyIndex::new();

        vacancy.try_reserve(chunks)?;
        vacancy.extend(chunks);

        for (of_chunk, chunk) in self.live_chunks()[..chunks].iter().enumerate() {
            if !chunk.is_full() {
                vacancy.mark_vacant(IndexOfChunkRaw(of_chunk));
            }
        }

        Ok(Truncation { live, vacancy })
    }

    /// Covers only the chunks of `truncation`, as prepared by `prepare_truncate`, releasing the memory of the others.
    ///
    /// #   Panics
    ///
    /// In Debug, if any live slot would no longer be covered, or if `self` was modified since the preparation.
    pub fn commit_truncate(&mut self, truncation: Truncation) {
        let Truncation { live, vacancy } = truncation;

        let chunks = vacancy.chunks();

        debug_assert!(chunks <= self.chunks());
        debug_assert!(self.live_chunks()[chunks..].iter().all(BitChunkRaw::is_empty));
        debug_assert_eq!(&self.live_chunks()[..chunks], &live.chunks()[..chunks]);

        self.live = live;
        self.vacancy = vacancy;
    }

    /// Covers no chunk any longer, releasing the memory.
    ///
    /// #   Panics
    ///
    /// In Debug, if any slot is still live.
    pub fn clear(&mut self) {
        debug_assert!(self.live_chunks().iter().all(BitChunkRaw::is_empty));

        *self = Self::new();
    }

    /// Checks the invariants, in tests.
    #[cfg(test)]
    #[track_caller]
    pub(crate) fn assert_invariants(&self) {
        for (of_chunk, chunk) in self.live.chunks().iter().enumerate() {
            let of_chunk = IndexOfChunkRaw(of_chunk);

            if of_chunk.0 < self.chunks() {
                assert_eq!(!chunk.is_full(), self.vacancy.is_vacant(of_chunk), "{of_chunk:?} - {chunk:?}");
            } else {
                assert!(chunk.is_empty(), "{of_chunk:?} - {chunk:?}");
            }
        }

        let lowest = self
            .live_chunks()
            .iter()
            .position(|chunk| !chunk.is_full())
            .map(IndexOfChunkRaw);

        assert_eq!(lowest, self.vacancy.first());
    }
}

// mod occupancy_tests

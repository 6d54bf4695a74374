//  See structs.

use super::{BitChunkRaw, IndexInChunkRaw, IndexOfChunkRaw};

//
//  In chunk iterator.
//

/// Forward iterator over the set bits of a `BitChunkRaw`, lowest first.
///
/// Each step costs a single bit-scan, regardless of the number of unset bits skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct BitInChunkIter {
    //  Bits yet to be yielded.
    remaining: BitChunkRaw,
}

impl BitInChunkIter {
    /// Creates a new iterator, over all set bits of `chunk`.
    pub const fn new(chunk: BitChunkRaw) -> Self {
        Self { remaining: chunk }
    }

    /// Creates a new iterator, over the set bits of `chunk` at, or after, `start`.
    pub const fn starting_at(chunk: BitChunkRaw, start: IndexInChunkRaw) -> Self {
        Self::new(chunk.retain_after(start))
    }

    /// Returns the next set bit, without advancing.
    pub const fn peek(&self) -> Option<IndexInChunkRaw> {
        self.remaining.first_set()
    }
}

impl Iterator for BitInChunkIter {
    type Item = IndexInChunkRaw;

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.remaining.count();

        (count, Some(count))
    }

    fn count(self) -> usize {
        self.remaining.count()
    }

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.remaining.first_set()?;

        self.remaining.reset(result);

        Some(result)
    }
}

impl ExactSizeIterator for BitInChunkIter {}

#[cfg(test)]
mod in_chunk_tests {
    use super::*;

    #[test]
    fn empty() {
        const EMPTY: &[u32] = &[];

        assert_eq!(EMPTY, collect(0));
    }

    #[test]
    fn single() {
        const SINGLE: &[u32] = &[1];

        assert_eq!(SINGLE, collect(0b0010));
    }

    #[test]
    fn boundaries() {
        const FORWARD: &[u32] = &[0, 63];

        assert_eq!(FORWARD, collect(1 << 63 | 1));
    }

    #[test]
    fn starting_at() {
        const CHUNK: BitChunkRaw = BitChunkRaw(1 << 63 | 1 << 9 | 1 << 8 | 1);

        let at = |start: u32| -> Vec<u32> {
            BitInChunkIter::starting_at(CHUNK, IndexInChunkRaw(start))
                .map(|i| i.0)
                .collect()
        };

        assert_eq!(&[0, 8, 9, 63][..], at(0));
        assert_eq!(&[8, 9, 63][..], at(1));
        assert_eq!(&[9, 63][..], at(9));
        assert_eq!(&[63][..], at(10));
    }

    #[test]
    fn size_hint() {
        let mut iter = BitInChunkIter::new(BitChunkRaw(0b1011));

        assert_eq!(3, iter.len());
        assert_eq!(Some(IndexInChunkRaw(0)), iter.peek());

        iter.next();

        assert_eq!(2, iter.len());
        assert_eq!(Some(IndexInChunkRaw(1)), iter.peek());
    }

    fn collect(chunk: u64) -> Vec<u32> {
        BitInChunkIter::new(BitChunkRaw(chunk)).map(|i| i.0).collect()
    }
} // mod in_chunk_tests

//
//  Across chunks iterator.
//

/// Forward iterator over the set bits of a slice of `BitChunkRaw`, yielding their fused index.
///
/// Chunks with no set bit are skipped at the cost of a single comparison each, and set bits within a chunk are found
/// by bit-scan, hence the iteration costs O(1) per item plus O(1) per chunk, never O(1) per bit.
#[derive(Clone, Copy, Debug)]
pub struct BitIter<'a> {
    chunks: &'a [BitChunkRaw],
    //  Index of the chunk `current` was extracted from.
    of_chunk: IndexOfChunkRaw,
    //  Empty only once exhausted: empty chunks are skipped eagerly.
    current: BitInChunkIter,
}

impl<'a> BitIter<'a> {
    /// Creates a new iterator, over all set bits of `chunks`.
    pub fn new(chunks: &'a [BitChunkRaw]) -> Self {
        Self::starting_at(chunks, 0)
    }

    /// Creates a new iterator, over the set bits of `chunks` at, or after, `start`.
    ///
    /// If `start` is beyond the end of `chunks`, the iterator is empty.
    pub fn starting_at(chunks: &'a [BitChunkRaw], start: usize) -> Self {
        let (of_chunk, in_chunk) = BitChunkRaw::split(start);

        let current = match chunks.get(of_chunk.0) {
            Some(chunk) => BitInChunkIter::starting_at(*chunk, in_chunk),
            None => BitInChunkIter::default(),
        };

        let mut this = Self {
            chunks,
            of_chunk,
            current,
        };

        this.skip_empty();

        this
    }

    /// Returns the underlying chunks.
    pub fn chunks(&self) -> &'a [BitChunkRaw] {
        self.chunks
    }

    /// Returns the number of bits covered by the underlying chunks, which is the index this iterator reports once
    /// exhausted.
    pub fn end(&self) -> usize {
        self.chunks.len() * BitChunkRaw::BITS
    }

    /// Returns the index of the next set bit, or `self.end()` if there is none, without advancing.
    ///
    /// O(1), as the next set bit is located in advance.
    pub fn position(&self) -> usize {
        self.current
            .peek()
            .and_then(|in_chunk| BitChunkRaw::fuse(self.of_chunk, in_chunk))
            .unwrap_or_else(|| self.end())
    }

    //  Moves to the next chunk with a set bit, unless `current` has one left.
    fn skip_empty(&mut self) {
        while self.current.peek().is_none() {
            let next = IndexOfChunkRaw(self.of_chunk.0 + 1);

            let Some(chunk) = self.chunks.get(next.0) else {
                return;
            };

            self.of_chunk = next;
            self.current = BitInChunkIter::new(*chunk);
        }
    }
}

impl Iterator for BitIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let of_chunk = self.of_chunk;
        let in_chunk = self.current.next()?;

        self.skip_empty();

        //  The chunks are in memory, hence their bits can be indexed.
        BitChunkRaw::fuse(of_chunk, in_chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = self.chunks.len().saturating_sub(self.of_chunk.0) * BitChunkRaw::BITS;

        (self.current.len(), Some(upper))
    }
}

impl core::iter::FusedIterator for BitIter<'_> {}

// mod across_chunks_tests

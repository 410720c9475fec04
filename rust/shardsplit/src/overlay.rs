//! Virtual deletions over a read-only segment.
//!
//! A [`DeletionOverlay`] wraps one segment and keeps two bitmasks of `max_doc` bits:
//!
//! - `original`: the segment's own deletions, captured once at construction and never
//!   modified afterwards. It is shared (`Arc`) so several overlays over the same segment
//!   can be seeded from one snapshot.
//! - `working`: the deletions of the current pass. `working ⊇ original` at all times;
//!   [`DeletionOverlay::reset_to_original`] restores exactly `original`.
//!
//! The overlay is itself a [`CorpusReader`], so every consumer of the segment (most
//! importantly the output writer) observes the working deletions and nothing else.

use std::sync::Arc;

use shardsplit_bit_array::BitArray;
use shardsplit_common::Result;
use shardsplit_corpus::{
    Document,
    reader::{CorpusReader, Occurrences, Postings},
};

pub struct DeletionOverlay {
    segment: Arc<dyn CorpusReader>,
    original: Arc<BitArray>,
    working: BitArray,
}

impl DeletionOverlay {
    /// Wraps `segment`, snapshotting its current deletions as the original state.
    ///
    /// Segments without deletions still get an (all-zero) original bitmask.
    pub fn new(segment: Arc<dyn CorpusReader>) -> DeletionOverlay {
        let original = Arc::new(Self::snapshot_deletions(segment.as_ref()));
        Self::from_snapshot(segment, original)
    }

    /// Wraps `segment` with a previously captured original-deletions snapshot.
    ///
    /// # Panics
    ///
    /// If the snapshot length differs from `segment.max_doc()`.
    pub fn from_snapshot(segment: Arc<dyn CorpusReader>, original: Arc<BitArray>) -> DeletionOverlay {
        assert_eq!(
            original.len(),
            segment.max_doc() as usize,
            "deletion snapshot does not match the segment"
        );
        let working = (*original).clone();
        DeletionOverlay {
            segment,
            original,
            working,
        }
    }

    fn snapshot_deletions(segment: &dyn CorpusReader) -> BitArray {
        let max_doc = segment.max_doc() as usize;
        if !segment.has_deletions() {
            return BitArray::empty(max_doc);
        }
        BitArray::from_positions(
            (0..segment.max_doc())
                .filter(|&ordinal| segment.is_deleted(ordinal))
                .map(|ordinal| ordinal as usize),
            max_doc,
        )
    }

    pub fn segment(&self) -> &Arc<dyn CorpusReader> {
        &self.segment
    }

    pub fn original(&self) -> &Arc<BitArray> {
        &self.original
    }

    /// Marks `ordinal` absent for the current pass. Idempotent.
    ///
    /// # Panics
    ///
    /// If `ordinal >= max_doc`.
    #[inline]
    pub fn mark_absent(&mut self, ordinal: u32) {
        assert!(
            (ordinal as usize) < self.working.len(),
            "ordinal {ordinal} out of range (max_doc {})",
            self.working.len()
        );
        self.working.set(ordinal as usize);
    }

    /// Drops every absence introduced since construction or the last reset. Pre-existing
    /// deletions stay in place.
    pub fn reset_to_original(&mut self) {
        debug_assert!(self.working.is_superset_of(&*self.original));
        self.working.copy_from(&*self.original);
    }

    #[inline]
    pub fn is_present(&self, ordinal: u32) -> bool {
        !self.working.contains(ordinal as usize)
    }

    pub fn present_count(&self) -> u32 {
        self.working.count_zeros() as u32
    }

    pub fn has_any_absent(&self) -> bool {
        self.segment.max_doc() != self.present_count()
    }
}

impl CorpusReader for DeletionOverlay {
    fn max_doc(&self) -> u32 {
        self.segment.max_doc()
    }

    fn num_docs(&self) -> u32 {
        self.present_count()
    }

    fn has_deletions(&self) -> bool {
        self.has_any_absent()
    }

    fn is_deleted(&self, ordinal: u32) -> bool {
        !self.is_present(ordinal)
    }

    fn fetch_field(&self, ordinal: u32, field: &str) -> Result<Option<String>> {
        self.segment.fetch_field(ordinal, field)
    }

    fn document(&self, ordinal: u32) -> Result<Document> {
        self.segment.document(ordinal)
    }

    fn live_ordinals(&self) -> Occurrences<'_> {
        Box::new(LiveOccurrences {
            inner: 0..self.segment.max_doc(),
            absent: &self.working,
        })
    }

    fn postings<'a>(&'a self, field: &'a str, term: &'a str) -> Postings<'a> {
        Box::new(LivePostings {
            inner: self.segment.postings(field, term),
            absent: &self.working,
        })
    }
}

impl std::fmt::Debug for DeletionOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionOverlay")
            .field("max_doc", &self.working.len())
            .field("original_absent", &self.original.count_ones())
            .field("present", &self.present_count())
            .finish()
    }
}

/// An ordinal stream that skips ordinals absent in the working bitmask at the time they
/// are reached.
struct LiveOccurrences<'a, I> {
    inner: I,
    absent: &'a BitArray,
}

impl<I: Iterator<Item = u32>> Iterator for LiveOccurrences<'_, I> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.inner
            .by_ref()
            .find(|&ordinal| !self.absent.contains(ordinal as usize))
    }
}

/// The posting-stream counterpart of [`LiveOccurrences`]; errors pass through.
struct LivePostings<'a> {
    inner: Postings<'a>,
    absent: &'a BitArray,
}

impl Iterator for LivePostings<'_> {
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Result<u32>> {
        let absent = self.absent;
        self.inner.by_ref().find(|item| match item {
            Ok(ordinal) => !absent.contains(*ordinal as usize),
            Err(_) => true,
        })
    }
}

//! A single logical corpus composed of overlaid segments.

use std::sync::Arc;

use shardsplit_bit_array::BitArray;
use shardsplit_common::{Result, error::Error};
use shardsplit_corpus::{
    Document,
    reader::{CorpusReader, Occurrences, Postings},
};

use crate::overlay::DeletionOverlay;

/// Concatenates segments into one ordinal space, each segment wrapped by its own
/// [`DeletionOverlay`].
///
/// Global ordinal `base[i] + local` addresses ordinal `local` of segment `i`. Marking,
/// resetting and presence queries are routed to the owning segment's overlay.
pub struct CorpusView {
    overlays: Vec<DeletionOverlay>,
    bases: Vec<u32>,
    max_doc: u32,
}

impl CorpusView {
    pub fn new(segments: Vec<Arc<dyn CorpusReader>>) -> Result<CorpusView> {
        Self::from_overlays(segments.into_iter().map(DeletionOverlay::new).collect())
    }

    fn from_overlays(overlays: Vec<DeletionOverlay>) -> Result<CorpusView> {
        let mut bases = Vec::with_capacity(overlays.len());
        let mut max_doc = 0u32;
        for overlay in &overlays {
            bases.push(max_doc);
            max_doc = max_doc.checked_add(overlay.max_doc()).ok_or_else(|| {
                Error::invalid_arg("segments", "combined document count exceeds u32 range")
            })?;
        }
        Ok(CorpusView {
            overlays,
            bases,
            max_doc,
        })
    }

    /// Captures the original deletions of every segment, for building independent views.
    pub fn snapshot(&self) -> CorpusSnapshot {
        CorpusSnapshot {
            segments: self
                .overlays
                .iter()
                .map(|overlay| (overlay.segment().clone(), overlay.original().clone()))
                .collect(),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn overlays(&self) -> &[DeletionOverlay] {
        &self.overlays
    }

    /// Resolves a global ordinal to `(segment index, local ordinal)`.
    fn locate(&self, ordinal: u32) -> Option<(usize, u32)> {
        if ordinal >= self.max_doc {
            return None;
        }
        // Empty segments share their base with the following segment; the last segment
        // whose base does not exceed `ordinal` is the one that owns it.
        let index = self.bases.partition_point(|&base| base <= ordinal) - 1;
        Some((index, ordinal - self.bases[index]))
    }

    fn locate_or_err(&self, ordinal: u32) -> Result<(usize, u32)> {
        self.locate(ordinal).ok_or_else(|| {
            Error::invalid_arg(
                "ordinal",
                format!("{ordinal} out of range (max_doc {})", self.max_doc),
            )
        })
    }

    /// # Panics
    ///
    /// If `ordinal` is out of range.
    pub fn mark_absent(&mut self, ordinal: u32) {
        let (index, local) = self
            .locate(ordinal)
            .unwrap_or_else(|| panic!("ordinal {ordinal} out of range"));
        self.overlays[index].mark_absent(local);
    }

    pub fn reset_to_original(&mut self) {
        self.overlays
            .iter_mut()
            .for_each(DeletionOverlay::reset_to_original);
    }

    /// Out-of-range ordinals are never present.
    pub fn is_present(&self, ordinal: u32) -> bool {
        self.locate(ordinal)
            .is_some_and(|(index, local)| self.overlays[index].is_present(local))
    }

    pub fn present_count(&self) -> u32 {
        self.overlays.iter().map(|o| o.present_count()).sum()
    }

    pub fn has_any_absent(&self) -> bool {
        self.overlays.iter().any(|o| o.has_any_absent())
    }
}

impl CorpusReader for CorpusView {
    fn max_doc(&self) -> u32 {
        self.max_doc
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
        let (index, local) = self.locate_or_err(ordinal)?;
        self.overlays[index].fetch_field(local, field)
    }

    fn document(&self, ordinal: u32) -> Result<Document> {
        let (index, local) = self.locate_or_err(ordinal)?;
        self.overlays[index].document(local)
    }

    fn live_ordinals(&self) -> Occurrences<'_> {
        Box::new(
            self.overlays
                .iter()
                .zip(&self.bases)
                .flat_map(|(overlay, &base)| overlay.live_ordinals().map(move |o| base + o)),
        )
    }

    fn postings<'a>(&'a self, field: &'a str, term: &'a str) -> Postings<'a> {
        Box::new(
            self.overlays
                .iter()
                .zip(&self.bases)
                .flat_map(move |(overlay, &base)| {
                    overlay
                        .postings(field, term)
                        .map(move |item| item.map(|o| base + o))
                }),
        )
    }
}

impl std::fmt::Debug for CorpusView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusView")
            .field("segments", &self.overlays.len())
            .field("max_doc", &self.max_doc)
            .field("present", &self.present_count())
            .finish()
    }
}

/// The read-only part of a [`CorpusView`]: its segments and their original deletions.
///
/// Shared across shard workers; each worker builds its own view with private working
/// bitmasks via [`CorpusSnapshot::view`].
#[derive(Clone)]
pub struct CorpusSnapshot {
    segments: Vec<(Arc<dyn CorpusReader>, Arc<BitArray>)>,
}

impl CorpusSnapshot {
    pub fn view(&self) -> Result<CorpusView> {
        CorpusView::from_overlays(
            self.segments
                .iter()
                .map(|(segment, original)| {
                    DeletionOverlay::from_snapshot(segment.clone(), original.clone())
                })
                .collect(),
        )
    }
}

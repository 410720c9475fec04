//! The read interface over a corpus or a single segment.

use shardsplit_common::Result;

use crate::document::Document;

/// A stream of document ordinals, ascending.
pub type Occurrences<'a> = Box<dyn Iterator<Item = u32> + 'a>;

/// A stream of ordinals of documents containing a term, ascending. Items are fallible
/// because implementations may read stored documents lazily.
pub type Postings<'a> = Box<dyn Iterator<Item = Result<u32>> + 'a>;

/// Read access to a sequence of documents addressed by ordinal.
///
/// Ordinals are dense in `0..max_doc()` and include slots whose documents are deleted.
/// Implementations are read-only; wrappers that simulate deletions (see the splitter's
/// overlay) implement this same trait, so anything consuming a `CorpusReader` sees the
/// wrapper's view of which documents exist.
pub trait CorpusReader: Send + Sync {
    /// Number of addressable ordinals, deleted slots included.
    fn max_doc(&self) -> u32;

    /// Number of live (not deleted) documents.
    fn num_docs(&self) -> u32;

    fn has_deletions(&self) -> bool {
        self.max_doc() != self.num_docs()
    }

    fn is_deleted(&self, ordinal: u32) -> bool;

    /// Fetches a single field of a document rendered as text, without materializing the
    /// rest of the document. Returns `None` when the field is absent or empty.
    fn fetch_field(&self, ordinal: u32, field: &str) -> Result<Option<String>>;

    /// Fetches the full stored document.
    fn document(&self, ordinal: u32) -> Result<Document>;

    /// Ordinals of live documents, in ascending order.
    fn live_ordinals(&self) -> Occurrences<'_> {
        Box::new((0..self.max_doc()).filter(move |&ordinal| !self.is_deleted(ordinal)))
    }

    /// Ordinals of live documents whose `field` renders to exactly `term`.
    fn postings<'a>(&'a self, field: &'a str, term: &'a str) -> Postings<'a>;
}

//! Document corpus storage: a directory of JSON-lines segments described by a manifest.
//!
//! - [`reader::CorpusReader`]: the read interface consumed by the splitter (ordinal
//!   addressing, deletions, narrow field fetches, occurrence streams).
//! - [`corpus::Corpus`] / [`segment::JsonlSegment`]: the on-disk reader.
//! - [`writer::CorpusWriter`]: creates a corpus, consumes readers and commits durably.

pub mod corpus;
pub mod document;
pub mod io;
pub mod manifest;
pub mod reader;
pub mod segment;
pub mod writer;

pub use corpus::Corpus;
pub use document::Document;
pub use reader::CorpusReader;
pub use writer::CorpusWriter;

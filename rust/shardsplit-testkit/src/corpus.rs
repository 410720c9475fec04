//! Building small corpora for tests.

use std::path::Path;

use shardsplit_bit_array::BitArray;
use shardsplit_corpus::{Corpus, CorpusReader, CorpusWriter, Document, segment::JsonlSegment};

/// Documents of one segment plus the segment-local ordinals to delete.
#[derive(Debug, Clone, Default)]
pub struct SegmentFixture {
    pub docs: Vec<Document>,
    pub deleted: Vec<u32>,
}

impl SegmentFixture {
    /// One document per id, each carrying `field = id` and a `seq` number.
    pub fn with_ids(field: &str, ids: &[&str]) -> SegmentFixture {
        SegmentFixture {
            docs: ids
                .iter()
                .enumerate()
                .map(|(seq, id)| id_doc(field, id, seq))
                .collect(),
            deleted: Vec::new(),
        }
    }

    pub fn deleting(mut self, ordinals: &[u32]) -> SegmentFixture {
        self.deleted.extend_from_slice(ordinals);
        self
    }

    pub fn push(&mut self, doc: Document) {
        self.docs.push(doc);
    }
}

pub fn id_doc(field: &str, id: &str, seq: usize) -> Document {
    Document::new()
        .with_field(field, id)
        .with_field("seq", seq as u64)
}

/// Builds an in-memory segment with one document per id.
///
/// # Panics
///
/// On out-of-range deleted ordinals.
pub fn segment_with_ids(field: &str, ids: &[&str], deleted: &[u32]) -> JsonlSegment {
    let fixture = SegmentFixture::with_ids(field, ids).deleting(deleted);
    memory_segment("seg-test", &fixture)
}

pub fn memory_segment(name: &str, fixture: &SegmentFixture) -> JsonlSegment {
    let text = fixture
        .docs
        .iter()
        .map(|doc| serde_json::to_string(doc).expect("serialize") + "\n")
        .collect::<String>();
    let max_doc = fixture.docs.len();
    let deletions = (!fixture.deleted.is_empty()).then(|| {
        BitArray::from_positions(fixture.deleted.iter().map(|&o| o as usize), max_doc)
    });
    JsonlSegment::from_parts(name.to_string(), text, max_doc as u32, deletions)
        .expect("well-formed segment")
}

/// Writes a corpus with one segment per fixture into `path` and opens it.
pub fn write_corpus(path: &Path, segments: &[SegmentFixture]) -> anyhow::Result<Corpus> {
    let mut writer = CorpusWriter::create(path)?;
    for fixture in segments {
        for doc in &fixture.docs {
            writer.append_document(doc)?;
        }
        let base = writer.max_doc() - fixture.docs.len() as u64;
        for &local in &fixture.deleted {
            writer.delete_document((base + local as u64) as u32)?;
        }
        writer.flush_segment()?;
    }
    writer.commit()?;
    Ok(Corpus::open(path)?)
}

/// Writes a single-segment corpus of `ids` into `path`.
pub fn write_id_corpus(
    path: &Path,
    field: &str,
    ids: &[&str],
    deleted: &[u32],
) -> anyhow::Result<Corpus> {
    write_corpus(path, &[SegmentFixture::with_ids(field, ids).deleting(deleted)])
}

/// The values of `field` over the live documents of the corpus at `path`, in order.
///
/// Fails if a live document lacks the field.
pub fn read_ids(path: &Path, field: &str) -> anyhow::Result<Vec<String>> {
    let corpus = Corpus::open(path)?;
    corpus
        .field_values(field)?
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            value.ok_or_else(|| anyhow::anyhow!("{}: document {i} has no {field}", path.display()))
        })
        .collect()
}

/// All live documents of the corpus at `path`, in order.
pub fn read_documents(path: &Path) -> anyhow::Result<Vec<Document>> {
    let corpus = Corpus::open(path)?;
    let mut docs = Vec::new();
    for segment in corpus.segments() {
        for ordinal in segment.live_ordinals() {
            docs.push(segment.document(ordinal)?);
        }
    }
    Ok(docs)
}

//! Synthetic documents for testing.
//!
//! Generation is seeded, so a given seed always produces the same corpus.

use std::path::Path;

use shardsplit_corpus::{Corpus, Document};

use crate::corpus::{SegmentFixture, write_corpus};

const WORDS: &[&str] = &[
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india",
    "juliett", "kilo", "lima", "mike", "november", "oscar", "papa",
];

/// Produces documents with a unique `id` field and a few random payload fields.
pub struct DocGenerator {
    rng: fastrand::Rng,
    id_field: String,
    next_id: u64,
}

impl DocGenerator {
    pub fn new(seed: u64) -> DocGenerator {
        Self::with_id_field(seed, "id")
    }

    pub fn with_id_field(seed: u64, id_field: &str) -> DocGenerator {
        DocGenerator {
            rng: fastrand::Rng::with_seed(seed),
            id_field: id_field.to_string(),
            next_id: 0,
        }
    }

    pub fn document(&mut self) -> Document {
        let id = format!("doc-{}", self.next_id);
        self.next_id += 1;
        let words = (0..self.rng.usize(1..6))
            .map(|_| WORDS[self.rng.usize(..WORDS.len())])
            .collect::<Vec<_>>()
            .join(" ");
        Document::new()
            .with_field(self.id_field.as_str(), id)
            .with_field("title", words)
            .with_field("tag", WORDS[self.rng.usize(..4)])
            .with_field("rank", self.rng.u32(..1000))
            .with_field("flag", self.rng.bool())
    }

    /// Generates `count` documents, deleting each one with probability `delete_ratio`.
    pub fn segment(&mut self, count: usize, delete_ratio: f64) -> SegmentFixture {
        let mut fixture = SegmentFixture::default();
        for ordinal in 0..count {
            fixture.push(self.document());
            if self.rng.f64() < delete_ratio {
                fixture.deleted.push(ordinal as u32);
            }
        }
        fixture
    }

    /// Generates segment fixtures with the given sizes.
    pub fn segments(&mut self, sizes: &[usize], delete_ratio: f64) -> Vec<SegmentFixture> {
        sizes
            .iter()
            .map(|&count| self.segment(count, delete_ratio))
            .collect()
    }
}

/// Writes a generated corpus with the given segment sizes into `path`.
pub fn generate_corpus(
    path: &Path,
    seed: u64,
    sizes: &[usize],
    delete_ratio: f64,
) -> anyhow::Result<Corpus> {
    let segments = DocGenerator::new(seed).segments(sizes, delete_ratio);
    write_corpus(path, &segments)
}

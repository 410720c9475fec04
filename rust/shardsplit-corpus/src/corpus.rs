//! Opening a corpus directory.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use shardsplit_common::Result;

use crate::{
    manifest::CorpusManifest,
    reader::CorpusReader,
    segment::JsonlSegment,
};

/// An opened corpus: the segments listed by its manifest, in manifest order.
pub struct Corpus {
    path: PathBuf,
    segments: Vec<Arc<JsonlSegment>>,
}

impl Corpus {
    /// Returns `true` if `path` is a directory holding a corpus manifest.
    pub fn exists(path: &Path) -> bool {
        path.is_dir() && CorpusManifest::path(path).is_file()
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Corpus> {
        let path = path.as_ref().to_path_buf();
        let manifest = CorpusManifest::load(&path)?;
        let segments = manifest
            .segments
            .iter()
            .map(|entry| JsonlSegment::open(&path, entry).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        log::debug!(
            "opened corpus {} with {} segment(s)",
            path.display(),
            segments.len()
        );
        Ok(Corpus { path, segments })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn segments(&self) -> &[Arc<JsonlSegment>] {
        &self.segments
    }

    /// The segments as type-erased readers, for composing into a larger view.
    pub fn leaves(&self) -> impl Iterator<Item = Arc<dyn CorpusReader>> + '_ {
        self.segments
            .iter()
            .map(|segment| segment.clone() as Arc<dyn CorpusReader>)
    }

    pub fn max_doc(&self) -> u64 {
        self.segments.iter().map(|s| s.max_doc() as u64).sum()
    }

    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.num_docs() as u64).sum()
    }

    /// Collects the text of `field` over all live documents, in ordinal order.
    pub fn field_values(&self, field: &str) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(self.num_docs() as usize);
        for segment in &self.segments {
            for ordinal in segment.live_ordinals() {
                values.push(segment.fetch_field(ordinal, field)?);
            }
        }
        Ok(values)
    }
}

impl std::fmt::Debug for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corpus")
            .field("path", &self.path)
            .field("segments", &self.segments.len())
            .finish()
    }
}

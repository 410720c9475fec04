//! Corpus manifest: the list of segments making up a corpus directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shardsplit_common::{Result, error::Error, verify_data};

use crate::io::write_file_atomic;

/// File name of the manifest within a corpus directory.
pub const MANIFEST_FILE: &str = "corpus.json";

/// Extension of segment document files.
pub const DOCS_EXTENSION: &str = "jsonl";

/// Extension of segment deletion bitmaps.
pub const DELETIONS_EXTENSION: &str = "del";

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusManifest {
    pub format_version: u32,
    pub segments: Vec<SegmentEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    /// Segment base name; files are `<name>.jsonl` and, with deletions, `<name>.del`.
    pub name: String,
    pub max_doc: u32,
    #[serde(default)]
    pub has_deletions: bool,
}

impl SegmentEntry {
    pub fn docs_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.{DOCS_EXTENSION}", self.name))
    }

    pub fn deletions_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.{DELETIONS_EXTENSION}", self.name))
    }
}

impl CorpusManifest {
    pub fn new(segments: Vec<SegmentEntry>) -> CorpusManifest {
        CorpusManifest {
            format_version: FORMAT_VERSION,
            segments,
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    pub fn load(dir: &Path) -> Result<CorpusManifest> {
        let path = Self::path(dir);
        let content = std::fs::read(&path)
            .map_err(|e| Error::io(format!("read manifest {}", path.display()), e))?;
        let manifest: CorpusManifest = serde_json::from_slice(&content)
            .map_err(|e| Error::json(path.display().to_string(), e))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Writes the manifest through a temporary file and renames it into place, so a
    /// reader never observes a partially written manifest.
    pub fn store(&self, dir: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::json(MANIFEST_FILE, e))?;
        write_file_atomic(&Self::path(dir), &content)
    }

    pub fn max_doc(&self) -> u64 {
        self.segments.iter().map(|s| s.max_doc as u64).sum()
    }

    fn validate(&self) -> Result<()> {
        verify_data!(format_version, self.format_version == FORMAT_VERSION);
        verify_data!(
            max_doc,
            self.segments.iter().map(|s| s.max_doc as u64).sum::<u64>() <= u32::MAX as u64
        );
        for (i, segment) in self.segments.iter().enumerate() {
            verify_data!(segment_name, !segment.name.is_empty());
            verify_data!(
                segment_name,
                !segment.name.contains(['/', '\\']) && segment.name != ".."
            );
            verify_data!(
                segment_name,
                self.segments[..i].iter().all(|s| s.name != segment.name)
            );
        }
        Ok(())
    }
}

//! Creating a corpus directory.

use std::path::{Path, PathBuf};

use shardsplit_bit_array::BitArray;
use shardsplit_common::{Result, error::Error, verify_arg};

use crate::{
    document::Document,
    io::{FileWriter, SealingWrite},
    manifest::{CorpusManifest, DELETIONS_EXTENSION, DOCS_EXTENSION, MANIFEST_FILE, SegmentEntry},
    reader::CorpusReader,
};

/// Writes a new corpus into a directory.
///
/// Documents are appended to an open segment, which is sealed by `flush_segment` or
/// `commit`. The corpus becomes visible to [`Corpus::open`](crate::Corpus::open) only
/// once `commit` has written the manifest.
pub struct CorpusWriter {
    path: PathBuf,
    segments: Vec<SegmentEntry>,
    pending: Option<PendingSegment>,
    deleted: u64,
    committed: bool,
}

struct PendingSegment {
    entry: SegmentEntry,
    writer: FileWriter,
    deleted: Vec<u32>,
    buf: Vec<u8>,
}

/// Outcome of a successful [`CorpusWriter::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitStats {
    pub segments: usize,
    pub max_doc: u64,
    pub num_docs: u64,
}

impl CorpusWriter {
    /// Creates the corpus directory, replacing any corpus previously stored there.
    ///
    /// Only files belonging to a corpus (manifest and segment files) are removed; other
    /// content of the directory is left alone.
    pub fn create(path: impl AsRef<Path>) -> Result<CorpusWriter> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)
            .map_err(|e| Error::io(format!("create directory {}", path.display()), e))?;
        remove_corpus_files(&path)?;
        Ok(CorpusWriter {
            path,
            segments: Vec::new(),
            pending: None,
            deleted: 0,
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of document slots written so far, across sealed and open segments.
    pub fn max_doc(&self) -> u64 {
        self.base() + self.pending_max_doc()
    }

    /// Appends a document and returns its corpus-wide ordinal.
    pub fn append_document(&mut self, doc: &Document) -> Result<u32> {
        self.ensure_open()?;
        let base = self.base();
        verify_arg!(max_doc, self.max_doc() < u32::MAX as u64);
        let pending = self.pending_segment()?;

        pending.buf.clear();
        serde_json::to_writer(&mut pending.buf, doc)
            .map_err(|e| Error::json("serialize document", e))?;
        pending.buf.push(b'\n');
        pending
            .writer
            .write_all(&pending.buf)
            .map_err(|e| Error::io(format!("write {}", pending.writer.path().display()), e))?;

        let ordinal = pending.entry.max_doc;
        pending.entry.max_doc += 1;
        Ok((base + ordinal as u64) as u32)
    }

    /// Marks a document of the open segment as deleted.
    ///
    /// Deletion applies to the segment being written; documents of already sealed
    /// segments cannot be deleted.
    pub fn delete_document(&mut self, ordinal: u32) -> Result<()> {
        self.ensure_open()?;
        let base = self.base();
        let pending = self.pending.as_mut().ok_or_else(|| {
            Error::invalid_arg("ordinal", format!("{ordinal}: no open segment"))
        })?;
        let local = (ordinal as u64).checked_sub(base).filter(|&local| {
            local < pending.entry.max_doc as u64
        });
        let Some(local) = local else {
            return Err(Error::invalid_arg(
                "ordinal",
                format!("{ordinal} is not in the open segment"),
            ));
        };
        pending.deleted.push(local as u32);
        Ok(())
    }

    /// Appends every live document of `source`, in ordinal order, and returns the number
    /// of documents written.
    ///
    /// The source's live-ordinal stream decides which documents exist, so a reader that
    /// filters documents virtually is copied with its filtering applied.
    pub fn append_all(&mut self, source: &dyn CorpusReader) -> Result<u64> {
        self.ensure_open()?;
        let mut count = 0u64;
        for ordinal in source.live_ordinals() {
            let doc = source.document(ordinal)?;
            self.append_document(&doc)?;
            count += 1;
        }
        Ok(count)
    }

    /// Seals the open segment, if any. Subsequent documents start a new segment.
    pub fn flush_segment(&mut self) -> Result<()> {
        self.ensure_open()?;
        let Some(mut pending) = self.pending.take() else {
            return Ok(());
        };
        pending
            .writer
            .seal()
            .map_err(|e| Error::io(format!("seal {}", pending.writer.path().display()), e))?;

        if !pending.deleted.is_empty() {
            let bits = BitArray::from_positions(
                pending.deleted.iter().map(|&o| o as usize),
                pending.entry.max_doc as usize,
            );
            let del_path = pending.entry.deletions_path(&self.path);
            let mut writer = FileWriter::create(&del_path)
                .map_err(|e| Error::io(format!("create {}", del_path.display()), e))?;
            writer
                .write_all(&bits.to_lsb_bytes())
                .and_then(|_| writer.seal())
                .map_err(|e| Error::io(format!("write {}", del_path.display()), e))?;
            pending.entry.has_deletions = true;
            self.deleted += bits.count_ones() as u64;
        }

        log::debug!(
            "sealed segment {} of {} ({} documents, {} deleted)",
            pending.entry.name,
            self.path.display(),
            pending.entry.max_doc,
            pending.deleted.len()
        );
        self.segments.push(pending.entry);
        Ok(())
    }

    /// Seals the open segment and durably writes the manifest.
    ///
    /// The writer cannot be used after a successful commit.
    pub fn commit(&mut self) -> Result<CommitStats> {
        self.flush_segment()?;
        let manifest = CorpusManifest::new(std::mem::take(&mut self.segments));
        manifest.store(&self.path)?;
        self.committed = true;

        let stats = CommitStats {
            segments: manifest.segments.len(),
            max_doc: manifest.max_doc(),
            num_docs: manifest.max_doc() - self.deleted,
        };
        log::debug!("committed corpus {}: {stats:?}", self.path.display());
        Ok(stats)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.committed {
            return Err(Error::invalid_operation(format!(
                "write to committed corpus {}",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn base(&self) -> u64 {
        self.segments.iter().map(|s| s.max_doc as u64).sum()
    }

    fn pending_max_doc(&self) -> u64 {
        self.pending.as_ref().map_or(0, |p| p.entry.max_doc as u64)
    }

    fn pending_segment(&mut self) -> Result<&mut PendingSegment> {
        if self.pending.is_none() {
            let entry = SegmentEntry {
                name: format!("seg-{}", self.segments.len()),
                max_doc: 0,
                has_deletions: false,
            };
            let docs_path = entry.docs_path(&self.path);
            let writer = FileWriter::create(&docs_path)
                .map_err(|e| Error::io(format!("create {}", docs_path.display()), e))?;
            self.pending = Some(PendingSegment {
                entry,
                writer,
                deleted: Vec::new(),
                buf: Vec::new(),
            });
        }
        self.pending
            .as_mut()
            .ok_or_else(|| Error::invalid_operation("open segment"))
    }
}

/// Removes the manifest and segment files of a previous corpus stored in `dir`.
fn remove_corpus_files(dir: &Path) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::io(format!("list directory {}", dir.display()), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(format!("list directory {}", dir.display()), e))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let is_segment_file = name.starts_with("seg-")
            && (name.ends_with(&format!(".{DOCS_EXTENSION}"))
                || name.ends_with(&format!(".{DELETIONS_EXTENSION}")));
        if name == MANIFEST_FILE || is_segment_file {
            let path = entry.path();
            log::debug!("removing previous corpus file {}", path.display());
            std::fs::remove_file(&path)
                .map_err(|e| Error::io(format!("remove {}", path.display()), e))?;
        }
    }
    Ok(())
}

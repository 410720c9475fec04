//! The split protocol: validate, hash once, then one filtering pass per shard.
//!
//! ```text
//! Validating -> HashingPass -> ShardPass(0) .. ShardPass(N-1) -> Done
//! ```
//!
//! Every failure aborts the run. Destinations already committed by earlier shard passes
//! are left in place.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::prelude::*;
use shardsplit_common::{Result, error::Error, verify_arg, verify_data};
use shardsplit_corpus::{CorpusReader, CorpusWriter};

use crate::{
    assign::ShardAssigner,
    progress::{NoProgress, PercentTracker, Phase, ProgressReporter},
    view::CorpusView,
};

pub const DEFAULT_ID_FIELD: &str = "id";

/// How shard passes are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassMode {
    /// One pass at a time over a single shared overlay.
    #[default]
    Sequential,
    /// All passes concurrently, each over a private overlay built from a shared snapshot
    /// of the original deletions. `threads: None` uses the rayon default.
    Parallel { threads: Option<usize> },
}

/// Parameters of a split run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitParams {
    /// Field holding each document's unique identifier.
    pub id_field: String,
    pub mode: PassMode,
}

impl Default for SplitParams {
    fn default() -> Self {
        SplitParams {
            id_field: DEFAULT_ID_FIELD.to_string(),
            mode: PassMode::default(),
        }
    }
}

/// The shard of every ordinal, computed once by the hashing pass.
#[derive(Debug, Clone)]
pub struct ShardAssignments {
    shards: Vec<u32>,
    counts: Vec<u64>,
}

impl ShardAssignments {
    /// Marks ordinals that were already deleted in the source and never hashed.
    pub const UNASSIGNED: u32 = u32::MAX;

    pub fn num_shards(&self) -> u32 {
        self.counts.len() as u32
    }

    pub fn max_doc(&self) -> u32 {
        self.shards.len() as u32
    }

    pub fn shard_of(&self, ordinal: u32) -> Option<u32> {
        self.shards
            .get(ordinal as usize)
            .copied()
            .filter(|&shard| shard != Self::UNASSIGNED)
    }

    /// Number of documents assigned to `shard`.
    pub fn count(&self, shard: u32) -> u64 {
        self.counts[shard as usize]
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// One committed output shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardOutcome {
    pub shard: u32,
    pub path: PathBuf,
    pub documents: u64,
}

/// Result of a completed split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    /// Addressable ordinals of the input, deleted slots included.
    pub source_max_doc: u32,
    /// Live documents of the input.
    pub source_docs: u64,
    /// Outcomes in shard order.
    pub shards: Vec<ShardOutcome>,
}

impl SplitSummary {
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub fn total_documents(&self) -> u64 {
        self.shards.iter().map(|s| s.documents).sum()
    }
}

/// `out_dir/part-0 .. out_dir/part-{num_shards - 1}`.
pub fn shard_output_paths(out_dir: &Path, num_shards: u32) -> Vec<PathBuf> {
    (0..num_shards)
        .map(|shard| out_dir.join(format!("part-{shard}")))
        .collect()
}

/// Runs the split protocol over a set of input segments.
pub struct PartitionDriver<'a> {
    params: SplitParams,
    progress: &'a dyn ProgressReporter,
}

impl PartitionDriver<'static> {
    pub fn new(params: SplitParams) -> Self {
        PartitionDriver {
            params,
            progress: &NoProgress,
        }
    }
}

impl<'a> PartitionDriver<'a> {
    pub fn with_progress<'b>(self, progress: &'b dyn ProgressReporter) -> PartitionDriver<'b> {
        PartitionDriver {
            params: self.params,
            progress,
        }
    }

    pub fn params(&self) -> &SplitParams {
        &self.params
    }

    /// Splits the documents of `segments`, taken in order as one corpus, into
    /// `outputs.len()` shards; shard `k` is written to `outputs[k]`.
    ///
    /// The segments are only read. Nothing is created before validation and the hashing
    /// pass have succeeded.
    pub fn split(
        &self,
        segments: Vec<Arc<dyn CorpusReader>>,
        outputs: &[PathBuf],
    ) -> Result<SplitSummary> {
        // Validating
        if outputs.len() < 2 {
            return Err(Error::precondition(format!(
                "at least 2 output destinations are required, got {}",
                outputs.len()
            )));
        }
        verify_arg!(id_field, !self.params.id_field.is_empty());
        let num_shards = u32::try_from(outputs.len())
            .map_err(|_| Error::invalid_arg("outputs", "too many output destinations"))?;
        let assigner = ShardAssigner::new(num_shards)?;

        let source_docs = segments.iter().map(|s| s.num_docs() as u64).sum::<u64>();
        if source_docs < 2 {
            return Err(Error::precondition(format!(
                "the input must contain at least 2 live documents, found {source_docs}"
            )));
        }

        let mut view = CorpusView::new(segments)?;
        log::info!(
            "Splitting {source_docs} document(s) from {} segment(s) into {num_shards} shards",
            view.segment_count()
        );

        let assignments = self.hash_pass(&view, &assigner)?;
        verify_data!(assigned_documents, assignments.total() == source_docs);
        for (shard, count) in assignments.counts().iter().enumerate() {
            log::debug!("shard {shard}: {count} document(s) assigned");
        }

        let shards = match self.params.mode {
            PassMode::Sequential => self.sequential_passes(&mut view, &assignments, outputs)?,
            PassMode::Parallel { threads } => {
                self.parallel_passes(&view, &assignments, outputs, threads)?
            }
        };

        log::info!("Done.");
        Ok(SplitSummary {
            source_max_doc: view.max_doc(),
            source_docs,
            shards,
        })
    }

    /// Computes the shard of every live ordinal, fetching only the id field.
    ///
    /// Runs before any shard exclusion is marked, so the table depends on the source
    /// deletions alone.
    fn hash_pass(&self, view: &CorpusView, assigner: &ShardAssigner) -> Result<ShardAssignments> {
        let phase = Phase::Hashing;
        let id_field = self.params.id_field.as_str();
        let max_doc = view.max_doc();
        let mut shards = vec![ShardAssignments::UNASSIGNED; max_doc as usize];
        let mut counts = vec![0u64; assigner.num_shards() as usize];

        self.progress.start(phase);
        let mut tracker = PercentTracker::new(max_doc as u64);
        for ordinal in 0..max_doc {
            if view.is_present(ordinal) {
                let id = view
                    .fetch_field(ordinal, id_field)?
                    .ok_or_else(|| Error::missing_id_field(id_field, ordinal))?;
                let shard = assigner.assign(&id)?;
                shards[ordinal as usize] = shard;
                counts[shard as usize] += 1;
            }
            if let Some(percent) = tracker.advance() {
                self.progress.update(phase, percent);
            }
        }
        self.progress.finish(phase);
        log::info!("Generated hashes for {max_doc} ordinal(s)");

        Ok(ShardAssignments { shards, counts })
    }

    fn sequential_passes(
        &self,
        view: &mut CorpusView,
        assignments: &ShardAssignments,
        outputs: &[PathBuf],
    ) -> Result<Vec<ShardOutcome>> {
        let num_shards = assignments.num_shards();
        let mut outcomes = Vec::with_capacity(outputs.len());
        for shard in 0..num_shards {
            let phase = Phase::Shard { shard, num_shards };
            self.progress.start(phase);
            select_shard(view, assignments, shard, |percent| {
                self.progress.update(phase, percent)
            });
            self.progress.finish(phase);
            outcomes.push(write_shard(view, shard, &outputs[shard as usize])?);
        }
        Ok(outcomes)
    }

    fn parallel_passes(
        &self,
        view: &CorpusView,
        assignments: &ShardAssignments,
        outputs: &[PathBuf],
        threads: Option<usize>,
    ) -> Result<Vec<ShardOutcome>> {
        let num_shards = assignments.num_shards();
        let snapshot = view.snapshot();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .thread_name(|i| format!("shardsplit_{i}"))
            .build()
            .map_err(|e| Error::other("build shard thread pool", e))?;
        log::debug!(
            "running {num_shards} shard passes on {} thread(s)",
            pool.current_num_threads()
        );

        pool.install(|| {
            (0..num_shards)
                .into_par_iter()
                .map(|shard| {
                    let phase = Phase::Shard { shard, num_shards };
                    let mut view = snapshot.view()?;
                    self.progress.start(phase);
                    select_shard(&mut view, assignments, shard, |_| ());
                    self.progress.finish(phase);
                    write_shard(&view, shard, &outputs[shard as usize])
                })
                .collect::<Result<Vec<_>>>()
        })
    }
}

/// Resets `view` and marks absent every ordinal not assigned to `shard`.
fn select_shard(
    view: &mut CorpusView,
    assignments: &ShardAssignments,
    shard: u32,
    mut on_progress: impl FnMut(u8),
) {
    view.reset_to_original();
    let mut tracker = PercentTracker::new(assignments.max_doc() as u64);
    for (ordinal, &assigned) in assignments.shards.iter().enumerate() {
        if assigned != shard {
            view.mark_absent(ordinal as u32);
        }
        if let Some(percent) = tracker.advance() {
            on_progress(percent);
        }
    }
    debug_assert_eq!(view.present_count() as u64, assignments.count(shard));
}

/// Writes the present documents of `view` to a fresh corpus at `path` and commits it.
fn write_shard(view: &CorpusView, shard: u32, path: &Path) -> Result<ShardOutcome> {
    let documents = view.present_count() as u64;
    log::info!("Writing {documents} document(s) to shard {shard}");

    let mut writer = CorpusWriter::create(path)?;
    let written = writer.append_all(view)?;
    verify_data!(written_documents, written == documents);
    writer.commit()?;

    log::info!("Wrote shard {shard} to {}", path.display());
    Ok(ShardOutcome {
        shard,
        path: path.to_path_buf(),
        documents,
    })
}

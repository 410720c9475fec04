//! Hash-based corpus splitting.
//!
//! A corpus is split into N shards by assigning every document to
//! `md5(id) mod N` ([`assign`]). The split never copies or mutates the input: each
//! segment is wrapped in a [`overlay::DeletionOverlay`] and the composed
//! [`view::CorpusView`] is filtered down to one shard at a time before being handed to
//! the output writer ([`driver::PartitionDriver`]).

pub mod assign;
pub mod driver;
pub mod overlay;
pub mod progress;
pub mod view;

#[cfg(test)]
mod tests;

pub use assign::{ShardAssigner, shard_for_id};
pub use driver::{
    DEFAULT_ID_FIELD, PartitionDriver, PassMode, ShardOutcome, SplitParams, SplitSummary,
    shard_output_paths,
};
pub use progress::{ConsoleProgressBar, NoProgress, Phase, ProgressReporter};
pub use view::CorpusView;

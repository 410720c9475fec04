//! Split command implementation

use std::{io::IsTerminal, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use shardsplit_common::error::Error;
use shardsplit::{
    ConsoleProgressBar, DEFAULT_ID_FIELD, NoProgress, PartitionDriver, PassMode,
    ProgressReporter, SplitParams, SplitSummary, shard_output_paths,
};

use crate::utils::open_input_corpora;

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    /// Output directory; shards are written to `<out>/part-<k>`
    #[arg(long)]
    pub out: PathBuf,

    /// Number of shards to produce (at least 2)
    #[arg(long)]
    pub num: u32,

    /// Field holding the unique document id
    #[arg(long, default_value = DEFAULT_ID_FIELD)]
    pub id_field: String,

    /// Write all shards concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Worker threads for --parallel (defaults to the number of CPUs)
    #[arg(long, requires = "parallel")]
    pub threads: Option<usize>,

    /// Do not draw progress bars
    #[arg(short, long)]
    pub quiet: bool,

    /// Input corpus directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

impl SplitArgs {
    fn params(&self) -> SplitParams {
        SplitParams {
            id_field: self.id_field.clone(),
            mode: if self.parallel {
                PassMode::Parallel {
                    threads: self.threads,
                }
            } else {
                PassMode::Sequential
            },
        }
    }
}

pub fn run(args: SplitArgs) -> Result<SplitSummary> {
    if args.num < 2 {
        return Err(Error::invalid_arg("--num", format!("must be at least 2, got {}", args.num)).into());
    }
    if args.id_field.is_empty() {
        return Err(Error::invalid_arg("--id-field", "must not be empty").into());
    }
    if args.threads == Some(0) {
        return Err(Error::invalid_arg("--threads", "must be positive").into());
    }

    let corpora = open_input_corpora(&args.inputs)?;
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory {}", args.out.display()))?;

    let progress: Box<dyn ProgressReporter> = if args.quiet || !std::io::stderr().is_terminal() {
        Box::new(NoProgress)
    } else {
        Box::new(ConsoleProgressBar::stderr())
    };

    let segments = corpora.iter().flat_map(|c| c.leaves()).collect();
    let outputs = shard_output_paths(&args.out, args.num);
    PartitionDriver::new(args.params())
        .with_progress(progress.as_ref())
        .split(segments, &outputs)
        .with_context(|| format!("Failed to split into {}", args.out.display()))
}

pub fn print_summary(summary: &SplitSummary) {
    println!(
        "Split {} document(s) into {} shard(s):",
        summary.source_docs,
        summary.num_shards()
    );
    for shard in &summary.shards {
        println!(
            "  part-{}: {} document(s) -> {}",
            shard.shard,
            shard.documents,
            shard.path.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use clap::Parser;
    use shardsplit_testkit::corpus::{read_ids, write_id_corpus};

    use super::{SplitArgs, run};
    use crate::utils::exit_status;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SplitArgs,
    }

    fn args(out: &Path, num: u32, inputs: Vec<PathBuf>) -> SplitArgs {
        SplitArgs {
            out: out.to_path_buf(),
            num,
            id_field: "id".to_string(),
            parallel: false,
            threads: None,
            quiet: true,
            inputs,
        }
    }

    #[test]
    fn test_parse_defaults() {
        let cli = TestCli::parse_from(["split", "--out", "/tmp/out", "--num", "4", "a", "b"]);
        assert_eq!(cli.args.id_field, "id");
        assert!(!cli.args.parallel);
        assert_eq!(cli.args.inputs, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn test_parse_requires_inputs_and_out() {
        assert!(TestCli::try_parse_from(["split", "--out", "o", "--num", "2"]).is_err());
        assert!(TestCli::try_parse_from(["split", "--num", "2", "in"]).is_err());
        assert!(TestCli::try_parse_from(["split", "--out", "o", "in"]).is_err());
        assert!(
            TestCli::try_parse_from(["split", "--out", "o", "--num", "2", "--threads", "2", "in"])
                .is_err()
        );
    }

    #[test]
    fn test_split_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        write_id_corpus(&input, "id", &["doc-1", "doc-2", "doc-3", "doc-4"], &[]).unwrap();
        let out = dir.path().join("nested").join("out");

        let summary = run(args(&out, 2, vec![dir.path().join("missing"), input])).unwrap();
        assert_eq!(summary.total_documents(), 4);
        assert_eq!(read_ids(&out.join("part-0"), "id").unwrap(), vec!["doc-1"]);
        assert_eq!(
            read_ids(&out.join("part-1"), "id").unwrap(),
            vec!["doc-2", "doc-3", "doc-4"]
        );
    }

    #[test]
    fn test_parallel_flag() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        write_id_corpus(&input, "id", &["a", "b", "c", "d"], &[]).unwrap();
        let out = dir.path().join("out");
        let mut args = args(&out, 3, vec![input]);
        args.parallel = true;
        args.threads = Some(2);

        let summary = run(args).unwrap();
        let counts = summary.shards.iter().map(|s| s.documents).collect::<Vec<_>>();
        assert_eq!(counts, vec![1, 3, 0]);
    }

    #[test]
    fn test_bad_shard_count_fails_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        write_id_corpus(&input, "id", &["a", "b"], &[]).unwrap();
        let out = dir.path().join("out");

        let err = run(args(&out, 1, vec![input])).unwrap_err();
        assert_eq!(exit_status(&err), 2);
        assert!(!out.exists());
    }

    #[test]
    fn test_no_valid_inputs_fails_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = run(args(&out, 2, vec![dir.path().join("missing")])).unwrap_err();
        assert_eq!(exit_status(&err), 1);
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_id_field_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        write_id_corpus(&input, "key", &["a", "b"], &[]).unwrap();
        let out = dir.path().join("out");

        let err = run(args(&out, 2, vec![input])).unwrap_err();
        assert!(format!("{err:#}").contains("--id-field"));
        assert_eq!(exit_status(&err), 2);
        assert!(!out.join("part-0").exists());
    }
}

//! Common utilities for shardsplit-cmd

use std::path::{Path, PathBuf};

use anyhow::Result;
use shardsplit_common::error::Error;
use shardsplit_corpus::Corpus;

/// Process exit status for a failed command: 2 when the user's arguments or data
/// violate a requirement (bad shard count, missing id field), 1 for anything else.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(err) if err.is_configuration() => 2,
        _ => 1,
    }
}

/// Opens every usable input corpus.
///
/// Missing paths, non-directories and directories that do not hold a readable corpus
/// are skipped with a warning. Fails only when nothing usable remains.
pub fn open_input_corpora(inputs: &[PathBuf]) -> Result<Vec<Corpus>> {
    let mut corpora = Vec::with_capacity(inputs.len());
    for path in inputs {
        match open_input(path) {
            Ok(corpus) => corpora.push(corpus),
            Err(reason) => log::warn!("Invalid input corpus - skipping {}: {reason}", path.display()),
        }
    }
    if corpora.is_empty() {
        anyhow::bail!("No valid input corpora among {} path(s)", inputs.len());
    }
    Ok(corpora)
}

fn open_input(path: &Path) -> std::result::Result<Corpus, String> {
    if !path.exists() {
        return Err("path does not exist".into());
    }
    if !path.is_dir() {
        return Err("not a directory".into());
    }
    if !Corpus::exists(path) {
        return Err("no corpus manifest".into());
    }
    Corpus::open(path).map_err(|e| e.to_string())
}

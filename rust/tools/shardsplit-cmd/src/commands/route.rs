//! Route command implementation

use std::io::Write;

use anyhow::{Context, Result};
use shardsplit::ShardAssigner;

/// Writes `<id>\t<shard>` for every id.
pub fn run(num: u32, ids: &[String], out: &mut impl Write) -> Result<()> {
    let assigner = ShardAssigner::new(num).with_context(|| format!("Invalid shard count {num}"))?;
    for id in ids {
        let shard = assigner
            .assign(id)
            .with_context(|| format!("Cannot route id {id:?}"))?;
        writeln!(out, "{id}\t{shard}")?;
    }
    Ok(())
}

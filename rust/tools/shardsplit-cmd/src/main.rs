use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod utils;

#[derive(Parser)]
#[command(name = "shardsplit-cmd")]
#[command(about = "Splits document corpora into hash-partitioned shards")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split one or more input corpora into `--num` shards under `--out`
    Split(commands::split::SplitArgs),

    /// Print the shard each id is assigned to for a given shard count
    Route {
        /// Number of shards
        #[arg(long)]
        num: u32,

        /// Document ids to route
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(utils::exit_status(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Split(args) => {
            let summary = commands::split::run(args)?;
            commands::split::print_summary(&summary);
            Ok(())
        }
        Commands::Route { num, ids } => commands::route::run(num, &ids, &mut std::io::stdout()),
    }
}

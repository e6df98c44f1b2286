//! `memo`: inspect and maintain cache directories.
//!
//! Lists records with their version tags, prints the version of a single
//! record, and deletes one or all records. The cache directory comes from
//! `--dir` or from the `[cache]` table of `memo.toml`.

#![warn(missing_docs)]

mod inspect;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Inspect and maintain memo cache directories.
#[derive(Parser, Debug)]
#[command(name = "memo", version, about = "Memo cache maintenance")]
pub struct Cli {
    /// Cache directory; overrides `cache.dir` from `memo.toml`.
    #[arg(long, global = true)]
    pub dir: Option<String>,

    /// Directory containing `memo.toml` (default: current directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Record file extension.
    #[arg(long, global = true)]
    pub ext: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every record with its version tag.
    List {
        /// Print a JSON array instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Print the version tag of one record.
    Version {
        /// Record key.
        key: String,
    },
    /// Delete one record.
    Delete {
        /// Record key.
        key: String,
    },
    /// Delete every record.
    Clear,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,memo_cache=info,memo_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let mut out = std::io::stdout().lock();
    let result = inspect::open_store(&cli)
        .and_then(|store| inspect::run(&cli.command, &store, &mut out));

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

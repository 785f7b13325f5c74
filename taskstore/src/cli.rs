use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "taskstore", about = "Inspect a taskctl record store")]
pub struct Cli {
    /// Directory containing store.sqlite3 and the collection JSONL logs.
    #[arg(long, default_value = ".taskctl/store")]
    pub store_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print row counts per known collection.
    Stats,
    /// Print a scalar/counter key's value.
    Get { key: String },
}

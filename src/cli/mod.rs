pub mod common;
pub mod parser;
pub mod reader;

pub use common::*;
pub use parser::{parse_config, Settings};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reader::read_config;

#[derive(Parser)]
#[clap(about = "Mirror public forks into private organizations")]
pub struct Args {
    #[clap(short, long, parse(from_os_str))]
    pub config: std::path::PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[clap(short, long)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a private mirror of a fork.
    Create {
        #[clap(long)]
        org: String,
        #[clap(long)]
        fork_owner: String,
        #[clap(long)]
        fork_name: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        branch: String,
    },
    /// List mirrors tracking a fork.
    List {
        #[clap(long)]
        org: String,
        #[clap(long)]
        fork_name: String,
    },
    /// Rename a mirror.
    Edit {
        #[clap(long)]
        org: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        new_name: String,
    },
    /// Delete a mirror.
    Delete {
        #[clap(long)]
        org: String,
        #[clap(long)]
        owner: String,
        #[clap(long)]
        name: String,
    },
}

pub fn load_settings(path: &std::path::Path) -> Result<Settings> {
    let result = std::fs::read_to_string(path)
        .with_context(|| format!("could not read file `{:?}`", path))?;

    let content =
        read_config(&result).with_context(|| format!("could not parse config `{:?}`", path))?;
    let settings = parse_config(content)?;

    Ok(settings)
}

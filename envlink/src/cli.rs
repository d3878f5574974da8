// envlink/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use envlink_common::error::Result;
use envlink_common::Config;

pub mod link;
pub mod list;
pub mod post_extract;
pub mod rm_dup;
pub mod unlink;
pub mod verify;

use crate::cli::link::LinkArgs;
use crate::cli::list::List;
use crate::cli::post_extract::PostExtract;
use crate::cli::rm_dup::RmDup;
use crate::cli::unlink::Unlink;
use crate::cli::verify::Verify;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "envlink", bin_name = "envlink")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Root installation prefix (defaults to $ENVLINK_ROOT_PREFIX, then the
    /// directory above the one holding this executable)
    #[arg(long, global = true, value_name = "PATH")]
    pub root_prefix: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Link every declared environment from the package cache
    Link(LinkArgs),
    /// Activate a package extracted directly into an environment
    PostExtract(PostExtract),
    /// Remove duplicate dists from the root environment
    RmDup(RmDup),
    Unlink(Unlink),
    Verify(Verify),
    List(List),
}

impl Command {
    /// Runs the command. `Ok(false)` means it completed but found problems
    /// the exit status should report.
    pub fn run(&self, config: &Config) -> Result<bool> {
        match self {
            Self::Link(command) => command.run(config),
            Self::PostExtract(command) => command.run(config).map(|_| true),
            Self::RmDup(command) => command.run(config).map(|_| true),
            Self::Unlink(command) => command.run(config).map(|_| true),
            Self::Verify(command) => command.run(config),
            Self::List(command) => command.run(config).map(|_| true),
        }
    }
}

use clap::Args;
use colored::Colorize;
use envlink_common::config::Config;
use envlink_common::error::Result;
use envlink_core::remove_duplicates;

#[derive(Args, Debug)]
pub struct RmDup;

impl RmDup {
    pub fn run(&self, config: &Config) -> Result<()> {
        let removed = remove_duplicates(config)?;
        if removed.is_empty() {
            println!("No duplicates in {}", config.root_prefix().display());
        }
        for dist in removed {
            println!("{} {}", "removed".red(), dist);
        }
        Ok(())
    }
}

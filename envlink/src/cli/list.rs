use clap::Args;
use colored::Colorize;
use envlink_common::config::{Config, ROOT_ENV_NAME};
use envlink_common::error::Result;
use envlink_core::linked;
use serde_json::json;

#[derive(Args, Debug)]
pub struct List {
    #[arg(long, default_value = ROOT_ENV_NAME)]
    pub env: String,

    /// Print a JSON array of dists instead of a table
    #[arg(long)]
    pub json: bool,
}

impl List {
    pub fn run(&self, config: &Config) -> Result<()> {
        let prefix = config.prefix_env(&self.env);
        let dists = linked(&prefix)?;
        if self.json {
            let names: Vec<&str> = dists.iter().map(|d| d.as_str()).collect();
            println!("{}", serde_json::to_string_pretty(&json!(names))?);
            return Ok(());
        }
        if dists.is_empty() {
            println!("{}", format!("0 dists linked in {}", prefix.display()).yellow());
            return Ok(());
        }
        for dist in &dists {
            println!("{dist}");
        }
        println!("{}", format!("{} dists linked", dists.len()).bold());
        Ok(())
    }
}

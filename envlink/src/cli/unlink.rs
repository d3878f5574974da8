use clap::Args;
use colored::Colorize;
use envlink_common::config::{Config, ROOT_ENV_NAME};
use envlink_common::error::Result;
use envlink_common::model::Dist;
use envlink_core::unlink_dist;

#[derive(Args, Debug)]
pub struct Unlink {
    /// Dist to remove, e.g. numpy-1.12.1-py27_0
    pub dist: String,

    #[arg(long, default_value = ROOT_ENV_NAME)]
    pub env: String,

    #[arg(long)]
    pub skip_scripts: bool,
}

impl Unlink {
    pub fn run(&self, config: &Config) -> Result<()> {
        let config = config.clone().with_skip_scripts(self.skip_scripts);
        let prefix = config.prefix_env(&self.env);
        let dist = Dist::new(self.dist.as_str());
        let count = unlink_dist(&config, &prefix, &dist)?;
        println!(
            "{} {} ({} files removed)",
            "Unlinked".green().bold(),
            dist,
            count.removed
        );
        if count.failed > 0 {
            println!(
                "{} {} files could not be removed",
                "!".yellow().bold(),
                count.failed
            );
        }
        Ok(())
    }
}

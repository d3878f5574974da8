use clap::Args;
use colored::Colorize;
use envlink_common::config::{Config, ROOT_ENV_NAME};
use envlink_common::error::Result;
use envlink_core::post_extract;

#[derive(Args, Debug)]
pub struct PostExtract {
    /// Environment the package was extracted into
    #[arg(long, default_value = ROOT_ENV_NAME)]
    pub env: String,

    /// Run the pre-unlink script first (reinstall over an existing copy)
    #[arg(long)]
    pub force: bool,

    #[arg(long)]
    pub skip_scripts: bool,
}

impl PostExtract {
    pub fn run(&self, config: &Config) -> Result<()> {
        let config = config
            .clone()
            .with_force(config.force || self.force)
            .with_skip_scripts(self.skip_scripts);
        let dist = post_extract(&config, &self.env)?;
        println!("{} {} activated in {}", "✓".green(), dist, self.env);
        Ok(())
    }
}

use clap::Args;
use colored::Colorize;
use envlink_common::config::{Config, ROOT_ENV_NAME};
use envlink_common::error::Result;
use envlink_common::model::Dist;
use envlink_core::verify_dist;

#[derive(Args, Debug)]
pub struct Verify {
    pub dist: String,

    #[arg(long, default_value = ROOT_ENV_NAME)]
    pub env: String,
}

impl Verify {
    /// Returns `false` when any recorded file is missing.
    pub fn run(&self, config: &Config) -> Result<bool> {
        let prefix = config.prefix_env(&self.env);
        let dist = Dist::new(self.dist.as_str());
        let report = verify_dist(&prefix, &dist)?;
        for f in &report.missing {
            println!("{} {}", "missing".red(), prefix.join(f).display());
        }
        if report.is_ok() {
            println!("{} {} ({} files)", "✓".green(), dist, report.checked);
        } else {
            println!(
                "{} {}: {} of {} files missing",
                "✖".red().bold(),
                dist,
                report.missing.len(),
                report.checked
            );
        }
        Ok(report.is_ok())
    }
}

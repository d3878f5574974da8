use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use envlink_common::config::Config;
use envlink_common::error::Result;
use envlink_common::model::{DistIndex, EnvSpec};
use envlink_core::{link_envs, warn_on_special_chars};
use tracing::debug;

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Dist index JSON (defaults to <pkgs>/dists.json)
    #[arg(long, value_name = "FILE")]
    pub index: Option<PathBuf>,

    /// Environment declarations JSON (defaults to <pkgs>/envs.json)
    #[arg(long, value_name = "FILE")]
    pub envs: Option<PathBuf>,

    /// Replace files that already exist in a prefix
    #[arg(long)]
    pub force: bool,
}

impl LinkArgs {
    /// Returns `false` when some files could not be linked.
    pub fn run(&self, config: &Config) -> Result<bool> {
        let config = config.clone().with_force(config.force || self.force);
        let index_path = self
            .index
            .clone()
            .unwrap_or_else(|| config.dist_index_path());
        let envs_path = self.envs.clone().unwrap_or_else(|| config.env_spec_path());

        let index = DistIndex::load(&index_path)?;
        let envs = EnvSpec::load(&envs_path)?;
        debug!(
            "Provisioning {} from {} and {}",
            config.root_prefix().display(),
            index_path.display(),
            envs_path.display()
        );

        let report = link_envs(&config, &index, &envs)?;
        let mut degraded = 0;
        for (env_name, dist, link_report) in &report.linked {
            if link_report.is_degraded() {
                degraded += 1;
                println!(
                    "{} {} in {}: {} of {} files not linked",
                    "!".yellow().bold(),
                    dist,
                    env_name,
                    link_report.failed.len(),
                    link_report.files
                );
            }
        }
        for (env_name, dist) in &report.unlinked {
            println!("{} {} in {} (superseded)", "-".red(), dist, env_name);
        }
        println!(
            "{} {} dists linked{}",
            "==>".bold().blue(),
            report.linked.len(),
            report
                .link_type
                .map(|lt| format!(" ({lt})"))
                .unwrap_or_default()
        );

        warn_on_special_chars(&config);
        Ok(degraded == 0)
    }
}

// envlink-core/src/env.rs
//! Orchestration across environments: initial provisioning from the
//! installer payload, post-extract activation, and duplicate cleanup.

use std::fs;
use std::path::Path;

use envlink_common::config::{manifest_path, Config};
use envlink_common::error::{LinkError, Result};
use envlink_common::model::{Dist, DistIndex, EnvSpec, LinkType};
use tracing::{debug, info, warn};

use crate::fs::{link_file, rm_rf, RemovalCount};
use crate::info::InfoDir;
use crate::link::{link, LinkReport};
use crate::meta::{linked, logged_dists};
use crate::script::{run_script, ScriptAction};
use crate::uninstall::{duplicates_to_remove, remove_dists};

const SPECIAL_ASCII: &str = "$!&\\%^|{}[]<>~`\"':;?@*#";

/// Summary of a provisioning run.
#[derive(Debug, Clone, Default)]
pub struct ProvisionReport {
    pub link_type: Option<LinkType>,
    pub linked: Vec<(String, Dist, LinkReport)>,
    pub unlinked: Vec<(String, Dist)>,
}

/// Decides between hard links and copies by trying to hard-link the URL log
/// into the root prefix. The probe file is always removed.
pub fn detect_link_type(config: &Config) -> Result<LinkType> {
    let src = config.urls_path();
    let dst = config.hard_link_probe_path();
    if !src.is_file() {
        return Err(LinkError::NotFound(format!(
            "URL log {} (required to probe hard-link support)",
            src.display()
        )));
    }
    if dst.symlink_metadata().is_ok() {
        debug!("Removing stale probe {}", dst.display());
        rm_rf(&dst);
    }

    let link_type = match link_file(&src, &dst, LinkType::Hard) {
        Ok(()) => LinkType::Hard,
        Err(e) => {
            debug!("Hard links unavailable in {}: {}", config.root_prefix().display(), e);
            LinkType::Copy
        }
    };
    rm_rf(&dst);
    debug!("Using {} for provisioning", link_type);
    Ok(link_type)
}

/// Links every declared dist into its environment, environments in sorted
/// order. Afterwards any other dist sharing a name with a declared one is
/// set aside by renaming its manifest to `<dist>.json.bak`.
///
/// Every declared dist must be in `index`. The first fatal error stops the
/// whole run.
pub fn link_envs(config: &Config, index: &DistIndex, envs: &EnvSpec) -> Result<ProvisionReport> {
    let link_type = detect_link_type(config)?;
    let mut report = ProvisionReport {
        link_type: Some(link_type),
        ..Default::default()
    };

    for (env_name, dists) in envs.iter() {
        if dists.is_empty() {
            continue;
        }
        let prefix = config.prefix_env(env_name);
        info!("linking {} packages into {}", dists.len(), prefix.display());

        for dist in dists {
            if !index.contains(dist) {
                return Err(LinkError::NotFound(format!(
                    "{dist} is declared for environment '{env_name}' but missing from the dist index"
                )));
            }
            let link_report = link(config, index, &prefix, dist, Some(link_type))?;
            report
                .linked
                .push((env_name.to_string(), dist.clone(), link_report));
        }

        for dist in duplicates_to_remove(&linked(&prefix)?, dists) {
            set_aside_manifest(&prefix, &dist);
            report.unlinked.push((env_name.to_string(), dist));
        }
    }
    Ok(report)
}

fn set_aside_manifest(prefix: &Path, dist: &Dist) {
    let meta_path = manifest_path(prefix, dist);
    warn!("unlinking: {}", meta_path.display());
    let mut bak = meta_path.clone().into_os_string();
    bak.push(".bak");
    if let Err(e) = fs::rename(&meta_path, &bak) {
        debug!("Rename of {} failed ({}), deleting it", meta_path.display(), e);
        rm_rf(&meta_path);
    }
}

/// Activates a package that was extracted directly into environment
/// `env_name`: rewrites placeholders, runs `post-link` and records the
/// manifest without touching the files, then deletes `<prefix>/info`.
pub fn post_extract(config: &Config, env_name: &str) -> Result<Dist> {
    let prefix = config.prefix_env(env_name);
    let info_dir = prefix.join("info");
    let dist = InfoDir::new(&info_dir).index()?.dist();
    debug!("Post-extract of {} in {}", dist, prefix.display());

    if config.force {
        run_script(&prefix, &dist, ScriptAction::PreUnlink, config.skip_scripts)?;
    }
    link(config, &DistIndex::default(), &prefix, &dist, None)?;
    fs::remove_dir_all(&info_dir).map_err(|e| LinkError::io_at("remove", &info_dir, e))?;
    Ok(dist)
}

/// Removes duplicates from the root environment, keeping the dists recorded
/// in the URL log.
pub fn remove_duplicates(config: &Config) -> Result<Vec<Dist>> {
    let prefix = config.root_prefix();
    let keep = logged_dists(&config.urls_path())?;
    for dist in &keep {
        if !manifest_path(prefix, dist).is_file() {
            return Err(LinkError::NotFound(format!(
                "{dist} is in the URL log but has no manifest in {}",
                prefix.display()
            )));
        }
    }

    let remove = duplicates_to_remove(&linked(prefix)?, &keep);
    let RemovalCount { removed, failed } = remove_dists(prefix, &remove, &keep)?;
    debug!(
        "Duplicate removal: {} dists, {} files removed, {} failures",
        remove.len(),
        removed,
        failed
    );
    Ok(remove)
}

/// Characters from the shell-special set that appear in the root prefix.
pub fn special_chars_in_prefix(prefix: &Path) -> Vec<char> {
    let prefix = prefix.to_string_lossy();
    SPECIAL_ASCII.chars().filter(|c| prefix.contains(*c)).collect()
}

/// Warns about each shell-special character in the root prefix. No-op on
/// Windows.
pub fn warn_on_special_chars(config: &Config) {
    if cfg!(windows) {
        return;
    }
    for c in special_chars_in_prefix(config.root_prefix()) {
        warn!("found '{}' in install prefix.", c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_special_characters() {
        assert!(special_chars_in_prefix(Path::new("/opt/anaconda")).is_empty());
        assert_eq!(
            special_chars_in_prefix(Path::new("/home/me/my$stuff (x)#1")),
            vec!['$', '#']
        );
    }

    #[test]
    fn probe_requires_url_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());
        assert!(matches!(
            detect_link_type(&config),
            Err(LinkError::NotFound(_))
        ));
    }

    #[test]
    fn probe_prefers_hard_links_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());
        fs::create_dir_all(config.pkgs_dir()).unwrap();
        fs::write(config.urls_path(), "").unwrap();
        fs::write(config.hard_link_probe_path(), "stale").unwrap();

        let link_type = detect_link_type(&config).unwrap();
        assert_eq!(link_type, LinkType::Hard);
        assert!(!config.hard_link_probe_path().exists());
    }
}

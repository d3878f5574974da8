// envlink-core/src/link.rs
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use envlink_common::config::Config;
use envlink_common::error::{LinkError, Result};
use envlink_common::model::{Dist, DistIndex, LinkManifest, LinkSource, LinkType, PrefixRecord};
use tracing::{debug, info, warn};

use crate::fs::{is_symlink, link_file, path_exists, rm_rf, Backoff};
use crate::info::InfoDir;
use crate::meta::{create_meta, source_info};
use crate::relocate::{update_prefix, Rewrite};
use crate::script::{run_script, ScriptAction};

/// Per-file materialization decisions for one dist.
#[derive(Debug, Clone)]
pub struct LinkPlan {
    default: LinkType,
    has_prefix: BTreeMap<String, PrefixRecord>,
    no_link: HashSet<String>,
}

impl LinkPlan {
    pub fn new(
        default: LinkType,
        has_prefix: BTreeMap<String, PrefixRecord>,
        no_link: HashSet<String>,
    ) -> Self {
        Self {
            default,
            has_prefix,
            no_link,
        }
    }

    /// Files that get rewritten, files that must never share an inode, and
    /// symlinks are copied; everything else uses the default.
    pub fn link_type_for(&self, rel: &str, src: &Path) -> LinkType {
        if self.has_prefix.contains_key(rel) || self.no_link.contains(rel) || is_symlink(src) {
            LinkType::Copy
        } else {
            self.default
        }
    }

    pub fn has_prefix(&self) -> &BTreeMap<String, PrefixRecord> {
        &self.has_prefix
    }
}

/// What `link` did for one dist.
#[derive(Debug, Clone, Default)]
pub struct LinkReport {
    pub files: usize,
    /// Files whose link or copy failed. They are still listed in the
    /// manifest.
    pub failed: Vec<String>,
    pub rewritten: usize,
}

impl LinkReport {
    pub fn is_degraded(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Links `dist` into `prefix`.
///
/// With a link type the files are materialized from the package cache
/// (`<pkgs>/<dist>`). Without one the package is assumed to be extracted in
/// `prefix` already and only its `<prefix>/info` metadata is used. Either
/// way placeholders are rewritten, the `post-link` script runs and the
/// manifest is written last.
pub fn link(
    config: &Config,
    index: &DistIndex,
    prefix: &Path,
    dist: &Dist,
    link_type: Option<LinkType>,
) -> Result<LinkReport> {
    let source_dir = config.dist_source_dir(dist);
    let info = match link_type {
        Some(_) => InfoDir::new(source_dir.join("info")),
        None => InfoDir::new(prefix.join("info")),
    };
    debug!(
        "Linking {} into {} ({})",
        dist,
        prefix.display(),
        link_type.map_or("already extracted", LinkType::label)
    );

    let files = info.files()?;
    let has_prefix = info.has_prefix()?;
    let mut report = LinkReport {
        files: files.len(),
        ..Default::default()
    };

    let link_source = match link_type {
        Some(lt) => {
            let plan = LinkPlan::new(lt, has_prefix, info.no_link());
            report.failed = materialize(&plan, &files, &source_dir, prefix, config.force)?;
            for f in &report.failed {
                warn!("could not link {} for {}", f, dist);
            }
            relocate_files(plan.has_prefix(), prefix, dist, &mut report)?;
            Some(LinkSource {
                source: source_dir,
                link_type: lt,
            })
        }
        None => {
            relocate_files(&has_prefix, prefix, dist, &mut report)?;
            None
        }
    };

    run_script(prefix, dist, ScriptAction::PostLink, config.skip_scripts)?;

    let manifest = LinkManifest::new(
        info.index()?,
        files,
        link_source,
        source_info(index, &config.urls_path(), dist),
        &config.installed_by,
    );
    create_meta(prefix, dist, &manifest)?;

    info!("linked {} ({} files)", dist, report.files);
    Ok(report)
}

/// Places every file of the dist under `prefix`. Existing destinations are
/// an error unless `force` is set. Individual link failures are returned,
/// not raised.
pub fn materialize(
    plan: &LinkPlan,
    files: &[String],
    source_dir: &Path,
    prefix: &Path,
    force: bool,
) -> Result<Vec<String>> {
    let mut failed = Vec::new();
    for f in files {
        let src = source_dir.join(f);
        let dst = prefix.join(f);
        if let Some(dst_dir) = dst.parent() {
            if !dst_dir.is_dir() {
                fs::create_dir_all(dst_dir)
                    .map_err(|e| LinkError::io_at("create dir", dst_dir, e))?;
            }
        }
        if path_exists(&dst) {
            if force {
                debug!("Removing existing {}", dst.display());
                rm_rf(&dst);
            } else {
                return Err(LinkError::DestinationExists(dst));
            }
        }
        let lt = plan.link_type_for(f, &src);
        if let Err(e) = link_file(&src, &dst, lt) {
            debug!(
                "{} {} -> {} failed: {}",
                lt,
                src.display(),
                dst.display(),
                e
            );
            failed.push(f.clone());
        }
    }
    Ok(failed)
}

fn relocate_files(
    has_prefix: &BTreeMap<String, PrefixRecord>,
    prefix: &Path,
    dist: &Dist,
    report: &mut LinkReport,
) -> Result<()> {
    let new_prefix = prefix.to_string_lossy();
    let backoff = Backoff::for_platform();
    for (f, record) in has_prefix {
        let path: PathBuf = prefix.join(f);
        match update_prefix(&path, &new_prefix, &record.placeholder, record.mode, backoff) {
            Ok(Rewrite::Rewritten) => report.rewritten += 1,
            Ok(_) => {}
            Err(LinkError::Padding { placeholder, .. }) => {
                return Err(LinkError::PlaceholderTooShort {
                    placeholder,
                    dist: dist.to_string(),
                    path,
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

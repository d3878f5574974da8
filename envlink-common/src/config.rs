// envlink-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{LinkError, Result};
use super::model::dist::Dist;

pub const ROOT_ENV_NAME: &str = "root";
const ROOT_PREFIX_ENV_VAR: &str = "ENVLINK_ROOT_PREFIX";
const INSTALLED_BY_ENV_VAR: &str = "ENVLINK_INSTALLED_BY";
const FORCE_ENV_VAR: &str = "FORCE";
const META_DIR_NAME: &str = "conda-meta";

/// Everything the linker needs to know about where it runs. Built once by the
/// caller and passed to every entry point.
#[derive(Debug, Clone)]
pub struct Config {
    pub root_prefix: PathBuf,
    pub pkgs_dir: PathBuf,
    pub force: bool,
    pub skip_scripts: bool,
    pub installed_by: String,
}

impl Config {
    /// Builds a config rooted at `root_prefix` with flags taken from the
    /// environment.
    pub fn new(root_prefix: impl AsRef<Path>) -> Self {
        let root_prefix = normalize_root(root_prefix.as_ref());
        let pkgs_dir = root_prefix.join("pkgs");
        Self {
            root_prefix,
            pkgs_dir,
            force: force_from_env(),
            skip_scripts: false,
            installed_by: env::var(INSTALLED_BY_ENV_VAR)
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("envlink-{}", env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Resolves the root prefix from an explicit value, then
    /// `ENVLINK_ROOT_PREFIX`, then the location of the running executable
    /// (which is expected to live in `<root>/pkgs/`).
    pub fn load(root_prefix: Option<PathBuf>) -> Result<Self> {
        debug!("Loading envlink configuration");

        let root = match root_prefix {
            Some(p) => p,
            None => match env::var(ROOT_PREFIX_ENV_VAR).ok().filter(|s| !s.is_empty()) {
                Some(s) => PathBuf::from(s),
                None => {
                    debug!(
                        "{} not set, deriving root prefix from executable location",
                        ROOT_PREFIX_ENV_VAR
                    );
                    let exe = env::current_exe().map_err(|e| {
                        LinkError::Config(format!("cannot locate running executable: {e}"))
                    })?;
                    exe.parent()
                        .and_then(Path::parent)
                        .map(Path::to_path_buf)
                        .ok_or_else(|| {
                            LinkError::Config(format!(
                                "cannot derive root prefix from {}",
                                exe.display()
                            ))
                        })?
                }
            },
        };

        let root = if root.is_absolute() {
            root
        } else {
            env::current_dir()?.join(root)
        };

        let config = Self::new(root);
        debug!("Effective root prefix: {}", config.root_prefix.display());
        Ok(config)
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_skip_scripts(mut self, skip_scripts: bool) -> Self {
        self.skip_scripts = skip_scripts;
        self
    }

    pub fn root_prefix(&self) -> &Path {
        &self.root_prefix
    }

    pub fn pkgs_dir(&self) -> &Path {
        &self.pkgs_dir
    }

    /// Log of downloaded archive URLs, one `baseurl/filename[#md5]` per line.
    pub fn urls_path(&self) -> PathBuf {
        self.pkgs_dir.join("urls")
    }

    pub fn dist_index_path(&self) -> PathBuf {
        self.pkgs_dir.join("dists.json")
    }

    pub fn env_spec_path(&self) -> PathBuf {
        self.pkgs_dir.join("envs.json")
    }

    /// Extracted package directory in the package cache.
    pub fn dist_source_dir(&self, dist: &Dist) -> PathBuf {
        self.pkgs_dir.join(dist.as_str())
    }

    pub fn hard_link_probe_path(&self) -> PathBuf {
        self.root_prefix.join(".hard-link")
    }

    pub fn prefix_env(&self, env_name: &str) -> PathBuf {
        if env_name == ROOT_ENV_NAME {
            self.root_prefix.clone()
        } else {
            self.root_prefix.join("envs").join(env_name)
        }
    }
}

/// State directory of an environment, holding one manifest per dist.
pub fn meta_dir(prefix: &Path) -> PathBuf {
    prefix.join(META_DIR_NAME)
}

pub fn manifest_path(prefix: &Path, dist: &Dist) -> PathBuf {
    meta_dir(prefix).join(format!("{}.json", dist.as_str()))
}

fn normalize_root(root: &Path) -> PathBuf {
    let s = root.to_string_lossy();
    if s.contains("//") {
        let mut collapsed = s.replace("//", "/");
        while collapsed.contains("//") {
            collapsed = collapsed.replace("//", "/");
        }
        PathBuf::from(collapsed)
    } else {
        root.to_path_buf()
    }
}

fn force_from_env() -> bool {
    env::var(FORCE_ENV_VAR)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .is_some_and(|n| n != 0)
}

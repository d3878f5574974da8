// envlink-core/src/fs.rs
//! Filesystem primitives used while materializing and removing packages.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use envlink_common::error::{LinkError, Result};
use envlink_common::model::LinkType;
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

/// Materializes `src` at `dst` using the given strategy.
///
/// A copy preserves relative symlinks as symlinks and copies the contents of
/// everything else, absolute symlinks included.
pub fn link_file(src: &Path, dst: &Path, link_type: LinkType) -> io::Result<()> {
    match link_type {
        LinkType::Hard => fs::hard_link(src, dst),
        LinkType::Soft => symlink(src, dst),
        LinkType::Copy => {
            if let Some(target) = relative_symlink_target(src) {
                debug!(
                    "Preserving relative symlink {} -> {}",
                    dst.display(),
                    target.display()
                );
                symlink(&target, dst)
            } else {
                fs::copy(src, dst).map(|_| ())
            }
        }
    }
}

fn relative_symlink_target(path: &Path) -> Option<std::path::PathBuf> {
    let meta = fs::symlink_metadata(path).ok()?;
    if !meta.file_type().is_symlink() {
        return None;
    }
    let target = fs::read_link(path).ok()?;
    if target.is_absolute() {
        None
    } else {
        Some(target)
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Whether something (including a dangling symlink) exists at `path`.
pub fn path_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

pub fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Deletes a file, symlink, or directory tree. Never fails.
///
/// Returns `true` if nothing is left at `path` afterwards.
pub fn rm_rf(path: &Path) -> bool {
    match path.symlink_metadata() {
        Ok(metadata) => {
            let result = if metadata.file_type().is_dir() {
                fs::remove_dir_all(path)
            } else {
                // files and symlinks, dangling ones included
                fs::remove_file(path)
            };
            match result {
                Ok(()) => {
                    debug!("Removed {}", path.display());
                    true
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => true,
                Err(e) => {
                    debug!("Could not remove {}: {}", path.display(), e);
                    false
                }
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            debug!("Could not stat {} for removal: {}", path.display(), e);
            false
        }
    }
}

/// Outcome of a best-effort removal of many paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalCount {
    pub removed: usize,
    pub failed: usize,
}

/// Runs [`rm_rf`] on every path and counts the outcomes. Never fails.
pub fn rm_rf_all<'a, I>(paths: I) -> RemovalCount
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut count = RemovalCount::default();
    for path in paths {
        if rm_rf(path) {
            count.removed += 1;
        } else {
            count.failed += 1;
        }
    }
    count
}

/// Retry policy for file replacements that virus scanners can transiently
/// block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_tries: u32,
    pub base_delay: Duration,
}

impl Backoff {
    /// Six attempts with 0.1s * 2^n sleeps between them (3.1s total) on
    /// Windows; a single attempt elsewhere.
    pub fn for_platform() -> Self {
        Self {
            max_tries: if cfg!(windows) { 6 } else { 1 },
            base_delay: Duration::from_millis(100),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Runs `op`, retrying on permission errors according to `backoff`. Any
/// other error is returned immediately.
pub fn with_backoff<T, F>(path: &Path, backoff: Backoff, mut op: F) -> Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    let max_tries = backoff.max_tries.max(1);
    for attempt in 0..max_tries {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                if max_tries == 1 {
                    return Err(LinkError::io_at("replace", path, e));
                }
                if attempt == max_tries - 1 {
                    error!(
                        "Giving up on {} after {} attempts: {}",
                        path.display(),
                        max_tries,
                        e
                    );
                    break;
                }
                let delay = backoff.delay(attempt);
                warn!(
                    "Permission denied on {} (attempt {}), retrying in {:?}",
                    path.display(),
                    attempt + 1,
                    delay
                );
                thread::sleep(delay);
            }
            Err(e) => return Err(LinkError::io_at("replace", path, e)),
        }
    }
    Err(LinkError::RetriesExhausted {
        attempts: max_tries,
        path: path.to_path_buf(),
    })
}

/// Writes `content` to `path` through a temporary file in the same
/// directory, so readers never see a half-written file.
pub fn atomic_write_file(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        LinkError::Generic(format!("Cannot get parent directory for {}", path.display()))
    })?;
    fs::create_dir_all(dir).map_err(|e| LinkError::io_at("create dir", dir, e))?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    debug!(
        "Atomically writing {} bytes to {} via {}",
        content.len(),
        path.display(),
        temp_file.path().display()
    );
    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| {
        error!("Failed to persist temporary file over {}: {}", path.display(), e.error);
        LinkError::io_at("persist", path, e.error)
    })?;

    // NamedTempFile is created 0600
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o644)) {
            warn!("Failed to set permissions on {}: {}", path.display(), e);
        }
    }
    Ok(())
}

// envlink-core/src/relocate.rs
//! Rewrites the build-time placeholder prefix embedded in installed files.

use std::fs;
use std::io::Write;
use std::path::Path;

use envlink_common::error::{LinkError, Result};
use envlink_common::model::PrefixMode;
use regex::bytes::{NoExpand, Regex};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::fs::{with_backoff, Backoff};

/// Whether a rewrite touched the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    Unchanged,
    Rewritten,
    /// Binary rewrites are not performed on Windows.
    Skipped,
}

/// Replaces every occurrence of `placeholder` in the file at `path` with
/// `new_prefix`.
///
/// Symlinks are resolved first. If nothing changes the file is not touched.
/// Otherwise the new content is written to a temporary file beside it, given
/// the original permission bits and renamed over it (the old inode may be
/// mapped by a running process or shared through a hard link). The file is
/// never missing or half-written.
pub fn update_prefix(
    path: &Path,
    new_prefix: &str,
    placeholder: &str,
    mode: PrefixMode,
    backoff: Backoff,
) -> Result<Rewrite> {
    let new_prefix = if cfg!(windows) {
        new_prefix.replace('\\', "/")
    } else {
        new_prefix.to_string()
    };

    let path = fs::canonicalize(path).map_err(|e| LinkError::io_at("resolve", path, e))?;
    let data = fs::read(&path).map_err(|e| LinkError::io_at("read", &path, e))?;

    let new_data = match mode {
        PrefixMode::Text => text_replace(&data, placeholder.as_bytes(), new_prefix.as_bytes())?,
        PrefixMode::Binary => {
            if cfg!(windows) {
                debug!("Skipping binary prefix rewrite on Windows: {}", path.display());
                return Ok(Rewrite::Skipped);
            }
            binary_replace(&data, placeholder.as_bytes(), new_prefix.as_bytes())?
        }
    };

    if new_data == data {
        debug!("No placeholder found in {}", path.display());
        return Ok(Rewrite::Unchanged);
    }

    let permissions = fs::symlink_metadata(&path)
        .map_err(|e| LinkError::io_at("stat", &path, e))?
        .permissions();
    let dir = path.parent().ok_or_else(|| {
        LinkError::Generic(format!("Cannot get parent directory for {}", path.display()))
    })?;

    // a fresh inode, so hard links sharing the original are left alone
    let mut temp_file =
        NamedTempFile::new_in(dir).map_err(|e| LinkError::io_at("create temp in", dir, e))?;
    temp_file
        .write_all(&new_data)
        .map_err(|e| LinkError::io_at("write", temp_file.path(), e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| LinkError::io_at("sync", temp_file.path(), e))?;
    let temp_path = temp_file.into_temp_path();
    fs::set_permissions(&temp_path, permissions)
        .map_err(|e| LinkError::io_at("chmod", &temp_path, e))?;
    with_backoff(&path, backoff, || fs::rename(&temp_path, &path))?;

    debug!(
        "Rewrote {} ({} mode, {} -> {} bytes)",
        path.display(),
        mode,
        data.len(),
        new_data.len()
    );
    Ok(Rewrite::Rewritten)
}

fn literal(needle: &[u8]) -> Result<Regex> {
    let pattern = std::str::from_utf8(needle)
        .map_err(|e| LinkError::Generic(format!("placeholder is not UTF-8: {e}")))?;
    Regex::new(&regex::escape(pattern))
        .map_err(|e| LinkError::Generic(format!("invalid placeholder pattern: {e}")))
}

/// Plain substring replacement of `a` with `b`.
pub fn text_replace(data: &[u8], a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    if a.is_empty() {
        return Ok(data.to_vec());
    }
    Ok(literal(a)?.replace_all(data, NoExpand(b)).into_owned())
}

/// Replaces `a` with `b` inside NUL-terminated strings, padding each string
/// with NUL bytes so that the data keeps its exact length.
///
/// Fails with [`LinkError::Padding`] when `b` is longer than `a`.
pub fn binary_replace(data: &[u8], a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    if a.is_empty() {
        return Ok(data.to_vec());
    }
    let needle = literal(a)?;
    let pattern = std::str::from_utf8(a)
        .map_err(|e| LinkError::Generic(format!("placeholder is not UTF-8: {e}")))?;
    let padded = Regex::new(&format!(r"{}(?-u:[^\x00])*?\x00", regex::escape(pattern)))
        .map_err(|e| LinkError::Generic(format!("invalid placeholder pattern: {e}")))?;

    let mut res = Vec::with_capacity(data.len());
    let mut last = 0;
    for m in padded.find_iter(data) {
        res.extend_from_slice(&data[last..m.start()]);
        let segment = m.as_bytes();
        let occurrences = needle.find_iter(segment).count() as i64;
        let padding = (a.len() as i64 - b.len() as i64) * occurrences;
        if padding < 0 {
            return Err(LinkError::Padding {
                placeholder: String::from_utf8_lossy(a).into_owned(),
                new_prefix: String::from_utf8_lossy(b).into_owned(),
                padding,
            });
        }
        res.extend_from_slice(&needle.replace_all(segment, NoExpand(b)));
        res.resize(res.len() + padding as usize, 0);
        last = m.end();
    }
    res.extend_from_slice(&data[last..]);

    assert_eq!(
        res.len(),
        data.len(),
        "binary prefix replacement changed the data length"
    );
    Ok(res)
}

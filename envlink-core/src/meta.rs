// envlink-core/src/meta.rs
//! Per-environment state: one manifest per linked dist under `conda-meta/`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use envlink_common::config::{manifest_path, meta_dir};
use envlink_common::error::{LinkError, Result};
use envlink_common::model::{Dist, DistIndex, LinkManifest, SourceInfo};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::fs::atomic_write_file;

lazy_static! {
    /// `baseurl/filename[#md5]`, one whitespace-delimited token.
    static ref URL_RE: Regex =
        Regex::new(r"^(?P<baseurl>\S+/)(?P<fn>[^\s#/]+)(?:#(?P<md5>[0-9a-f]{32}))?$").unwrap();
}

/// Writes the manifest for `dist`, replacing any previous one. The state
/// directory and an empty `history` file are created on first use.
pub fn create_meta(prefix: &Path, dist: &Dist, manifest: &LinkManifest) -> Result<PathBuf> {
    let dir = meta_dir(prefix);
    if !dir.is_dir() {
        debug!("Creating state directory {}", dir.display());
        fs::create_dir_all(&dir).map_err(|e| LinkError::io_at("create dir", &dir, e))?;
        let history = dir.join("history");
        fs::write(&history, "").map_err(|e| LinkError::io_at("write", &history, e))?;
    }

    let path = manifest_path(prefix, dist);
    let json = manifest.to_sorted_json()?;
    atomic_write_file(&path, json.as_bytes())?;
    debug!(
        "Wrote manifest for {} ({} files) to {}",
        dist,
        manifest.files.len(),
        path.display()
    );
    Ok(path)
}

pub fn read_manifest(prefix: &Path, dist: &Dist) -> Result<LinkManifest> {
    let path = manifest_path(prefix, dist);
    let raw = fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LinkError::NotFound(format!("{dist} is not linked in {}", prefix.display()))
        } else {
            LinkError::io_at("read", &path, e)
        }
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| LinkError::ParseError("manifest", format!("{}: {e}", path.display())))
}

/// Dists with a manifest in `prefix`.
pub fn linked(prefix: &Path) -> Result<BTreeSet<Dist>> {
    let dir = meta_dir(prefix);
    if !dir.is_dir() {
        return Ok(BTreeSet::new());
    }
    let mut res = BTreeSet::new();
    for entry in fs::read_dir(&dir).map_err(|e| LinkError::io_at("read dir", &dir, e))? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(dist) = name.to_str().and_then(|n| n.strip_suffix(".json")) {
            res.insert(Dist::new(dist));
        }
    }
    Ok(res)
}

/// Download provenance of `dist`: the dist index when it knows the dist,
/// otherwise the URL log. Unknown provenance is an empty record.
pub fn source_info(index: &DistIndex, urls_path: &Path, dist: &Dist) -> SourceInfo {
    if let Some(info) = index.get(dist) {
        return info.clone();
    }
    read_urls(urls_path, dist).unwrap_or_default()
}

/// Looks `dist` up in the URL log, most recent entry first. A missing or
/// unreadable log yields `None`.
pub fn read_urls(urls_path: &Path, dist: &Dist) -> Option<SourceInfo> {
    let data = match fs::read_to_string(urls_path) {
        Ok(data) => data,
        Err(e) => {
            debug!("URL log {} unavailable: {}", urls_path.display(), e);
            return None;
        }
    };
    let archive = dist.archive_file_name();
    data.split_whitespace().rev().find_map(|token| {
        let caps = URL_RE.captures(token)?;
        if caps["fn"] != archive {
            return None;
        }
        Some(SourceInfo {
            url: Some(format!("{}{}", &caps["baseurl"], &caps["fn"])),
            md5: caps.name("md5").map(|m| m.as_str().to_string()),
        })
    })
}

/// Dists recorded in the URL log, in log order.
pub fn logged_dists(urls_path: &Path) -> Result<Vec<Dist>> {
    let data = fs::read_to_string(urls_path).map_err(|e| LinkError::io_at("read", urls_path, e))?;
    Ok(data
        .lines()
        .filter_map(|line| URL_RE.captures(line.trim()))
        .filter_map(|caps| {
            caps["fn"]
                .strip_suffix(".tar.bz2")
                .map(Dist::new)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use envlink_common::model::IndexRecord;

    use super::*;

    const URLS: &str = "\
https://repo.example.test/pkgs/free/osx-64/numpy-1.11.0-py27_0.tar.bz2#0123456789abcdef0123456789abcdef
https://repo.example.test/pkgs/free/osx-64/six-1.10.0-py27_0.tar.bz2
not a url
https://mirror.example.test/numpy-1.11.0-py27_0.tar.bz2#fedcba9876543210fedcba9876543210
";

    fn manifest(files: &[&str]) -> LinkManifest {
        LinkManifest::new(
            IndexRecord {
                name: "six".into(),
                version: "1.10.0".into(),
                build: "py27_0".into(),
                extra: BTreeMap::new(),
            },
            files.iter().map(|f| f.to_string()).collect(),
            None,
            SourceInfo::default(),
            "envlink-test",
        )
    }

    #[test]
    fn read_urls_prefers_latest_entry() {
        let dir = tempfile::tempdir().unwrap();
        let urls = dir.path().join("urls");
        fs::write(&urls, URLS).unwrap();
        let info = read_urls(&urls, &Dist::new("numpy-1.11.0-py27_0")).unwrap();
        assert_eq!(
            info.url.as_deref(),
            Some("https://mirror.example.test/numpy-1.11.0-py27_0.tar.bz2")
        );
        assert_eq!(info.md5.as_deref(), Some("fedcba9876543210fedcba9876543210"));

        let six = read_urls(&urls, &Dist::new("six-1.10.0-py27_0")).unwrap();
        assert!(six.md5.is_none());
        assert!(read_urls(&urls, &Dist::new("absent-1-0")).is_none());
    }

    #[test]
    fn missing_url_log_is_unknown_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let info = source_info(
            &DistIndex::default(),
            &dir.path().join("urls"),
            &Dist::new("six-1.10.0-py27_0"),
        );
        assert_eq!(info, SourceInfo::default());
    }

    #[test]
    fn index_wins_over_url_log() {
        let dir = tempfile::tempdir().unwrap();
        let urls = dir.path().join("urls");
        fs::write(&urls, URLS).unwrap();
        let dist = Dist::new("six-1.10.0-py27_0");
        let mut index = DistIndex::default();
        index.insert(
            dist.clone(),
            SourceInfo {
                url: Some("https://index.example.test/six.tar.bz2".into()),
                md5: Some("00000000000000000000000000000000".into()),
            },
        );
        let info = source_info(&index, &urls, &dist);
        assert_eq!(info.url.as_deref(), Some("https://index.example.test/six.tar.bz2"));
    }

    #[test]
    fn logged_dists_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let urls = dir.path().join("urls");
        fs::write(&urls, URLS).unwrap();
        let dists = logged_dists(&urls).unwrap();
        let names: Vec<&str> = dists.iter().map(Dist::as_str).collect();
        assert_eq!(
            names,
            vec!["numpy-1.11.0-py27_0", "six-1.10.0-py27_0", "numpy-1.11.0-py27_0"]
        );
    }

    #[test]
    fn create_meta_initializes_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dist = Dist::new("six-1.10.0-py27_0");
        let path = create_meta(dir.path(), &dist, &manifest(&["lib/six.py"])).unwrap();

        assert!(meta_dir(dir.path()).join("history").is_file());
        assert_eq!(fs::read_to_string(meta_dir(dir.path()).join("history")).unwrap(), "");
        assert_eq!(path, manifest_path(dir.path(), &dist));
        assert_eq!(linked(dir.path()).unwrap().into_iter().collect::<Vec<_>>(), vec![dist.clone()]);

        let read = read_manifest(dir.path(), &dist).unwrap();
        assert_eq!(read.files, vec!["lib/six.py"]);
        assert_eq!(read.installed_by.as_deref(), Some("envlink-test"));
    }

    #[test]
    fn create_meta_replaces_previous_manifest_and_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let dist = Dist::new("six-1.10.0-py27_0");
        create_meta(dir.path(), &dist, &manifest(&["a"])).unwrap();
        fs::write(meta_dir(dir.path()).join("history"), "==> log <==\n").unwrap();
        create_meta(dir.path(), &dist, &manifest(&["b"])).unwrap();

        assert_eq!(read_manifest(dir.path(), &dist).unwrap().files, vec!["b"]);
        assert_eq!(
            fs::read_to_string(meta_dir(dir.path()).join("history")).unwrap(),
            "==> log <==\n"
        );
    }

    #[test]
    fn linked_ignores_non_manifest_files() {
        let dir = tempfile::tempdir().unwrap();
        let meta = meta_dir(dir.path());
        fs::create_dir_all(&meta).unwrap();
        fs::write(meta.join("history"), "").unwrap();
        fs::write(meta.join("a-1-0.json.bak"), "{}").unwrap();
        fs::write(meta.join("b-2-0.json"), "{}").unwrap();
        let linked: Vec<Dist> = linked(dir.path()).unwrap().into_iter().collect();
        assert_eq!(linked, vec![Dist::new("b-2-0")]);
    }

    #[test]
    fn read_manifest_of_unlinked_dist_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest(dir.path(), &Dist::new("a-1-0")).unwrap_err();
        assert!(matches!(err, LinkError::NotFound(_)));
    }
}

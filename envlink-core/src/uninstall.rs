// envlink-core/src/uninstall.rs
//! Duplicate resolution and removal of linked dists.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use envlink_common::config::{manifest_path, Config};
use envlink_common::error::Result;
use envlink_common::model::Dist;
use tracing::{debug, info, warn};

use crate::fs::{rm_rf, rm_rf_all, RemovalCount};
use crate::meta::{linked, read_manifest};
use crate::script::{run_script, ScriptAction};

/// Returns the sorted dists to remove so that only one dist per package
/// name remains.
///
/// Dists in `keep` are never returned. When a name has several linked dists
/// and none of them is kept, the lexicographically greatest one survives.
pub fn duplicates_to_remove<'a, L, K>(linked_dists: L, keep_dists: K) -> Vec<Dist>
where
    L: IntoIterator<Item = &'a Dist>,
    K: IntoIterator<Item = &'a Dist>,
{
    let keep: HashSet<&Dist> = keep_dists.into_iter().collect();
    let mut by_name: BTreeMap<&str, BTreeSet<&Dist>> = BTreeMap::new();
    for dist in linked_dists {
        by_name.entry(dist.name()).or_default().insert(dist);
    }

    let mut res = BTreeSet::new();
    for dists in by_name.values() {
        if dists.len() == 1 {
            continue;
        }
        if dists.iter().any(|d| keep.contains(d)) {
            res.extend(dists.iter().filter(|d| !keep.contains(*d)).copied());
        } else {
            // all but the greatest
            res.extend(dists.iter().take(dists.len() - 1).copied());
        }
    }
    res.into_iter().cloned().collect()
}

/// Files recorded in the manifests of `dists`. An unreadable manifest is an
/// error, so callers never delete a file a kept dist still owns.
pub fn manifest_files<'a, I>(prefix: &Path, dists: I) -> Result<HashSet<String>>
where
    I: IntoIterator<Item = &'a Dist>,
{
    let mut files = HashSet::new();
    for dist in dists {
        files.extend(read_manifest(prefix, dist)?.files);
    }
    Ok(files)
}

/// Deletes the files of `dist` that are not in `keep_files`, then its
/// manifest. Never fails; the manifest is removed whatever happened to the
/// files.
pub fn remove_dist(prefix: &Path, dist: &Dist, keep_files: &HashSet<String>) -> RemovalCount {
    let files = match read_manifest(prefix, dist) {
        Ok(manifest) => manifest.files,
        Err(e) => {
            warn!("cannot read manifest of {}: {}", dist, e);
            Vec::new()
        }
    };
    let doomed: Vec<_> = files
        .iter()
        .filter(|f| !keep_files.contains(*f))
        .map(|f| prefix.join(f))
        .collect();
    let count = rm_rf_all(doomed.iter().map(|p| p.as_path()));
    if count.failed > 0 {
        warn!("{} files of {} could not be removed", count.failed, dist);
    }

    let meta = manifest_path(prefix, dist);
    if !rm_rf(&meta) {
        warn!("could not remove manifest {}", meta.display());
    }
    debug!(
        "Removed {} ({} files removed, {} kept by other dists)",
        dist,
        count.removed,
        files.len() - doomed.len()
    );
    count
}

/// Removes every dist in `remove`, sparing files referenced by the dists in
/// `keep`. Fails without deleting anything if a `keep` manifest is
/// unreadable; past that point removal is best-effort.
pub fn remove_dists(prefix: &Path, remove: &[Dist], keep: &[Dist]) -> Result<RemovalCount> {
    let keep_files = manifest_files(prefix, keep)?;
    let mut total = RemovalCount::default();
    for dist in remove {
        info!("unlinking: {}", dist);
        let count = remove_dist(prefix, dist, &keep_files);
        total.removed += count.removed;
        total.failed += count.failed;
    }
    Ok(total)
}

/// Unlinks a single dist: runs its `pre-unlink` script, then removes the
/// files no other linked dist references.
pub fn unlink_dist(config: &Config, prefix: &Path, dist: &Dist) -> Result<RemovalCount> {
    // fail early if it is not linked
    read_manifest(prefix, dist)?;
    let others: Vec<Dist> = linked(prefix)?
        .into_iter()
        .filter(|d| d != dist)
        .collect();
    let keep_files = manifest_files(prefix, &others)?;

    run_script(prefix, dist, ScriptAction::PreUnlink, config.skip_scripts)?;
    info!("unlinking: {}", dist);
    Ok(remove_dist(prefix, dist, &keep_files))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use envlink_common::config::meta_dir;
    use envlink_common::error::LinkError;
    use envlink_common::model::{IndexRecord, LinkManifest, SourceInfo};

    use super::*;
    use crate::meta::create_meta;

    fn dists(names: &[&str]) -> Vec<Dist> {
        names.iter().map(|n| Dist::new(*n)).collect()
    }

    fn install(prefix: &Path, dist: &str, files: &[&str]) -> Dist {
        let dist = Dist::new(dist);
        for f in files {
            let path = prefix.join(f);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, dist.as_str()).unwrap();
        }
        let parts: Vec<&str> = dist.as_str().rsplitn(3, '-').collect();
        let manifest = LinkManifest::new(
            IndexRecord {
                name: parts[2].into(),
                version: parts[1].into(),
                build: parts[0].into(),
                extra: BTreeMap::new(),
            },
            files.iter().map(|f| f.to_string()).collect(),
            None,
            SourceInfo::default(),
            "envlink-test",
        );
        create_meta(prefix, &dist, &manifest).unwrap();
        dist
    }

    #[test]
    fn greatest_dist_survives_without_keep_set() {
        let linked = dists(&["numpy-1.12.1-py27_0", "numpy-1.11.0-py27_0"]);
        let res = duplicates_to_remove(&linked, &[]);
        assert_eq!(res, dists(&["numpy-1.11.0-py27_0"]));
    }

    #[test]
    fn kept_dist_survives() {
        let linked = dists(&["numpy-1.12.1-py27_0", "numpy-1.11.0-py27_0"]);
        let keep = dists(&["numpy-1.11.0-py27_0"]);
        let res = duplicates_to_remove(&linked, &keep);
        assert_eq!(res, dists(&["numpy-1.12.1-py27_0"]));
    }

    #[test]
    fn singletons_and_multiple_names() {
        let linked = dists(&[
            "six-1.10.0-py27_0",
            "python-dateutil-2.6.0-py27_0",
            "python-dateutil-2.5.3-py27_0",
            "python-2.7.13-0",
            "python-2.7.12-1",
            "python-2.7.13-1",
        ]);
        let keep = dists(&["python-2.7.12-1"]);
        let res = duplicates_to_remove(&linked, &keep);
        assert_eq!(
            res,
            dists(&[
                "python-2.7.13-0",
                "python-2.7.13-1",
                "python-dateutil-2.5.3-py27_0",
            ])
        );
    }

    #[test]
    fn lexicographic_tie_break_is_not_semantic() {
        // "9" sorts after "10", so the older build wins
        let linked = dists(&["foo-10-0", "foo-9-0"]);
        assert_eq!(duplicates_to_remove(&linked, &[]), dists(&["foo-10-0"]));
    }

    #[test]
    fn removal_spares_files_of_kept_dists() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path();
        let old = install(prefix, "numpy-1.11.0-py27_0", &["lib/numpy/old.py", "lib/numpy/shared.py"]);
        let new = install(prefix, "numpy-1.12.1-py27_0", &["lib/numpy/shared.py", "lib/numpy/new.py"]);

        let count = remove_dists(prefix, &[old.clone()], &[new.clone()]).unwrap();
        assert_eq!(count, RemovalCount { removed: 1, failed: 0 });
        assert!(!prefix.join("lib/numpy/old.py").exists());
        assert!(prefix.join("lib/numpy/shared.py").exists());
        assert!(prefix.join("lib/numpy/new.py").exists());
        assert!(!manifest_path(prefix, &old).exists());
        assert!(manifest_path(prefix, &new).exists());
    }

    #[test]
    fn manifest_removed_even_if_files_are_gone() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path();
        let dist = install(prefix, "six-1.10.0-py27_0", &["lib/six.py"]);
        fs::remove_file(prefix.join("lib/six.py")).unwrap();

        remove_dist(prefix, &dist, &HashSet::new());
        assert!(!manifest_path(prefix, &dist).exists());
    }

    #[test]
    fn unlink_keeps_files_shared_with_other_linked_dists() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path();
        let a = install(prefix, "a-1.0-0", &["bin/a", "share/common"]);
        install(prefix, "b-1.0-0", &["bin/b", "share/common"]);

        let config = Config::new(prefix);
        unlink_dist(&config, prefix, &a).unwrap();
        assert!(!prefix.join("bin/a").exists());
        assert!(prefix.join("share/common").exists());
        assert!(prefix.join("bin/b").exists());
        let remaining: Vec<Dist> = linked(prefix).unwrap().into_iter().collect();
        assert_eq!(remaining, dists(&["b-1.0-0"]));
    }

    #[test]
    fn unlink_of_unknown_dist_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());
        assert!(unlink_dist(&config, dir.path(), &Dist::new("nope-1-0")).is_err());
    }

    #[test]
    fn unreadable_keep_manifest_aborts_before_deleting() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path();
        let old = install(prefix, "numpy-1.11.0-py27_0", &["lib/numpy/old.py", "lib/shared.py"]);
        let keep = install(prefix, "numpy-1.12.1-py27_0", &["lib/shared.py"]);
        fs::write(manifest_path(prefix, &keep), "{\"files\": [").unwrap();

        let err = remove_dists(prefix, &[old.clone()], &[keep]).unwrap_err();
        assert!(matches!(err, LinkError::ParseError(..)));
        assert!(prefix.join("lib/shared.py").exists());
        assert!(prefix.join("lib/numpy/old.py").exists());
        assert!(manifest_path(prefix, &old).exists());
    }

    #[test]
    fn keep_manifest_with_only_files_protects_them() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path();
        let old = install(prefix, "numpy-1.11.0-py27_0", &["lib/numpy/old.py", "lib/shared.py"]);
        let keep = Dist::new("numpy-1.12.1-py27_0");
        fs::write(
            manifest_path(prefix, &keep),
            r#"{"files": ["lib/shared.py"], "link": null}"#,
        )
        .unwrap();

        let count = remove_dists(prefix, &[old], &[keep]).unwrap();
        assert_eq!(count, RemovalCount { removed: 1, failed: 0 });
        assert!(prefix.join("lib/shared.py").exists());
        assert!(!prefix.join("lib/numpy/old.py").exists());
    }

    #[test]
    fn partial_manifest_still_removes_its_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path();
        fs::create_dir_all(prefix.join("bin")).unwrap();
        fs::write(prefix.join("bin/x"), "").unwrap();
        let dist = Dist::new("x-1.0-0");
        fs::create_dir_all(meta_dir(prefix)).unwrap();
        fs::write(manifest_path(prefix, &dist), r#"{"files": ["bin/x"], "link": null}"#).unwrap();

        let count = remove_dist(prefix, &dist, &HashSet::new());
        assert_eq!(count, RemovalCount { removed: 1, failed: 0 });
        assert!(!prefix.join("bin/x").exists());
        assert!(!manifest_path(prefix, &dist).exists());
    }

    #[test]
    fn unlink_refuses_when_another_manifest_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path();
        let a = install(prefix, "a-1.0-0", &["bin/a", "share/common"]);
        let b = install(prefix, "b-1.0-0", &["bin/b", "share/common"]);
        fs::write(manifest_path(prefix, &b), "not json").unwrap();

        let config = Config::new(prefix);
        assert!(unlink_dist(&config, prefix, &a).is_err());
        assert!(prefix.join("share/common").exists());
        assert!(prefix.join("bin/a").exists());
        assert!(manifest_path(prefix, &a).exists());
    }
}

// envlink-core/src/check.rs
use std::path::Path;

use envlink_common::error::Result;
use envlink_common::model::Dist;
use tracing::debug;

use crate::fs::path_exists;
use crate::meta::read_manifest;

/// Result of checking a linked dist against its manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub checked: usize,
    pub missing: Vec<String>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Checks that every file listed in the manifest of `dist` is present in
/// `prefix`. Symlinks count as present even when dangling.
pub fn verify_dist(prefix: &Path, dist: &Dist) -> Result<VerifyReport> {
    let manifest = read_manifest(prefix, dist)?;
    let missing: Vec<String> = manifest
        .files
        .iter()
        .filter(|f| !path_exists(&prefix.join(f)))
        .cloned()
        .collect();
    debug!(
        "Verified {}: {} files, {} missing",
        dist,
        manifest.files.len(),
        missing.len()
    );
    Ok(VerifyReport {
        checked: manifest.files.len(),
        missing,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use envlink_common::model::{IndexRecord, LinkManifest, SourceInfo};

    use super::*;
    use crate::meta::create_meta;

    #[test]
    fn reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path();
        fs::create_dir_all(prefix.join("bin")).unwrap();
        fs::write(prefix.join("bin/tool"), "").unwrap();

        let dist = Dist::new("tool-1.0-0");
        let manifest = LinkManifest::new(
            IndexRecord {
                name: "tool".into(),
                version: "1.0".into(),
                build: "0".into(),
                extra: BTreeMap::new(),
            },
            vec!["bin/tool".into(), "share/tool/data".into()],
            None,
            SourceInfo::default(),
            "envlink-test",
        );
        create_meta(prefix, &dist, &manifest).unwrap();

        let report = verify_dist(prefix, &dist).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.missing, vec!["share/tool/data"]);
        assert!(!report.is_ok());
    }

    #[test]
    fn manifest_without_package_metadata_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path();
        let dist = Dist::new("x-1.0-0");
        fs::create_dir_all(envlink_common::config::meta_dir(prefix)).unwrap();
        fs::write(
            envlink_common::config::manifest_path(prefix, &dist),
            r#"{"files": ["bin/x"]}"#,
        )
        .unwrap();

        let report = verify_dist(prefix, &dist).unwrap();
        assert_eq!(report.missing, vec!["bin/x"]);
    }
}

// envlink-common/src/model/dist.rs
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical package identity, `name-version-build`. The name may itself
/// contain hyphens.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dist(String);

impl Dist {
    pub fn new(dist: impl Into<String>) -> Self {
        Self(dist.into())
    }

    pub fn from_parts(name: &str, version: &str, build: &str) -> Self {
        Self(format!("{name}-{version}-{build}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Package name: everything before the last two hyphen-delimited parts.
    pub fn name(&self) -> &str {
        self.0.rsplitn(3, '-').last().unwrap_or(&self.0)
    }

    /// File name of the archive this dist was unpacked from.
    pub fn archive_file_name(&self) -> String {
        format!("{}.tar.bz2", self.0)
    }
}

impl fmt::Display for Dist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Dist {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Dist {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Dist {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_drops_version_and_build() {
        assert_eq!(Dist::new("numpy-1.12.1-py27_0").name(), "numpy");
        assert_eq!(
            Dist::new("anaconda-navigator-1.6.2-py27_0").name(),
            "anaconda-navigator"
        );
        assert_eq!(Dist::new("_license-1.1-py27_1").name(), "_license");
    }

    #[test]
    fn name_of_short_identifiers() {
        assert_eq!(Dist::new("foo").name(), "foo");
        assert_eq!(Dist::new("foo-1").name(), "foo");
    }

    #[test]
    fn dists_order_lexicographically() {
        let mut dists = vec![
            Dist::new("numpy-1.12.1-py27_0"),
            Dist::new("numpy-1.11.0-py27_0"),
        ];
        dists.sort();
        assert_eq!(dists[0].as_str(), "numpy-1.11.0-py27_0");
    }
}

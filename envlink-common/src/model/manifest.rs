// envlink-common/src/model/manifest.rs
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dist::Dist;
use crate::error::Result;

/// How a file is materialized in the target prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    #[serde(rename = "hard-link")]
    Hard,
    #[serde(rename = "soft-link")]
    Soft,
    #[serde(rename = "copy")]
    Copy,
}

impl LinkType {
    pub fn label(self) -> &'static str {
        match self {
            LinkType::Hard => "hard-link",
            LinkType::Soft => "soft-link",
            LinkType::Copy => "copy",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the files of a linked dist came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSource {
    pub source: PathBuf,
    #[serde(rename = "type")]
    pub link_type: LinkType,
}

/// Download provenance of a dist's archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

/// Contents of a package's `info/index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub name: String,
    pub version: String,
    pub build: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl IndexRecord {
    pub fn dist(&self) -> Dist {
        Dist::from_parts(&self.name, &self.version, &self.build)
    }
}

/// Keys the engine owns in a manifest; an index.json entry with one of these
/// names never reaches `extra`.
const RESERVED_KEYS: [&str; 8] = [
    "name",
    "version",
    "build",
    "files",
    "link",
    "url",
    "md5",
    "installed_by",
];

/// Per-dist record written to `<prefix>/conda-meta/<dist>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub build: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub link: Option<LinkSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_by: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl LinkManifest {
    /// Merges a package's own metadata with what the linker knows about the
    /// install. Operational fields win over same-named index fields.
    pub fn new(
        index: IndexRecord,
        files: Vec<String>,
        link: Option<LinkSource>,
        source: SourceInfo,
        installed_by: &str,
    ) -> Self {
        let mut extra = index.extra;
        extra.retain(|k, _| !RESERVED_KEYS.contains(&k.as_str()));
        Self {
            name: index.name,
            version: index.version,
            build: index.build,
            files,
            link,
            url: source.url,
            md5: source.md5,
            installed_by: Some(installed_by.to_string()),
            extra,
        }
    }

    pub fn dist(&self) -> Dist {
        Dist::from_parts(&self.name, &self.version, &self.build)
    }

    /// Pretty-printed JSON with keys in sorted order, two-space indent.
    pub fn to_sorted_json(&self) -> Result<String> {
        // serde_json::Map is a BTreeMap without the preserve_order feature, so
        // going through Value sorts every object's keys.
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

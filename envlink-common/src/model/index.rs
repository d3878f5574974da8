// envlink-common/src/model/index.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dist::Dist;
use super::manifest::SourceInfo;
use crate::error::{LinkError, Result};

/// Precomputed download provenance for the dists an installer ships,
/// keyed by dist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistIndex(BTreeMap<Dist, SourceInfo>);

impl DistIndex {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading dist index from {}", path.display());
        let raw = fs::read_to_string(path).map_err(|e| LinkError::io_at("read", path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| LinkError::ParseError("dist index", format!("{}: {e}", path.display())))
    }

    pub fn get(&self, dist: &Dist) -> Option<&SourceInfo> {
        self.0.get(dist)
    }

    pub fn contains(&self, dist: &Dist) -> bool {
        self.0.contains_key(dist)
    }

    pub fn insert(&mut self, dist: Dist, info: SourceInfo) {
        self.0.insert(dist, info);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Declared environments: environment name to the ordered dists it must
/// contain. Iteration is in sorted name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvSpec(BTreeMap<String, Vec<Dist>>);

impl EnvSpec {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading environment declarations from {}", path.display());
        let raw = fs::read_to_string(path).map_err(|e| LinkError::io_at("read", path, e))?;
        serde_json::from_str(&raw).map_err(|e| {
            LinkError::ParseError("environment declarations", format!("{}: {e}", path.display()))
        })
    }

    pub fn insert(&mut self, env_name: impl Into<String>, dists: Vec<Dist>) {
        self.0.insert(env_name.into(), dists);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Dist])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

// envlink-common/src/model/prefix.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// Fake install path baked into packages at build time. Its byte length is
/// the longest real prefix a binary-mode rewrite can accept.
pub const PREFIX_PLACEHOLDER: &str = "/opt/anaconda1anaconda2anaconda3";

/// How a placeholder is rewritten inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixMode {
    /// Plain substring replacement; the file may change length.
    Text,
    /// NUL-padded replacement; the file keeps its exact length.
    Binary,
}

impl PrefixMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PrefixMode::Text => "text",
            PrefixMode::Binary => "binary",
        }
    }
}

impl fmt::Display for PrefixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrefixMode {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(PrefixMode::Text),
            "binary" => Ok(PrefixMode::Binary),
            other => Err(LinkError::InvalidPrefixMode(other.to_string())),
        }
    }
}

/// One `info/has_prefix` entry: the placeholder to look for and how to
/// replace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRecord {
    pub placeholder: String,
    pub mode: PrefixMode,
}

impl PrefixRecord {
    pub fn new(placeholder: impl Into<String>, mode: PrefixMode) -> Self {
        Self {
            placeholder: placeholder.into(),
            mode,
        }
    }

    /// Entry for a bare `has_prefix` line naming only a file.
    pub fn legacy() -> Self {
        Self::new(PREFIX_PLACEHOLDER, PrefixMode::Text)
    }
}

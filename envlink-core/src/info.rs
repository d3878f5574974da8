// envlink-core/src/info.rs
//! Readers for the `info/` metadata directory of an extracted package.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use envlink_common::error::{LinkError, Result};
use envlink_common::model::{IndexRecord, PrefixMode, PrefixRecord};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    /// Shell-style tokens; quoted tokens keep their quotes.
    static ref TOKEN_RE: Regex = Regex::new(r#""[^"]*"|'[^']*'|\S+"#).unwrap();
}

/// Handle on a package's `info/` directory.
#[derive(Debug, Clone)]
pub struct InfoDir {
    path: PathBuf,
}

impl InfoDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> Result<IndexRecord> {
        let path = self.path.join("index.json");
        let raw = fs::read_to_string(&path).map_err(|e| LinkError::io_at("read", &path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| LinkError::ParseError("index.json", format!("{}: {e}", path.display())))
    }

    /// Relative paths listed in `info/files`. The list is required.
    pub fn files(&self) -> Result<Vec<String>> {
        let path = self.path.join("files");
        yield_lines(&path).map_err(|e| LinkError::io_at("read", &path, e))
    }

    /// Files needing prefix rewriting. A missing `has_prefix` means none.
    pub fn has_prefix(&self) -> Result<BTreeMap<String, PrefixRecord>> {
        let path = self.path.join("has_prefix");
        match yield_lines(&path) {
            Ok(lines) => parse_has_prefix(&lines),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(LinkError::io_at("read", &path, e)),
        }
    }

    /// Union of `no_link` and `no_softlink`; missing files contribute
    /// nothing.
    pub fn no_link(&self) -> HashSet<String> {
        let mut res = HashSet::new();
        for name in ["no_link", "no_softlink"] {
            let path = self.path.join(name);
            match yield_lines(&path) {
                Ok(lines) => res.extend(lines),
                Err(e) => debug!("No {} list at {}: {}", name, path.display(), e),
            }
        }
        res
    }
}

/// Non-blank lines of a file, trimmed, with `#` comment lines dropped.
pub fn yield_lines(path: &Path) -> io::Result<Vec<String>> {
    let raw = fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Parses `has_prefix` lines of the form `placeholder mode path`. A line
/// that is not exactly three tokens names a file using the default
/// placeholder in text mode.
pub fn parse_has_prefix<S: AsRef<str>>(lines: &[S]) -> Result<BTreeMap<String, PrefixRecord>> {
    let mut res = BTreeMap::new();
    for line in lines {
        let line = line.as_ref();
        let tokens: Vec<&str> = TOKEN_RE
            .find_iter(line)
            .map(|m| m.as_str().trim_matches(|c| c == '"' || c == '\''))
            .collect();
        match tokens.as_slice() {
            [placeholder, mode, file] => {
                let mode: PrefixMode = mode.parse()?;
                res.insert(file.to_string(), PrefixRecord::new(*placeholder, mode));
            }
            _ => {
                res.insert(line.to_string(), PrefixRecord::legacy());
            }
        }
    }
    Ok(res)
}

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LinkError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Parsing Error in {0}: {1}")]
    ParseError(&'static str, String),

    /// The new prefix does not fit in the space the placeholder reserves in a
    /// binary file. `padding` is the (negative) number of bytes left over.
    #[error("Padding Error: placeholder '{placeholder}' cannot hold '{new_prefix}' (padding {padding})")]
    Padding {
        placeholder: String,
        new_prefix: String,
        padding: i64,
    },

    #[error("placeholder '{placeholder}' too short in: {dist} ({})", path.display())]
    PlaceholderTooShort {
        placeholder: String,
        dist: String,
        path: PathBuf,
    },

    #[error("Invalid mode: {0}")]
    InvalidPrefixMode(String),

    #[error("dst exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("{action} failed for: {dist}")]
    ScriptFailed { dist: String, action: String },

    #[error("max_tries={attempts} reached for {}", path.display())]
    RetriesExhausted { attempts: u32, path: PathBuf },

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl LinkError {
    /// Wraps an I/O error with the operation and path it failed on, keeping
    /// the original error kind.
    pub fn io_at(op: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        LinkError::Io(Arc::new(std::io::Error::new(
            err.kind(),
            format!("{op} {}: {err}", path.display()),
        )))
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        LinkError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures reading or writing `<name>.json.gz` cache files.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("cache file {} could not be decoded: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("could not encode cache file {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    pub(crate) fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            CacheError::NotFound { path }
        } else {
            CacheError::Io { path, source }
        }
    }
}

/// A record key or figure stem that does not have exactly five fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key '{key}' has {found} fields, expected 5")]
    FieldCount { key: String, found: usize },
}

/// Failures while switching the browsed source or building its panels.
#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("unknown source: {}", .0.display())]
    UnknownSource(PathBuf),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Key(#[from] KeyError),
}

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to stat target {path:?}: {source}")]
    Discovery {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no config file found on this path: {path:?} ({source})")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Error {
    /// Whether the config file simply does not exist, as opposed to being unreadable or malformed.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

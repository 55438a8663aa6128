//! Unified error handling for the relnodes crate
//!
//! Every fallible operation in the directory core returns [`Result`]. The
//! variants map one-to-one onto the outcomes the HTTP surface distinguishes:
//! validation failures, a missing catalog, and genuine storage trouble.
//! Filesystem outcomes that the design treats as success-equivalent
//! ("already exists" on directory creation, "not found" on marker removal)
//! never surface here.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the directory service
#[derive(Error, Debug)]
pub enum Error {
    /// Hostname failed `[0-9a-z.-]+` validation (or was a dot-prefixed
    /// name, which is reserved)
    #[error("invalid hostname {0:?}")]
    InvalidHostname(String),

    /// Query argument was neither a `Type[Title]` reference nor a bare type
    #[error("invalid resource query {0:?}")]
    InvalidQuery(String),

    /// Catalog document could not be decoded, including a document that
    /// lacks the resource collection
    #[error("malformed catalog: {0}")]
    MalformedCatalog(#[from] serde_yaml_ng::Error),

    /// No catalog is stored for the hostname
    #[error("no catalog stored for host {0:?}")]
    NotFound(String),

    /// Filesystem failure outside the tolerated no-op cases
    #[error("storage error at {}: {source}", .path.display())]
    StorageIo { path: PathBuf, source: io::Error },
}

impl Error {
    /// Wrap an I/O error with the path it occurred on.
    pub(crate) fn storage_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StorageIo {
            path: path.into(),
            source,
        }
    }

    /// True for malformed-input errors, the ones that map onto 400.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidHostname(_) | Self::InvalidQuery(_) | Self::MalformedCatalog(_)
        )
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

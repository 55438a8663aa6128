//! Per-host catalog document storage
//!
//! One opaque document per hostname under the `catalogs/` namespace. The
//! most recently stored document is the diff baseline for the host's next
//! ingest, so replacement is atomic: write to a dot-prefixed temp file in
//! the same directory, then rename over the target. Readers see either the
//! old document or the new one, never a partial write.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::Hostname;

/// Directory name of the catalog namespace under the data directory.
pub const CATALOGS_DIR: &str = "catalogs";

/// Filesystem-backed store of raw catalog documents, keyed by hostname.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    root: PathBuf,
}

impl CatalogStore {
    /// Open the store under `data_dir`, creating the namespace if missing.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let root = data_dir.join(CATALOGS_DIR);
        fs::create_dir_all(&root).map_err(|e| Error::storage_io(&root, e))?;
        Ok(Self { root })
    }

    /// Raw document for `host`, or `None` if nothing is stored.
    pub fn get(&self, host: &Hostname) -> Result<Option<Vec<u8>>> {
        let path = self.host_path(host);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage_io(&path, e)),
        }
    }

    /// Atomically replace the stored document for `host`.
    pub fn put(&self, host: &Hostname, document: &[u8]) -> Result<()> {
        let path = self.host_path(host);
        // Hostnames cannot start with a dot, so the temp name cannot
        // collide with another host's document.
        let tmp = self.root.join(format!(".{}.tmp", host.as_str()));
        fs::write(&tmp, document).map_err(|e| Error::storage_io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::storage_io(&path, e))?;
        tracing::debug!(host = %host, bytes = document.len(), "catalog stored");
        Ok(())
    }

    /// Remove the stored document for `host`; absence is a no-op.
    pub fn delete(&self, host: &Hostname) -> Result<()> {
        let path = self.host_path(host);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(host = %host, "catalog removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_io(&path, e)),
        }
    }

    fn host_path(&self, host: &Hostname) -> PathBuf {
        self.root.join(host.as_str())
    }
}

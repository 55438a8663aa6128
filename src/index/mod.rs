//! Sharded inverted index over the filesystem
//!
//! Maps an index key (a full `Type[Title]` reference or a bare type name)
//! to the set of hostnames currently declaring it. No global structure is
//! ever loaded into memory: a key is hashed to its SHA-256 hex digest, the
//! first two hex characters select the outer shard directory, the rest the
//! inner one, and each owning host is a zero-byte marker file inside.
//!
//! ```text
//! index/
//!   d2/
//!     0b586146...4c952e/
//!       web01.example.com     (empty file)
//!       web02.example.com
//! ```
//!
//! Lookup cost is one `readdir` regardless of how many keys exist, and an
//! absent shard directory simply means nobody declares the key.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::Hostname;

/// Directory name of the index namespace under the data directory.
pub const INDEX_DIR: &str = "index";

/// Filesystem-backed inverted index with two-level hash fan-out.
#[derive(Debug, Clone)]
pub struct ShardedIndex {
    root: PathBuf,
}

impl ShardedIndex {
    /// Open the index under `data_dir`, creating the namespace if missing.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let root = data_dir.join(INDEX_DIR);
        fs::create_dir_all(&root).map_err(|e| Error::storage_io(&root, e))?;
        Ok(Self { root })
    }

    /// Record that `host` declares `key`.
    ///
    /// Re-adding an existing marker is a no-op, so replays converge.
    pub fn add(&self, key: &str, host: &Hostname) -> Result<()> {
        let dir = self.shard_dir(key);
        fs::create_dir_all(&dir).map_err(|e| Error::storage_io(&dir, e))?;
        let marker = dir.join(host.as_str());
        fs::File::create(&marker).map_err(|e| Error::storage_io(&marker, e))?;
        tracing::debug!(key, host = %host, "indexed");
        Ok(())
    }

    /// Remove the record that `host` declares `key`.
    ///
    /// An already-absent marker is a no-op. Shard directories emptied by
    /// the removal are deleted best-effort, outer level after inner; a
    /// failure there (typically a concurrent writer re-populating the
    /// shard) is never surfaced.
    pub fn remove(&self, key: &str, host: &Hostname) -> Result<()> {
        let dir = self.shard_dir(key);
        let marker = dir.join(host.as_str());
        match fs::remove_file(&marker) {
            Ok(()) => tracing::debug!(key, host = %host, "unindexed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::storage_io(&marker, e)),
        }
        match fs::remove_dir(&dir) {
            Ok(()) => {
                if let Some(outer) = dir.parent() {
                    if let Err(e) = fs::remove_dir(outer) {
                        tracing::debug!(path = %outer.display(), error = %e, "kept fan-out level");
                    }
                }
            }
            Err(e) => tracing::debug!(path = %dir.display(), error = %e, "kept shard directory"),
        }
        Ok(())
    }

    /// Hostnames currently declaring `key`, sorted.
    ///
    /// An absent shard directory is an empty result, not an error.
    pub fn lookup(&self, key: &str) -> Result<Vec<Hostname>> {
        let dir = self.shard_dir(key);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage_io(&dir, e)),
        };
        let mut hosts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::storage_io(&dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            match name.parse::<Hostname>() {
                Ok(host) => hosts.push(host),
                // dot-prefixed temp files and other strays are not hosts
                Err(_) => tracing::debug!(key, entry = name, "skipping non-hostname shard entry"),
            }
        }
        hosts.sort();
        Ok(hosts)
    }

    /// Shard directory for a key: `<root>/<hh>/<rest of digest>`.
    fn shard_dir(&self, key: &str) -> PathBuf {
        let digest = key_digest(key);
        self.root.join(&digest[..2]).join(&digest[2..])
    }
}

/// Lowercase hex SHA-256 of an index key.
fn key_digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

//! Ingest, delete, and query orchestration
//!
//! [`ResourceDirectory`] owns the catalog store and the inverted index and
//! keeps them consistent. Index mutations always complete before the
//! stored catalog is swapped: a crash mid-update leaves the previous
//! catalog in place as the diff baseline, and the next ingest of the same
//! host converges the index back to a clean state because marker adds and
//! removes are idempotent.
//!
//! Writes to the same host are serialized through a per-host async lock;
//! writes to distinct hosts proceed in parallel. Queries take no locks at
//! all and observe each marker atomically.

pub mod diff;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::catalog::{CatalogDocument, ParameterMap};
use crate::error::{Error, Result};
use crate::index::ShardedIndex;
use crate::models::{Hostname, QueryKey};
use crate::store::CatalogStore;
use diff::CatalogDiff;

/// Per-host write locks.
///
/// Two updates for the same hostname must not interleave, or one of them
/// would diff against a baseline the other is replacing. The registry maps
/// hostnames to async mutexes and grows on demand; entries are never
/// reclaimed, which is fine for fleet-sized host counts.
#[derive(Debug, Default)]
struct HostLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl HostLocks {
    fn for_host(&self, host: &Hostname) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(host.as_str().to_string()).or_default().clone()
    }
}

/// The reverse-lookup directory: which hosts manage which resources.
#[derive(Debug)]
pub struct ResourceDirectory {
    store: CatalogStore,
    index: ShardedIndex,
    locks: HostLocks,
}

impl ResourceDirectory {
    /// Open the directory rooted at `data_dir`, creating the on-disk
    /// layout (`catalogs/` and `index/`) if missing.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let store = CatalogStore::open(data_dir)?;
        let index = ShardedIndex::open(data_dir)?;
        Ok(Self {
            store,
            index,
            locks: HostLocks::default(),
        })
    }

    /// Ingest a catalog document for `host`, replacing any previous one.
    ///
    /// The document is validated before anything is touched; a malformed
    /// upload changes no state. Index keys the old and new catalogs share
    /// are left alone.
    pub async fn ingest(&self, host: &Hostname, raw: &[u8]) -> Result<()> {
        let new = CatalogDocument::from_slice(raw)?;

        let lock = self.locks.for_host(host);
        let _guard = lock.lock().await;

        let old = self.load_baseline(host)?;
        let diff = CatalogDiff::between(old.as_ref(), &new);
        for key in diff.additions() {
            self.index.add(key, host)?;
        }
        for key in diff.removals() {
            self.index.remove(key, host)?;
        }
        self.store.put(host, raw)?;

        tracing::info!(
            host = %host,
            resources = new.resources.len(),
            added = diff.references.added.len() + diff.types.added.len(),
            removed = diff.references.removed.len() + diff.types.removed.len(),
            "catalog ingested"
        );
        Ok(())
    }

    /// Remove `host` from the directory: every index key it declares,
    /// then its stored catalog.
    ///
    /// Fails with [`Error::NotFound`] when no catalog is stored.
    pub async fn delete(&self, host: &Hostname) -> Result<()> {
        let lock = self.locks.for_host(host);
        let _guard = lock.lock().await;

        let raw = self
            .store
            .get(host)?
            .ok_or_else(|| Error::NotFound(host.to_string()))?;
        match CatalogDocument::from_slice(&raw) {
            Ok(doc) => {
                let references = doc.references();
                for key in &references {
                    self.index.remove(key, host)?;
                }
                let types = doc.types();
                for key in &types {
                    self.index.remove(key, host)?;
                }
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "stored catalog undecodable, removing document only");
            }
        }
        self.store.delete(host)?;
        tracing::info!(host = %host, "catalog deleted");
        Ok(())
    }

    /// Hostnames currently declaring `key`, sorted.
    pub fn lookup(&self, key: &QueryKey) -> Result<Vec<Hostname>> {
        self.index.lookup(&key.to_string())
    }

    /// Title-to-parameter mapping for every resource matching `key`,
    /// collected across all declaring hosts.
    ///
    /// Titles that occur on more than one matching host are qualified as
    /// `title:hostname` so no host's answer shadows another's; unique
    /// titles stay bare. Hosts whose stored catalog is missing or
    /// undecodable contribute nothing.
    pub fn collect_parameters(&self, key: &QueryKey) -> Result<BTreeMap<String, ParameterMap>> {
        let hosts = self.lookup(key)?;
        let mut entries: Vec<(String, Hostname, ParameterMap)> = Vec::new();
        for host in hosts {
            let Some(raw) = self.store.get(&host)? else {
                tracing::warn!(host = %host, key = %key, "indexed host has no stored catalog, skipping");
                continue;
            };
            let doc = match CatalogDocument::from_slice(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "stored catalog undecodable, skipping");
                    continue;
                }
            };
            match key {
                QueryKey::Reference(reference) => {
                    let wanted = reference.to_string();
                    if let Some(params) = doc.resources_by_key().remove(&wanted) {
                        entries.push((reference.title().to_string(), host.clone(), params));
                    }
                }
                QueryKey::Type(kind) => {
                    for resource in doc.resources.iter().filter(|r| r.kind == *kind) {
                        entries.push((resource.title.clone(), host.clone(), resource.query_parameters()));
                    }
                }
            }
        }

        // Qualify titles declared by more than one host.
        let mut owners: HashMap<&str, HashSet<&str>> = HashMap::new();
        for (title, host, _) in &entries {
            owners.entry(title.as_str()).or_default().insert(host.as_str());
        }
        let shared: HashSet<String> = owners
            .into_iter()
            .filter(|(_, hosts)| hosts.len() > 1)
            .map(|(title, _)| title.to_string())
            .collect();

        let mut result = BTreeMap::new();
        for (title, host, params) in entries {
            let entry_key = if shared.contains(&title) {
                format!("{title}:{host}")
            } else {
                title
            };
            result.insert(entry_key, params);
        }
        Ok(result)
    }

    /// Previous catalog for diffing. Absent or undecodable documents are
    /// an empty baseline; an undecodable one self-heals on this ingest.
    fn load_baseline(&self, host: &Hostname) -> Result<Option<CatalogDocument>> {
        let Some(raw) = self.store.get(host)? else {
            return Ok(None);
        };
        match CatalogDocument::from_slice(&raw) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "stored catalog undecodable, diffing against empty baseline");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn host(name: &str) -> Hostname {
        name.parse().unwrap()
    }

    fn key(s: &str) -> QueryKey {
        s.parse().unwrap()
    }

    fn names(hosts: &[Hostname]) -> Vec<&str> {
        hosts.iter().map(Hostname::as_str).collect()
    }

    #[tokio::test]
    async fn test_ingest_indexes_references_and_types() {
        let dir = tempdir().unwrap();
        let directory = ResourceDirectory::open(dir.path()).unwrap();
        let a = host("a");

        directory
            .ingest(&a, b"resources:\n  - type: File\n    title: /etc/passwd\n")
            .await
            .unwrap();

        assert_eq!(names(&directory.lookup(&key("File[/etc/passwd]")).unwrap()), ["a"]);
        assert_eq!(names(&directory.lookup(&key("File")).unwrap()), ["a"]);
        assert!(directory.lookup(&key("Package")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_ingest_changes_nothing() {
        let dir = tempdir().unwrap();
        let directory = ResourceDirectory::open(dir.path()).unwrap();
        let a = host("a");

        directory
            .ingest(&a, b"resources:\n  - type: File\n    title: /x\n")
            .await
            .unwrap();
        let err = directory.ingest(&a, b"not: [valid").await.unwrap_err();
        assert!(matches!(err, Error::MalformedCatalog(_)));

        // previous state survives intact
        assert_eq!(names(&directory.lookup(&key("File[/x]")).unwrap()), ["a"]);
    }

    #[tokio::test]
    async fn test_replacement_removes_stale_keys() {
        let dir = tempdir().unwrap();
        let directory = ResourceDirectory::open(dir.path()).unwrap();
        let a = host("a");

        directory
            .ingest(&a, b"resources:\n  - type: File\n    title: /old\n")
            .await
            .unwrap();
        directory
            .ingest(&a, b"resources:\n  - type: Package\n    title: nginx\n")
            .await
            .unwrap();

        assert!(directory.lookup(&key("File[/old]")).unwrap().is_empty());
        assert!(directory.lookup(&key("File")).unwrap().is_empty());
        assert_eq!(names(&directory.lookup(&key("Package[nginx]")).unwrap()), ["a"]);
    }

    #[tokio::test]
    async fn test_delete_unknown_host_is_not_found() {
        let dir = tempdir().unwrap();
        let directory = ResourceDirectory::open(dir.path()).unwrap();
        let err = directory.delete(&host("ghost")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_clears_every_key_of_the_host() {
        let dir = tempdir().unwrap();
        let directory = ResourceDirectory::open(dir.path()).unwrap();
        let (a, b) = (host("a"), host("b"));
        let doc = b"resources:\n  - type: Package\n    title: nginx\n";

        directory.ingest(&a, doc).await.unwrap();
        directory.ingest(&b, doc).await.unwrap();
        directory.delete(&a).await.unwrap();

        assert_eq!(names(&directory.lookup(&key("Package[nginx]")).unwrap()), ["b"]);
        assert_eq!(names(&directory.lookup(&key("Package")).unwrap()), ["b"]);
    }

    #[tokio::test]
    async fn test_parameters_for_reference_query() {
        let dir = tempdir().unwrap();
        let directory = ResourceDirectory::open(dir.path()).unwrap();
        directory
            .ingest(
                &host("a"),
                b"resources:
  - type: Package
    title: nginx
    parameters:
      ensure: latest
      name: nginx
",
            )
            .await
            .unwrap();

        let params = directory.collect_parameters(&key("Package[nginx]")).unwrap();
        assert_eq!(params.len(), 1);
        let nginx = &params["nginx"];
        assert_eq!(
            nginx.get("ensure"),
            Some(&serde_yaml_ng::Value::String("latest".to_string()))
        );
        assert!(nginx.get("name").is_none());
    }

    #[tokio::test]
    async fn test_colliding_titles_are_qualified_with_hostname() {
        let dir = tempdir().unwrap();
        let directory = ResourceDirectory::open(dir.path()).unwrap();
        let doc = b"resources:\n  - type: Package\n    title: nginx\n";
        directory.ingest(&host("a"), doc).await.unwrap();
        directory.ingest(&host("b"), doc).await.unwrap();

        let params = directory.collect_parameters(&key("Package[nginx]")).unwrap();
        let titles: Vec<&String> = params.keys().collect();
        assert_eq!(titles, ["nginx:a", "nginx:b"]);
    }

    #[tokio::test]
    async fn test_type_query_collects_all_titles() {
        let dir = tempdir().unwrap();
        let directory = ResourceDirectory::open(dir.path()).unwrap();
        directory
            .ingest(
                &host("a"),
                b"resources:
  - type: File
    title: /etc/motd
  - type: File
    title: /etc/issue
  - type: Package
    title: vim
",
            )
            .await
            .unwrap();

        let params = directory.collect_parameters(&key("File")).unwrap();
        let titles: Vec<&String> = params.keys().collect();
        assert_eq!(titles, ["/etc/issue", "/etc/motd"]);
    }

    #[tokio::test]
    async fn test_unindexed_parameter_query_is_empty() {
        let dir = tempdir().unwrap();
        let directory = ResourceDirectory::open(dir.path()).unwrap();
        assert!(directory
            .collect_parameters(&key("Service[sshd]"))
            .unwrap()
            .is_empty());
    }
}

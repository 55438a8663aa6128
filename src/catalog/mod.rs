//! Catalog document decoding and extraction
//!
//! A catalog is the compiled set of managed resources for one host,
//! uploaded as a YAML document. The store keeps the raw bytes untouched;
//! this module decodes them and extracts the three projections the rest of
//! the service works with: the reference set, the type set, and the
//! per-reference parameter maps.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;

/// Arbitrary resource parameters, keyed by parameter name.
pub type ParameterMap = BTreeMap<String, serde_yaml_ng::Value>;

/// One managed resource inside a catalog document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type, e.g. `File`
    #[serde(rename = "type")]
    pub kind: String,

    /// Resource title, e.g. `/etc/passwd`
    pub title: String,

    /// Explicit reference; synthesized as `Type[Title]` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Resource parameters as compiled
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: ParameterMap,
}

impl Resource {
    /// The reference key identifying this resource in the index.
    pub fn key(&self) -> String {
        match &self.reference {
            Some(reference) => reference.clone(),
            None => format!("{}[{}]", self.kind, self.title),
        }
    }

    /// Parameters as served to queries, with the `name` and `title`
    /// entries stripped (they duplicate the reference itself).
    pub fn query_parameters(&self) -> ParameterMap {
        let mut params = self.parameters.clone();
        params.remove("name");
        params.remove("title");
        params
    }
}

/// A decoded catalog document.
///
/// Only the resource collection matters to the service; any other
/// top-level fields in the incoming document are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    /// Resources as compiled, in document order
    pub resources: Vec<Resource>,
}

impl CatalogDocument {
    /// Decode a catalog from raw YAML bytes.
    ///
    /// Fails with [`Error::MalformedCatalog`](crate::error::Error) on any
    /// decode failure, including a document without a `resources`
    /// collection.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_yaml_ng::from_slice(bytes)?)
    }

    /// Every resource reference declared by this catalog.
    pub fn references(&self) -> BTreeSet<String> {
        self.resources.iter().map(Resource::key).collect()
    }

    /// Every distinct resource type declared by this catalog.
    pub fn types(&self) -> BTreeSet<String> {
        self.resources.iter().map(|r| r.kind.clone()).collect()
    }

    /// Query parameters per reference key. The first declaration of a
    /// duplicated key wins.
    pub fn resources_by_key(&self) -> BTreeMap<String, ParameterMap> {
        let mut map = BTreeMap::new();
        for resource in &self.resources {
            map.entry(resource.key())
                .or_insert_with(|| resource.query_parameters());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
resources:
  - type: File
    title: /etc/passwd
    parameters:
      owner: root
      mode: \"0644\"
  - type: Package
    title: nginx
  - type: File
    title: /etc/motd
";

    #[test]
    fn test_decode_extracts_references_and_types() {
        let doc = CatalogDocument::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(doc.resources.len(), 3);
        assert_eq!(
            doc.references(),
            BTreeSet::from([
                "File[/etc/passwd]".to_string(),
                "File[/etc/motd]".to_string(),
                "Package[nginx]".to_string(),
            ])
        );
        // types collapse duplicates
        assert_eq!(
            doc.types(),
            BTreeSet::from(["File".to_string(), "Package".to_string()])
        );
    }

    #[test]
    fn test_explicit_reference_overrides_synthesized_key() {
        let doc = CatalogDocument::from_slice(
            b"resources:\n  - type: File\n    title: motd\n    reference: \"File[/etc/motd]\"\n",
        )
        .unwrap();
        assert_eq!(doc.resources[0].key(), "File[/etc/motd]");
        assert_eq!(
            doc.references(),
            BTreeSet::from(["File[/etc/motd]".to_string()])
        );
    }

    #[test]
    fn test_query_parameters_strip_name_and_title() {
        let doc = CatalogDocument::from_slice(
            b"resources:
  - type: Package
    title: nginx
    parameters:
      name: nginx
      title: nginx
      ensure: latest
",
        )
        .unwrap();
        let params = doc.resources[0].query_parameters();
        assert_eq!(params.len(), 1);
        assert_eq!(
            params.get("ensure"),
            Some(&serde_yaml_ng::Value::String("latest".to_string()))
        );
        // the stored resource keeps its full parameter map
        assert_eq!(doc.resources[0].parameters.len(), 3);
    }

    #[test]
    fn test_resources_by_key_first_declaration_wins() {
        let doc = CatalogDocument::from_slice(
            b"resources:
  - type: Package
    title: nginx
    parameters:
      ensure: latest
  - type: Package
    title: nginx
    parameters:
      ensure: absent
  - type: Service
    title: nginx
",
        )
        .unwrap();
        let by_key = doc.resources_by_key();
        assert_eq!(by_key.len(), 2);
        assert_eq!(
            by_key["Package[nginx]"].get("ensure"),
            Some(&serde_yaml_ng::Value::String("latest".to_string()))
        );
        assert!(by_key["Service[nginx]"].is_empty());
    }

    #[test]
    fn test_empty_resource_list_is_valid() {
        let doc = CatalogDocument::from_slice(b"resources: []\n").unwrap();
        assert!(doc.references().is_empty());
        assert!(doc.types().is_empty());
        assert!(doc.resources_by_key().is_empty());
    }

    #[test]
    fn test_missing_resource_collection_is_malformed() {
        assert!(CatalogDocument::from_slice(b"classes:\n  - base\n").is_err());
        assert!(CatalogDocument::from_slice(b"").is_err());
        assert!(CatalogDocument::from_slice(b"not: [valid").is_err());
    }

    #[test]
    fn test_resource_without_title_is_malformed() {
        assert!(CatalogDocument::from_slice(b"resources:\n  - type: File\n").is_err());
    }
}

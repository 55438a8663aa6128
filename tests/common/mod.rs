//! Common test utilities

use std::collections::BTreeMap;

use relnodes::catalog::{CatalogDocument, Resource};

/// Create a resource with no parameters
pub fn resource(kind: &str, title: &str) -> Resource {
    Resource {
        kind: kind.to_string(),
        title: title.to_string(),
        reference: None,
        parameters: BTreeMap::new(),
    }
}

/// Create a resource with string-valued parameters
#[allow(dead_code)]
pub fn resource_with_params(kind: &str, title: &str, params: &[(&str, &str)]) -> Resource {
    Resource {
        kind: kind.to_string(),
        title: title.to_string(),
        reference: None,
        parameters: params
            .iter()
            .map(|(k, v)| {
                (
                    (*k).to_string(),
                    serde_yaml_ng::Value::String((*v).to_string()),
                )
            })
            .collect(),
    }
}

/// Serialize resources into catalog document bytes
pub fn catalog(resources: Vec<Resource>) -> Vec<u8> {
    let doc = CatalogDocument { resources };
    serde_yaml_ng::to_string(&doc).unwrap().into_bytes()
}

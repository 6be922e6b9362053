//! Unstructured descriptors for generated, not-yet-applied child resources.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::{Metadata, ObjectKey, TypeRef};

/// A generated child-resource descriptor.
///
/// Carries typed apiVersion/kind/metadata and keeps everything else
/// (`spec`, `data`, `status`, ...) as unstructured JSON, mirroring how the
/// external store represents objects. Identity is kind + namespace + name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl Descriptor {
    /// Create an empty descriptor with identity fields filled in.
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            metadata: Metadata::named(name, namespace),
            content: Map::new(),
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Attach an annotation.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    /// Set a top-level content field such as `spec` or `data`.
    pub fn with_content(mut self, key: impl Into<String>, value: Value) -> Self {
        self.content.insert(key.into(), value);
        self
    }

    /// The resource-type identity of this descriptor.
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::from_api_version(&self.api_version, self.kind.clone())
    }

    /// The store address of this descriptor.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(
            self.type_ref(),
            self.metadata.namespace.clone(),
            self.metadata.name.clone(),
        )
    }

    /// Decode the descriptor into a typed resource.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let value = serde_json::to_value(self).map_err(Error::encode_failed)?;
        serde_json::from_value(value).map_err(Error::encode_failed)
    }

    /// Encode a typed resource into a descriptor.
    pub fn encode<T: Serialize>(resource: &T) -> Result<Self> {
        let value = serde_json::to_value(resource).map_err(Error::encode_failed)?;
        serde_json::from_value(value).map_err(Error::encode_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PocketValidator;
    use serde_json::json;

    #[test]
    fn test_content_is_flattened() {
        let descriptor = Descriptor::new("v1", "Service", "web", "default")
            .with_content("spec", json!({"clusterIP": "None"}));

        let value = serde_json::to_value(&descriptor).ok();
        assert_eq!(
            value.as_ref().and_then(|v| v.pointer("/spec/clusterIP")),
            Some(&json!("None"))
        );
        assert_eq!(
            value.as_ref().and_then(|v| v.pointer("/apiVersion")),
            Some(&json!("v1"))
        );
    }

    #[test]
    fn test_typed_round_trip() {
        let workload = PocketValidator::new("v1-validator1", "default");
        let descriptor = Descriptor::encode(&workload).ok();
        assert!(descriptor.is_some());

        let decoded: Option<PocketValidator> = descriptor.as_ref().and_then(|d| d.decode().ok());
        assert_eq!(decoded.as_ref(), Some(&workload));
    }

    #[test]
    fn test_key_uses_identity_fields() {
        let descriptor = Descriptor::new("apps/v1", "StatefulSet", "node-0", "pocketset-sample");
        let key = descriptor.key();
        assert_eq!(key.name, "node-0");
        assert_eq!(key.namespace, "pocketset-sample");
        assert_eq!(key.type_ref, TypeRef::new("StatefulSet", "apps", "v1"));
    }
}

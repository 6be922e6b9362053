//! Identity types, object metadata, and the workload/collection data model.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API group for the Pocket node resource types.
pub const NODES_GROUP: &str = "nodes.pokt.network";

/// API version for the Pocket node resource types.
pub const NODES_VERSION: &str = "v1alpha1";

/// Resource-type identity: the (kind, group, version) triple.
///
/// Equality over all three fields is the key used for watch deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    /// Object kind, e.g. `Service`.
    pub kind: String,
    /// API group; empty for the core group.
    pub group: String,
    /// API version, e.g. `v1alpha1`.
    pub version: String,
}

impl TypeRef {
    /// Create a resource-type identity.
    pub fn new(kind: impl Into<String>, group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            group: group.into(),
            version: version.into(),
        }
    }

    /// Create a core-group resource-type identity.
    pub fn core(kind: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(kind, "", version)
    }

    /// Render the `apiVersion` wire form: `group/version`, or bare version
    /// for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Parse a resource-type identity from an `apiVersion` string and a kind.
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(kind, group, version),
            None => Self::core(kind, api_version),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}.{}", self.kind, self.version)
        } else {
            write!(f, "{}.{}/{}", self.kind, self.group, self.version)
        }
    }
}

/// Reference to a collection by name and namespace.
///
/// An empty name means "discover the singleton collection".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectRef {
    pub name: String,
    pub namespace: String,
}

impl ObjectRef {
    /// Create a reference to a named object.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Whether this reference selects nothing (singleton discovery).
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Store address of a single object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub type_ref: TypeRef,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Create an object key.
    pub fn new(type_ref: TypeRef, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_ref,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.namespace, self.name, self.type_ref)
    }
}

/// Object metadata shared by all resource kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Create metadata with a name and namespace.
    pub fn named(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }
}

/// Selector for a single key inside a named secret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretKeySelector {
    pub name: String,
    pub key: String,
}

/// Indirection wrapper matching the CRD wire form (`secretKeyRef`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretSource {
    pub secret_key_ref: SecretKeySelector,
}

/// Validator node port configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSpec {
    pub consensus: u16,
    pub rpc: u16,
}

impl Default for PortSpec {
    fn default() -> Self {
        Self {
            consensus: 8080,
            rpc: 50832,
        }
    }
}

/// Postgres connection parameters for the validator node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostgresSpec {
    pub user: SecretSource,
    pub password: SecretSource,
    pub host: String,
    pub port: String,
    pub database: String,
    /// Schema name; an empty value defaults to the workload name.
    pub schema: String,
}

impl Default for PostgresSpec {
    fn default() -> Self {
        Self {
            user: SecretSource::default(),
            password: SecretSource::default(),
            host: String::new(),
            port: "5432".to_string(),
            database: "validatordb".to_string(),
            schema: String::new(),
        }
    }
}

/// Declared configuration of a validator node workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PocketValidatorSpec {
    /// Explicit collection reference; `None` (or an empty name) means the
    /// singleton collection is discovered at reconcile time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<ObjectRef>,
    pub prometheus_scrape: bool,
    pub pocket_image: String,
    pub ports: PortSpec,
    pub private_key: SecretSource,
    pub postgres: PostgresSpec,
}

/// The validator node workload resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PocketValidator {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: PocketValidatorSpec,
}

impl PocketValidator {
    /// Create an empty workload with the canonical apiVersion and kind.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            api_version: Self::workload_type().api_version(),
            kind: Self::workload_type().kind,
            metadata: Metadata::named(name, namespace),
            spec: PocketValidatorSpec::default(),
        }
    }

    /// The resource-type identity of the workload kind.
    pub fn workload_type() -> TypeRef {
        TypeRef::new("PocketValidator", NODES_GROUP, NODES_VERSION)
    }
}

/// The collection resource grouping validator workloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PocketSet {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
}

impl PocketSet {
    /// Create an empty collection with the canonical apiVersion and kind.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            api_version: Self::collection_type().api_version(),
            kind: Self::collection_type().kind,
            metadata: Metadata::named(name, namespace),
        }
    }

    /// The resource-type identity of the collection kind.
    pub fn collection_type() -> TypeRef {
        TypeRef::new("PocketSet", NODES_GROUP, NODES_VERSION)
    }
}

/// Capability interface implemented by each concrete workload kind.
///
/// Replaces runtime type dispatch between workload variants: callers that
/// only need identity, collection membership, or deletion state work
/// against this trait.
pub trait Workload {
    /// The resource-type identity of this workload.
    fn type_ref(&self) -> TypeRef;

    /// The store address of this workload.
    fn key(&self) -> ObjectKey;

    /// The explicit collection reference, if one was declared.
    fn collection_ref(&self) -> Option<&ObjectRef>;

    /// Whether the workload has been marked for deletion.
    fn marked_for_deletion(&self) -> bool;

    /// Finalizers currently attached to the workload.
    fn finalizers(&self) -> &[String];
}

impl Workload for PocketValidator {
    fn type_ref(&self) -> TypeRef {
        Self::workload_type()
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(
            Self::workload_type(),
            self.metadata.namespace.clone(),
            self.metadata.name.clone(),
        )
    }

    fn collection_ref(&self) -> Option<&ObjectRef> {
        self.spec.collection.as_ref().filter(|r| !r.is_empty())
    }

    fn marked_for_deletion(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    fn finalizers(&self) -> &[String] {
        &self.metadata.finalizers
    }
}

/// Capability interface implemented by each concrete collection kind.
pub trait Collection {
    /// The resource-type identity of this collection.
    fn type_ref(&self) -> TypeRef;

    /// The store address of this collection.
    fn key(&self) -> ObjectKey;
}

impl Collection for PocketSet {
    fn type_ref(&self) -> TypeRef {
        Self::collection_type()
    }

    fn key(&self) -> ObjectKey {
        ObjectKey::new(
            Self::collection_type(),
            self.metadata.namespace.clone(),
            self.metadata.name.clone(),
        )
    }
}

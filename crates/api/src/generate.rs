//! Ordered generator pipeline producing child-resource descriptors.
//!
//! Each generator is a pure function over the (workload, collection) pair;
//! the pipeline runs them in a fixed order and fails fast on the first
//! error, returning no partial descriptor set. Collisions by identity are a
//! logic defect surfaced at apply time, so the pipeline never reorders or
//! deduplicates.

use serde_json::json;

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::types::{PocketSet, PocketValidator};

/// Label key marking every generated resource.
pub const PURPOSE_LABEL: &str = "v1-purpose";

/// Label value for validator-owned resources.
pub const PURPOSE_VALIDATOR: &str = "validator";

/// Pre-P2P gossip port exposed by the validators service.
pub const PRE2P_PORT: u16 = 8221;

/// P2P port exposed by the validators service.
pub const P2P_PORT: u16 = 8222;

/// A single generator contributing zero or more descriptors.
pub type Generator = fn(&PocketValidator, &PocketSet) -> Result<Vec<Descriptor>>;

/// The generator pipeline, in execution order.
pub const GENERATORS: &[Generator] = &[
    stateful_set,
    validators_service,
    node_config,
    scrape_config,
];

/// Run the full pipeline for a workload and its collection.
pub fn generate(workload: &PocketValidator, collection: &PocketSet) -> Result<Vec<Descriptor>> {
    let mut descriptors = Vec::new();

    for generator in GENERATORS {
        descriptors.extend(generator(workload, collection)?);
    }

    Ok(descriptors)
}

fn child_name(workload: &PocketValidator, collection: &PocketSet) -> String {
    format!("{}-{}", collection.metadata.name, workload.metadata.name)
}

/// Scheme used by every generated child: resources land in a namespace named
/// after the collection.
fn child_namespace(collection: &PocketSet) -> String {
    collection.metadata.name.clone()
}

fn schema_name(workload: &PocketValidator) -> String {
    if workload.spec.postgres.schema.is_empty() {
        workload.metadata.name.clone()
    } else {
        workload.spec.postgres.schema.clone()
    }
}

/// StatefulSet running the validator node container.
pub fn stateful_set(
    workload: &PocketValidator,
    collection: &PocketSet,
) -> Result<Vec<Descriptor>> {
    if workload.spec.pocket_image.is_empty() {
        return Err(Error::missing_field("spec.pocketImage"));
    }

    let name = child_name(workload, collection);
    let postgres = &workload.spec.postgres;

    let spec = json!({
        "replicas": 1,
        "serviceName": format!("{}-validators", collection.metadata.name),
        "selector": {
            "matchLabels": {
                "app": name,
                (PURPOSE_LABEL): PURPOSE_VALIDATOR,
            },
        },
        "template": {
            "metadata": {
                "labels": {
                    "app": name,
                    (PURPOSE_LABEL): PURPOSE_VALIDATOR,
                },
            },
            "spec": {
                "containers": [{
                    "name": "pocket",
                    "image": workload.spec.pocket_image,
                    "ports": [
                        {"containerPort": workload.spec.ports.consensus, "name": "consensus"},
                        {"containerPort": workload.spec.ports.rpc, "name": "rpc"},
                    ],
                    "env": [
                        {
                            "name": "POCKET_PRIVATE_KEY",
                            "valueFrom": {"secretKeyRef": {
                                "name": workload.spec.private_key.secret_key_ref.name,
                                "key": workload.spec.private_key.secret_key_ref.key,
                            }},
                        },
                        {
                            "name": "POSTGRES_USER",
                            "valueFrom": {"secretKeyRef": {
                                "name": postgres.user.secret_key_ref.name,
                                "key": postgres.user.secret_key_ref.key,
                            }},
                        },
                        {
                            "name": "POSTGRES_PASSWORD",
                            "valueFrom": {"secretKeyRef": {
                                "name": postgres.password.secret_key_ref.name,
                                "key": postgres.password.secret_key_ref.key,
                            }},
                        },
                        {"name": "POSTGRES_HOST", "value": postgres.host},
                        {"name": "POSTGRES_PORT", "value": postgres.port},
                        {"name": "POSTGRES_DB", "value": postgres.database},
                        {"name": "POSTGRES_SCHEMA", "value": schema_name(workload)},
                    ],
                }],
            },
        },
    });

    Ok(vec![Descriptor::new(
        "apps/v1",
        "StatefulSet",
        name,
        child_namespace(collection),
    )
    .with_label("app", child_name(workload, collection))
    .with_label(PURPOSE_LABEL, PURPOSE_VALIDATOR)
    .with_content("spec", spec)])
}

/// Headless service exposing the validator gossip ports for the whole
/// collection.
pub fn validators_service(
    _workload: &PocketValidator,
    collection: &PocketSet,
) -> Result<Vec<Descriptor>> {
    let spec = json!({
        "ports": [
            {"port": PRE2P_PORT, "name": "pre2p"},
            {"port": P2P_PORT, "name": "p2p"},
        ],
        "clusterIP": "None",
        "selector": {
            (PURPOSE_LABEL): PURPOSE_VALIDATOR,
        },
    });

    Ok(vec![Descriptor::new(
        "v1",
        "Service",
        format!("{}-validators", collection.metadata.name),
        child_namespace(collection),
    )
    .with_content("spec", spec)])
}

/// ConfigMap carrying the node configuration.
pub fn node_config(workload: &PocketValidator, collection: &PocketSet) -> Result<Vec<Descriptor>> {
    let postgres = &workload.spec.postgres;

    let data = json!({
        "consensus_port": workload.spec.ports.consensus.to_string(),
        "rpc_port": workload.spec.ports.rpc.to_string(),
        "postgres_host": postgres.host,
        "postgres_port": postgres.port,
        "postgres_database": postgres.database,
        "postgres_schema": schema_name(workload),
    });

    Ok(vec![Descriptor::new(
        "v1",
        "ConfigMap",
        format!("{}-config", child_name(workload, collection)),
        child_namespace(collection),
    )
    .with_label(PURPOSE_LABEL, PURPOSE_VALIDATOR)
    .with_content("data", data)])
}

/// ConfigMap with Prometheus scrape parameters.
///
/// Emitted unconditionally; the mutation chain excludes it when scraping is
/// disabled on the workload.
pub fn scrape_config(
    workload: &PocketValidator,
    collection: &PocketSet,
) -> Result<Vec<Descriptor>> {
    let data = json!({
        "scrape_path": "/metrics",
        "scrape_port": workload.spec.ports.rpc.to_string(),
        "scrape_target": child_name(workload, collection),
    });

    Ok(vec![Descriptor::new(
        "v1",
        "ConfigMap",
        format!("{}-scrape", child_name(workload, collection)),
        child_namespace(collection),
    )
    .with_label(PURPOSE_LABEL, PURPOSE_VALIDATOR)
    .with_content("data", data)])
}

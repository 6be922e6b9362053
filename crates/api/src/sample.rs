//! Sample manifests for the custom resource types.

/// Sample validator workload containing all fields.
const POCKET_VALIDATOR_SAMPLE: &str = r#"apiVersion: nodes.pokt.network/v1alpha1
kind: PocketValidator
metadata:
  name: pocketvalidator-sample
spec:
  #collection:
    #name: "pocketset-sample"
    #namespace: ""
  prometheusScrape: false
  pocketImage: "ghcr.io/pokt-network/pocket-v1:main-dev"
  ports:
    consensus: 8080
    rpc: 50832
  privateKey:
    secretKeyRef:
      name: "v1-validator1"
      key: "private_key"
  postgres:
    user:
      secretKeyRef:
        name: "postgres-credentials"
        key: "username"
    password:
      secretKeyRef:
        name: "postgres-credentials"
        key: "postgres-password"
    host: "postgres-host"
    port: "5432"
    database: "validatordb"
    schema: "v1-validator1"
"#;

/// Sample validator workload containing only required fields.
const POCKET_VALIDATOR_SAMPLE_REQUIRED: &str = r#"apiVersion: nodes.pokt.network/v1alpha1
kind: PocketValidator
metadata:
  name: pocketvalidator-sample
spec:
  #collection:
    #name: "pocketset-sample"
    #namespace: ""
  pocketImage: "ghcr.io/pokt-network/pocket-v1:main-dev"
  privateKey:
    secretKeyRef:
      name: "v1-validator1"
      key: "private_key"
  postgres:
    user:
      secretKeyRef:
        name: "postgres-credentials"
        key: "username"
    password:
      secretKeyRef:
        name: "postgres-credentials"
        key: "postgres-password"
    host: "postgres-host"
    port: "5432"
"#;

/// Sample collection manifest.
const POCKET_SET_SAMPLE: &str = r#"apiVersion: nodes.pokt.network/v1alpha1
kind: PocketSet
metadata:
  name: pocketset-sample
"#;

/// Return the sample workload manifest.
pub fn validator_sample(required_only: bool) -> &'static str {
    if required_only {
        POCKET_VALIDATOR_SAMPLE_REQUIRED
    } else {
        POCKET_VALIDATOR_SAMPLE
    }
}

/// Return the sample collection manifest.
pub fn set_sample() -> &'static str {
    POCKET_SET_SAMPLE
}

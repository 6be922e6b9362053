//! Offline generation entry point.
//!
//! Accepts workload and collection manifests as YAML text and runs the same
//! validation, generation, and mutation path as the live controller, with no
//! store connection. Output for identical inputs is identical to the live
//! path by construction.

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::generate::generate;
use crate::mutate::apply_mutations;
use crate::types::{PocketSet, PocketValidator};

/// Validate a workload resource.
pub fn validate_workload(workload: &PocketValidator) -> Result<()> {
    if workload.metadata.name.is_empty() {
        return Err(Error::missing_field("metadata.name"));
    }

    if !workload.kind.is_empty() && workload.kind != PocketValidator::workload_type().kind {
        return Err(Error::invalid_workload(
            &workload.metadata.name,
            format!("unexpected kind '{}'", workload.kind),
        ));
    }

    if workload.spec.pocket_image.is_empty() {
        return Err(Error::invalid_workload(
            &workload.metadata.name,
            "spec.pocketImage must not be empty",
        ));
    }

    if workload.spec.ports.consensus == 0 || workload.spec.ports.rpc == 0 {
        return Err(Error::invalid_workload(
            &workload.metadata.name,
            "spec.ports must be non-zero",
        ));
    }

    Ok(())
}

/// Validate a collection resource.
pub fn validate_collection(collection: &PocketSet) -> Result<()> {
    if collection.metadata.name.is_empty() {
        return Err(Error::missing_field("metadata.name"));
    }

    if !collection.kind.is_empty() && collection.kind != PocketSet::collection_type().kind {
        return Err(Error::invalid_collection(
            &collection.metadata.name,
            format!("unexpected kind '{}'", collection.kind),
        ));
    }

    Ok(())
}

/// Generate the child descriptor set from manifest text.
pub fn generate_from_manifests(
    workload_yaml: &str,
    collection_yaml: &str,
) -> Result<Vec<Descriptor>> {
    let workload: PocketValidator =
        serde_yaml::from_str(workload_yaml).map_err(Error::yaml_parse_failed)?;
    validate_workload(&workload)?;

    let collection: PocketSet =
        serde_yaml::from_str(collection_yaml).map_err(Error::yaml_parse_failed)?;
    validate_collection(&collection)?;

    let generated = generate(&workload, &collection)?;
    apply_mutations(generated, &workload, &collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;

    #[test]
    fn test_samples_generate() {
        let descriptors =
            generate_from_manifests(sample::validator_sample(false), sample::set_sample());
        assert!(descriptors.is_ok());
        assert!(descriptors.map(|d| d.len()).unwrap_or(0) >= 3);
    }

    #[test]
    fn test_offline_matches_direct_pipeline() {
        let workload: PocketValidator =
            serde_yaml::from_str(sample::validator_sample(false)).unwrap_or_default();
        let collection: PocketSet =
            serde_yaml::from_str(sample::set_sample()).unwrap_or_default();

        let direct = generate(&workload, &collection)
            .and_then(|d| apply_mutations(d, &workload, &collection))
            .ok();
        let offline =
            generate_from_manifests(sample::validator_sample(false), sample::set_sample()).ok();

        assert!(direct.is_some());
        assert_eq!(direct, offline);
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let result = generate_from_manifests("not: [valid", sample::set_sample());
        assert!(matches!(result, Err(Error::YamlParseFailed { .. })));
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let result = generate_from_manifests(sample::set_sample(), sample::set_sample());
        assert!(matches!(result, Err(Error::InvalidWorkload { .. })));
    }

    #[test]
    fn test_missing_image_is_rejected() {
        let workload = "apiVersion: nodes.pokt.network/v1alpha1\nkind: PocketValidator\nmetadata:\n  name: bare\n";
        let result = generate_from_manifests(workload, sample::set_sample());
        assert!(matches!(result, Err(Error::InvalidWorkload { .. })));
    }
}

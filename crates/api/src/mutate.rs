//! Mutation hooks applied to generated descriptors before convergence.
//!
//! A hook may replace one descriptor with zero, one, or several, or signal
//! that it should be excluded entirely. Hooks are deterministic and
//! side-effect free; anything needing external I/O belongs in the apply
//! phase, not here.

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::types::{PocketSet, PocketValidator};

/// Annotation enabling Prometheus scraping on workload pods.
pub const SCRAPE_ANNOTATION: &str = "prometheus.io/scrape";

/// Annotation naming the Prometheus scrape port.
pub const SCRAPE_PORT_ANNOTATION: &str = "prometheus.io/port";

/// A per-descriptor mutation hook.
///
/// Returns the replacement descriptors and whether the original should be
/// excluded from the applied set.
pub type MutationHook =
    fn(&Descriptor, &PocketValidator, &PocketSet) -> Result<(Vec<Descriptor>, bool)>;

/// Mutate a single descriptor, dispatching on its kind and name.
pub fn mutate(
    descriptor: &Descriptor,
    workload: &PocketValidator,
    collection: &PocketSet,
) -> Result<(Vec<Descriptor>, bool)> {
    match descriptor.kind.as_str() {
        "StatefulSet" => mutate_stateful_set(descriptor, workload, collection),
        "ConfigMap" if descriptor.metadata.name.ends_with("-scrape") => {
            mutate_scrape_config(descriptor, workload, collection)
        }
        _ => Ok((vec![descriptor.clone()], false)),
    }
}

/// Run the chain over a generated descriptor list, in generation order.
pub fn apply_mutations(
    descriptors: Vec<Descriptor>,
    workload: &PocketValidator,
    collection: &PocketSet,
) -> Result<Vec<Descriptor>> {
    let mut mutated = Vec::with_capacity(descriptors.len());

    for descriptor in &descriptors {
        let (replacements, exclude) = mutate(descriptor, workload, collection)?;
        if exclude {
            continue;
        }
        mutated.extend(replacements);
    }

    Ok(mutated)
}

/// Inject scrape annotations into the StatefulSet when scraping is enabled.
fn mutate_stateful_set(
    descriptor: &Descriptor,
    workload: &PocketValidator,
    _collection: &PocketSet,
) -> Result<(Vec<Descriptor>, bool)> {
    if !workload.spec.prometheus_scrape {
        return Ok((vec![descriptor.clone()], false));
    }

    let annotated = descriptor
        .clone()
        .with_annotation(SCRAPE_ANNOTATION, "true")
        .with_annotation(SCRAPE_PORT_ANNOTATION, workload.spec.ports.rpc.to_string());

    Ok((vec![annotated], false))
}

/// Drop the scrape ConfigMap when the workload has scraping disabled.
fn mutate_scrape_config(
    descriptor: &Descriptor,
    workload: &PocketValidator,
    _collection: &PocketSet,
) -> Result<(Vec<Descriptor>, bool)> {
    if workload.spec.prometheus_scrape {
        Ok((vec![descriptor.clone()], false))
    } else {
        Ok((Vec::new(), true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::generate;

    fn sample_pair() -> (PocketValidator, PocketSet) {
        let mut workload = PocketValidator::new("v1-validator1", "default");
        workload.spec.pocket_image = "ghcr.io/pokt-network/pocket-v1:main-dev".to_string();
        let collection = PocketSet::new("pocketset-sample", "default");
        (workload, collection)
    }

    #[test]
    fn test_scrape_config_excluded_when_disabled() {
        let (workload, collection) = sample_pair();
        let generated = generate(&workload, &collection).unwrap_or_default();
        let mutated = apply_mutations(generated, &workload, &collection).unwrap_or_default();

        assert!(!mutated.is_empty());
        assert!(!mutated
            .iter()
            .any(|d| d.metadata.name.ends_with("-scrape")));
    }

    #[test]
    fn test_scrape_config_kept_when_enabled() {
        let (mut workload, collection) = sample_pair();
        workload.spec.prometheus_scrape = true;

        let generated = generate(&workload, &collection).unwrap_or_default();
        let mutated = apply_mutations(generated, &workload, &collection).unwrap_or_default();

        assert!(mutated.iter().any(|d| d.metadata.name.ends_with("-scrape")));
    }

    #[test]
    fn test_stateful_set_annotated_when_scraping() {
        let (mut workload, collection) = sample_pair();
        workload.spec.prometheus_scrape = true;

        let generated = generate(&workload, &collection).unwrap_or_default();
        let mutated = apply_mutations(generated, &workload, &collection).unwrap_or_default();

        let sts = mutated.iter().find(|d| d.kind == "StatefulSet");
        assert_eq!(
            sts.and_then(|d| d.metadata.annotations.get(SCRAPE_ANNOTATION)),
            Some(&"true".to_string())
        );
        assert_eq!(
            sts.and_then(|d| d.metadata.annotations.get(SCRAPE_PORT_ANNOTATION)),
            Some(&"50832".to_string())
        );
    }

    #[test]
    fn test_chain_is_deterministic() {
        let (workload, collection) = sample_pair();
        let run = || {
            generate(&workload, &collection)
                .and_then(|d| apply_mutations(d, &workload, &collection))
                .ok()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_hook_may_split_a_descriptor() {
        // The chain contract allows one-to-many replacement; exercise it
        // with a hook that fans a ConfigMap out per environment.
        let (workload, collection) = sample_pair();
        let splitting: MutationHook = |descriptor, _w, _c| {
            let variants = ["staging", "production"]
                .iter()
                .map(|env| {
                    let mut variant = descriptor.clone();
                    variant.metadata.name = format!("{}-{env}", descriptor.metadata.name);
                    variant
                })
                .collect();
            Ok((variants, false))
        };

        let base = Descriptor::new("v1", "ConfigMap", "bundle", "pocketset-sample");
        let (variants, excluded) = splitting(&base, &workload, &collection).unwrap_or_default();
        assert!(!excluded);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants.first().map(|d| d.metadata.name.as_str()), Some("bundle-staging"));
    }
}

//! Data model and child-resource generation for Pocket validator workloads.
//!
//! This crate is the pure half of the operator: the workload and collection
//! types, the descriptor representation for not-yet-applied child resources,
//! the ordered generator pipeline, and the mutation hook chain. Everything
//! here is deterministic and free of I/O, so the offline (manifest-driven)
//! entry point and the live controller share one code path.

pub mod descriptor;
pub mod error;
pub mod generate;
pub mod manifest;
pub mod mutate;
pub mod sample;
pub mod types;

pub use descriptor::Descriptor;
pub use error::{Error, Result};
pub use generate::generate;
pub use manifest::{generate_from_manifests, validate_collection, validate_workload};
pub use mutate::{apply_mutations, mutate};
pub use types::{
    Collection, Metadata, ObjectKey, ObjectRef, PocketSet, PocketValidator, PocketValidatorSpec,
    PortSpec, PostgresSpec, SecretKeySelector, SecretSource, TypeRef, Workload,
};

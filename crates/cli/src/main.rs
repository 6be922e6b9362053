//! Offline manifest tooling for Pocket validator workloads.
//!
//! `pocketctl generate` runs the exact generation and mutation pipeline the
//! controller applies at reconcile time, printing the resulting child
//! manifests instead of writing them to a store. `pocketctl sample` prints
//! starter manifests for the workload and collection kinds.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pocket_api::{generate_from_manifests, sample, Descriptor};

#[derive(Parser)]
#[command(name = "pocketctl")]
#[command(about = "Generate child manifests for Pocket validator workloads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate child manifests from workload and collection manifests
    Generate {
        /// Path to the PocketValidator manifest
        #[arg(long)]
        workload: PathBuf,

        /// Path to the PocketSet manifest; the built-in sample is used
        /// when omitted
        #[arg(long)]
        collection: Option<PathBuf>,

        /// Output as a JSON array instead of a YAML stream
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Print starter manifests
    Sample {
        /// Emit only the required workload fields
        #[arg(long, default_value = "false")]
        required_only: bool,

        /// Print the collection manifest instead of the workload
        #[arg(long, default_value = "false")]
        collection: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate {
            workload,
            collection,
            json,
        } => run_generate(&workload, collection.as_deref(), json),
        Command::Sample {
            required_only,
            collection,
        } => run_sample(required_only, collection),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_generate(
    workload_path: &std::path::Path,
    collection_path: Option<&std::path::Path>,
    json: bool,
) -> Result<()> {
    let workload_yaml = fs::read_to_string(workload_path)
        .with_context(|| format!("reading workload manifest {}", workload_path.display()))?;
    let collection_yaml = match collection_path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading collection manifest {}", path.display()))?,
        None => sample::set_sample().to_string(),
    };

    let descriptors = generate_from_manifests(&workload_yaml, &collection_yaml)
        .context("manifest generation failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
    } else {
        print_yaml_stream(&descriptors)?;
    }
    Ok(())
}

fn print_yaml_stream(descriptors: &[Descriptor]) -> Result<()> {
    for descriptor in descriptors {
        println!("---");
        print!("{}", serde_yaml::to_string(descriptor)?);
    }
    Ok(())
}

fn run_sample(required_only: bool, collection: bool) -> Result<()> {
    if collection {
        print!("{}", sample::set_sample());
    } else {
        print!("{}", sample::validator_sample(required_only));
    }
    Ok(())
}

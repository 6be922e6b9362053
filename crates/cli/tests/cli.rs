use std::io::Write;

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;

fn pocketctl() -> Result<Command> {
    Ok(Command::cargo_bin("pocketctl")?)
}

fn sample_workload_file() -> Result<tempfile::NamedTempFile> {
    let sample = pocketctl()?.args(["sample"]).output()?;
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&sample.stdout)?;
    Ok(file)
}

#[test]
fn sample_prints_workload_manifest() -> Result<()> {
    pocketctl()?
        .args(["sample"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kind: PocketValidator"))
        .stdout(predicate::str::contains("pocketImage"));
    Ok(())
}

#[test]
fn sample_required_only_omits_optional_fields() -> Result<()> {
    pocketctl()?
        .args(["sample", "--required-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kind: PocketValidator"))
        .stdout(predicate::str::contains("prometheusScrape").not());
    Ok(())
}

#[test]
fn sample_collection_prints_set_manifest() -> Result<()> {
    pocketctl()?
        .args(["sample", "--collection"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kind: PocketSet"))
        .stdout(predicate::str::contains("pocketset-sample"));
    Ok(())
}

#[test]
fn generate_emits_child_yaml_stream() -> Result<()> {
    let workload = sample_workload_file()?;

    pocketctl()?
        .args(["generate", "--workload"])
        .arg(workload.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("kind: Service"))
        .stdout(predicate::str::contains("pocketset-sample-validators"))
        .stdout(predicate::str::contains("clusterIP: None"));
    Ok(())
}

#[test]
fn generate_json_emits_array() -> Result<()> {
    let workload = sample_workload_file()?;

    pocketctl()?
        .args(["generate", "--json", "--workload"])
        .arg(workload.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("["))
        .stdout(predicate::str::contains("\"kind\": \"StatefulSet\""));
    Ok(())
}

#[test]
fn generate_rejects_missing_manifest() -> Result<()> {
    pocketctl()?
        .args(["generate", "--workload", "/nonexistent/workload.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading workload manifest"));
    Ok(())
}

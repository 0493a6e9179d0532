// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Writes the `AzureConfig` and `DrainerConfig` CRD manifests.
//!
//! ```text
//! cargo run --bin crdgen                  # writes deploy/crds/
//! cargo run --bin crdgen -- out/crds      # writes out/crds/
//! cargo run --bin crdgen -- --check       # fails when deploy/crds/ is stale
//! ```

use anyhow::{bail, Context as _, Result};
use azure_operator::crd::{AzureConfig, DrainerConfig};
use clap::Parser;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const MANIFEST_PREAMBLE: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# Rendered by the crdgen binary from the types in src/crd.rs.
# Change the types and rerun crdgen instead of editing this manifest.
#
";

#[derive(Debug, Parser)]
#[command(name = "crdgen", about = "Render the operator's CRD manifests")]
struct Args {
    /// Directory receiving one manifest per CRD
    #[arg(default_value = "deploy/crds")]
    output_dir: PathBuf,

    /// Compare against the files on disk instead of writing them
    #[arg(long)]
    check: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let manifests = [
        ("azureconfigs.crd.yaml", AzureConfig::crd()),
        ("drainerconfigs.crd.yaml", DrainerConfig::crd()),
    ];

    let mut stale = Vec::new();
    for (file, crd) in manifests {
        let rendered = render_manifest(crd)?;
        let path = args.output_dir.join(file);

        if args.check {
            if !is_current(&path, &rendered)? {
                stale.push(path.display().to_string());
            }
            continue;
        }

        fs::create_dir_all(&args.output_dir)
            .with_context(|| format!("creating {}", args.output_dir.display()))?;
        fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }

    if !stale.is_empty() {
        bail!("stale CRD manifests, rerun crdgen: {}", stale.join(", "));
    }
    Ok(())
}

/// Serialize one CRD to YAML behind the manifest preamble.
fn render_manifest(crd: CustomResourceDefinition) -> Result<String> {
    let mut value = serde_json::to_value(crd)?;
    preserve_status_fields(&mut value);
    Ok(format!("{MANIFEST_PREAMBLE}{}", serde_yaml::to_string(&value)?))
}

/// Mark the status schema of every served version as open.
///
/// The cluster status of an `AzureConfig` is shared with other controllers, so
/// the API server must not prune fields this operator does not model.
fn preserve_status_fields(crd: &mut Value) {
    let Some(versions) = crd
        .pointer_mut("/spec/versions")
        .and_then(Value::as_array_mut)
    else {
        return;
    };

    for version in versions {
        if let Some(Value::Object(status)) =
            version.pointer_mut("/schema/openAPIV3Schema/properties/status")
        {
            status.insert(
                "x-kubernetes-preserve-unknown-fields".to_string(),
                Value::Bool(true),
            );
        }
    }
}

fn is_current(path: &Path, rendered: &str) -> Result<bool> {
    match fs::read_to_string(path) {
        Ok(existing) => Ok(existing == rendered),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

#[cfg(test)]
#[path = "crdgen_tests.rs"]
mod crdgen_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deployment checksums.
//!
//! The reconciler stores the checksums of the last submitted deployment on the
//! `AzureConfig` status and compares them with the checksums of the desired
//! deployment to decide whether a new ARM deployment is needed.
//!
//! Both checksums are lowercase hex SHA-256 digests of canonical JSON (object
//! keys sorted at every level), so they do not depend on field order.

use crate::azure::DeploymentProperties;
use crate::errors::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use url::Url;

/// Parameters holding blob URLs signed with a time-limited SAS token.
///
/// The token changes whenever the URL is re-signed, so only the blob location
/// takes part in the checksum.
pub const VOLATILE_URL_PARAMETERS: &[&str] = &["masterCloudConfigData", "workerCloudConfigData"];

/// Checksum of the deployment template.
///
/// Covers the inline template when present, otherwise the template link.
///
/// # Errors
///
/// Returns an error if the template cannot be serialized.
pub fn template_checksum(properties: &DeploymentProperties) -> Result<String> {
    match &properties.template {
        Some(template) => checksum(template),
        None => checksum(&properties.template_link),
    }
}

/// Checksum of the deployment parameters, ignoring SAS tokens.
///
/// # Errors
///
/// Returns an error if the parameters cannot be serialized.
pub fn parameters_checksum(properties: &DeploymentProperties) -> Result<String> {
    let mut parameters = serde_json::to_value(&properties.parameters)?;

    if let Value::Object(map) = &mut parameters {
        for name in VOLATILE_URL_PARAMETERS {
            if let Some(Value::Object(parameter)) = map.get_mut(*name) {
                if let Some(Value::String(url)) = parameter.get_mut("value") {
                    *url = strip_query(url);
                }
            }
        }
    }

    checksum(&parameters)
}

/// SHA-256 of the canonical JSON encoding of `data`.
///
/// # Errors
///
/// Returns an error if `data` cannot be serialized.
pub fn checksum<T: Serialize>(data: &T) -> Result<String> {
    let value = canonicalize(serde_json::to_value(data)?);
    let json = serde_json::to_string(&value)?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Drop query string and fragment. Values that are not URLs are kept as is.
fn strip_query(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
#[path = "checksum_tests.rs"]
mod checksum_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Every setting is a command line flag that can also be provided through an
//! environment variable, which is how the operator's Deployment passes them.
//!
//! ```text
//! AZURE_SUBSCRIPTION_ID=... AZURE_TENANT_ID=... \
//! AZURE_CLIENT_ID=... AZURE_CLIENT_SECRET=... azure-operator
//! ```

use crate::azure::AzureCredentials;
use crate::constants::{
    DEFAULT_LOGIN_ENDPOINT, DEFAULT_MANAGEMENT_ENDPOINT, DEFAULT_METRICS_ADDRESS,
};
use crate::errors::{Error, Result};
use clap::Parser;
use std::net::SocketAddr;

/// Default location of the versioned ARM templates.
pub const DEFAULT_TEMPLATE_BASE_URI: &str =
    "https://raw.githubusercontent.com/giantswarm/azure-operator/master/service/controller/templates";

#[derive(Parser, Clone, Debug)]
#[command(name = "azure-operator", version, about)]
pub struct Config {
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID", help = "Azure subscription holding the tenant clusters")]
    pub subscription_id: String,

    #[arg(long, env = "AZURE_TENANT_ID", help = "Azure AD tenant of the service principal")]
    pub tenant_id: String,

    #[arg(long, env = "AZURE_CLIENT_ID", help = "Client ID of the service principal")]
    pub client_id: String,

    #[arg(
        long,
        env = "AZURE_CLIENT_SECRET",
        hide_env_values = true,
        help = "Client secret of the service principal"
    )]
    pub client_secret: String,

    #[arg(
        long,
        env = "AZURE_MANAGEMENT_ENDPOINT",
        default_value = DEFAULT_MANAGEMENT_ENDPOINT,
        help = "Azure Resource Manager endpoint"
    )]
    pub management_endpoint: String,

    #[arg(
        long,
        env = "AZURE_LOGIN_ENDPOINT",
        default_value = DEFAULT_LOGIN_ENDPOINT,
        help = "Azure AD login endpoint"
    )]
    pub login_endpoint: String,

    #[arg(
        long,
        env = "AZURE_TEMPLATE_BASE_URI",
        default_value = DEFAULT_TEMPLATE_BASE_URI,
        help = "Base URI of the ARM templates, one directory per operator version"
    )]
    pub template_base_uri: String,

    #[arg(
        long,
        env = "OPERATOR_VERSION",
        default_value = env!("CARGO_PKG_VERSION"),
        help = "Operator version recorded in deployments and used to pick the template"
    )]
    pub operator_version: String,

    #[arg(
        long,
        env = "METRICS_ADDRESS",
        default_value = DEFAULT_METRICS_ADDRESS,
        help = "Listen address of the Prometheus metrics endpoint"
    )]
    pub metrics_address: String,

    #[arg(
        long,
        env = "POD_NAMESPACE",
        default_value = "default",
        help = "Namespace of the leader election lease"
    )]
    pub lease_namespace: String,

    #[arg(
        long,
        env = "LEASE_NAME",
        default_value = "azure-operator-leader",
        help = "Name of the leader election lease"
    )]
    pub lease_name: String,

    #[arg(
        long,
        env = "POD_NAME",
        default_value = "azure-operator",
        help = "Identity of this replica in leader election"
    )]
    pub pod_name: String,
}

impl Config {
    /// Reject settings the operator cannot start with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("subscription-id", &self.subscription_id),
            ("tenant-id", &self.tenant_id),
            ("client-id", &self.client_id),
            ("client-secret", &self.client_secret),
            ("operator-version", &self.operator_version),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{name} must not be empty")));
            }
        }

        for (name, value) in [
            ("management-endpoint", &self.management_endpoint),
            ("login-endpoint", &self.login_endpoint),
            ("template-base-uri", &self.template_base_uri),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::InvalidConfig(format!("{name} '{value}' is not a URL: {e}")))?;
        }

        self.metrics_socket_addr()?;
        Ok(())
    }

    #[must_use]
    pub fn credentials(&self) -> AzureCredentials {
        AzureCredentials {
            subscription_id: self.subscription_id.clone(),
            tenant_id: self.tenant_id.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }

    /// Parsed metrics listen address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the address does not parse.
    pub fn metrics_socket_addr(&self) -> Result<SocketAddr> {
        self.metrics_address.parse().map_err(|e| {
            Error::InvalidConfig(format!(
                "metrics-address '{}' is not a socket address: {e}",
                self.metrics_address
            ))
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use super::super::Config;
    use crate::constants::{DEFAULT_MANAGEMENT_ENDPOINT, DEFAULT_METRICS_ADDRESS};
    use clap::Parser;

    const REQUIRED: [&str; 9] = [
        "azure-operator",
        "--subscription-id",
        "sub-123",
        "--tenant-id",
        "tenant-456",
        "--client-id",
        "client-789",
        "--client-secret",
        "s3cr3t",
    ];

    fn parse(extra: &[&str]) -> Config {
        Config::try_parse_from(REQUIRED.iter().chain(extra).copied()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);

        assert_eq!(config.management_endpoint, DEFAULT_MANAGEMENT_ENDPOINT);
        assert_eq!(config.metrics_address, DEFAULT_METRICS_ADDRESS);
        assert_eq!(config.operator_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.lease_name, "azure-operator-leader");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credentials() {
        let credentials = parse(&[]).credentials();

        assert_eq!(credentials.subscription_id, "sub-123");
        assert_eq!(credentials.tenant_id, "tenant-456");
        assert_eq!(credentials.client_id, "client-789");
        assert_eq!(credentials.client_secret, "s3cr3t");
    }

    #[test]
    fn test_empty_secret_rejected() {
        let mut config = parse(&[]);
        config.client_secret = "  ".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("client-secret"));
        assert!(err.is_execution_failed());
    }

    #[test]
    fn test_malformed_endpoint_rejected() {
        let config = parse(&["--management-endpoint", "not a url"]);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("management-endpoint"));
    }

    #[test]
    fn test_malformed_metrics_address_rejected() {
        let config = parse(&["--metrics-address", "localhost"]);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_socket_addr() {
        let config = parse(&["--metrics-address", "127.0.0.1:9090"]);

        assert_eq!(config.metrics_socket_addr().unwrap().port(), 9090);
    }
}

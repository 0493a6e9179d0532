// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for operator error types.

#[cfg(test)]
mod tests {
    use crate::errors::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code,
            metadata: None,
            details: None,
        }))
    }

    #[test]
    fn test_vmss_not_found_message() {
        let error = Error::VmssNotFound {
            resource_group: "x7k2p".to_string(),
            name: "x7k2p-worker".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "virtual machine scale set 'x7k2p-worker' not found in resource group 'x7k2p'"
        );
        assert!(error.is(ErrorKind::VmssNotFound));
        assert!(error.is_not_found());
        assert!(!error.is_execution_failed());
    }

    #[test]
    fn test_not_found_kinds() {
        let errors = [
            Error::DeploymentNotFound {
                resource_group: "rg".to_string(),
                name: "d".to_string(),
            },
            Error::DrainerConfigNotFound {
                namespace: "ns".to_string(),
                name: "n".to_string(),
            },
            Error::TenantClusterUnavailable {
                cluster_id: "c".to_string(),
                reason: "no secret".to_string(),
            },
            Error::IgnitionBlobNotFound {
                cluster_id: "c".to_string(),
                role: "worker".to_string(),
            },
        ];

        for error in &errors {
            assert!(error.is_not_found(), "{error} should be not-found");
            assert_eq!(error.metric_label(), "not_found");
        }
    }

    #[test]
    fn test_execution_failed_kinds() {
        let error = Error::ExecutionFailed("unknown stage 'half-way'".to_string());
        assert_eq!(error.to_string(), "execution failed: unknown stage 'half-way'");
        assert!(error.is(ErrorKind::ExecutionFailed));
        assert!(error.is_execution_failed());
        assert!(!error.is_not_found());

        let error = Error::InvalidInstanceId("abc".to_string());
        assert!(error.is_execution_failed());
        assert_eq!(error.metric_label(), "execution_failed");
    }

    #[test]
    fn test_is_distinguishes_kinds() {
        let error = Error::DeploymentNotFound {
            resource_group: "rg".to_string(),
            name: "d".to_string(),
        };
        assert!(error.is(ErrorKind::DeploymentNotFound));
        assert!(!error.is(ErrorKind::VmssNotFound));
    }

    #[test]
    fn test_conflict_detection() {
        assert!(Error::Conflict("x7k2p".to_string()).is_conflict());
        assert!(Error::Kube(api_error(409)).is_conflict());
        assert!(!Error::Kube(api_error(404)).is_conflict());
        assert!(!Error::InvalidConfig("bad".to_string()).is_conflict());
    }

    #[test]
    fn test_is_kube_status() {
        assert!(is_kube_status(&api_error(404), 404));
        assert!(!is_kube_status(&api_error(500), 404));
    }

    #[test]
    fn test_azure_error_message() {
        let error = Error::Azure {
            operation: "get vmss".to_string(),
            status: 429,
            message: "too many requests".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "azure request get vmss failed with HTTP 429: too many requests"
        );
        assert_eq!(error.metric_label(), "azure_error");
        assert!(!error.is_not_found());
    }
}

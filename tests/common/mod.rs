// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use azure_operator::crd::{
    AzureConfig, AzureConfigSpec, AzureSpec, ClusterSpec, NodeSpec, VersionBundle, VirtualNetwork,
};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, DeleteParams, PostParams},
    client::Client,
};
use std::collections::BTreeMap;

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => {
            println!("✓ Successfully connected to Kubernetes cluster");
            Some(client)
        }
        Err(e) => {
            eprintln!("⊘ Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let mut labels = BTreeMap::new();
    labels.insert("test".to_string(), "integration".to_string());
    labels.insert("managed-by".to_string(), "azure-operator-test".to_string());

    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("✓ Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("  Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(client: &Client, name: &str) {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => println!("✓ Deleted test namespace: {name}"),
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("  Test namespace already deleted: {name}");
        }
        Err(e) => eprintln!("⚠ Failed to delete test namespace {name}: {e}"),
    }
}

/// Build an `AzureConfig` for cluster `cluster_id` living in `namespace`
pub fn build_azure_config(namespace: &str, cluster_id: &str, workers: usize) -> AzureConfig {
    let mut cr = AzureConfig::new(
        cluster_id,
        AzureConfigSpec {
            cluster: ClusterSpec {
                id: cluster_id.to_string(),
                api_domain: format!("api.{cluster_id}.k8s.example.com"),
                masters: vec![NodeSpec::with_vm_size("Standard_D4s_v3")],
                workers: vec![NodeSpec::with_vm_size("Standard_D4s_v3"); workers],
            },
            azure: AzureSpec {
                virtual_network: VirtualNetwork {
                    cidr: "10.1.0.0/16".to_string(),
                    master_subnet_cidr: "10.1.0.0/24".to_string(),
                    worker_subnet_cidr: "10.1.1.0/24".to_string(),
                },
            },
            version_bundle: VersionBundle {
                version: "4.2.0".to_string(),
            },
        },
    );
    cr.metadata.namespace = Some(namespace.to_string());
    cr
}

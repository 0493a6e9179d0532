// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the Azure operator's Kubernetes facing parts
//!
//! These tests need a cluster with the CRDs from deploy/crds/ installed. They
//! never talk to Azure.
//!
//! Run with: cargo test --test simple_integration -- --ignored

mod common;

use azure_operator::constants::{
    CONDITION_STAGE, CONDITION_TEMPLATE_CHECKSUM, CORE_API_GROUP, KIND_AZURE_CONFIG,
    KIND_DRAINER_CONFIG, PROVIDER_API_GROUP,
};
use azure_operator::crd::AzureConfig;
use azure_operator::deployment::{IgnitionSource, KubeIgnitionSource};
use azure_operator::errors::ErrorKind;
use azure_operator::reconcilers::status::{KubeStatusStore, StatusStore};
use azure_operator::tenant::{DrainerApi, KubeDrainerApi};
use common::{
    build_azure_config, cleanup_test_namespace, create_test_namespace, get_kube_client_or_skip,
};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DeleteParams, ListParams, PostParams};

#[tokio::test]
#[ignore] // Run with: cargo test --test simple_integration -- --ignored
async fn test_crds_installed() {
    println!("\n=== Test: Azure operator CRDs Installed ===\n");

    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };

    let crds: Api<CustomResourceDefinition> = Api::all(client);
    let crd_list = crds.list(&ListParams::default()).await.unwrap();

    let kinds: Vec<(String, String)> = crd_list
        .items
        .iter()
        .map(|crd| (crd.spec.group.clone(), crd.spec.names.kind.clone()))
        .collect();

    for (group, kind) in [
        (PROVIDER_API_GROUP, KIND_AZURE_CONFIG),
        (CORE_API_GROUP, KIND_DRAINER_CONFIG),
    ] {
        println!("  Checking CRD {kind}.{group}");
        assert!(kinds.contains(&(group.to_string(), kind.to_string())));
    }

    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_status_store_round_trip() {
    println!("\n=== Test: Status Store Round Trip ===\n");

    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    let namespace = "azure-operator-it-status";
    create_test_namespace(&client, namespace).await.unwrap();

    let api: Api<AzureConfig> = Api::namespaced(client.clone(), namespace);
    let cr = api
        .create(&PostParams::default(), &build_azure_config(namespace, "it5tat", 2))
        .await
        .unwrap();

    let store = KubeStatusStore::new(client.clone());
    assert_eq!(store.get(&cr, CONDITION_STAGE).await.unwrap(), "");

    store
        .set(&cr, CONDITION_STAGE, "DeploymentInitialized")
        .await
        .unwrap();
    store
        .set(&cr, CONDITION_TEMPLATE_CHECKSUM, "3f1c")
        .await
        .unwrap();

    assert_eq!(
        store.get(&cr, CONDITION_STAGE).await.unwrap(),
        "DeploymentInitialized"
    );
    assert_eq!(
        store.get(&cr, CONDITION_TEMPLATE_CHECKSUM).await.unwrap(),
        "3f1c"
    );

    api.delete(&cr.metadata.name.clone().unwrap(), &DeleteParams::default())
        .await
        .unwrap();
    cleanup_test_namespace(&client, namespace).await;

    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_drainer_config_lifecycle() {
    println!("\n=== Test: DrainerConfig Lifecycle ===\n");

    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    // Drainer configs live in the namespace named after the cluster.
    let cluster_id = "it6dr9";
    create_test_namespace(&client, cluster_id).await.unwrap();

    let cr = build_azure_config("default", cluster_id, 2);
    let drainers = KubeDrainerApi::new(client.clone());
    let node = format!("{cluster_id}-worker-000001");

    drainers.create(&cr, &node).await.unwrap();
    // A second request for the same node is a no-op.
    drainers.create(&cr, &node).await.unwrap();

    let configs = drainers.list(cluster_id).await.unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].node_name(), node);
    assert!(!configs[0].is_drained());

    drainers.delete(cluster_id, &node).await.unwrap();
    let err = drainers.delete(cluster_id, &node).await.unwrap_err();
    assert!(err.is(ErrorKind::DrainerConfigNotFound));

    cleanup_test_namespace(&client, cluster_id).await;

    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_ignition_source_without_secret() {
    println!("\n=== Test: Ignition Source Without Secret ===\n");

    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    let cluster_id = "it7gn1";
    create_test_namespace(&client, cluster_id).await.unwrap();

    let cr = build_azure_config("default", cluster_id, 1);
    let err = KubeIgnitionSource::new(client.clone())
        .ignition_urls(&cr)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::IgnitionBlobNotFound));
    assert!(err.is_not_found());

    cleanup_test_namespace(&client, cluster_id).await;

    println!("\n✓ Test passed\n");
}

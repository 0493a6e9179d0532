// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`AzureApi`] implementation on top of the Azure Resource Manager REST API.
//!
//! Authentication uses the OAuth2 client-credentials flow against Azure AD.
//! The access token is cached and refreshed shortly before it expires.

use super::{
    AzureApi, Deployment, DeploymentProperties, ProvisioningState, VirtualMachineScaleSet,
    VmssInstance,
};
use crate::constants::{COMPUTE_API_VERSION, RESOURCES_API_VERSION, TOKEN_EXPIRY_MARGIN_SECS};
use crate::errors::{Error, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Per-request timeout for ARM calls
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Service principal used to talk to Azure.
#[derive(Clone, Debug)]
pub struct AzureCredentials {
    pub subscription_id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds. Azure AD v1 returns a string, v2 a number.
    expires_in: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

#[derive(Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmssResponse {
    name: String,
    #[serde(default)]
    sku: Option<SkuResponse>,
    #[serde(default)]
    properties: Option<ProvisioningProperties>,
}

#[derive(Deserialize)]
struct SkuResponse {
    #[serde(default)]
    capacity: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisioningProperties {
    provisioning_state: Option<ProvisioningState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmssVmListResponse {
    #[serde(default)]
    value: Vec<VmssVmResponse>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmssVmResponse {
    instance_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    properties: VmssVmProperties,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct VmssVmProperties {
    #[serde(default)]
    latest_model_applied: bool,
    provisioning_state: Option<ProvisioningState>,
}

impl From<VmssVmResponse> for VmssInstance {
    fn from(vm: VmssVmResponse) -> Self {
        Self {
            instance_id: vm.instance_id,
            name: vm.name,
            latest_model_applied: vm.properties.latest_model_applied,
            provisioning_state: vm
                .properties
                .provisioning_state
                .unwrap_or(ProvisioningState::Unknown),
        }
    }
}

/// ARM REST client.
pub struct ArmClient {
    http: reqwest::Client,
    credentials: AzureCredentials,
    management_endpoint: String,
    login_endpoint: String,
    token: Mutex<Option<AccessToken>>,
}

impl ArmClient {
    /// Create a client for the given endpoints, e.g. `https://management.azure.com`
    /// and `https://login.microsoftonline.com`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        credentials: AzureCredentials,
        management_endpoint: &str,
        login_endpoint: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            credentials,
            management_endpoint: management_endpoint.trim_end_matches('/').to_string(),
            login_endpoint: login_endpoint.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - ChronoDuration::seconds(TOKEN_EXPIRY_MARGIN_SECS) > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        debug!(tenant_id = %self.credentials.tenant_id, "Requesting Azure access token");

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_endpoint, self.credentials.tenant_id
        );
        let scope = format!("{}/.default", self.management_endpoint);
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("client_secret", &self.credentials.client_secret)
            .append_pair("scope", &scope)
            .finish();

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        let response = check_status(response, "acquire token").await?;
        let token: TokenResponse = response.json().await?;

        let expires_in = token
            .expires_in
            .as_i64()
            .or_else(|| token.expires_in.as_str().and_then(|s| s.parse().ok()))
            .unwrap_or(0);

        let value = token.access_token;
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Utc::now() + ChronoDuration::seconds(expires_in),
        });

        Ok(value)
    }

    fn compute_url(&self, resource_group: &str, vmss: &str, suffix: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachineScaleSets/{}{}?api-version={}",
            self.management_endpoint,
            self.credentials.subscription_id,
            resource_group,
            vmss,
            suffix,
            COMPUTE_API_VERSION
        )
    }

    fn deployment_url(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourcegroups/{}/providers/Microsoft.Resources/deployments/{}?api-version={}",
            self.management_endpoint,
            self.credentials.subscription_id,
            resource_group,
            name,
            RESOURCES_API_VERSION
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        operation: &str,
    ) -> Result<Response> {
        let token = self.access_token().await?;

        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = %method, url = %url, operation = operation, "Sending ARM request");
        let response = request.send().await?;
        check_status(response, operation).await
    }

    async fn post_instance_ids(
        &self,
        resource_group: &str,
        vmss: &str,
        action: &str,
        instance_ids: &[String],
    ) -> Result<()> {
        let url = self.compute_url(resource_group, vmss, &format!("/{action}"));
        let body = json!({ "instanceIds": instance_ids });
        self.send(Method::POST, &url, Some(&body), action)
            .await
            .map_err(|e| vmss_not_found(e, resource_group, vmss))?;

        info!(
            resource_group = resource_group,
            vmss = vmss,
            action = action,
            instance_ids = ?instance_ids,
            "Submitted scale set instance operation"
        );
        Ok(())
    }
}

/// Turn non-success responses into [`Error::Azure`].
async fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ArmErrorBody>(&text).map_or(text, |body| {
        if body.error.code.is_empty() {
            body.error.message
        } else {
            format!("{}: {}", body.error.code, body.error.message)
        }
    });

    Err(Error::Azure {
        operation: operation.to_string(),
        status: status.as_u16(),
        message,
    })
}

fn is_azure_not_found(err: &Error) -> bool {
    matches!(err, Error::Azure { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
}

fn vmss_not_found(err: Error, resource_group: &str, name: &str) -> Error {
    if is_azure_not_found(&err) {
        Error::VmssNotFound {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        }
    } else {
        err
    }
}

fn deployment_not_found(err: Error, resource_group: &str, name: &str) -> Error {
    if is_azure_not_found(&err) {
        Error::DeploymentNotFound {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        }
    } else {
        err
    }
}

#[async_trait::async_trait]
impl AzureApi for ArmClient {
    async fn get_vmss(&self, resource_group: &str, name: &str) -> Result<VirtualMachineScaleSet> {
        let url = self.compute_url(resource_group, name, "");
        let response = self
            .send(Method::GET, &url, None, "get vmss")
            .await
            .map_err(|e| vmss_not_found(e, resource_group, name))?;
        let vmss: VmssResponse = response.json().await?;

        Ok(VirtualMachineScaleSet {
            name: vmss.name,
            capacity: vmss.sku.map_or(0, |sku| sku.capacity),
            provisioning_state: vmss
                .properties
                .and_then(|p| p.provisioning_state)
                .unwrap_or(ProvisioningState::Unknown),
        })
    }

    async fn delete_vmss(&self, resource_group: &str, name: &str) -> Result<()> {
        let url = self.compute_url(resource_group, name, "");
        self.send(Method::DELETE, &url, None, "delete vmss")
            .await
            .map_err(|e| vmss_not_found(e, resource_group, name))?;

        info!(
            resource_group = resource_group,
            vmss = name,
            "Submitted scale set deletion"
        );
        Ok(())
    }

    async fn list_vmss_instances(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Vec<VmssInstance>> {
        let mut instances = Vec::new();
        let mut next = Some(self.compute_url(resource_group, name, "/virtualMachines"));

        while let Some(url) = next {
            let response = self
                .send(Method::GET, &url, None, "list vmss instances")
                .await
                .map_err(|e| vmss_not_found(e, resource_group, name))?;
            let page: VmssVmListResponse = response.json().await?;

            instances.extend(page.value.into_iter().map(VmssInstance::from));
            next = page.next_link.filter(|link| !link.is_empty());
        }

        debug!(
            resource_group = resource_group,
            vmss = name,
            count = instances.len(),
            "Listed scale set instances"
        );
        Ok(instances)
    }

    async fn update_vmss_capacity(
        &self,
        resource_group: &str,
        name: &str,
        capacity: i64,
    ) -> Result<()> {
        let url = self.compute_url(resource_group, name, "");
        let body = json!({ "sku": { "capacity": capacity } });
        self.send(Method::PATCH, &url, Some(&body), "update vmss capacity")
            .await
            .map_err(|e| vmss_not_found(e, resource_group, name))?;

        info!(
            resource_group = resource_group,
            vmss = name,
            capacity = capacity,
            "Submitted scale set capacity change"
        );
        Ok(())
    }

    async fn update_instances(
        &self,
        resource_group: &str,
        vmss: &str,
        instance_ids: &[String],
    ) -> Result<()> {
        self.post_instance_ids(resource_group, vmss, "manualupgrade", instance_ids)
            .await
    }

    async fn reimage_instances(
        &self,
        resource_group: &str,
        vmss: &str,
        instance_ids: &[String],
    ) -> Result<()> {
        self.post_instance_ids(resource_group, vmss, "reimage", instance_ids)
            .await
    }

    async fn delete_instances(
        &self,
        resource_group: &str,
        vmss: &str,
        instance_ids: &[String],
    ) -> Result<()> {
        self.post_instance_ids(resource_group, vmss, "delete", instance_ids)
            .await
    }

    async fn get_deployment(&self, resource_group: &str, name: &str) -> Result<Deployment> {
        let url = self.deployment_url(resource_group, name);
        let response = self
            .send(Method::GET, &url, None, "get deployment")
            .await
            .map_err(|e| deployment_not_found(e, resource_group, name))?;

        Ok(response.json().await?)
    }

    async fn create_or_update_deployment(
        &self,
        resource_group: &str,
        name: &str,
        properties: &DeploymentProperties,
    ) -> Result<()> {
        let url = self.deployment_url(resource_group, name);
        let body = json!({ "properties": properties });
        self.send(Method::PUT, &url, Some(&body), "create deployment")
            .await?;

        info!(
            resource_group = resource_group,
            deployment = name,
            "Submitted ARM deployment"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "arm_tests.rs"]
mod arm_tests;

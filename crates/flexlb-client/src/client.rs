//! HTTP client for the orchestrator API server.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::watch::PodWatchStream;
use flexlb_core::{Binding, Deployment, Node, ObjectMeta, Pod};
use k8s_openapi::api::core::v1::ObjectReference;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Lightweight HTTP client for placers and the detector to talk to the
/// orchestrator API server
pub struct ApiClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client with default transport settings (no TLS material)
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            token: None,
        }
    }

    /// Create a client from a discovered configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(pem) = &config.ca_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem).map_err(|e| {
                ClientError::configuration(format!("invalid CA certificate: {}", e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::configuration(format!("failed to build client: {}", e)))?;

        Ok(Self {
            base_url: config.server.trim_end_matches('/').to_string(),
            client,
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET a list endpoint and decode its `items` array, skipping items that
    /// fail to deserialize.
    async fn get_list<T: DeserializeOwned>(
        &self,
        url: String,
        field_selector: Option<&str>,
        kind: &str,
    ) -> Result<Vec<T>> {
        debug!("GET {}", url);

        let mut req = self.request(reqwest::Method::GET, url);
        if let Some(selector) = field_selector {
            req = req.query(&[("fieldSelector", selector)]);
        }

        let resp = req.send().await?;
        let resp = check_status(resp, kind).await?;

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ClientError::decode(format!("failed to parse {} list: {}", kind, e)))?;

        let items = body["items"].as_array().cloned().unwrap_or_default();

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<T>(item) {
                Ok(parsed) => out.push(parsed),
                Err(e) => warn!("Failed to parse {} from list: {}", kind, e),
            }
        }

        Ok(out)
    }

    /// GET /api/v1/nodes
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        let url = format!("{}/api/v1/nodes", self.base_url);
        self.get_list(url, None, "node").await
    }

    /// GET /api/v1/pods with an optional field selector.
    ///
    /// The selector language supports equality and `!=` negation on
    /// `spec.nodeName`, `spec.schedulerName`, and `status.phase`.
    pub async fn list_pods(&self, field_selector: Option<&str>) -> Result<Vec<Pod>> {
        let url = format!("{}/api/v1/pods", self.base_url);
        self.get_list(url, field_selector, "pod").await
    }

    /// GET /apis/apps/v1/deployments
    pub async fn list_deployments_all_namespaces(&self) -> Result<Vec<Deployment>> {
        let url = format!("{}/apis/apps/v1/deployments", self.base_url);
        self.get_list(url, None, "deployment").await
    }

    /// PATCH /apis/apps/v1/namespaces/{namespace}/deployments/{name}
    ///
    /// Sends a strategic-merge patch; the operation is idempotent.
    pub async fn patch_deployment(
        &self,
        namespace: &str,
        name: &str,
        body: &serde_json::Value,
    ) -> Result<()> {
        let url = format!(
            "{}/apis/apps/v1/namespaces/{}/deployments/{}",
            self.base_url, namespace, name
        );
        debug!("PATCH {}", url);

        let resp = self
            .request(reqwest::Method::PATCH, url)
            .header("Content-Type", "application/strategic-merge-patch+json")
            .json(body)
            .send()
            .await?;

        check_status(resp, "deployment patch").await?;
        Ok(())
    }

    /// POST /api/v1/namespaces/{namespace}/pods/{pod_name}/binding
    ///
    /// The binding is the orchestrator's compare-and-set: the first accepted
    /// binding wins and every later one is rejected. A rejection (or a pod
    /// that has disappeared) surfaces as [`ClientError::Conflict`].
    pub async fn create_binding(
        &self,
        namespace: &str,
        pod_name: &str,
        node_name: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/api/v1/namespaces/{}/pods/{}/binding",
            self.base_url, namespace, pod_name
        );
        debug!("POST {}", url);

        let binding = binding_body(namespace, pod_name, node_name);

        let resp = self
            .request(reqwest::Method::POST, url)
            .json(&binding)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::CONFLICT || status == StatusCode::NOT_FOUND {
            return Err(ClientError::conflict(format!("{}/{}", namespace, pod_name)));
        }

        check_status(resp, "binding").await?;
        Ok(())
    }

    /// GET /api/v1/pods?watch=true with a field selector.
    ///
    /// Returns a live event stream. An immediate 410 response (resource
    /// version too old) surfaces as [`ClientError::StreamExpired`].
    pub async fn watch_pods(
        &self,
        field_selector: &str,
        resource_version: Option<&str>,
    ) -> Result<PodWatchStream> {
        let url = format!("{}/api/v1/pods", self.base_url);
        debug!("WATCH {} fieldSelector={}", url, field_selector);

        let mut query: Vec<(&str, &str)> = vec![
            ("watch", "true"),
            ("allowWatchBookmarks", "true"),
            ("fieldSelector", field_selector),
        ];
        if let Some(version) = resource_version {
            query.push(("resourceVersion", version));
        }

        let resp = self
            .request(reqwest::Method::GET, url)
            .query(&query)
            .send()
            .await?;

        let resp = check_status(resp, "pod watch").await?;
        Ok(PodWatchStream::new(resp))
    }
}

/// Map a non-success response to the matching error kind
async fn check_status(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::GONE {
        return Err(ClientError::StreamExpired);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::api(
        status.as_u16(),
        format!("{} failed: {}", context, body),
    ))
}

/// Build the binding object naming a pod and its target node
fn binding_body(namespace: &str, pod_name: &str, node_name: &str) -> Binding {
    Binding {
        metadata: ObjectMeta {
            name: Some(pod_name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        target: ObjectReference {
            api_version: Some("v1".to_string()),
            kind: Some("Node".to_string()),
            name: Some(node_name.to_string()),
            ..Default::default()
        },
    }
}

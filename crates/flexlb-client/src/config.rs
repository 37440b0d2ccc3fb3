//! Orchestrator client configuration discovery.
//!
//! Resolution order matches the usual controller bootstrap: in-cluster
//! service-account material first, then a local config file. If neither is
//! discoverable the process cannot run and startup fails.

use crate::error::{ClientError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

const IN_CLUSTER_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const IN_CLUSTER_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Resolved connection parameters for the orchestrator API server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API server, e.g. "https://10.0.0.1:443"
    pub server: String,
    /// Bearer token, if any
    pub token: Option<String>,
    /// PEM-encoded CA certificate to trust, if any
    pub ca_cert_pem: Option<Vec<u8>>,
}

/// Minimal local config file schema (kubeconfig-compatible subset)
#[derive(Debug, Deserialize)]
struct LocalConfigFile {
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    cluster: ClusterEntry,
}

#[derive(Debug, Deserialize)]
struct ClusterEntry {
    server: String,
    #[serde(rename = "certificate-authority")]
    certificate_authority: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    user: UserEntry,
}

#[derive(Debug, Deserialize, Default)]
struct UserEntry {
    token: Option<String>,
}

impl ClientConfig {
    /// Discover a configuration: in-cluster first, local config file second.
    pub fn discover() -> Result<Self> {
        match Self::in_cluster() {
            Ok(config) => {
                info!("Loaded in-cluster orchestrator configuration");
                return Ok(config);
            }
            Err(e) => {
                info!("No in-cluster configuration ({}), trying local config", e);
            }
        }

        let path = Self::local_config_path()?;
        let config = Self::from_file(&path)?;
        info!("Loaded local orchestrator configuration from {:?}", path);
        Ok(config)
    }

    /// Build a configuration from the in-cluster environment.
    pub fn in_cluster() -> Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| ClientError::configuration("KUBERNETES_SERVICE_HOST is not set"))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT")
            .map_err(|_| ClientError::configuration("KUBERNETES_SERVICE_PORT is not set"))?;

        let token = std::fs::read_to_string(IN_CLUSTER_TOKEN_PATH)
            .map_err(|e| {
                ClientError::configuration(format!(
                    "cannot read service account token at {}: {}",
                    IN_CLUSTER_TOKEN_PATH, e
                ))
            })?
            .trim()
            .to_string();

        let ca_cert_pem = std::fs::read(IN_CLUSTER_CA_PATH).ok();

        Ok(Self {
            server: format!("https://{}:{}", host, port),
            token: Some(token),
            ca_cert_pem,
        })
    }

    /// Build a configuration from a local YAML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClientError::configuration(format!("cannot read config file {:?}: {}", path, e))
        })?;

        let parsed: LocalConfigFile = serde_yaml::from_str(&raw).map_err(|e| {
            ClientError::configuration(format!("malformed config file {:?}: {}", path, e))
        })?;

        let cluster = parsed
            .clusters
            .first()
            .map(|c| &c.cluster)
            .ok_or_else(|| {
                ClientError::configuration(format!("config file {:?} defines no clusters", path))
            })?;

        let ca_cert_pem = match &cluster.certificate_authority {
            Some(ca_path) => Some(std::fs::read(ca_path).map_err(|e| {
                ClientError::configuration(format!(
                    "cannot read certificate authority {:?}: {}",
                    ca_path, e
                ))
            })?),
            None => None,
        };

        let token = parsed
            .users
            .first()
            .and_then(|u| u.user.token.clone());

        Ok(Self {
            server: cluster.server.trim_end_matches('/').to_string(),
            token,
            ca_cert_pem,
        })
    }

    /// Path of the local config file: $KUBECONFIG, or ~/.kube/config.
    fn local_config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("KUBECONFIG") {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let home = std::env::var("HOME")
            .map_err(|_| ClientError::configuration("neither KUBECONFIG nor HOME is set"))?;
        Ok(PathBuf::from(home).join(".kube").join("config"))
    }
}

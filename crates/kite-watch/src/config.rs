use std::path::{Path, PathBuf};

use kite_model::{LabelSelector, ResourceKind};

use crate::errors::SourceError;

/// Where service-account credentials are mounted inside a pod.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Base URL of the API server, e.g. `https://10.0.0.1:443`.
    pub endpoint: String,
    /// Restrict to one namespace; `None` watches all namespaces.
    pub namespace: Option<String>,
    pub kind: ResourceKind,
    pub label_selector: LabelSelector,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Extra PEM root certificate to trust.
    pub ca_cert: Option<PathBuf>,
    /// Server-side lifetime of one watch request.
    pub watch_timeout_secs: u64,
    /// Connect timeout, and total timeout for list and probe requests.
    pub request_timeout_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8001".to_string(),
            namespace: None,
            kind: ResourceKind::Pod,
            label_selector: LabelSelector::everything(),
            token: None,
            ca_cert: None,
            watch_timeout_secs: 290,
            request_timeout_ms: 30_000,
        }
    }
}

impl WatchConfig {
    /// Configuration for a process running inside the cluster.
    ///
    /// Reads `KUBERNETES_SERVICE_HOST`/`KUBERNETES_SERVICE_PORT` and the mounted service-account
    /// token, namespace and CA certificate.
    pub fn in_cluster(kind: ResourceKind) -> Result<Self, SourceError> {
        Self::in_cluster_from(kind, Path::new(SERVICE_ACCOUNT_DIR), |name| {
            std::env::var(name).ok()
        })
    }

    pub(crate) fn in_cluster_from(
        kind: ResourceKind,
        dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SourceError> {
        let host = env("KUBERNETES_SERVICE_HOST")
            .filter(|h| !h.is_empty())
            .ok_or(SourceError::MissingEnv("KUBERNETES_SERVICE_HOST"))?;
        let port = env("KUBERNETES_SERVICE_PORT").unwrap_or_else(|| "443".to_string());
        let endpoint = if host.contains(':') {
            format!("https://[{host}]:{port}")
        } else {
            format!("https://{host}:{port}")
        };

        let token_path = dir.join("token");
        let token = std::fs::read_to_string(&token_path)
            .map_err(|source| SourceError::ReadFile {
                path: token_path,
                source,
            })?
            .trim()
            .to_string();

        let namespace = std::fs::read_to_string(dir.join("namespace"))
            .ok()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty());

        let ca = dir.join("ca.crt");
        let ca_cert = ca.exists().then_some(ca);

        Ok(Self {
            endpoint,
            namespace,
            kind,
            token: Some(token),
            ca_cert,
            ..Self::default()
        })
    }
}

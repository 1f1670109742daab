mod frame;
mod lines;

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use kite_core::{ResourceList, WatchError, WatchSource, WatchStream};
use kite_model::{Resource, ResourceKind};

use crate::{config::WatchConfig, errors::SourceError};
use frame::{ApiStatus, frames};

#[derive(Debug, Deserialize)]
struct ListBody {
    #[serde(default)]
    metadata: ListMeta,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMeta {
    #[serde(default)]
    resource_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    #[serde(default)]
    git_version: String,
}

/// [`WatchSource`] backed by a Kubernetes-compatible API server.
///
/// Lists with `GET {prefix}[/namespaces/{ns}]/{plural}` and watches the same collection with
/// `watch=true`, decoding the newline-delimited JSON frames of the response body.
pub struct HttpSource {
    client: reqwest::Client,
    cfg: WatchConfig,
    base: Url,
}

impl HttpSource {
    pub fn new(cfg: WatchConfig) -> Result<Self, SourceError> {
        let base = Url::parse(&cfg.endpoint).map_err(|e| SourceError::InvalidEndpoint {
            endpoint: cfg.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(SourceError::InvalidEndpoint {
                endpoint: cfg.endpoint.clone(),
                reason: "not a base URL".into(),
            });
        }

        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(cfg.request_timeout_ms));
        if let Some(path) = &cfg.ca_cert {
            let pem = std::fs::read(path).map_err(|source| SourceError::ReadFile {
                path: path.clone(),
                source,
            })?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }
        let client = builder.build()?;

        Ok(Self { client, cfg, base })
    }

    /// Build the source and verify the server is reachable and accepts the credentials.
    pub async fn connect(cfg: WatchConfig) -> Result<Self, SourceError> {
        let source = Self::new(cfg)?;
        let version = source.probe().await.map_err(SourceError::Probe)?;
        info!(endpoint = %source.cfg.endpoint, %version, "connected to api server");
        Ok(source)
    }

    /// `GET /version`; returns the server's git version.
    pub async fn probe(&self) -> Result<String, WatchError> {
        let mut url = self.base.clone();
        url.set_path("/version");
        let resp = self
            .request(url)
            .timeout(self.request_timeout())
            .send()
            .await
            .map_err(transport)?;
        let info: VersionInfo = check(resp).await?.json().await.map_err(transport)?;
        Ok(info.git_version)
    }

    pub fn config(&self) -> &WatchConfig {
        &self.cfg
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.cfg.request_timeout_ms)
    }

    fn request(&self, url: Url) -> RequestBuilder {
        let req = self.client.get(url);
        match &self.cfg.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn collection_url(&self) -> Url {
        let kind = self.cfg.kind;
        let path = match &self.cfg.namespace {
            Some(ns) => format!("{}/namespaces/{ns}/{}", kind.api_prefix(), kind.plural()),
            None => format!("{}/{}", kind.api_prefix(), kind.plural()),
        };
        let mut url = self.base.clone();
        url.set_path(&path);
        if !self.cfg.label_selector.is_empty() {
            url.query_pairs_mut()
                .append_pair("labelSelector", &self.cfg.label_selector.to_string());
        }
        url
    }

    pub(crate) fn list_url(&self) -> Url {
        self.collection_url()
    }

    pub(crate) fn watch_url(&self, resource_version: &str) -> Url {
        let mut url = self.collection_url();
        url.query_pairs_mut()
            .append_pair("watch", "true")
            .append_pair("resourceVersion", resource_version)
            .append_pair("allowWatchBookmarks", "true")
            .append_pair("timeoutSeconds", &self.cfg.watch_timeout_secs.to_string());
        url
    }
}

fn transport(e: reqwest::Error) -> WatchError {
    if e.is_decode() {
        WatchError::Decode(e.to_string())
    } else {
        WatchError::Connect(e.to_string())
    }
}

/// Pass successful responses through; turn anything else into a [`WatchError`].
async fn check(resp: Response) -> Result<Response, WatchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let api: ApiStatus = serde_json::from_str(&body).unwrap_or_else(|_| ApiStatus {
        message: body.trim().to_string(),
        ..Default::default()
    });
    Err(api.into_error(status.as_u16()))
}

#[async_trait]
impl WatchSource for HttpSource {
    fn kind(&self) -> ResourceKind {
        self.cfg.kind
    }

    #[instrument(level = "debug", skip(self), fields(kind = %self.cfg.kind))]
    async fn list(&self) -> Result<ResourceList, WatchError> {
        let resp = self
            .request(self.list_url())
            .timeout(self.request_timeout())
            .send()
            .await
            .map_err(transport)?;
        let body: ListBody = check(resp).await?.json().await.map_err(transport)?;

        let kind = self.cfg.kind;
        let items = body
            .items
            .into_iter()
            .map(|v| Resource::decode(kind, v))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| WatchError::Decode(e.to_string()))?;
        debug!(items = items.len(), version = %body.metadata.resource_version, "listed");

        Ok(ResourceList {
            items,
            resource_version: body.metadata.resource_version,
        })
    }

    #[instrument(level = "debug", skip(self), fields(kind = %self.cfg.kind))]
    async fn watch(&self, resource_version: &str) -> Result<WatchStream, WatchError> {
        let resp = self
            .request(self.watch_url(resource_version))
            .send()
            .await
            .map_err(transport)?;
        let resp = check(resp).await?;
        debug!("watch stream opened");
        Ok(frames(resp.bytes_stream(), self.cfg.kind).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(cfg: WatchConfig) -> HttpSource {
        HttpSource::new(cfg).unwrap()
    }

    #[test]
    fn namespaced_list_url_carries_selector() {
        let s = source(WatchConfig {
            endpoint: "https://10.96.0.1:443".into(),
            namespace: Some("wr".into()),
            label_selector: "app=wr-manager".parse().unwrap(),
            ..Default::default()
        });
        assert_eq!(
            s.list_url().as_str(),
            "https://10.96.0.1/api/v1/namespaces/wr/pods?labelSelector=app%3Dwr-manager"
        );
    }

    #[test]
    fn watch_url_resumes_from_version() {
        let s = source(WatchConfig {
            endpoint: "http://127.0.0.1:8001".into(),
            kind: ResourceKind::ConfigMap,
            watch_timeout_secs: 60,
            ..Default::default()
        });
        assert_eq!(
            s.watch_url("1234").as_str(),
            "http://127.0.0.1:8001/api/v1/configmaps?watch=true&resourceVersion=1234&allowWatchBookmarks=true&timeoutSeconds=60"
        );
    }

    #[test]
    fn rejects_malformed_endpoint() {
        assert!(matches!(
            HttpSource::new(WatchConfig {
                endpoint: "not a url".into(),
                ..Default::default()
            }),
            Err(SourceError::InvalidEndpoint { .. })
        ));
    }
}

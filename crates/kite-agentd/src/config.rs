use std::time::Duration;

use anyhow::{Context, bail};

use kite_core::ControllerConfig;
use kite_model::{LabelSelector, ResourceKind};
use kite_observe::{LoggerConfig, LoggerFormat};
use kite_watch::WatchConfig;

pub const DEFAULT_SELECTOR: &str = "app=wr-manager";

/// Everything the agent needs, read from `KITE_*` variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub logger: LoggerConfig,
    /// `None` means "derive from the in-cluster service account".
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub kind: ResourceKind,
    pub selector: LabelSelector,
    pub controller: ControllerConfig,
    pub hook: Option<String>,
    pub hook_permanent_codes: Vec<i32>,
    pub metrics: bool,
}

impl AgentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut logger = LoggerConfig {
            identifier: "kite-agentd".to_string(),
            ..LoggerConfig::default()
        };
        if let Some(format) = get("KITE_LOG_FORMAT") {
            logger.format = format
                .parse::<LoggerFormat>()
                .with_context(|| format!("KITE_LOG_FORMAT={format}"))?;
        }
        if let Some(level) = get("KITE_LOG_LEVEL") {
            logger.level = level;
        }

        let kind = match get("KITE_KIND") {
            Some(kind) => kind
                .parse::<ResourceKind>()
                .with_context(|| format!("KITE_KIND={kind}"))?,
            None => ResourceKind::Pod,
        };
        let selector = get("KITE_SELECTOR")
            .unwrap_or_else(|| DEFAULT_SELECTOR.to_string())
            .parse::<LabelSelector>()
            .context("KITE_SELECTOR")?;

        let mut controller = ControllerConfig::default();
        if let Some(workers) = parse::<usize>(&get, "KITE_WORKERS")? {
            controller.workers = workers;
        }
        if let Some(ceiling) = parse::<u32>(&get, "KITE_RETRY_CEILING")? {
            controller.retry_ceiling = ceiling;
        }
        controller.reconcile_timeout =
            parse::<u64>(&get, "KITE_RECONCILE_TIMEOUT_MS")?.map(Duration::from_millis);
        controller.sync_timeout = parse::<u64>(&get, "KITE_SYNC_TIMEOUT_SECS")?.map(Duration::from_secs);
        controller.resync_period = parse::<u64>(&get, "KITE_RESYNC_SECS")?.map(Duration::from_secs);
        if let Some(grace) = parse::<u64>(&get, "KITE_SHUTDOWN_GRACE_SECS")? {
            controller.shutdown_grace = Duration::from_secs(grace);
        }
        controller.validate()?;

        let hook_permanent_codes = match get("KITE_HOOK_PERMANENT_CODES") {
            Some(list) => list
                .split(',')
                .map(|c| c.trim().parse::<i32>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("KITE_HOOK_PERMANENT_CODES={list}"))?,
            None => Vec::new(),
        };

        let hook = get("KITE_HOOK");
        if hook.is_none() && kind != ResourceKind::Pod {
            bail!("KITE_HOOK is required when watching {kind}");
        }

        let metrics = match get("KITE_METRICS").as_deref() {
            None | Some("0" | "false" | "no") => false,
            Some("1" | "true" | "yes") => true,
            Some(other) => bail!("KITE_METRICS={other}: expected a boolean"),
        };

        Ok(Self {
            logger,
            endpoint: get("KITE_ENDPOINT"),
            token: get("KITE_TOKEN"),
            namespace: get("KITE_NAMESPACE"),
            kind,
            selector,
            controller,
            hook,
            hook_permanent_codes,
            metrics,
        })
    }

    /// Watch settings: explicit endpoint if given, otherwise the in-cluster service account.
    pub fn watch(&self) -> anyhow::Result<WatchConfig> {
        let mut cfg = match &self.endpoint {
            Some(endpoint) => WatchConfig {
                endpoint: endpoint.clone(),
                ..WatchConfig::default()
            },
            None => WatchConfig::in_cluster(self.kind)
                .context("KITE_ENDPOINT is not set and in-cluster configuration is unavailable")?,
        };
        cfg.kind = self.kind;
        cfg.label_selector = self.selector.clone();
        if self.token.is_some() {
            cfg.token = self.token.clone();
        }
        if self.namespace.is_some() {
            cfg.namespace = self.namespace.clone();
        }
        Ok(cfg)
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(name)
        .map(|v| v.parse::<T>().with_context(|| format!("{name}={v}")))
        .transpose()
}

use std::time::Duration;

use crate::{
    error::CoreError,
    queue::{BackoffConfig, BucketConfig},
    watch::DispatchConfig,
    worker::DEFAULT_RETRY_CEILING,
};

/// Controller tuning.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Number of concurrent worker tasks.
    pub workers: usize,
    /// Retries of a transiently failing key before it is dropped and reported.
    pub retry_ceiling: u32,
    /// Deadline for a single reconcile call. `None` means unbounded.
    pub reconcile_timeout: Option<Duration>,
    /// How long to wait for the initial listing. `None` waits until cancelled.
    pub sync_timeout: Option<Duration>,
    /// Time granted to in-flight reconciles on shutdown before they are aborted.
    pub shutdown_grace: Duration,
    /// Re-enqueue every cached key at this interval.
    pub resync_period: Option<Duration>,
    /// Per-key retry backoff.
    pub backoff: BackoffConfig,
    /// Overall retry rate.
    pub bucket: BucketConfig,
    /// Backoff between failed list/watch attempts.
    pub relist_backoff: BackoffConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            reconcile_timeout: None,
            sync_timeout: None,
            shutdown_grace: Duration::from_secs(30),
            resync_period: None,
            backoff: BackoffConfig::default(),
            bucket: BucketConfig::default(),
            relist_backoff: DispatchConfig::default().relist_backoff,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.workers == 0 {
            return Err(CoreError::InvalidConfig("workers must be at least 1".into()));
        }
        for (name, b) in [("backoff", &self.backoff), ("relist_backoff", &self.relist_backoff)] {
            if b.base_ms == 0 || b.base_ms > b.max_ms {
                return Err(CoreError::InvalidConfig(format!(
                    "{name}: base_ms must be positive and not exceed max_ms"
                )));
            }
        }
        if self.bucket.qps.is_nan() || self.bucket.qps <= 0.0 || self.bucket.burst == 0 {
            return Err(CoreError::InvalidConfig(
                "bucket: qps and burst must be positive".into(),
            ));
        }
        if self.resync_period.is_some_and(|p| p.is_zero()) {
            return Err(CoreError::InvalidConfig(
                "resync_period must be positive".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            relist_backoff: self.relist_backoff,
            resync_period: self.resync_period,
            ..DispatchConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ControllerConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.workers, 1);
        assert_eq!(cfg.retry_ceiling, 5);
        assert_eq!(cfg.backoff.base_ms, 5);
        assert_eq!(cfg.backoff.max_ms, 1_000_000);
    }

    #[test]
    fn rejects_degenerate_values() {
        let cases = [
            ControllerConfig {
                workers: 0,
                ..Default::default()
            },
            ControllerConfig {
                backoff: BackoffConfig {
                    base_ms: 10,
                    max_ms: 1,
                },
                ..Default::default()
            },
            ControllerConfig {
                bucket: BucketConfig { qps: 0.0, burst: 1 },
                ..Default::default()
            },
            ControllerConfig {
                resync_period: Some(Duration::ZERO),
                ..Default::default()
            },
        ];
        for cfg in cases {
            assert!(matches!(cfg.validate(), Err(CoreError::InvalidConfig(_))));
        }
    }
}

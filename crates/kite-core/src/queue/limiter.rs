use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use tokio::time::Instant;

use kite_model::ResourceKey;

use crate::sync::lock;

/// Decides how long a failed key waits before it becomes visible to workers again.
pub trait RateLimiter: Send + Sync {
    /// Delay for the next retry of `key`. Records one more failure for it.
    fn when(&self, key: &ResourceKey) -> Duration;
    /// Drop all retry history for `key`.
    fn forget(&self, key: &ResourceKey);
    /// Failures recorded for `key` since the last `forget`.
    fn num_requeues(&self, key: &ResourceKey) -> u32;
}

/// Per-key exponential backoff parameters.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub base_ms: u64,
    /// Upper bound for any single delay.
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 5,
            max_ms: 1_000_000,
        }
    }
}

impl BackoffConfig {
    /// `base * 2^exp`, capped at `max`.
    pub fn delay(&self, exp: u32) -> Duration {
        let max = Duration::from_millis(self.max_ms);
        2u32.checked_pow(exp)
            .and_then(|factor| Duration::from_millis(self.base_ms).checked_mul(factor))
            .map_or(max, |d| d.min(max))
    }
}

/// Overall token bucket shared by all keys.
#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    pub qps: f64,
    pub burst: u32,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            qps: 10.0,
            burst: 100,
        }
    }
}

/// Doubles the delay on each consecutive failure of the same key.
pub struct ExponentialLimiter {
    cfg: BackoffConfig,
    failures: Mutex<HashMap<ResourceKey, u32>>,
}

impl ExponentialLimiter {
    pub fn new(cfg: BackoffConfig) -> Self {
        Self {
            cfg,
            failures: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for ExponentialLimiter {
    fn when(&self, key: &ResourceKey) -> Duration {
        let mut failures = lock(&self.failures);
        let count = failures.entry(key.clone()).or_insert(0);
        let exp = *count;
        *count = count.saturating_add(1);
        self.cfg.delay(exp)
    }

    fn forget(&self, key: &ResourceKey) {
        lock(&self.failures).remove(key);
    }

    fn num_requeues(&self, key: &ResourceKey) -> u32 {
        lock(&self.failures).get(key).copied().unwrap_or(0)
    }
}

/// Caps the overall retry rate regardless of which keys are failing.
pub struct BucketLimiter {
    cfg: BucketConfig,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last: Instant,
}

impl BucketLimiter {
    pub fn new(cfg: BucketConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(BucketState {
                tokens: f64::from(cfg.burst),
                last: Instant::now(),
            }),
        }
    }
}

impl RateLimiter for BucketLimiter {
    fn when(&self, _key: &ResourceKey) -> Duration {
        if self.cfg.qps <= 0.0 {
            return Duration::ZERO;
        }
        let mut st = lock(&self.state);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(st.last).as_secs_f64();
        st.last = now;
        st.tokens = (st.tokens + elapsed * self.cfg.qps).min(f64::from(self.cfg.burst));
        st.tokens -= 1.0;

        if st.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-st.tokens / self.cfg.qps)
        }
    }

    fn forget(&self, _key: &ResourceKey) {}

    fn num_requeues(&self, _key: &ResourceKey) -> u32 {
        0
    }
}

/// Combines limiters by taking the longest delay.
pub struct MaxOfLimiter {
    limiters: Vec<Box<dyn RateLimiter>>,
}

impl MaxOfLimiter {
    pub fn new(limiters: Vec<Box<dyn RateLimiter>>) -> Self {
        Self { limiters }
    }
}

impl RateLimiter for MaxOfLimiter {
    fn when(&self, key: &ResourceKey) -> Duration {
        self.limiters
            .iter()
            .map(|l| l.when(key))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(&self, key: &ResourceKey) {
        for l in &self.limiters {
            l.forget(key);
        }
    }

    fn num_requeues(&self, key: &ResourceKey) -> u32 {
        self.limiters
            .iter()
            .map(|l| l.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

/// Per-key exponential backoff bounded by an overall token bucket.
pub fn default_controller_limiter(backoff: BackoffConfig, bucket: BucketConfig) -> MaxOfLimiter {
    MaxOfLimiter::new(vec![
        Box::new(ExponentialLimiter::new(backoff)),
        Box::new(BucketLimiter::new(bucket)),
    ])
}

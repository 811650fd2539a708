//! Time source and bounded polling used between browser actions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::DriverError;

/// Injectable time source. Production sleeps on tokio; tests advance a
/// virtual clock instantly.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn elapsed(&self) -> Duration;
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Debug)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` advances time without waiting and records the
/// requested duration.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.inner.lock().elapsed += duration;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.inner.lock().sleeps.iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.inner.lock().elapsed
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.inner.lock();
            state.elapsed += duration;
            state.sleeps.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

/// Backoff schedule for [`poll_until`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    pub timeout_ms: u64,
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub factor: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            initial_interval_ms: 100,
            max_interval_ms: 1_000,
            factor: 2,
        }
    }
}

impl PollPolicy {
    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Self::default()
        }
    }
}

/// Runs `probe` until it yields `Some`, backing off between attempts.
///
/// Returns `Ok(None)` once the policy timeout elapses without a hit. The
/// probe always runs at least once. Probe errors end the poll immediately.
pub async fn poll_until<T, F, Fut>(
    clock: &dyn Clock,
    policy: &PollPolicy,
    mut probe: F,
) -> Result<Option<T>, DriverError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, DriverError>>,
{
    let started = clock.elapsed();
    let timeout = Duration::from_millis(policy.timeout_ms);
    let max_interval = Duration::from_millis(policy.max_interval_ms.max(1));
    let mut interval = Duration::from_millis(policy.initial_interval_ms.max(1)).min(max_interval);

    loop {
        if let Some(found) = probe().await? {
            return Ok(Some(found));
        }
        let spent = clock.elapsed().saturating_sub(started);
        if spent >= timeout {
            return Ok(None);
        }
        clock.sleep(interval.min(timeout - spent)).await;
        interval = interval
            .checked_mul(policy.factor.max(1))
            .map_or(max_interval, |next| next.min(max_interval));
    }
}

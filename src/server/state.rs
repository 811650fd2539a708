use std::sync::Arc;
use std::time::Duration;

use procurement_flow::RunExecutor;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    executor: Arc<dyn RunExecutor>,
    api_key: Option<Arc<str>>,
    runs: Arc<Semaphore>,
    run_timeout: Duration,
}

impl AppState {
    pub fn new(executor: Arc<dyn RunExecutor>, server: &ServerConfig) -> Self {
        Self {
            executor,
            api_key: server.api_key.as_deref().map(Arc::from),
            runs: Arc::new(Semaphore::new(server.max_concurrent_runs.max(1))),
            run_timeout: Duration::from_secs(server.run_timeout_secs),
        }
    }

    pub fn executor(&self) -> &dyn RunExecutor {
        self.executor.as_ref()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn run_timeout(&self) -> Duration {
        self.run_timeout
    }

    /// `None` when every run slot is taken.
    pub fn try_acquire_run(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.runs).try_acquire_owned().ok()
    }
}

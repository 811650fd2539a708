use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::driver::{Driver, Launcher, Selector};
use crate::error::{DriverError, DriverErrorKind};
use crate::wait::{poll_until, Clock, PollPolicy};

/// Diagnostic capture written into the run folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Screenshot,
    PageSource,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "png",
            ArtifactKind::PageSource => "html",
        }
    }
}

/// Exclusively owned browser session for one run.
///
/// `close` is idempotent. A session dropped without `close` still releases
/// the browser through the driver's own drop.
pub struct DriverSession<D: Driver> {
    driver: D,
    clock: Arc<dyn Clock>,
    artifact_dir: PathBuf,
    nav_retry_backoff: Duration,
    closed: AtomicBool,
}

impl<D: Driver> DriverSession<D> {
    pub async fn open<L>(
        launcher: &L,
        config: &DriverConfig,
        clock: Arc<dyn Clock>,
        artifact_dir: impl Into<PathBuf>,
    ) -> Result<Self, DriverError>
    where
        L: Launcher<Driver = D>,
    {
        let driver = launcher.launch(config).await.map_err(|err| {
            if err.is_launch_failure() {
                err
            } else {
                let hint = err.to_string();
                DriverError::new(DriverErrorKind::LaunchFailed).with_hint(hint)
            }
        })?;
        let backoff = Duration::from_millis(config.nav_retry_backoff_ms);
        Ok(Self::from_driver(driver, clock, artifact_dir, backoff))
    }

    pub fn from_driver(
        driver: D,
        clock: Arc<dyn Clock>,
        artifact_dir: impl Into<PathBuf>,
        nav_retry_backoff: Duration,
    ) -> Self {
        Self {
            driver,
            clock,
            artifact_dir: artifact_dir.into(),
            nav_retry_backoff,
            closed: AtomicBool::new(false),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.is_closed() {
            return Err(DriverError::new(DriverErrorKind::Closed));
        }
        Ok(())
    }

    /// Fixed wait routed through the session clock.
    pub async fn settle(&self, millis: u64) {
        if millis > 0 {
            self.clock.sleep(Duration::from_millis(millis)).await;
        }
    }

    /// Navigates, retrying exactly once after the backoff when the first
    /// failure is retriable.
    pub async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        match self.driver.navigate(url).await {
            Ok(()) => Ok(()),
            Err(err) if err.retriable => {
                warn!(
                    target: "cdp-session",
                    url,
                    error = %err,
                    backoff_ms = self.nav_retry_backoff.as_millis() as u64,
                    "navigation failed; retrying once"
                );
                self.clock.sleep(self.nav_retry_backoff).await;
                self.driver.navigate(url).await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn find(&self, selector: &Selector) -> Result<Option<D::Element>, DriverError> {
        self.ensure_open()?;
        self.driver.find(selector).await
    }

    pub async fn find_all(&self, selector: &Selector) -> Result<Vec<D::Element>, DriverError> {
        self.ensure_open()?;
        self.driver.find_all(selector).await
    }

    pub async fn find_within(
        &self,
        parent: &D::Element,
        selector: &Selector,
    ) -> Result<Vec<D::Element>, DriverError> {
        self.driver.find_within(parent, selector).await
    }

    /// Polls for `selector` under `policy`; `None` when it never shows up.
    pub async fn wait_for(
        &self,
        selector: &Selector,
        policy: &PollPolicy,
    ) -> Result<Option<D::Element>, DriverError> {
        self.ensure_open()?;
        let driver = &self.driver;
        poll_until(self.clock.as_ref(), policy, move || driver.find(selector)).await
    }

    pub async fn click(&self, element: &D::Element) -> Result<(), DriverError> {
        self.driver.click(element).await
    }

    pub async fn clear(&self, element: &D::Element) -> Result<(), DriverError> {
        self.driver.clear(element).await
    }

    pub async fn type_text(&self, element: &D::Element, text: &str) -> Result<(), DriverError> {
        self.driver.type_text(element, text).await
    }

    pub async fn text(&self, element: &D::Element) -> Result<String, DriverError> {
        self.driver.text(element).await
    }

    pub async fn attribute(
        &self,
        element: &D::Element,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.driver.attribute(element, name).await
    }

    pub async fn select_option(&self, element: &D::Element, value: &str) -> Result<(), DriverError> {
        self.driver.select_option(element, value).await
    }

    pub async fn is_displayed(&self, element: &D::Element) -> Result<bool, DriverError> {
        self.driver.is_displayed(element).await
    }

    pub async fn is_enabled(&self, element: &D::Element) -> Result<bool, DriverError> {
        self.driver.is_enabled(element).await
    }

    pub async fn scroll_into_view(&self, element: &D::Element) -> Result<(), DriverError> {
        self.driver.scroll_into_view(element).await
    }

    /// Writes a screenshot or page source to `<artifact_dir>/<name>.<ext>`.
    pub async fn dump_artifact(&self, kind: ArtifactKind, name: &str) -> Result<PathBuf, DriverError> {
        self.ensure_open()?;
        let bytes = match kind {
            ArtifactKind::Screenshot => self.driver.screenshot().await?,
            ArtifactKind::PageSource => self.driver.page_source().await?.into_bytes(),
        };
        tokio::fs::create_dir_all(&self.artifact_dir).await?;
        let path = self
            .artifact_dir
            .join(format!("{name}.{}", kind.extension()));
        tokio::fs::write(&path, bytes).await?;
        debug!(target: "cdp-session", path = %path.display(), ?kind, "artifact saved");
        Ok(path)
    }

    /// Releases the browser. Later calls are no-ops.
    pub async fn close(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(target: "cdp-session", "closing browser session");
        self.driver.quit().await
    }
}

impl<D: Driver> Drop for DriverSession<D> {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            warn!(
                target: "cdp-session",
                "session dropped without close; browser released on drop"
            );
        }
    }
}

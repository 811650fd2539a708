//! Chromium implementation of [`Driver`] on top of `chromiumoxide`.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::driver::{Driver, Launcher, Selector};
use crate::error::{DriverError, DriverErrorKind};

const CLEAR_JS: &str = r#"function() {
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

const DISPLAYED_JS: &str = r#"function() {
    const style = window.getComputedStyle(this);
    if (style.display === 'none' || style.visibility === 'hidden') {
        return false;
    }
    if (this.tagName === 'INPUT' && (this.type || '').toLowerCase() === 'hidden') {
        return false;
    }
    const rect = this.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}"#;

const ENABLED_JS: &str = r#"function() {
    return !this.disabled && !this.closest('fieldset[disabled]');
}"#;

/// Chromium-backed driver. Owns the browser process and the single page it
/// drives.
pub struct ChromiumDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn call_fn(&self, element: &Element, declaration: String) -> Result<Option<Value>, DriverError> {
        let returns = element
            .call_js_fn(declaration, false)
            .await
            .map_err(map_cdp_error)?;
        Ok(returns.result.value)
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        // Browser's own drop kills the child process if it is still running.
        self.handler.abort();
    }
}

#[async_trait]
impl Driver for ChromiumDriver {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        debug!(target: "cdp-session", url, "navigate");
        self.page.goto(url).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn find(&self, selector: &Selector) -> Result<Option<Element>, DriverError> {
        Ok(self.find_all(selector).await?.into_iter().next())
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<Element>, DriverError> {
        self.page
            .find_elements(selector.to_css())
            .await
            .or_else(absent_as_empty)
    }

    async fn find_within(
        &self,
        parent: &Element,
        selector: &Selector,
    ) -> Result<Vec<Element>, DriverError> {
        parent
            .find_elements(selector.to_css())
            .await
            .or_else(absent_as_empty)
    }

    async fn click(&self, element: &Element) -> Result<(), DriverError> {
        element.click().await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn clear(&self, element: &Element) -> Result<(), DriverError> {
        self.call_fn(element, CLEAR_JS.to_string()).await?;
        Ok(())
    }

    async fn type_text(&self, element: &Element, text: &str) -> Result<(), DriverError> {
        element.focus().await.map_err(map_cdp_error)?;
        element.type_str(text).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn select_option(&self, element: &Element, value: &str) -> Result<(), DriverError> {
        let literal = serde_json::to_string(value).map_err(|err| {
            DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string())
        })?;
        let declaration = format!(
            r#"function() {{
    const wanted = {literal};
    const options = Array.from(this.options || []);
    if (!options.some((option) => option.value === wanted)) {{
        return false;
    }}
    this.value = wanted;
    this.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}}"#
        );
        match self.call_fn(element, declaration).await? {
            Some(Value::Bool(true)) => Ok(()),
            _ => Err(DriverError::new(DriverErrorKind::OptionNotFound)
                .with_hint(format!("no option with value {value}"))),
        }
    }

    async fn scroll_into_view(&self, element: &Element) -> Result<(), DriverError> {
        element.scroll_into_view().await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn text(&self, element: &Element) -> Result<String, DriverError> {
        let text = element.inner_text().await.map_err(map_cdp_error)?;
        Ok(text.map(|value| value.trim().to_string()).unwrap_or_default())
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, DriverError> {
        let literal = serde_json::to_string(name).map_err(|err| {
            DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string())
        })?;
        // DOM property first (resolved href, live value), then the raw attribute.
        let declaration = format!(
            r#"function() {{
    const name = {literal};
    const prop = this[name];
    if (prop !== undefined && prop !== null && typeof prop !== 'object' && typeof prop !== 'function') {{
        return String(prop);
    }}
    return this.getAttribute(name);
}}"#
        );
        Ok(match self.call_fn(element, declaration).await? {
            Some(Value::String(value)) => Some(value),
            _ => None,
        })
    }

    async fn is_displayed(&self, element: &Element) -> Result<bool, DriverError> {
        let value = self.call_fn(element, DISPLAYED_JS.to_string()).await?;
        Ok(matches!(value, Some(Value::Bool(true))))
    }

    async fn is_enabled(&self, element: &Element) -> Result<bool, DriverError> {
        let value = self.call_fn(element, ENABLED_JS.to_string()).await?;
        Ok(matches!(value, Some(Value::Bool(true))))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page.screenshot(params).await.map_err(map_cdp_error)
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        self.page.content().await.map_err(map_cdp_error)
    }

    async fn quit(&self) -> Result<(), DriverError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        if let Err(err) = browser.close().await {
            warn!(target: "cdp-session", %err, "graceful close failed; killing browser");
            if let Some(Err(kill_err)) = browser.kill().await {
                return Err(DriverError::new(DriverErrorKind::CdpIo)
                    .with_hint(format!("failed to kill browser: {kill_err}")));
            }
        }
        if let Err(err) = browser.wait().await {
            debug!(target: "cdp-session", %err, "browser wait failed after close");
        }
        self.handler.abort();
        info!(target: "cdp-session", "browser closed");
        Ok(())
    }
}

/// Launches Chromium with the configured switches.
#[derive(Clone, Debug, Default)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    fn browser_config(cfg: &DriverConfig) -> Result<BrowserConfig, DriverError> {
        let executable = cfg.resolve_executable().ok_or_else(|| {
            DriverError::new(DriverErrorKind::LaunchFailed)
                .with_hint("chrome executable not found; set LICITACIONES_CHROME to its full path")
        })?;

        // Headless mode is requested through `--headless=new` in the launch args.
        let mut builder = BrowserConfig::builder()
            .with_head()
            .chrome_executable(executable)
            .window_size(cfg.window_width, cfg.window_height)
            .request_timeout(Duration::from_millis(cfg.page_load_timeout_ms))
            .launch_timeout(Duration::from_secs(30))
            .no_sandbox()
            .args(cfg.launch_args());

        if let Some(dir) = &cfg.user_data_dir {
            std::fs::create_dir_all(dir).map_err(|err| {
                DriverError::new(DriverErrorKind::LaunchFailed)
                    .with_hint(format!("failed to ensure user-data-dir: {err}"))
            })?;
            builder = builder.user_data_dir(dir.clone());
        }

        builder.build().map_err(|err| {
            DriverError::new(DriverErrorKind::LaunchFailed)
                .with_hint(format!("browser config error: {err}"))
        })
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    type Driver = ChromiumDriver;

    async fn launch(&self, config: &DriverConfig) -> Result<ChromiumDriver, DriverError> {
        let browser_config = Self::browser_config(config)?;
        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|err| {
            DriverError::new(DriverErrorKind::LaunchFailed)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp-session", %err, "cdp handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                handler.abort();
                return Err(DriverError::new(DriverErrorKind::LaunchFailed)
                    .with_hint(format!("failed to open page: {err}")));
            }
        };

        info!(
            target: "cdp-session",
            headless = config.headless,
            width = config.window_width,
            height = config.window_height,
            "browser launched"
        );

        Ok(ChromiumDriver {
            browser: Mutex::new(Some(browser)),
            page,
            handler,
        })
    }
}

fn absent_as_empty(err: CdpError) -> Result<Vec<Element>, DriverError> {
    match err {
        CdpError::NotFound => Ok(Vec::new()),
        other => Err(map_cdp_error(other)),
    }
}

pub(crate) fn map_cdp_error(err: CdpError) -> DriverError {
    let hint = err.to_string();
    match err {
        CdpError::Timeout => DriverError::new(DriverErrorKind::NavTimeout)
            .with_hint(hint)
            .retriable(true),
        CdpError::NotFound => DriverError::new(DriverErrorKind::ElementNotFound).with_hint(hint),
        CdpError::JavascriptException(_) | CdpError::Serde(_) => {
            DriverError::new(DriverErrorKind::Internal).with_hint(hint)
        }
        CdpError::Chrome(_) if hint.contains("No node") || hint.contains("Could not find node") => {
            DriverError::new(DriverErrorKind::StaleElement).with_hint(hint)
        }
        CdpError::Ws(_) | CdpError::Io(_) | CdpError::NoResponse => {
            DriverError::new(DriverErrorKind::CdpIo)
                .with_hint(hint)
                .retriable(true)
        }
        _ => DriverError::new(DriverErrorKind::CdpIo).with_hint(hint),
    }
}

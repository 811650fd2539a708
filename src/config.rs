//! Application configuration.
//!
//! Loaded from YAML at `--config` or `<config_dir>/licitaciones/config.yaml`,
//! then patched with `LICITACIONES_*` environment overrides.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cdp_session::config::parse_flag;
use cdp_session::DriverConfig;
use procurement_flow::paginator::DEFAULT_MAX_PAGES;
use procurement_flow::{FlowSettings, PortalConfig, Timings};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

pub const ENV_API_KEY: &str = "LICITACIONES_API_KEY";
pub const ENV_HEADLESS: &str = "LICITACIONES_HEADLESS";
pub const ENV_CHROME: &str = cdp_session::config::CHROME_ENV;
pub const ENV_OUTPUT_DIR: &str = "LICITACIONES_OUTPUT_DIR";
pub const ENV_BIND: &str = "LICITACIONES_BIND";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub browser: DriverConfig,
    pub portal: PortalConfig,
    pub timing: Timings,
    pub output: OutputConfig,
    pub server: ServerConfig,
    pub max_pages: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            browser: DriverConfig::default(),
            portal: PortalConfig::default(),
            timing: Timings::default(),
            output: OutputConfig::default(),
            server: ServerConfig::default(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_root: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("datos_licitaciones"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Requests to `/licitaciones` are rejected while no key is configured.
    pub api_key: Option<String>,
    pub max_concurrent_runs: usize,
    pub run_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            api_key: None,
            max_concurrent_runs: 1,
            run_timeout_secs: 1_800,
        }
    }
}

impl AppConfig {
    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            browser: self.browser.clone(),
            portal: self.portal.clone(),
            timing: self.timing.clone(),
            output_root: self.output.output_root.clone(),
            max_pages: self.max_pages,
        }
    }

    /// Applies `LICITACIONES_*` variables on top of the file values.
    /// Returns the variables whose values were not understood.
    pub fn apply_env_overrides(&mut self) -> Vec<IgnoredEnv> {
        let mut ignored = Vec::new();
        if let Some(key) = non_empty_env(ENV_API_KEY) {
            self.server.api_key = Some(key);
        }
        if let Some(raw) = non_empty_env(ENV_HEADLESS) {
            match parse_flag(&raw) {
                Some(headless) => self.browser.headless = headless,
                None => ignored.push(IgnoredEnv {
                    name: ENV_HEADLESS,
                    value: raw,
                }),
            }
        }
        if let Some(path) = non_empty_env(ENV_CHROME) {
            self.browser.executable = PathBuf::from(path);
        }
        if let Some(dir) = non_empty_env(ENV_OUTPUT_DIR) {
            self.output.output_root = PathBuf::from(dir);
        }
        if let Some(bind) = non_empty_env(ENV_BIND) {
            self.server.bind = bind;
        }
        ignored
    }
}

/// Override variable left unapplied because its value did not parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IgnoredEnv {
    pub name: &'static str,
    pub value: String,
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub from_file: bool,
    pub ignored_env: Vec<IgnoredEnv>,
}

impl LoadedConfig {
    /// Loading happens before the subscriber exists, so the source and any
    /// ignored overrides are reported afterwards.
    pub fn log_source(&self) {
        if self.from_file {
            info!("Loaded configuration from: {}", self.path.display());
        } else {
            warn!(
                "Config file not found, using defaults: {}",
                self.path.display()
            );
        }
        for ignored in &self.ignored_env {
            warn!(value = %ignored.value, "ignoring unrecognised {}", ignored.name);
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("licitaciones");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    let from_file = fs::try_exists(&config_path).await.unwrap_or(false);
    let mut config = if from_file {
        let content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("reading {}", config_path.display()))?;
        serde_yaml::from_str::<AppConfig>(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?
    } else {
        AppConfig::default()
    };

    let ignored_env = config.apply_env_overrides();
    Ok(LoadedConfig {
        config,
        path: config_path,
        from_file,
        ignored_env,
    })
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

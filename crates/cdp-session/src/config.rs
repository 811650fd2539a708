use crate::locate::find_browser;
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

/// Browser executable used when the config leaves `executable` empty.
pub const CHROME_ENV: &str = "LICITACIONES_CHROME";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for launching one browser session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Empty path means "detect at launch time".
    pub executable: PathBuf,
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    pub page_load_timeout_ms: u64,
    pub nav_retry_backoff_ms: u64,
    pub extra_args: Vec<String>,
    /// Fall back to the platform install locations when nothing on `PATH` matches.
    pub search_install_dirs: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::new(),
            user_data_dir: None,
            headless: resolve_headless_default(),
            window_width: 1920,
            window_height: 1080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_load_timeout_ms: 120_000,
            nav_retry_backoff_ms: 5_000,
            extra_args: Vec::new(),
            search_install_dirs: true,
        }
    }
}

impl DriverConfig {
    /// First existing browser among the configured path, `LICITACIONES_CHROME`,
    /// the known binaries on `PATH` and the platform install locations.
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        let from_env = env::var(CHROME_ENV)
            .ok()
            .map(|raw| PathBuf::from(raw.trim()));
        [Some(self.executable.clone()), from_env]
            .into_iter()
            .flatten()
            .find(|path| !path.as_os_str().is_empty() && path.is_file())
            .or_else(|| find_browser(env::var_os("PATH").as_deref(), self.search_install_dirs))
    }

    /// Command-line switches passed to Chromium on top of the builder defaults.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = vec![
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            format!("--user-agent={}", self.user_agent),
            format!("--window-size={},{}", self.window_width, self.window_height),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

fn resolve_headless_default() -> bool {
    // "0", "false", "no", "off" means headful
    match env::var("LICITACIONES_HEADLESS") {
        Ok(value) => parse_flag(&value).unwrap_or(true),
        Err(_) => true,
    }
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn headless_args_include_stealth_switches() {
        let cfg = DriverConfig {
            headless: true,
            ..DriverConfig::default()
        };
        let args = cfg.launch_args();
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(args.iter().any(|arg| arg.starts_with("--user-agent=Mozilla/5.0")));
    }

    #[test]
    fn headful_omits_headless_switch() {
        let cfg = DriverConfig {
            headless: false,
            ..DriverConfig::default()
        };
        assert!(!cfg.launch_args().iter().any(|arg| arg.starts_with("--headless")));
    }

    #[test]
    fn parses_flag_spellings() {
        assert_eq!(parse_flag("Off"), Some(false));
        assert_eq!(parse_flag(" yes "), Some(true));
        assert_eq!(parse_flag("maybe"), None);
    }

    struct ChromeEnv(Option<String>);

    impl ChromeEnv {
        fn set(value: impl AsRef<std::ffi::OsStr>) -> Self {
            let saved = env::var(CHROME_ENV).ok();
            env::set_var(CHROME_ENV, value);
            Self(saved)
        }
    }

    impl Drop for ChromeEnv {
        fn drop(&mut self) {
            match &self.0 {
                Some(value) => env::set_var(CHROME_ENV, value),
                None => env::remove_var(CHROME_ENV),
            }
        }
    }

    fn isolated() -> DriverConfig {
        DriverConfig {
            search_install_dirs: false,
            ..DriverConfig::default()
        }
    }

    #[test]
    #[serial]
    fn configured_executable_wins_over_environment() {
        let dir = tempfile::tempdir().unwrap();
        let configured = dir.path().join("configured-chrome");
        let from_env = dir.path().join("env-chrome");
        std::fs::write(&configured, b"").unwrap();
        std::fs::write(&from_env, b"").unwrap();
        let _env = ChromeEnv::set(&from_env);

        let cfg = DriverConfig {
            executable: configured.clone(),
            ..isolated()
        };
        assert_eq!(cfg.resolve_executable(), Some(configured));
    }

    #[test]
    #[serial]
    fn environment_fills_in_for_a_missing_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let from_env = dir.path().join("env-chrome");
        std::fs::write(&from_env, b"").unwrap();
        let _env = ChromeEnv::set(format!("  {}  ", from_env.display()));

        let cfg = DriverConfig {
            executable: dir.path().join("not-installed"),
            ..isolated()
        };
        assert_eq!(cfg.resolve_executable(), Some(from_env));
    }

    #[test]
    #[serial]
    fn environment_pointing_at_nothing_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let _env = ChromeEnv::set(dir.path().join("gone"));
        let cfg = isolated();
        let resolved = cfg.resolve_executable();
        assert_ne!(resolved, Some(dir.path().join("gone")));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: DriverConfig = serde_json::from_str(r#"{"window_width": 1280}"#).unwrap();
        assert_eq!(cfg.window_width, 1280);
        assert_eq!(cfg.window_height, 1080);
        assert_eq!(cfg.page_load_timeout_ms, 120_000);
        assert!(cfg.search_install_dirs);
    }
}

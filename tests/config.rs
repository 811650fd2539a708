use std::env;
use std::path::PathBuf;

use licitaciones_cli::config::{
    load_config, AppConfig, IgnoredEnv, ENV_API_KEY, ENV_BIND, ENV_CHROME, ENV_HEADLESS, ENV_OUTPUT_DIR,
};
use serial_test::serial;
use tempfile::tempdir;

const ALL_VARS: [&str; 5] = [ENV_API_KEY, ENV_HEADLESS, ENV_CHROME, ENV_OUTPUT_DIR, ENV_BIND];

/// Clears the override variables for the test and restores them afterwards.
struct EnvGuard {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn clean() -> Self {
        let saved = ALL_VARS
            .iter()
            .map(|name| (*name, env::var(name).ok()))
            .collect();
        for name in ALL_VARS {
            env::remove_var(name);
        }
        Self { saved }
    }

    fn set(&self, name: &str, value: &str) {
        env::set_var(name, value);
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, value) in &self.saved {
            match value {
                Some(value) => env::set_var(name, value),
                None => env::remove_var(name),
            }
        }
    }
}

#[tokio::test]
#[serial]
async fn missing_file_falls_back_to_defaults() {
    let _env = EnvGuard::clean();
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let loaded = load_config(Some(path.as_path())).await.unwrap();

    assert!(!loaded.from_file);
    assert_eq!(loaded.path, path);
    assert_eq!(loaded.config.max_pages, 500);
    assert_eq!(loaded.config.server.bind, "0.0.0.0:8000");
    assert!(loaded.config.server.api_key.is_none());
    assert_eq!(
        loaded.config.output.output_root,
        PathBuf::from("datos_licitaciones")
    );
    assert!(loaded.config.browser.headless);
}

#[tokio::test]
#[serial]
async fn partial_file_keeps_remaining_defaults() {
    let _env = EnvGuard::clean();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        "max_pages: 3\n\
         server:\n  api_key: from-file\n  max_concurrent_runs: 2\n\
         timing:\n  after_load_ms: 100\n\
         portal:\n  pagination_marker: Page\n",
    )
    .unwrap();

    let loaded = load_config(Some(path.as_path())).await.unwrap();
    let config = loaded.config;

    assert!(loaded.from_file);
    assert_eq!(config.max_pages, 3);
    assert_eq!(config.server.api_key.as_deref(), Some("from-file"));
    assert_eq!(config.server.max_concurrent_runs, 2);
    assert_eq!(config.server.run_timeout_secs, 1_800);
    assert_eq!(config.timing.after_load_ms, 100);
    assert_eq!(config.timing.after_reveal_ms, 5_000);
    assert_eq!(config.portal.pagination_marker, "Page");
    assert_eq!(config.portal.url, AppConfig::default().portal.url);

    let settings = config.flow_settings();
    assert_eq!(settings.max_pages, 3);
    assert_eq!(settings.timing.after_load_ms, 100);
}

#[tokio::test]
#[serial]
async fn environment_overrides_file_values() {
    let env = EnvGuard::clean();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "server:\n  api_key: from-file\n  bind: 127.0.0.1:9000\n").unwrap();

    env.set(ENV_API_KEY, "from-env");
    env.set(ENV_HEADLESS, "false");
    env.set(ENV_CHROME, "/opt/chrome/chrome");
    env.set(ENV_OUTPUT_DIR, "/tmp/licitaciones");
    env.set(ENV_BIND, "127.0.0.1:8123");

    let config = load_config(Some(path.as_path())).await.unwrap().config;

    assert_eq!(config.server.api_key.as_deref(), Some("from-env"));
    assert_eq!(config.server.bind, "127.0.0.1:8123");
    assert!(!config.browser.headless);
    assert_eq!(config.browser.executable, PathBuf::from("/opt/chrome/chrome"));
    assert_eq!(
        config.flow_settings().output_root,
        PathBuf::from("/tmp/licitaciones")
    );
}

#[tokio::test]
#[serial]
async fn blank_environment_values_are_ignored() {
    let env = EnvGuard::clean();
    env.set(ENV_API_KEY, "   ");
    env.set(ENV_HEADLESS, "maybe");

    let mut config = AppConfig::default();
    let ignored = config.apply_env_overrides();

    assert!(config.server.api_key.is_none());
    assert!(config.browser.headless);
    assert_eq!(
        ignored,
        [IgnoredEnv {
            name: ENV_HEADLESS,
            value: "maybe".to_string(),
        }]
    );
}

#[tokio::test]
#[serial]
async fn unrecognised_headless_value_is_kept_for_later_logging() {
    let env = EnvGuard::clean();
    env.set(ENV_HEADLESS, " sometimes ");
    let dir = tempdir().unwrap();

    let loaded = load_config(Some(dir.path().join("absent.yaml").as_path()))
        .await
        .unwrap();

    assert!(loaded.config.browser.headless);
    assert_eq!(loaded.ignored_env.len(), 1);
    assert_eq!(loaded.ignored_env[0].name, ENV_HEADLESS);
    assert_eq!(loaded.ignored_env[0].value, "sometimes");
}

#[tokio::test]
#[serial]
async fn recognised_overrides_leave_nothing_ignored() {
    let env = EnvGuard::clean();
    env.set(ENV_HEADLESS, "no");
    let dir = tempdir().unwrap();

    let loaded = load_config(Some(dir.path().join("absent.yaml").as_path()))
        .await
        .unwrap();

    assert!(!loaded.config.browser.headless);
    assert!(loaded.ignored_env.is_empty());
}

#[tokio::test]
#[serial]
async fn malformed_file_is_an_error() {
    let _env = EnvGuard::clean();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "max_pages: [not, a, number]\n").unwrap();

    let err = load_config(Some(path.as_path())).await.err().unwrap();
    assert!(format!("{err:#}").contains("parsing"));
}

use anyhow::{bail, Result};
use cdp_session::chrome_version;
use serde::Serialize;

use super::output::{print_json, OutputFormat};
use crate::config::AppConfig;
use crate::{BUILD_DATE, GIT_HASH};

#[derive(Debug, Serialize)]
struct DoctorReport {
    version: &'static str,
    build_date: &'static str,
    git_hash: &'static str,
    chrome_executable: Option<String>,
    chrome_version: Option<String>,
    problem: Option<String>,
}

/// Reports the build and the Chrome binary runs would launch.
pub async fn cmd_doctor(config: &AppConfig, output: OutputFormat) -> Result<()> {
    let executable = config.browser.resolve_executable();
    let mut report = DoctorReport {
        version: env!("CARGO_PKG_VERSION"),
        build_date: BUILD_DATE,
        git_hash: GIT_HASH,
        chrome_executable: executable.as_ref().map(|path| path.display().to_string()),
        chrome_version: None,
        problem: None,
    };

    match &executable {
        Some(path) => {
            let path = path.clone();
            match tokio::task::spawn_blocking(move || chrome_version(&path)).await? {
                Ok(version) => report.chrome_version = Some(version),
                Err(err) => report.problem = Some(err.to_string()),
            }
        }
        None => {
            report.problem = Some(
                "chrome executable not found; install Chrome/Chromium or set LICITACIONES_CHROME"
                    .to_string(),
            )
        }
    }

    match output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Human => {
            println!("licitaciones {}", report.version);
            println!("  Built:   {} ({})", report.build_date, report.git_hash);
            println!(
                "  Chrome:  {}",
                report.chrome_executable.as_deref().unwrap_or("not found")
            );
            if let Some(version) = &report.chrome_version {
                println!("  Version: {}", version);
            }
        }
    }

    if let Some(problem) = report.problem {
        bail!(problem);
    }
    Ok(())
}

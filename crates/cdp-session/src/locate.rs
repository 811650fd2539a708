//! Finding a Chromium build on the host and asking it for its version.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use which::which_in;

use crate::error::{DriverError, DriverErrorKind};

/// Browser binaries looked up on the search path, most preferred first.
#[cfg(windows)]
pub const BROWSER_BINARIES: &[&str] = &["chrome.exe", "chromium.exe"];
#[cfg(not(windows))]
pub const BROWSER_BINARIES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
];

/// Looks for a known browser binary on `search_path`, then in the platform
/// install locations when `install_dirs` is set.
pub fn find_browser(search_path: Option<&OsStr>, install_dirs: bool) -> Option<PathBuf> {
    search_path
        .and_then(|paths| {
            BROWSER_BINARIES
                .iter()
                .find_map(|name| which_in(name, Some(paths), ".").ok())
        })
        .or_else(|| {
            install_dirs
                .then(install_locations)?
                .into_iter()
                .find(|path| path.is_file())
        })
}

#[cfg(windows)]
fn install_locations() -> Vec<PathBuf> {
    ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
        .into_iter()
        .filter_map(std::env::var_os)
        .map(PathBuf::from)
        .flat_map(|root| {
            [
                root.join(r"Google\Chrome\Application\chrome.exe"),
                root.join(r"Chromium\Application\chrome.exe"),
            ]
        })
        .collect()
}

#[cfg(target_os = "macos")]
fn install_locations() -> Vec<PathBuf> {
    ["Google Chrome.app/Contents/MacOS/Google Chrome", "Chromium.app/Contents/MacOS/Chromium"]
        .into_iter()
        .map(|bundle| Path::new("/Applications").join(bundle))
        .collect()
}

#[cfg(not(any(windows, target_os = "macos")))]
fn install_locations() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = BROWSER_BINARIES
        .iter()
        .map(|name| Path::new("/usr/bin").join(name))
        .collect();
    paths.push(PathBuf::from("/snap/bin/chromium"));
    paths
}

/// Runs `<executable> --version` and returns its trimmed output.
pub fn chrome_version(executable: &Path) -> Result<String, DriverError> {
    let launch_failed = |hint: String| DriverError::new(DriverErrorKind::LaunchFailed).with_hint(hint);
    let output = Command::new(executable)
        .arg("--version")
        .output()
        .map_err(|err| launch_failed(format!("failed to run {}: {err}", executable.display())))?;
    if !output.status.success() {
        return Err(launch_failed(format!(
            "{} --version exited with {}",
            executable.display(),
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

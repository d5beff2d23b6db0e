use anyhow::{Result, bail};
use std::path::PathBuf;

/// Executable names tried on `PATH`, Chromium first.
const PATH_NAMES: &[&str] = &["chromium", "chromium-browser", "google-chrome-stable", "google-chrome"];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
];

#[cfg(target_os = "linux")]
const INSTALL_PATHS: &[&str] = &["/snap/bin/chromium", "/opt/google/chrome/chrome"];

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
const INSTALL_PATHS: &[&str] = &[];

/// Find a Chrome or Chromium binary to drive live pages.
///
/// `DOM_WAITER_CHROME` overrides the search. Otherwise `PATH` is tried before
/// the usual install locations.
pub fn find_chrome_binary() -> Result<PathBuf> {
    if let Ok(explicit) = std::env::var("DOM_WAITER_CHROME") {
        let path = PathBuf::from(explicit);
        if !path.exists() {
            bail!("DOM_WAITER_CHROME points to a missing file: {}", path.display());
        }
        return Ok(path);
    }

    let found = PATH_NAMES
        .iter()
        .find_map(|name| which::which(name).ok())
        .or_else(|| INSTALL_PATHS.iter().map(PathBuf::from).find(|path| path.exists()));

    match found {
        Some(path) => {
            tracing::info!("Using Chrome at {}", path.display());
            Ok(path)
        }
        None => bail!(
            "No Chrome or Chromium found; install one of {} or set DOM_WAITER_CHROME",
            PATH_NAMES.join(", ")
        ),
    }
}

//! # chrome-locate
//!
//! Find a Chrome or Chromium executable so headless-browser tooling can start
//! one without the user spelling out its path.
//!
//! ## How it works
//!
//! On first call to [`find_browser`]:
//!
//! 1. Checks `CHROME_PATH`; if it names an existing file, that file wins.
//! 2. Checks the platform's well-known install locations.
//! 3. Searches `PATH` for the usual executable names.
//!
//! The result is cached for the lifetime of the process.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrome_locate::find_browser;
//!
//! let chrome = find_browser().expect("no Chrome installed");
//! println!("using {}", chrome.display());
//! ```
//!
//! ## Platform support
//!
//! | OS      | Locations searched                                          |
//! |---------|-------------------------------------------------------------|
//! | macOS   | `/Applications/*.app`, `~/Applications/*.app`               |
//! | Linux   | `/usr/bin`, `/usr/local/bin`, `/snap/bin`, `/opt/google`    |
//! | Windows | `Program Files`, `Program Files (x86)`, `%LOCALAPPDATA%`    |
//!
//! ## Environment variable overrides
//!
//! - `CHROME_PATH` — path to a browser executable; skips discovery.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable that overrides discovery.
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by chrome-locate operations.
#[derive(Error, Debug, Clone)]
pub enum LocateError {
    /// The current OS is not one we know install locations for and nothing
    /// was found on `PATH`.
    #[error("Unsupported platform: {os}/{arch}; set CHROME_PATH to a Chrome executable")]
    UnsupportedPlatform { os: String, arch: String },

    /// No candidate location held an executable.
    #[error(
        "No Chrome or Chromium executable found.\n\
Searched: {searched}\n\
Install Chrome/Chromium or set CHROME_PATH=/path/to/chrome."
    )]
    NotFound { searched: String },
}

// ── Internal: platform metadata ──────────────────────────────────────────────

struct PlatformInfo {
    /// Absolute install paths, most preferred first.
    install_paths: Vec<PathBuf>,
    /// Executable names to look up on `PATH`.
    path_names: &'static [&'static str],
}

fn detect_platform() -> Result<PlatformInfo, LocateError> {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;

    match os {
        "macos" => {
            let bundles = [
                "Google Chrome.app/Contents/MacOS/Google Chrome",
                "Chromium.app/Contents/MacOS/Chromium",
                "Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
                "Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
            ];
            let mut roots = vec![PathBuf::from("/Applications")];
            if let Some(home) = dirs::home_dir() {
                roots.push(home.join("Applications"));
            }
            let install_paths = roots
                .iter()
                .flat_map(|root| bundles.iter().map(move |b| root.join(b)))
                .collect();
            Ok(PlatformInfo {
                install_paths,
                path_names: &["google-chrome", "chromium"],
            })
        }
        "linux" | "freebsd" | "openbsd" => Ok(PlatformInfo {
            install_paths: [
                "/usr/bin/google-chrome-stable",
                "/usr/bin/google-chrome",
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/usr/local/bin/chromium",
                "/snap/bin/chromium",
                "/opt/google/chrome/chrome",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
            path_names: &[
                "google-chrome-stable",
                "google-chrome",
                "chromium",
                "chromium-browser",
                "chrome",
            ],
        }),
        "windows" => {
            let suffixes = [
                r"Google\Chrome\Application\chrome.exe",
                r"Chromium\Application\chrome.exe",
                r"Microsoft\Edge\Application\msedge.exe",
            ];
            let mut roots: Vec<PathBuf> = ["ProgramFiles", "ProgramFiles(x86)"]
                .iter()
                .filter_map(|var| std::env::var_os(var).map(PathBuf::from))
                .collect();
            if let Some(local) = dirs::data_local_dir() {
                roots.push(local);
            }
            let install_paths = roots
                .iter()
                .flat_map(|root| suffixes.iter().map(move |s| root.join(s)))
                .collect();
            Ok(PlatformInfo {
                install_paths,
                path_names: &["chrome.exe", "msedge.exe"],
            })
        }
        os => Err(LocateError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns the browser executable to launch, discovering it on first call.
///
/// # Thread safety
///
/// Safe to call from multiple threads simultaneously; concurrent first calls
/// may both search, but they agree on the answer.
pub fn find_browser() -> Result<PathBuf, LocateError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = resolve()?;
    let _ = RESOLVED_PATH.set(path.clone());
    Ok(path)
}

/// Returns `true` if [`find_browser`] would succeed.
pub fn is_browser_available() -> bool {
    find_browser().is_ok()
}

/// Searches the directories of a `PATH`-style variable for any of `names`.
pub fn search_path_var(path_var: &OsStr, names: &[&str]) -> Option<PathBuf> {
    std::env::split_paths(path_var).find_map(|dir| {
        names
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| is_executable_file(candidate))
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve() -> Result<PathBuf, LocateError> {
    if let Some(env_path) = std::env::var_os(CHROME_PATH_ENV) {
        let p = PathBuf::from(env_path);
        if is_executable_file(&p) {
            return Ok(p);
        }
        // Fall through: a stale override should not hide an installed browser.
        eprintln!(
            "chrome-locate: {CHROME_PATH_ENV} '{}' is not an executable file; searching …",
            p.display()
        );
    }

    let info = detect_platform();
    let path_var = std::env::var_os("PATH").unwrap_or_default();

    let info = match info {
        Ok(info) => info,
        Err(err) => {
            return search_path_var(&path_var, &["chrome", "chromium"]).ok_or(err);
        }
    };

    if let Some(found) = info.install_paths.iter().find(|p| is_executable_file(p)) {
        return Ok(found.clone());
    }

    if let Some(found) = search_path_var(&path_var, info.path_names) {
        return Ok(found);
    }

    let mut searched: Vec<String> = info
        .install_paths
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    searched.push(format!("$PATH for {}", info.path_names.join(", ")));
    Err(LocateError::NotFound {
        searched: searched.join(", "),
    })
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

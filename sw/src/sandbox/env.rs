//! Environment construction for sandboxed commands

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Variables copied from the parent environment as-is
const PASSTHROUGH_VARS: &[&str] = &["HOME", "USER", "LOGNAME", "LANG", "LC_ALL", "TERM", "TMPDIR"];

const PROXY_VARS: &[&str] = &["http_proxy", "https_proxy", "HTTP_PROXY", "HTTPS_PROXY"];
const NO_PROXY_VARS: &[&str] = &["no_proxy", "NO_PROXY"];

/// Unroutable proxy that makes HTTP clients fail fast
const BLACKHOLE_PROXY: &str = "http://0.0.0.0:0";

const SAFE_BIN_DIRS: &[&str] = &[
    "/usr/local/bin",
    "/usr/bin",
    "/bin",
    "/usr/local/sbin",
    "/usr/sbin",
    "/sbin",
    "/opt/homebrew/bin",
];

/// Safe bin dirs relative to the user's home
const HOME_BIN_DIRS: &[&str] = &[".local/bin", ".cargo/bin", ".pyenv/shims"];

const NVM_BIN_GLOB: &str = ".nvm/versions/node/*/bin";

const FALLBACK_PATH: &[&str] = &["/usr/bin", "/bin"];

/// Build the complete environment for a sandboxed command
///
/// Nothing from the parent leaks through except [`PASSTHROUGH_VARS`] (and the
/// proxy settings when network access is allowed).
pub fn sandbox_env(root: &Path, allow_network: bool, extra_bin: Option<&Path>) -> BTreeMap<String, String> {
    debug!(?root, %allow_network, ?extra_bin, "sandbox_env: called");
    let mut env = BTreeMap::new();

    for var in PASSTHROUGH_VARS {
        if let Ok(value) = std::env::var(var) {
            env.insert(var.to_string(), value);
        }
    }

    if allow_network {
        debug!("sandbox_env: network allowed, keeping parent proxy settings");
        for var in PROXY_VARS.iter().chain(NO_PROXY_VARS) {
            if let Ok(value) = std::env::var(var) {
                env.insert(var.to_string(), value);
            }
        }
    } else {
        for var in PROXY_VARS {
            env.insert(var.to_string(), BLACKHOLE_PROXY.to_string());
        }
        for var in NO_PROXY_VARS {
            env.insert(var.to_string(), String::new());
        }
        env.insert("PIP_NO_INDEX".to_string(), "1".to_string());
        env.insert("NPM_CONFIG_OFFLINE".to_string(), "true".to_string());
    }

    let parent_path = std::env::var("PATH").unwrap_or_default();
    let home = dirs::home_dir();
    env.insert(
        "PATH".to_string(),
        build_path(&parent_path, home.as_deref(), root, extra_bin),
    );

    env
}

/// Keep only `PATH` entries that are, or live under, a safe bin directory
pub fn filter_path(path_var: &str, home: Option<&Path>) -> Vec<PathBuf> {
    let mut safe: Vec<PathBuf> = SAFE_BIN_DIRS.iter().map(PathBuf::from).collect();
    let mut nvm = None;
    if let Some(home) = home {
        safe.extend(HOME_BIN_DIRS.iter().map(|d| home.join(d)));
        nvm = glob::Pattern::new(&home.join(NVM_BIN_GLOB).to_string_lossy()).ok();
    }

    std::env::split_paths(path_var)
        .filter(|entry| !entry.as_os_str().is_empty())
        .filter(|entry| {
            safe.iter().any(|dir| entry.starts_with(dir)) || nvm.as_ref().is_some_and(|p| p.matches_path(entry))
        })
        .collect()
}

fn build_path(parent_path: &str, home: Option<&Path>, root: &Path, extra_bin: Option<&Path>) -> String {
    let mut entries: Vec<PathBuf> = Vec::new();

    if let Some(extra) = extra_bin
        && extra.is_dir()
    {
        entries.push(extra.to_path_buf());
    }
    let venv_bin = root.join(".venv").join("bin");
    if venv_bin.is_dir() {
        entries.push(venv_bin);
    }

    let filtered = filter_path(parent_path, home);
    if filtered.is_empty() {
        debug!("build_path: no safe PATH entries survived, using fallback");
        entries.extend(FALLBACK_PATH.iter().map(PathBuf::from));
    } else {
        entries.extend(filtered);
    }

    let mut seen = std::collections::HashSet::new();
    entries.retain(|e| seen.insert(e.clone()));

    std::env::join_paths(&entries)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| FALLBACK_PATH.join(":"))
}

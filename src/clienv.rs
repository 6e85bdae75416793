use std::path::{Path, PathBuf};

use crate::client_config::CONFIGS_DIR;
use crate::clients::{geth, lighthouse};

pub const ROOT_ENV: &str = "NODE_BRAINER_ROOT";
pub const GETH_RELEASES_URL_ENV: &str = "NODE_BRAINER_GETH_RELEASES_URL";
pub const LIGHTHOUSE_RELEASES_URL_ENV: &str = "NODE_BRAINER_LIGHTHOUSE_RELEASES_URL";

const DATA_SUBDIR: &str = "node-brainer";

/// Non-empty value of an environment variable.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Root override ($NODE_BRAINER_ROOT)
pub fn root_override() -> Option<PathBuf> {
    let val = env_opt(ROOT_ENV).map(PathBuf::from);
    tracing::trace!(value = ?val, "NODE_BRAINER_ROOT env var");
    val
}

/// Geth releases endpoint ($NODE_BRAINER_GETH_RELEASES_URL or GitHub)
pub fn geth_releases_url() -> String {
    let url = env_opt(GETH_RELEASES_URL_ENV).unwrap_or_else(|| geth::RELEASES_URL.to_string());
    tracing::trace!(url = %url, "Geth releases URL");
    url
}

/// Lighthouse releases endpoint ($NODE_BRAINER_LIGHTHOUSE_RELEASES_URL or GitHub)
pub fn lighthouse_releases_url() -> String {
    let url = env_opt(LIGHTHOUSE_RELEASES_URL_ENV)
        .unwrap_or_else(|| lighthouse::RELEASES_URL.to_string());
    tracing::trace!(url = %url, "Lighthouse releases URL");
    url
}

/// Fallback root (~/.local/share/node-brainer)
pub fn data_dir() -> PathBuf {
    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(DATA_SUBDIR);
    tracing::trace!(dir = %dir.display(), "Resolved data directory");
    dir
}

/// Nearest ancestor of `start` (inclusive) that already holds `clients/configs`.
pub fn discover_root(start: &Path) -> Option<PathBuf> {
    let found = start
        .ancestors()
        .find(|dir| dir.join(CONFIGS_DIR).is_dir())
        .map(Path::to_path_buf);
    tracing::trace!(start = %start.display(), found = ?found, "Root discovery");
    found
}

/// Root directory (flag > env var > discovery from cwd > data dir)
pub fn resolve_root(flag: Option<PathBuf>) -> PathBuf {
    if let Some(root) = flag.or_else(root_override) {
        return root;
    }
    std::env::current_dir()
        .ok()
        .and_then(|cwd| discover_root(&cwd))
        .unwrap_or_else(data_dir)
}

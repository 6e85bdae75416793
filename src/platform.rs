//! Host platform detection and the per-project release asset naming tables.
//!
//! Host tokens are normalised to Go-style names (`linux`, `darwin`, `amd64`, `arm64`) since that is
//! what the upstream projects key their artifacts on. Each module below maps those tokens to one
//! project's naming convention.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: String,
    pub arch: String,
}

impl HostPlatform {
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    /// Platform of the running binary.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        tracing::trace!(os = %os, arch = %arch, "Detected host platform");
        Self::new(os, arch)
    }
}

/// Lighthouse publishes Rust target-triple style assets, e.g.
/// `lighthouse-v4.5.0-x86_64-unknown-linux-gnu.tar.gz`.
pub mod lighthouse {
    use super::*;

    pub const APPLE_DARWIN: &str = "apple-darwin";
    pub const LINUX_GNU: &str = "linux-gnu";
    const PORTABLE_SUFFIX: &str = "-portable";

    pub fn os(host_os: &str) -> Result<&'static str> {
        match host_os {
            "darwin" => Ok(APPLE_DARWIN),
            "linux" => Ok(LINUX_GNU),
            other => Err(Error::UnsupportedPlatform(other.to_string())),
        }
    }

    /// Darwin builds are only published for x86_64, whatever the host runs.
    pub fn arch(os_token: &str, host_arch: &str) -> Result<&'static str> {
        if os_token == APPLE_DARWIN {
            return Ok("x86_64");
        }

        match host_arch {
            "amd64" | "x86_64" => Ok("x86_64-unknown"),
            "arm64" | "aarch64" => Ok("aarch64-unknown"),
            other => Err(Error::UnsupportedArch(other.to_string())),
        }
    }

    pub fn requires_portable(os_token: &str, host_arch: &str) -> bool {
        os_token == APPLE_DARWIN && matches!(host_arch, "arm64" | "aarch64")
    }

    /// Resolves the `(os, arch)` asset tokens, with the portable suffix already applied.
    pub fn asset_tokens(host: &HostPlatform) -> Result<(String, String)> {
        let os_token = os(&host.os)?;
        let arch_token = arch(os_token, &host.arch)?;

        let os_token = if requires_portable(os_token, &host.arch) {
            format!("{}{}", os_token, PORTABLE_SUFFIX)
        } else {
            os_token.to_string()
        };

        Ok((os_token, arch_token.to_string()))
    }
}

/// Geth's build store uses the raw `GOOS`/`GOARCH` names. Windows builds ship as zip and are not
/// handled.
pub mod geth {
    use super::*;

    pub fn os(host_os: &str) -> Result<&'static str> {
        match host_os {
            "linux" => Ok("linux"),
            "darwin" => Ok("darwin"),
            other => Err(Error::UnsupportedPlatform(other.to_string())),
        }
    }

    pub fn arch(host_arch: &str) -> Result<&'static str> {
        match host_arch {
            "amd64" | "x86_64" => Ok("amd64"),
            "arm64" | "aarch64" => Ok("arm64"),
            "386" => Ok("386"),
            "arm" => Ok("arm"),
            other => Err(Error::UnsupportedArch(other.to_string())),
        }
    }

    pub fn asset_tokens(host: &HostPlatform) -> Result<(String, String)> {
        Ok((os(&host.os)?.to_string(), arch(&host.arch)?.to_string()))
    }
}

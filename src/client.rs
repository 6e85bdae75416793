use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

use crate::client_config::InstallProvenance;
use crate::error::Result;
use crate::log_tail::ShutdownToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotInstalled,
    Installed,
    Running { pid: u32 },
    /// A pid is recorded but no such process exists any more.
    Stale { pid: u32 },
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInstalled => f.write_str("not installed"),
            Self::Installed => f.write_str("stopped"),
            Self::Running { pid } => write!(f, "running (pid {})", pid),
            Self::Stale { pid } => write!(f, "stale pid {} (process gone)", pid),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStatus {
    pub name: String,
    pub network: String,
    pub state: RunState,
    pub binary: Option<InstallProvenance>,
    /// Absolute path the node's output goes to.
    pub log_file: PathBuf,
}

/// Lifecycle contract every managed node client implements.
/// The CLI only ever talks to clients through this trait.
#[async_trait]
pub trait Client: Send + Sync {
    fn name(&self) -> &'static str;

    /// Installs the latest release for this host. A no-op when that release is already on disk.
    async fn download(&mut self) -> Result<()>;

    /// Launches the installed binary in the background and records its pid.
    async fn start(&mut self) -> Result<()>;

    /// Interrupts the recorded process and clears the pid.
    async fn stop(&mut self) -> Result<()>;

    /// Streams the client's log to stdout until `shutdown` fires.
    async fn logs(&self, shutdown: ShutdownToken) -> Result<()>;

    fn status(&self) -> ClientStatus;
}

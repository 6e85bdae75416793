use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lifecycle step a failure happened in, used in user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Init,
    Download,
    Start,
    Stop,
    Logs,
    Status,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Download => "download",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Logs => "logs",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{client} {operation} failed: {source}")]
    Client {
        client: String,
        operation: Operation,
        #[source]
        source: Box<Error>,
    },

    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("{url} returned status {status}")]
    Upstream { url: String, status: u16 },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("{action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decompress archive: {0}")]
    Decompression(String),

    #[error("malformed archive: {0}")]
    ArchiveFormat(String),

    #[error("failed to spawn {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no process found for pid {pid}: {reason}")]
    ProcessLookup { pid: u32, reason: String },

    #[error("failed to signal pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("unsupported operating system: {0}")]
    UnsupportedPlatform(String),

    #[error("unsupported architecture: {0}")]
    UnsupportedArch(String),

    #[error("config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("invalid url template: {0}")]
    Template(String),

    #[error("running {} --version failed: {reason}", binary.display())]
    VersionProbe { binary: PathBuf, reason: String },

    #[error("client is not installed, run download first")]
    NotInstalled,

    #[error("no process running")]
    NotRunning,

    #[error("already running with pid {pid}")]
    AlreadyRunning { pid: u32 },

    #[error("another download holds the lock at {}", path.display())]
    InstallInProgress { path: PathBuf },
}

impl Error {
    pub fn fs(action: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn config(path: impl AsRef<Path>, reason: impl fmt::Display) -> Self {
        Self::Config {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Tags the error with the client and operation it surfaced from.
    pub fn during(self, client: &str, operation: Operation) -> Self {
        match self {
            already @ Self::Client { .. } => already,
            other => Self::Client {
                client: client.to_string(),
                operation,
                source: Box::new(other),
            },
        }
    }

    /// The underlying failure with any client/operation tag removed.
    pub fn root(&self) -> &Error {
        match self {
            Self::Client { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

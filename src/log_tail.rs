use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use crate::error::{Error, Result};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 4096;

/// Stop signal for a log follower.
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested or every sender is gone.
    pub async fn wait(&mut self) {
        while !self.is_shutdown() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

/// Tails a file that another process keeps appending to.
///
/// The first chunk is everything already in the file, later chunks are whatever was appended
/// since. A file that shrinks (the node was restarted and truncated its log) is re-read from the
/// start.
pub struct LogFollower {
    path: PathBuf,
    file: File,
    position: u64,
    poll_interval: Duration,
    shutdown: ShutdownToken,
    buf: Vec<u8>,
}

impl LogFollower {
    pub async fn open(path: &Path, shutdown: ShutdownToken) -> Result<Self> {
        let file = File::open(path)
            .await
            .map_err(|e| Error::fs("opening log file", path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            position: 0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown,
            buf: vec![0; READ_CHUNK],
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Next bytes of the log, or `None` once shutdown was requested.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.position == 0 {
            let mut existing = Vec::new();
            self.file
                .read_to_end(&mut existing)
                .await
                .map_err(|e| Error::fs("reading log file", &self.path, e))?;
            if !existing.is_empty() {
                self.position = existing.len() as u64;
                return Ok(Some(existing));
            }
        }

        loop {
            if self.shutdown.is_shutdown() {
                return Ok(None);
            }

            let n = self
                .file
                .read(&mut self.buf)
                .await
                .map_err(|e| Error::fs("reading log file", &self.path, e))?;
            if n > 0 {
                self.position += n as u64;
                return Ok(Some(self.buf[..n].to_vec()));
            }

            let len = tokio::fs::metadata(&self.path)
                .await
                .map_err(|e| Error::fs("reading log file", &self.path, e))?
                .len();
            if len < self.position {
                tracing::debug!(path = %self.path.display(), "Log truncated, rewinding");
                self.file
                    .seek(SeekFrom::Start(0))
                    .await
                    .map_err(|e| Error::fs("seeking log file", &self.path, e))?;
                self.position = 0;
                continue;
            }

            let mut shutdown = self.shutdown.clone();
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.wait() => return Ok(None),
            }
        }
    }

    /// Copies the log into `out` until shutdown.
    pub async fn follow_to<W: AsyncWrite + Unpin>(&mut self, out: &mut W) -> Result<()> {
        while let Some(chunk) = self.next_chunk().await? {
            out.write_all(&chunk)
                .await
                .map_err(|e| Error::fs("writing log output for", &self.path, e))?;
            out.flush()
                .await
                .map_err(|e| Error::fs("writing log output for", &self.path, e))?;
        }
        Ok(())
    }
}

use flate2::read::GzDecoder;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tar::{Archive, EntryType};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Chunks buffered between the download task and the extraction task.
const CHANNEL_DEPTH: usize = 32;

/// Streams `.tar.gz` release artifacts straight from HTTP into an install directory.
pub struct ReleaseInstaller {
    http: reqwest::Client,
    label: String,
}

impl ReleaseInstaller {
    pub fn new(http: reqwest::Client, label: &str) -> Self {
        Self {
            http,
            label: label.to_string(),
        }
    }

    /// Downloads `url` and unpacks every entry under `dest`, keeping archive paths verbatim.
    pub async fn fetch_and_extract(&self, url: &str, dest: &Path) -> Result<()> {
        tracing::info!(url = %url, dest = %dest.display(), "Downloading");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::Upstream {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length().filter(|len| *len > 0);
        if total.is_none() {
            tracing::debug!("Server did not declare a content length");
        }
        let pb = create_progress_bar(&format!("Downloading {}", self.label), total);

        let (tx, rx) = mpsc::channel::<Vec<u8>>(CHANNEL_DEPTH);
        let target = dest.to_path_buf();
        let extraction =
            tokio::task::spawn_blocking(move || extract_tar_gz(ChannelReader::new(rx), &target));

        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;
        let mut transfer_error = None;

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    received += bytes.len() as u64;
                    pb.set_position(received);
                    if tx.send(bytes.to_vec()).await.is_err() {
                        // extractor gave up, its error is reported below
                        break;
                    }
                }
                Err(e) => {
                    transfer_error = Some(Error::Network {
                        url: url.to_string(),
                        reason: format!("download interrupted after {} bytes: {}", received, e),
                    });
                    break;
                }
            }
        }
        drop(tx);

        let extracted = extraction
            .await
            .map_err(|e| Error::ArchiveFormat(format!("extraction task failed: {}", e)))?;

        if let Some(err) = transfer_error {
            pb.abandon_with_message("Download failed");
            return Err(err);
        }

        match extracted {
            Ok(entries) => {
                pb.finish_with_message(format!("{} downloaded", self.label));
                tracing::info!(
                    bytes = received,
                    percent = ?percent(received, total),
                    entries,
                    "Download and extraction complete"
                );
                Ok(())
            }
            Err(e) => {
                pb.abandon_with_message("Extraction failed");
                Err(e)
            }
        }
    }
}

/// Share of `total` received so far, when the server told us the total.
pub fn percent(received: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(total) if total > 0 => Some((received as f64 / total as f64 * 100.0).min(100.0)),
        _ => None,
    }
}

fn create_progress_bar(message: &str, total: Option<u64>) -> ProgressBar {
    let pb = match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:30.green}] {bytes}/{total_bytes} ({percent}%)",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg} {bytes}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    };
    pb.set_message(message.to_string());
    pb
}

/// Blocking `Read` over chunks pushed by the async download loop.
struct ChannelReader {
    rx: mpsc::Receiver<Vec<u8>>,
    current: Vec<u8>,
    offset: usize,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            current: Vec::new(),
            offset: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset >= self.current.len() {
            match self.rx.blocking_recv() {
                Some(chunk) => {
                    self.current = chunk;
                    self.offset = 0;
                }
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.current.len() - self.offset);
        buf[..n].copy_from_slice(&self.current[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

/// Remembers whether the gzip layer (as opposed to tar) produced an error.
struct GzipProbe<R> {
    inner: GzDecoder<R>,
    failed: Arc<AtomicBool>,
}

impl<R: Read> Read for GzipProbe<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|_| {
            self.failed.store(true, Ordering::SeqCst);
        })
    }
}

fn archive_error(gzip_failed: &AtomicBool, e: io::Error) -> Error {
    if gzip_failed.load(Ordering::SeqCst) {
        Error::Decompression(e.to_string())
    } else {
        Error::ArchiveFormat(e.to_string())
    }
}

/// Unpacks a gzip tar stream under `dest`. Returns the number of entries written.
pub fn extract_tar_gz<R: Read>(reader: R, dest: &Path) -> Result<usize> {
    let gzip_failed = Arc::new(AtomicBool::new(false));
    let mut archive = Archive::new(GzipProbe {
        inner: GzDecoder::new(reader),
        failed: Arc::clone(&gzip_failed),
    });

    fs::create_dir_all(dest).map_err(|e| Error::fs("creating", dest, e))?;

    let mut written = 0;
    let entries = archive
        .entries()
        .map_err(|e| archive_error(&gzip_failed, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(&gzip_failed, e))?;
        let relative = entry
            .path()
            .map_err(|e| archive_error(&gzip_failed, e))?
            .into_owned();
        let target = entry_target(dest, &relative)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target).map_err(|e| Error::fs("creating", &target, e))?;
                set_mode(&target, 0o755)?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| Error::fs("creating", parent, e))?;
                }

                // written beside the target and renamed, so an interrupted transfer never
                // leaves a truncated file under the final name
                let partial = partial_path(&target);
                let expected = entry.header().size().unwrap_or(0);
                let copied = fs::File::create(&partial)
                    .map_err(|e| Error::fs("creating", &partial, e))
                    .and_then(|mut out| {
                        io::copy(&mut entry, &mut out).map_err(|e| {
                            if gzip_failed.load(Ordering::SeqCst) {
                                Error::Decompression(e.to_string())
                            } else {
                                Error::fs("writing", &partial, e)
                            }
                        })
                    })
                    .and_then(|n| {
                        if n < expected {
                            return Err(Error::ArchiveFormat(format!(
                                "{} ends after {} of {} bytes",
                                relative.display(),
                                n,
                                expected
                            )));
                        }
                        set_mode(&partial, 0o755)
                    });
                if let Err(e) = copied {
                    let _ = fs::remove_file(&partial);
                    return Err(e);
                }
                fs::rename(&partial, &target).map_err(|e| Error::fs("replacing", &target, e))?;

                written += 1;
                tracing::trace!(path = %target.display(), "Extracted");
            }
            other => {
                tracing::trace!(path = %relative.display(), kind = ?other, "Skipping archive entry");
            }
        }
    }

    Ok(written)
}

/// `bin/geth` -> `bin/geth.partial`
fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

fn entry_target(dest: &Path, relative: &Path) -> Result<PathBuf> {
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(Error::ArchiveFormat(format!(
                    "entry {} escapes the install directory",
                    relative.display()
                )))
            }
        }
    }
    Ok(dest.join(relative))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::fs("setting permissions on", path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

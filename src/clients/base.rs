use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::client::{ClientStatus, RunState};
use crate::client_config::{ClientConfig, ConfigStore, InstallProvenance};
use crate::error::{Error, Result};
use crate::log_tail::{LogFollower, ShutdownToken};
use crate::platform::HostPlatform;
use crate::process;
use crate::release::{http_client, ArtifactFetcher, ClientIdentity, ReleaseDescriptor};
use crate::release_installer::ReleaseInstaller;
use crate::secret;

/// Where a resolved release comes from and where it lands, all paths relative to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPlan {
    pub url: String,
    pub install_dir: String,
    pub provenance: InstallProvenance,
}

/// Lifecycle mechanics shared by every client. Concrete clients decide the artifact plan and the
/// command line; this owns the config document and everything that touches disk or processes.
pub struct BaseClient<C> {
    pub identity: ClientIdentity,
    pub store: ConfigStore,
    pub config: C,
    pub host: HostPlatform,
    fetcher: ArtifactFetcher,
    http: reqwest::Client,
}

impl<C: ClientConfig> BaseClient<C> {
    pub fn open(identity: ClientIdentity, store: ConfigStore) -> Result<Self> {
        let config = store.load(identity.name)?;
        let http = http_client()?;
        Ok(Self {
            identity,
            store,
            config,
            host: HostPlatform::current(),
            fetcher: ArtifactFetcher::with_client(http.clone()),
            http,
        })
    }

    pub fn name(&self) -> &'static str {
        self.identity.name
    }

    pub async fn resolve_release(&self) -> Result<ReleaseDescriptor> {
        self.fetcher.resolve(&self.identity).await
    }

    pub fn save(&self) -> Result<()> {
        self.store.save(self.identity.name, &self.config)
    }

    pub async fn install(&mut self, plan: ArtifactPlan) -> Result<()> {
        let install_dir = self.store.resolve(&plan.install_dir);
        let binary = self.store.resolve(&plan.provenance.path);
        let _lock = InstallLock::acquire(&install_dir)?;

        let existing = if binary.exists() {
            match process::probe_version(&binary).await {
                Ok(version) => Some(version),
                Err(e) => {
                    tracing::warn!(
                        client = self.name(),
                        error = %e,
                        "Existing binary is unusable, reinstalling {}",
                        binary.display()
                    );
                    None
                }
            }
        } else {
            None
        };

        match existing {
            Some(version) => tracing::info!(
                client = self.name(),
                version = %version,
                "Already installed, using {}",
                binary.display()
            ),
            None => {
                tracing::info!(
                    client = self.name(),
                    tag = %plan.provenance.version,
                    os = %plan.provenance.os,
                    arch = %plan.provenance.arch,
                    commit = ?plan.provenance.sha_commit,
                    "Installing"
                );
                ReleaseInstaller::new(self.http.clone(), self.identity.name)
                    .fetch_and_extract(&plan.url, &install_dir)
                    .await?;

                if !binary.exists() {
                    return Err(Error::ArchiveFormat(format!(
                        "{} did not contain {}",
                        plan.url, plan.provenance.path
                    )));
                }
                let version = process::probe_version(&binary).await?;
                tracing::info!(client = self.name(), version = %version, "Installed");
            }
        }

        if self.config.node().binary.as_ref() != Some(&plan.provenance) {
            self.config.node_mut().binary = Some(plan.provenance);
            self.save()?;
        }
        Ok(())
    }

    /// Absolute path of the recorded binary, if it is really there.
    pub fn installed_binary(&self) -> Result<PathBuf> {
        let provenance = self.config.node().binary.as_ref().ok_or(Error::NotInstalled)?;
        let path = self.store.resolve(&provenance.path);
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Recorded binary is missing");
            return Err(Error::NotInstalled);
        }
        Ok(path)
    }

    pub fn start(&mut self, args: Vec<OsString>, jwt_secret: Option<&str>) -> Result<u32> {
        let binary = self.installed_binary()?;

        if let Some(pid) = self.config.node().pid {
            if process::is_alive(pid) {
                return Err(Error::AlreadyRunning { pid });
            }
            tracing::warn!(client = self.name(), pid, "Recorded process is gone, starting anew");
        }

        if let Some(path) = jwt_secret {
            secret::ensure_secret(&self.store.resolve(path))?;
        }

        let log_file = self.store.resolve(&self.config.node().stdout_file);
        let pid = process::spawn(&binary, &args, &log_file)?;
        tracing::info!(
            client = self.name(),
            pid,
            "Started, output redirected to {}",
            log_file.display()
        );

        let node = self.config.node_mut();
        node.pid = Some(pid);
        node.started_binary = Some(binary.to_string_lossy().into_owned());
        self.save()?;
        Ok(pid)
    }

    pub fn stop(&mut self) -> Result<()> {
        let pid = self.config.node().pid.ok_or(Error::NotRunning)?;
        let node = self.config.node();
        // files written before startedBinary existed only know the installed path
        let expected = match &node.started_binary {
            Some(path) => Some(PathBuf::from(path)),
            None => node
                .binary
                .as_ref()
                .map(|binary| self.store.resolve(&binary.path)),
        };

        process::interrupt(pid, expected.as_deref())?;
        tracing::info!(client = self.name(), pid, "Stopped");

        let node = self.config.node_mut();
        node.pid = None;
        node.started_binary = None;
        self.save()
    }

    pub async fn logs(&self, shutdown: ShutdownToken) -> Result<()> {
        let path = self.store.resolve(&self.config.node().stdout_file);
        let mut follower = LogFollower::open(&path, shutdown).await?;
        let mut stdout = tokio::io::stdout();
        follower.follow_to(&mut stdout).await
    }

    pub fn status(&self) -> ClientStatus {
        let node = self.config.node();
        let installed = node
            .binary
            .as_ref()
            .is_some_and(|binary| self.store.resolve(&binary.path).exists());

        let state = match node.pid {
            Some(pid) if process::is_alive(pid) => RunState::Running { pid },
            Some(pid) => RunState::Stale { pid },
            None if installed => RunState::Installed,
            None => RunState::NotInstalled,
        };

        ClientStatus {
            name: self.name().to_string(),
            network: node.network.clone(),
            state,
            binary: node.binary.clone(),
            log_file: self.store.resolve(&node.stdout_file),
        }
    }
}

/// Advisory lock next to an install directory so two downloads of one release never interleave.
struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    fn acquire(install_dir: &Path) -> Result<Self> {
        let path = lock_path(install_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::fs("creating", parent, e))?;
        }

        for _ in 0..2 {
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(std::process::id().to_string().as_bytes())
                        .map_err(|e| Error::fs("writing", &path, e))?;
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let owner = fs::read_to_string(&path)
                        .ok()
                        .and_then(|pid| pid.trim().parse::<u32>().ok());
                    match owner {
                        Some(pid) if process::is_alive(pid) => {
                            return Err(Error::InstallInProgress { path });
                        }
                        _ => {
                            tracing::warn!(path = %path.display(), owner = ?owner, "Removing stale install lock");
                            let _ = fs::remove_file(&path);
                        }
                    }
                }
                Err(e) => return Err(Error::fs("creating", &path, e)),
            }
        }

        Err(Error::InstallInProgress { path })
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// `binaries/geth/v1.13.5` -> `binaries/geth/v1.13.5.lock`
fn lock_path(install_dir: &Path) -> PathBuf {
    let mut name = install_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    install_dir.with_file_name(name)
}

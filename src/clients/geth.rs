use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;

use super::base::{ArtifactPlan, BaseClient};
use crate::client::{Client, ClientStatus};
use crate::client_config::{ClientConfig, ConfigStore, InstallProvenance, NodeConfig, BINARIES_DIR};
use crate::clienv;
use crate::error::{Error, Operation, Result};
use crate::log_tail::ShutdownToken;
use crate::platform::{self, HostPlatform};
use crate::release::{strip_v, ClientIdentity, ReleaseDescriptor, TemplateVars};

pub const NAME: &str = "geth";

pub const RELEASES_URL: &str = "https://api.github.com/repos/ethereum/go-ethereum/releases/latest";
pub const TAG_COMMIT_URL: &str =
    "https://api.github.com/repos/ethereum/go-ethereum/git/refs/tags/{tag}";
pub const DOWNLOAD_URL: &str =
    "https://gethstore.blob.core.windows.net/builds/geth-{os}-{arch}-{version}-{commit}.tar.gz";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRpc {
    pub addr: String,
    pub port: String,
    pub vhosts: String,
    pub jwtsecret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpApi {
    pub enabled: bool,
    pub api: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GethConfig {
    #[serde(flatten)]
    pub node: NodeConfig,
    pub authrpc: AuthRpc,
    pub http: HttpApi,
}

impl Default for GethConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::new("mainnet", "clients/data/geth", "clients/logs/geth.log"),
            authrpc: AuthRpc {
                addr: "localhost".to_string(),
                port: "8551".to_string(),
                vhosts: "localhost".to_string(),
                jwtsecret: "clients/jwt.hex".to_string(),
            },
            http: HttpApi {
                enabled: true,
                api: vec!["eth".to_string(), "net".to_string()],
            },
        }
    }
}

impl ClientConfig for GethConfig {
    fn node(&self) -> &NodeConfig {
        &self.node
    }

    fn node_mut(&mut self) -> &mut NodeConfig {
        &mut self.node
    }
}

pub fn identity() -> Result<ClientIdentity> {
    ClientIdentity::new(NAME, &clienv::geth_releases_url(), DOWNLOAD_URL)?
        .with_tag_commit_url(TAG_COMMIT_URL)
}

/// go-ethereum execution client.
pub struct Geth {
    base: BaseClient<GethConfig>,
}

impl Geth {
    pub fn open(store: ConfigStore) -> Result<Self> {
        Self::with_identity(store, identity()?)
    }

    pub fn with_identity(store: ConfigStore, identity: ClientIdentity) -> Result<Self> {
        Ok(Self {
            base: BaseClient::open(identity, store)?,
        })
    }

    pub fn with_host(mut self, host: HostPlatform) -> Self {
        self.base.host = host;
        self
    }

    pub fn config(&self) -> &GethConfig {
        &self.base.config
    }

    /// Geth's archives unpack into `geth-<os>-<arch>-<version>-<commit>/geth`.
    pub fn plan(&self, release: &ReleaseDescriptor) -> Result<ArtifactPlan> {
        let (os, arch) = platform::geth::asset_tokens(&self.base.host)?;
        let commit = release.commit.as_deref().ok_or_else(|| {
            Error::Template(format!("{} assets need a commit hash for {}", NAME, release.tag))
        })?;

        let vars = TemplateVars::for_tag(&release.tag)
            .with_platform(&os, &arch)
            .with_commit(Some(commit));
        let url = self.base.identity.download_url.render(&vars)?;

        let install_dir = format!("{}/{}/{}", BINARIES_DIR, NAME, release.tag);
        let path = format!(
            "{}/geth-{}-{}-{}-{}/geth",
            install_dir,
            os,
            arch,
            strip_v(&release.tag),
            commit
        );

        Ok(ArtifactPlan {
            url,
            install_dir,
            provenance: InstallProvenance {
                path,
                version: release.tag.clone(),
                os,
                arch,
                sha_commit: Some(commit.to_string()),
            },
        })
    }

    pub fn start_args(&self) -> Vec<OsString> {
        let config = &self.base.config;
        let store = &self.base.store;

        let mut args: Vec<OsString> = vec![
            format!("--{}", config.node.network).into(),
            "--datadir".into(),
            store.resolve(&config.node.datadir).into(),
            "--authrpc.addr".into(),
            config.authrpc.addr.clone().into(),
            "--authrpc.port".into(),
            config.authrpc.port.clone().into(),
            "--authrpc.vhosts".into(),
            config.authrpc.vhosts.clone().into(),
            "--authrpc.jwtsecret".into(),
            store.resolve(&config.authrpc.jwtsecret).into(),
        ];

        if config.http.enabled {
            args.push("--http".into());
            if !config.http.api.is_empty() {
                args.push("--http.api".into());
                args.push(config.http.api.join(",").into());
            }
        }

        args
    }

    async fn download_inner(&mut self) -> Result<()> {
        let release = self.base.resolve_release().await?;
        let plan = self.plan(&release)?;
        self.base.install(plan).await
    }

    fn start_inner(&mut self) -> Result<()> {
        let args = self.start_args();
        let jwt = self.base.config.authrpc.jwtsecret.clone();
        self.base.start(args, Some(&jwt)).map(|_| ())
    }
}

#[async_trait]
impl Client for Geth {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn download(&mut self) -> Result<()> {
        self.download_inner()
            .await
            .map_err(|e| e.during(NAME, Operation::Download))
    }

    async fn start(&mut self) -> Result<()> {
        self.start_inner()
            .map_err(|e| e.during(NAME, Operation::Start))
    }

    async fn stop(&mut self) -> Result<()> {
        self.base
            .stop()
            .map_err(|e| e.during(NAME, Operation::Stop))
    }

    async fn logs(&self, shutdown: ShutdownToken) -> Result<()> {
        self.base
            .logs(shutdown)
            .await
            .map_err(|e| e.during(NAME, Operation::Logs))
    }

    fn status(&self) -> ClientStatus {
        self.base.status()
    }
}

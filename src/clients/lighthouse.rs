use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;

use super::base::{ArtifactPlan, BaseClient};
use crate::client::{Client, ClientStatus};
use crate::client_config::{ClientConfig, ConfigStore, InstallProvenance, NodeConfig, BINARIES_DIR};
use crate::clienv;
use crate::error::{Operation, Result};
use crate::log_tail::ShutdownToken;
use crate::platform::{self, HostPlatform};
use crate::release::{ClientIdentity, ReleaseDescriptor, TemplateVars};

pub const NAME: &str = "lighthouse";

pub const RELEASES_URL: &str = "https://api.github.com/repos/sigp/lighthouse/releases/latest";
pub const DOWNLOAD_URL: &str =
    "https://github.com/sigp/lighthouse/releases/download/{tag}/lighthouse-{tag}-{arch}-{os}.tar.gz";

/// Connection to the execution client's authenticated RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub endpoint: String,
    pub jwt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LighthouseConfig {
    #[serde(flatten)]
    pub node: NodeConfig,
    pub execution: Execution,
    #[serde(rename = "checkpointSyncUrl", default)]
    pub checkpoint_sync_url: String,
    #[serde(default)]
    pub http: bool,
}

impl Default for LighthouseConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::new(
                "mainnet",
                "clients/data/lighthouse",
                "clients/logs/lighthouse.log",
            ),
            execution: Execution {
                endpoint: "http://localhost:8551".to_string(),
                jwt: "clients/jwt.hex".to_string(),
            },
            checkpoint_sync_url: "https://mainnet.checkpoint.sigp.io".to_string(),
            http: true,
        }
    }
}

impl ClientConfig for LighthouseConfig {
    fn node(&self) -> &NodeConfig {
        &self.node
    }

    fn node_mut(&mut self) -> &mut NodeConfig {
        &mut self.node
    }
}

pub fn identity() -> Result<ClientIdentity> {
    ClientIdentity::new(NAME, &clienv::lighthouse_releases_url(), DOWNLOAD_URL)
}

/// Lighthouse consensus client, run as a beacon node.
pub struct Lighthouse {
    base: BaseClient<LighthouseConfig>,
}

impl Lighthouse {
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

    pub fn config(&self) -> &LighthouseConfig {
        &self.base.config
    }

    /// Lighthouse archives hold the bare `lighthouse` binary.
    pub fn plan(&self, release: &ReleaseDescriptor) -> Result<ArtifactPlan> {
        let (os, arch) = platform::lighthouse::asset_tokens(&self.base.host)?;
        let vars = TemplateVars::for_tag(&release.tag).with_platform(&os, &arch);
        let url = self.base.identity.download_url.render(&vars)?;

        let install_dir = format!("{}/{}/{}", BINARIES_DIR, NAME, release.tag);
        let path = format!("{}/{}", install_dir, NAME);

        Ok(ArtifactPlan {
            url,
            install_dir,
            provenance: InstallProvenance {
                path,
                version: release.tag.clone(),
                os,
                arch,
                sha_commit: None,
            },
        })
    }

    pub fn start_args(&self) -> Vec<OsString> {
        let config = &self.base.config;
        let store = &self.base.store;

        let mut args: Vec<OsString> = vec![
            "bn".into(),
            "--datadir".into(),
            store.resolve(&config.node.datadir).into(),
            "--network".into(),
            config.node.network.clone().into(),
            "--execution-endpoint".into(),
            config.execution.endpoint.clone().into(),
            "--execution-jwt".into(),
            store.resolve(&config.execution.jwt).into(),
        ];
        if !config.checkpoint_sync_url.is_empty() {
            args.push("--checkpoint-sync-url".into());
            args.push(config.checkpoint_sync_url.clone().into());
        }
        if config.http {
            args.push("--http".into());
        }
        args.push("--disable-deposit-contract-sync".into());
        args
    }

    async fn download_inner(&mut self) -> Result<()> {
        let release = self.base.resolve_release().await?;
        let plan = self.plan(&release)?;
        self.base.install(plan).await
    }

    fn start_inner(&mut self) -> Result<()> {
        let args = self.start_args();
        let jwt = self.base.config.execution.jwt.clone();
        self.base.start(args, Some(&jwt)).map(|_| ())
    }
}

#[async_trait]
impl Client for Lighthouse {
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

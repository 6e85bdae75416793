use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CONFIGS_DIR: &str = "clients/configs";
pub const BINARIES_DIR: &str = "clients/binaries";

/// What is actually installed on disk. `path` is relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallProvenance {
    pub path: String,
    pub version: String,
    pub os: String,
    pub arch: String,
    #[serde(
        rename = "shaCommit",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub sha_commit: Option<String>,
}

/// Fields every managed client persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub network: String,
    pub datadir: String,
    #[serde(rename = "stdoutFile")]
    pub stdout_file: String,
    #[serde(
        default,
        deserialize_with = "installed_binary",
        skip_serializing_if = "Option::is_none"
    )]
    pub binary: Option<InstallProvenance>,
    /// Stored as `-1` when nothing is running.
    #[serde(default, with = "pid_sentinel")]
    pub pid: Option<u32>,
    /// Absolute path of the binary behind `pid`. A later download may move `binary` on.
    #[serde(
        rename = "startedBinary",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_binary: Option<String>,
}

impl NodeConfig {
    pub fn new(network: &str, datadir: &str, stdout_file: &str) -> Self {
        Self {
            network: network.to_string(),
            datadir: datadir.to_string(),
            stdout_file: stdout_file.to_string(),
            binary: None,
            pid: None,
            started_binary: None,
        }
    }
}

/// A client's full persisted document, wrapping the shared [`NodeConfig`].
pub trait ClientConfig:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + Send + Sync + 'static
{
    fn node(&self) -> &NodeConfig;
    fn node_mut(&mut self) -> &mut NodeConfig;
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

fn installed_binary<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<InstallProvenance>, D::Error> {
    #[derive(Deserialize)]
    struct Raw {
        #[serde(default)]
        path: String,
        #[serde(default)]
        version: String,
        #[serde(default)]
        os: String,
        #[serde(default)]
        arch: String,
        #[serde(rename = "shaCommit", default, deserialize_with = "empty_as_none")]
        sha_commit: Option<String>,
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    Ok(raw.filter(|raw| !raw.path.is_empty()).map(|raw| InstallProvenance {
        path: raw.path,
        version: raw.version,
        os: raw.os,
        arch: raw.arch,
        sha_commit: raw.sha_commit,
    }))
}

mod pid_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    pub const NOT_RUNNING: i64 = -1;

    pub fn serialize<S: Serializer>(pid: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(pid.map(i64::from).unwrap_or(NOT_RUNNING))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        if raw <= 0 {
            return Ok(None);
        }
        u32::try_from(raw)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("pid {} out of range", raw)))
    }
}

/// Reads and writes `<root>/clients/configs/<client>.json`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths in config files are relative to the root; absolute ones are kept.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    pub fn config_path(&self, client: &str) -> PathBuf {
        self.root.join(CONFIGS_DIR).join(format!("{}.json", client))
    }

    pub fn load<C: DeserializeOwned>(&self, client: &str) -> Result<C> {
        let path = self.config_path(client);
        tracing::trace!(path = %path.display(), "Loading client config");

        let content = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config(&path, "not found, run `node-brainer init` first")
            } else {
                Error::config(&path, e)
            }
        })?;

        serde_json::from_slice(&content).map_err(|e| Error::config(&path, e))
    }

    /// Replaces the config file atomically: temp file, fsync, rename.
    pub fn save<C: Serialize>(&self, client: &str, config: &C) -> Result<()> {
        let path = self.config_path(client);
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| Error::fs("creating", parent, e))?;

        let mut content = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut content, formatter);
        config
            .serialize(&mut serializer)
            .map_err(|e| Error::config(&path, e))?;
        content.push(b'\n');

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(|e| Error::fs("creating", &tmp, e))?;
            file.write_all(&content)
                .map_err(|e| Error::fs("writing", &tmp, e))?;
            file.sync_all().map_err(|e| Error::fs("syncing", &tmp, e))?;
        }
        fs::rename(&tmp, &path).map_err(|e| Error::fs("replacing", &path, e))?;

        tracing::trace!(path = %path.display(), "Client config saved");
        Ok(())
    }

    /// Writes the default config for a client unless one exists. Returns whether it wrote.
    pub fn init<C: ClientConfig>(&self, client: &str) -> Result<bool> {
        if self.config_path(client).exists() {
            return Ok(false);
        }
        self.save(client, &C::default())?;
        Ok(true)
    }
}

//! clusterd.toml configuration.
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8896"
//!
//! [storage]
//! data_dir = "/var/lib/clusterd"
//!
//! [join]
//! timeout = "10s"
//! request_timeout = "2s"
//! peer_port = 8896
//! ```
//!
//! Every key is optional. Command-line flags override the file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use clusterd_node::{AgentConfig, parse_duration};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub join: JoinConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8896)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/clusterd"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Bound on finding an admitting member.
    pub timeout: String,
    /// Bound on each request to a peer.
    pub request_timeout: String,
    /// Port used for member addresses that carry none.
    pub peer_port: u16,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            timeout: "10s".to_string(),
            request_timeout: "2s".to_string(),
            peer_port: 8896,
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.join_timeout()?;
        config.request_timeout()?;
        Ok(config)
    }

    /// Path of the redb file inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join("clusterd.redb")
    }

    pub fn join_timeout(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.join.timeout)
            .with_context(|| format!("invalid join.timeout {:?}", self.join.timeout))
    }

    pub fn request_timeout(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.join.request_timeout).with_context(|| {
            format!("invalid join.request_timeout {:?}", self.join.request_timeout)
        })
    }

    pub fn agent_config(&self) -> anyhow::Result<AgentConfig> {
        Ok(AgentConfig {
            join_timeout: self.join_timeout()?,
            announce_timeout: self.request_timeout()?,
        })
    }
}

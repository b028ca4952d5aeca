use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::paginate::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub engine: EngineConfig,
}

/// Query engine tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rows per page of a paginated select.
    pub page_size: u64,
    /// Statements still running after this long are interrupted.
    pub query_timeout_ms: Option<u64>,
}

impl ServerConfig {
    /// Reads a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        if config.engine.page_size == 0 {
            return Err(Error::Config("engine.page_size must be positive".to_string()));
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Catalog of namespaces, repos, collaborators and cards.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("repobase.db")
    }

    #[must_use]
    pub fn engine_dir(&self) -> PathBuf {
        self.data_dir.join("engine")
    }

    #[must_use]
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("user_data")
    }
}

impl EngineConfig {
    #[must_use]
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            query_timeout_ms: None,
        }
    }
}

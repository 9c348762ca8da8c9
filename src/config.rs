//! Application Configuration
//!
//! YAML configuration with defaults for every field, so a partial file only
//! needs to name what it overrides.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::types::ErasureParams;

const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Metadata backend types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum MetadataBackend {
    #[default]
    Local,
    Mock,
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub retrieval: RetrievalConfig,
    pub track: TrackConfig,
    pub metadata: MetadataConfig,
    pub peers: PeersConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
}

/// Retrieval pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Directory retrieved files are materialized in
    pub file_dir: PathBuf,
    pub data_shards: usize,
    pub par_shards: usize,
    /// Fragment size in bytes
    pub fragment_size: usize,
    /// Deadline for a single peer read
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub dir: PathBuf,
    pub sweep_interval_secs: u64,
    /// How long completed records are kept
    pub retention_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,
    /// Root of the local metadata documents
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeersConfig {
    /// YAML list of known peers and their addresses
    pub book_file: PathBuf,
    /// Directory holding one mounted volume per peer address
    pub transport_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to log4rs configuration file
    pub config_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 4,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let erasure = ErasureParams::default();
        Self {
            file_dir: PathBuf::from("./data/file"),
            data_shards: erasure.data_shards,
            par_shards: erasure.par_shards,
            fragment_size: erasure.fragment_size,
            fetch_timeout_secs: 60,
        }
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/track"),
            sweep_interval_secs: 300,
            retention_secs: 86400,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::Local,
            dir: PathBuf::from("./data/chain"),
        }
    }
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            book_file: PathBuf::from("./peers.yaml"),
            transport_root: PathBuf::from("./data/peers"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load `config.yaml` from the working directory, use defaults if not found
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            warn!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(GatewayError::io(format!("read {}", path.display())))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|e| GatewayError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.data_shards == 0 || r.fragment_size == 0 {
            return Err(GatewayError::Config(
                "retrieval.data_shards and retrieval.fragment_size must be non-zero".into(),
            ));
        }
        if self.track.sweep_interval_secs == 0 {
            return Err(GatewayError::Config("track.sweep_interval_secs must be non-zero".into()));
        }
        Ok(())
    }

    pub fn erasure_params(&self) -> ErasureParams {
        ErasureParams {
            data_shards: self.retrieval.data_shards,
            par_shards: self.retrieval.par_shards,
            fragment_size: self.retrieval.fragment_size,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval.fetch_timeout_secs)
    }
}

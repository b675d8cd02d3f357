//! Server configuration (canteen.toml)

use canteen_sched::SchedulerConfig;
use canteen_server::DEFAULT_STORE_FILE;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file used when `--config` is absent
pub const CONFIG_ENV: &str = "CANTEEN_CONFIG";

/// Default listening port
pub const DEFAULT_PORT: u16 = 1024;

/// Config errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything `canteen serve` needs to start
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on
    pub bind: String,

    /// Port to listen on
    pub port: u16,

    /// Store file records are appended to
    pub store_path: PathBuf,

    /// Run queued tasks before exiting (false = discard them)
    pub drain_on_shutdown: bool,

    /// Worker pool settings
    pub scheduler: SchedulerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            drain_on_shutdown: true,
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Values given on the command line; each one wins over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--bind`
    pub bind: Option<String>,
    /// `--port`
    pub port: Option<u16>,
    /// `--workers`
    pub workers: Option<usize>,
    /// `--store`
    pub store_path: Option<PathBuf>,
    /// `--discard`
    pub discard: bool,
}

impl ServerConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parse config text
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`, else from `$CANTEEN_CONFIG`, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line overrides
    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(bind) = overrides.bind {
            self.bind = bind;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(workers) = overrides.workers {
            self.scheduler.worker_count = Some(workers);
        }
        if let Some(store_path) = overrides.store_path {
            self.store_path = store_path;
        }
        if overrides.discard {
            self.drain_on_shutdown = false;
        }
        self
    }

    /// `bind:port` as passed to the listener
    pub fn listen_addr(&self) -> String {
        if self.bind.contains(':') && !self.bind.starts_with('[') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }
}

//! Configuration management for FileChain

use crate::error::ChainError;
use crate::logging::LogFormat;
use crate::miner::MiningBound;
use crate::network::normalize_peer_url;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
    #[serde(default = "default_peer_connect_timeout_ms")]
    pub peer_connect_timeout_ms: u64,
    #[serde(default = "default_max_concurrent_peer_requests")]
    pub max_concurrent_peer_requests: usize,
    /// 0 disables the background resolve loop.
    #[serde(default)]
    pub auto_resolve_interval_secs: u64,
    /// Largest accepted request body. Hex doubles file size.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_port: default_api_port(),
            bootstrap_peers: Vec::new(),
            peer_timeout_ms: default_peer_timeout_ms(),
            peer_connect_timeout_ms: default_peer_connect_timeout_ms(),
            max_concurrent_peer_requests: default_max_concurrent_peer_requests(),
            auto_resolve_interval_secs: 0,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl NetworkConfig {
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn peer_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_connect_timeout_ms)
    }

    pub fn auto_resolve_interval(&self) -> Option<Duration> {
        (self.auto_resolve_interval_secs > 0)
            .then(|| Duration::from_secs(self.auto_resolve_interval_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u64,
    /// 0 means no wall-clock limit.
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_duration_ms: default_max_duration_ms(),
        }
    }
}

impl MinerConfig {
    pub fn bound(&self) -> MiningBound {
        MiningBound {
            max_attempts: self.max_attempts,
            max_duration: (self.max_duration_ms > 0)
                .then(|| Duration::from_millis(self.max_duration_ms)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Loads `config.toml` from the working directory.
pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Loads and validates configuration from `path`.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let config = read_config_from(path)?;
    config.validate()?;
    Ok(config)
}

/// Reads configuration from `path` without validating it, falling back to
/// defaults when the file is absent or empty. `PORT` in the environment
/// overrides the API port. Callers layering further overrides validate last.
pub fn read_config_from(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)
            .map_err(|e| ChainError::Config(format!("{}: {}", path.display(), e)))?
    };

    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
        config.network.api_port = port;
    }

    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.network.api_port == 0 {
            return Err(ChainError::Config("network.api_port must be non-zero".to_string()));
        }
        if self.network.max_concurrent_peer_requests == 0 {
            return Err(ChainError::Config(
                "network.max_concurrent_peer_requests must be at least 1".to_string(),
            ));
        }
        if self.network.peer_timeout_ms == 0 {
            return Err(ChainError::Config(
                "network.peer_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.network.max_body_bytes == 0 {
            return Err(ChainError::Config(
                "network.max_body_bytes must be at least 1".to_string(),
            ));
        }
        if self.miner.max_attempts == 0 {
            return Err(ChainError::Config("miner.max_attempts must be at least 1".to_string()));
        }
        for peer in &self.network.bootstrap_peers {
            normalize_peer_url(peer)
                .map_err(|e| ChainError::Config(format!("bootstrap peer {:?}: {}", peer, e)))?;
        }
        Ok(())
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8800
}

fn default_peer_timeout_ms() -> u64 {
    5_000
}

fn default_peer_connect_timeout_ms() -> u64 {
    2_000
}

fn default_max_concurrent_peer_requests() -> usize {
    8
}

/// Fits a 5 MiB file once hex encoded, plus the JSON envelope.
fn default_max_body_bytes() -> usize {
    11 * 1024 * 1024
}

fn default_max_attempts() -> u64 {
    50_000_000
}

fn default_max_duration_ms() -> u64 {
    60_000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.network.api_port, 8800);
        assert_eq!(config.network.max_concurrent_peer_requests, 8);
        assert!(config.network.auto_resolve_interval().is_none());
        assert_eq!(config.miner.bound(), MiningBound::default());
        assert_eq!(config.logging.format, LogFormat::Human);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path)?;
        writeln!(
            file,
            "[network]\n\
             bootstrap_peers = [\"http://10.0.0.2:8800/\"]\n\
             auto_resolve_interval_secs = 30\n\n\
             [miner]\n\
             max_duration_ms = 0\n\n\
             [logging]\n\
             format = \"json\""
        )?;

        let config: Config = toml::from_str(&fs::read_to_string(&path)?)?;
        config.validate()?;

        assert_eq!(config.network.bind_address, "0.0.0.0");
        assert_eq!(config.network.bootstrap_peers, vec!["http://10.0.0.2:8800/".to_string()]);
        assert_eq!(config.network.auto_resolve_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.miner.bound().max_duration, None);
        assert_eq!(config.miner.max_attempts, 50_000_000);
        assert_eq!(config.logging.format, LogFormat::Json);
        Ok(())
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.miner.max_attempts, 50_000_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.miner.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ChainError::Config(_))));

        let mut config = Config::default();
        config.network.bootstrap_peers = vec!["not a url".to_string()];
        assert!(matches!(config.validate(), Err(ChainError::Config(_))));
    }

    #[test]
    fn test_read_defers_validation_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[network]\napi_port = 0\n").unwrap();

        let mut config = read_config_from(&path).unwrap();
        // PORT in the environment would mask the zero port.
        if std::env::var("PORT").is_err() {
            assert_eq!(config.network.api_port, 0);
            assert!(matches!(load_config_from(&path), Err(ChainError::Config(_))));
        }
        config.network.api_port = 9100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_body_limit_default_fits_five_mib_file() {
        let config = Config::default();
        assert!(config.network.max_body_bytes > 2 * 5 * 1024 * 1024);

        let mut config = Config::default();
        config.network.max_body_bytes = 0;
        assert!(matches!(config.validate(), Err(ChainError::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[network\napi_port = ").unwrap();
        assert!(matches!(load_config_from(&path), Err(ChainError::Config(_))));
    }
}

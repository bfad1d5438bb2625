//! Client-side configuration loading
//!
//! Reads server address, transport, timeout, and remote aliases from
//! `~/.config/parley/config.toml`. Every field is optional.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use parley_utils::{config_file, ParleyError, Result};
use serde::Deserialize;

/// Client configuration file contents
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// `tcp` or `udp`
    pub transport: String,
    /// Seconds to wait for each reply
    pub timeout_secs: u64,
    /// Log in as this user right after connecting
    pub username: Option<String>,
    /// Named servers, `name = "host:port"`
    pub remotes: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9876,
            transport: "tcp".into(),
            timeout_secs: 5,
            username: None,
            remotes: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Parse a config file, reporting where it failed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ParleyError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ParleyError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if config.timeout_secs == 0 {
            return Err(ParleyError::ConfigInvalid {
                path: path.to_path_buf(),
                message: "timeout_secs must be at least 1".into(),
            });
        }
        Ok(config)
    }

    /// `host:port` of the configured server
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve a remote alias to an address
    pub fn resolve_remote(&self, name: &str) -> Option<&str> {
        self.remotes.get(name).map(String::as_str)
    }
}

/// Load the client config from the default location
///
/// Returns defaults if the file doesn't exist or can't be parsed.
pub fn load_config() -> ClientConfig {
    load_config_from(&config_file())
}

/// Load a config file, falling back to defaults on any problem
pub fn load_config_from(path: &Path) -> ClientConfig {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        return ClientConfig::default();
    }

    match ClientConfig::from_file(path) {
        Ok(config) => {
            tracing::debug!(
                "Loaded config: host={}, port={}, transport={}, timeout={}s",
                config.host,
                config.port,
                config.transport,
                config.timeout_secs
            );
            config
        }
        Err(e) => {
            tracing::warn!("{}, using defaults", e);
            ClientConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.address(), "127.0.0.1:9876");
        assert_eq!(config.transport, "tcp");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.username.is_none());
    }

    #[test]
    fn test_parse_empty_config() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            port = 4000
            transport = "udp"
            username = "alice"
        "#;
        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.transport, "udp");
        assert_eq!(config.username.as_deref(), Some("alice"));
        // Defaults for unspecified
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_parse_remotes() {
        let toml = r#"
            [remotes]
            lab = "192.168.1.5:9876"
            cloud = "chat.example.net:9000"
        "#;
        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.resolve_remote("lab"), Some("192.168.1.5:9876"));
        assert_eq!(config.resolve_remote("cloud"), Some("chat.example.net:9000"));
        assert_eq!(config.resolve_remote("missing"), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"10.0.0.2\"\ntimeout_secs = 2").unwrap();

        let config = load_config_from(file.path());
        assert_eq!(config.address(), "10.0.0.2:9876");
        assert_eq!(config.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let err = ClientConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ParleyError::ConfigInvalid { .. }));
        assert_eq!(load_config_from(file.path()), ClientConfig::default());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_secs = 0").unwrap();

        let err = ClientConfig::from_file(file.path()).unwrap_err();
        match err {
            ParleyError::ConfigInvalid { message, .. } => assert!(message.contains("timeout_secs")),
            other => panic!("Expected ConfigInvalid, got {:?}", other),
        }
        assert_eq!(load_config_from(file.path()).timeout_secs, 5);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.toml"));
        assert_eq!(config, ClientConfig::default());
    }
}

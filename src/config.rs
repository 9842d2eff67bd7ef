//! Configuration types for API Replay

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::network::MAX_CONNECTIONS;
use crate::{ApiReplayError, Result};

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "api-replay.toml";

/// Settings shared by `record` and `serve`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory recordings are written to and served from
    pub output_dir: PathBuf,
    /// Port the replay server listens on
    pub port: u16,
    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Caps on upstream body size and concurrent replay connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent connections while serving
    pub max_connections: usize,
    /// Maximum upstream response body size in bytes
    pub max_response_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: MAX_CONNECTIONS,
            max_response_size: 256 << 20,
        }
    }
}

impl Config {
    /// Read and validate a TOML config file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, malformed or invalid
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApiReplayError::ConfigError(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ApiReplayError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Check field values that serde cannot
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the first offending field
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ApiReplayError::ConfigError(
                "output_dir cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(ApiReplayError::ConfigError(
                "port cannot be 0".to_string(),
            ));
        }

        if self.limits.max_connections == 0 {
            return Err(ApiReplayError::ConfigError(
                "limits.max_connections must be > 0".to_string(),
            ));
        }

        if self.limits.max_response_size == 0 {
            return Err(ApiReplayError::ConfigError(
                "limits.max_response_size must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            output_dir = "recordings"
            port = 8080
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("recordings"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.limits.max_connections, 4096);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        let config_toml = r#"
            output_dir = "/tmp/api-replay"
            port = 9000

            [limits]
            max_connections = 16
            max_response_size = 1024
        "#;
        file.write_all(config_toml.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.limits.max_connections, 16);
        assert_eq!(config.limits.max_response_size, 1024);
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = Config::from_file(&dir.path().join(DEFAULT_CONFIG_FILE));
        assert!(matches!(result, Err(ApiReplayError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_config_zero_port() {
        let config_toml = r#"
            output_dir = "recordings"
            port = 0
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limits_are_validated() {
        let config: Config = toml::from_str(
            r#"
            output_dir = "recordings"
            port = 8080

            [limits]
            max_connections = 8
            max_response_size = 512
        "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_connections, 8);

        let zero_limit = Config {
            limits: LimitsConfig {
                max_response_size: 0,
                ..LimitsConfig::default()
            },
            ..config
        };
        assert!(matches!(
            zero_limit.validate(),
            Err(ApiReplayError::ConfigError(_))
        ));
    }

    #[test]
    fn test_invalid_config_missing_port() {
        let config_toml = r#"
            output_dir = "recordings"
        "#;

        assert!(toml::from_str::<Config>(config_toml).is_err());
    }
}

//! Bootstrap configuration loading
//!
//! The config file is located using this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `LMS_CONFIG` environment variable
//! 3. `<user config dir>/lms/<module>.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing file is never fatal: a warning is logged and compiled defaults are used.
//! A file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LMS_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// These settings cannot change while the service is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Base URL of the library backend REST API
    pub backend_url: String,

    /// Base URL of the realtime hub (defaults to `backend_url`)
    pub hub_url: Option<String>,

    /// HTTP port for the dialog service
    pub port: u16,

    pub hub: HubConfig,

    pub countdown: CountdownConfig,

    pub logging: LoggingConfig,
}

/// Realtime hub settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub path relative to the hub base URL
    pub path: String,

    /// Server-to-client invocation target carrying payment status
    pub status_event: String,
}

/// Payment countdown timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownConfig {
    /// Period of both the expiry and the navigation timer
    pub tick_ms: u64,

    /// Seconds between resolution and navigation
    pub navigate_grace_seconds: u32,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".to_string(),
            hub_url: None,
            port: 5780,
            hub: HubConfig::default(),
            countdown: CountdownConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            path: "payment-hub".to_string(),
            status_event: "PaymentStatusChanged".to_string(),
        }
    }
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            navigate_grace_seconds: 5,
        }
    }
}

impl CountdownConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Base URL of the realtime hub
    pub fn hub_base_url(&self) -> &str {
        self.hub_url.as_deref().unwrap_or(&self.backend_url)
    }

    pub fn validate(&self) -> Result<()> {
        for (key, url) in [("backend_url", Some(&self.backend_url)), ("hub_url", self.hub_url.as_ref())] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(Error::Config(format!(
                        "{} must be an http(s) URL, got '{}'",
                        key, url
                    )));
                }
            }
        }
        if self.countdown.tick_ms == 0 {
            return Err(Error::Config("countdown.tick_ms must be greater than 0".to_string()));
        }
        if self.hub.status_event.trim().is_empty() {
            return Err(Error::Config("hub.status_event must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Locates and loads the bootstrap config for one module
pub struct ConfigResolver {
    module_name: String,
}

impl ConfigResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
        }
    }

    /// Config file path by priority, without checking existence
    pub fn config_path(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config directory
        dirs::config_dir().map(|d| d.join("lms").join(format!("{}.toml", self.module_name)))
    }

    /// Resolve the effective configuration
    ///
    /// Falls back to compiled defaults (priority 4) when no file is found.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Result<TomlConfig> {
        let Some(path) = self.config_path(cli_arg) else {
            warn!("Could not determine config directory, using compiled defaults");
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            warn!(
                "Config file {} not found, using compiled defaults for {}",
                path.display(),
                self.module_name
            );
            return Ok(TomlConfig::default());
        }

        let config = TomlConfig::load(&path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TomlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hub.path, "payment-hub");
        assert_eq!(config.countdown.navigate_grace_seconds, 5);
        assert_eq!(config.countdown.tick(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            backend_url = "https://library.example.org"

            [countdown]
            navigate_grace_seconds = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.backend_url, "https://library.example.org");
        assert_eq!(config.countdown.navigate_grace_seconds, 3);
        assert_eq!(config.countdown.tick_ms, 1000);
        assert_eq!(config.port, 5780);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_hub_url_falls_back_to_backend() {
        let mut config = TomlConfig::default();
        assert_eq!(config.hub_base_url(), config.backend_url);

        config.hub_url = Some("http://hub.local".to_string());
        assert_eq!(config.hub_base_url(), "http://hub.local");
    }

    #[test]
    fn test_rejects_non_http_backend() {
        let result = TomlConfig::from_toml_str(r#"backend_url = "ftp://nope""#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_tick() {
        let result = TomlConfig::from_toml_str("[countdown]\ntick_ms = 0\n");
        assert!(result.is_err());
    }
}

//! Configuration for the actuator provider
//!
//! Loaded once at startup from a TOML file. Secrets are never stored in the
//! file itself: the file names environment variables and the values are
//! resolved at runtime.

use crate::link::{Credentials, RetryPolicy};
use crate::locator::{validate_locator, Locator, LocatorError};
use crate::output::sysfs::DEFAULT_SYSFS_GPIO_ROOT;
use crate::protocol::{validate_key_expr, KeyExprError, DEFAULT_KEY_EXPR};
use crate::transport::mqtt::{SessionConfig, SessionMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Interface used when neither the link section nor the locator names one
pub const DEFAULT_INTERFACE: &str = "wlan0";

/// Main actuator configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuatorConfig {
    pub device: DeviceSection,
    #[serde(default)]
    pub bus: BusSection,
    #[serde(default)]
    pub link: LinkSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier (must match [a-zA-Z0-9._-]+), used as the MQTT client id
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusSection {
    #[serde(default)]
    pub mode: SessionMode,
    /// `tcp/<IPv4>:<port>#iface=<name>`, or empty for the default endpoint
    #[serde(default)]
    pub locator: String,
    #[serde(default = "default_key_expr")]
    pub key_expr: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            locator: String::new(),
            key_expr: default_key_expr(),
            connect_timeout_secs: default_connect_timeout(),
            channel_capacity: default_channel_capacity(),
            username_env: None,
            password_env: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSection {
    pub interface: Option<String>,
    /// Environment variable containing the network SSID
    pub ssid_env: Option<String>,
    /// Environment variable containing the network passphrase
    pub password_env: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Argument vector run to (re)associate; `{ssid}` and `{password}` are substituted
    pub associate_command: Option<Vec<String>>,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            interface: None,
            ssid_env: None,
            password_env: None,
            max_retries: default_max_retries(),
            poll_interval_ms: default_poll_interval_ms(),
            associate_command: None,
        }
    }
}

/// Which output driver backs the actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    #[default]
    Sysfs,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSection {
    #[serde(default)]
    pub backend: OutputBackend,
    #[serde(default = "default_pin")]
    pub pin: u32,
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            backend: OutputBackend::default(),
            pin: default_pin(),
            sysfs_root: default_sysfs_root(),
        }
    }
}

fn default_key_expr() -> String {
    DEFAULT_KEY_EXPR.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_channel_capacity() -> usize {
    32
}

fn default_max_retries() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_pin() -> u32 {
    25
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from(DEFAULT_SYSFS_GPIO_ROOT)
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
    #[error("Invalid locator: {0}")]
    InvalidLocator(#[from] LocatorError),
    #[error("Invalid key-expression: {0}")]
    InvalidKeyExpr(#[from] KeyExprError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ActuatorConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ActuatorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.id)?;
        validate_locator(&self.bus.locator)?;
        validate_key_expr(&self.bus.key_expr)?;

        if self.bus.channel_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "bus.channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.link.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "link.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    fn get_env_var_required(env_var_name: Option<&String>) -> Result<Option<String>, ConfigError> {
        match env_var_name {
            Some(name) => std::env::var(name)
                .map(Some)
                .map_err(|_| ConfigError::EnvVarNotFound(name.clone())),
            None => Ok(None),
        }
    }

    pub fn get_bus_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.bus.username_env.as_ref())
    }

    pub fn get_bus_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.bus.password_env.as_ref())
    }

    /// Link credentials. A named variable that is unset is an error; an
    /// unnamed one resolves to an empty string.
    pub fn get_link_credentials(&self) -> Result<Credentials, ConfigError> {
        let ssid = Self::get_env_var_required(self.link.ssid_env.as_ref())?.unwrap_or_default();
        let password =
            Self::get_env_var_required(self.link.password_env.as_ref())?.unwrap_or_default();
        Ok(Credentials::new(ssid, password))
    }

    /// Parsed locator, `None` when the default endpoint should be used
    pub fn locator(&self) -> Result<Option<Locator>, ConfigError> {
        Ok(Locator::parse(&self.bus.locator)?)
    }

    /// Interface to watch: explicit setting, then the locator's iface, then the default
    pub fn link_interface(&self) -> Result<String, ConfigError> {
        if let Some(interface) = &self.link.interface {
            return Ok(interface.clone());
        }
        Ok(self
            .locator()?
            .map(|locator| locator.iface().to_string())
            .unwrap_or_else(|| DEFAULT_INTERFACE.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.link.poll_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.link.max_retries,
            retry_delay: self.poll_interval(),
        }
    }

    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let mut session = SessionConfig::new(self.device.id.clone());
        session.mode = self.bus.mode;
        session.locator = self.locator()?;
        session.username = self.get_bus_username();
        session.password = self.get_bus_password();
        session.connect_timeout = Duration::from_secs(self.bus.connect_timeout_secs);
        session.channel_capacity = self.bus.channel_capacity;
        Ok(session)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
id = "test-actuator"

[output]
backend = "log"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate device ID format
fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceId(format!(
            "Device ID '{device_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

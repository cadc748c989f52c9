//! Configuration loading for bridges.

use std::path::Path;

use serde::de::DeserializeOwned;

use emonlink_common::Format;

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, ZenohConfig};

/// Trait for bridge configuration types.
///
/// Implementors get JSON5 loading with validation, and expose the settings the
/// [`BridgeRunner`](crate::BridgeRunner) needs to start up.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use emonlink_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig, Result, ZenohConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub zenoh: ZenohConfig,
///     pub logging: LoggingConfig,
///     pub key_prefix: String,
///     pub devices: Vec<String>,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn zenoh(&self) -> &ZenohConfig { &self.zenoh }
///     fn logging(&self) -> &LoggingConfig { &self.logging }
///     fn key_prefix(&self) -> &str { &self.key_prefix }
///
///     fn validate(&self) -> Result<()> {
///         if self.devices.is_empty() {
///             return Err(BridgeError::validation("At least one device required"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Zenoh session settings.
    fn zenoh(&self) -> &ZenohConfig;

    /// Logging settings.
    fn logging(&self) -> &LoggingConfig;

    /// Key expression prefix payloads are published under.
    fn key_prefix(&self) -> &str;

    /// Envelope serialization format.
    fn format(&self) -> Format {
        Format::Json
    }

    /// Validate the configuration.
    ///
    /// Called automatically after loading.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Parse and validate a JSON5 document.
    fn parse(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON5 file.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

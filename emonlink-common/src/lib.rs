//! emonlink common library
//!
//! Shared types and utilities for the emonlink interfacer bridges:
//!
//! - [`telemetry`] - Published payload model (`Payload`, `Protocol`)
//! - [`serialization`] - JSON/CBOR encoding and decoding of payload envelopes
//! - [`config`] - Zenoh and logging settings, JSON5 loading
//! - [`session`] - Zenoh session management
//! - [`keyexpr`] - Channel key expression builders and parsers
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod keyexpr;
pub mod serialization;
pub mod session;
pub mod telemetry;

pub use config::{LogFormat, LoggingConfig, ZenohConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use keyexpr::{
    KEY_PREFIX, KeyExprBuilder, ParsedKeyExpr, all_payloads_wildcard, parse_key_expr,
    validate_chunk,
};
pub use serialization::{Format, decode, decode_auto, encode};
pub use session::connect;
pub use telemetry::{Payload, Protocol, current_timestamp_millis};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// # Example
///
/// ```ignore
/// use emonlink_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))
}

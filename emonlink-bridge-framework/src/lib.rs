//! emonlink bridge framework
//!
//! Scaffolding shared by bridges that poll field devices and publish
//! payloads to Zenoh.
//!
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for the bridge lifecycle (startup, workers, Ctrl+C shutdown)
//! - [`Publisher`] for fanning payloads out to channel key expressions
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for status reporting
//!
//! # Example
//!
//! ```ignore
//! use emonlink_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new("mybridge", config, &args).await?;
//!     let publisher = runner.publisher();
//!     runner.spawn("worker", my_worker(publisher));
//!
//!     runner.run().await
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::{PublishStats, Publisher};
pub use runner::BridgeRunner;
pub use status::{BridgeStatus, StatusPublisher};

pub use emonlink_common::{Format, LoggingConfig, Payload, Protocol, ZenohConfig};

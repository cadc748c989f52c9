//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;

use emonlink_common::{connect, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::Publisher;
use crate::status::StatusPublisher;

/// Owns a bridge's Zenoh session and worker tasks.
///
/// Startup initializes logging (CLI level override first), opens the Zenoh
/// session and builds the [`Publisher`]. Workers are spawned as independent
/// tasks; [`run`](Self::run) waits for Ctrl+C, aborts them, publishes the
/// offline status and closes the session.
pub struct BridgeRunner<C: BridgeConfig> {
    name: String,
    version: String,
    config: C,
    session: Arc<zenoh::Session>,
    publisher: Publisher,
    status: StatusPublisher,
    workers: Vec<(String, JoinHandle<()>)>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Start the bridge: logging, Zenoh session, publisher.
    pub async fn new(name: impl Into<String>, config: C, args: &BridgeArgs) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let log_config = config
            .logging()
            .with_level_override(args.log_level.as_deref());
        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let session = Arc::new(
            connect(config.zenoh())
                .await
                .map_err(|e| BridgeError::ZenohConnection(e.to_string()))?,
        );

        let publisher = Publisher::new(session.clone(), config.key_prefix(), config.format());
        let status = StatusPublisher::new(publisher.clone(), &name, &version);

        Ok(Self {
            name,
            version,
            config,
            session,
            publisher,
            status,
            workers: Vec::new(),
        })
    }

    /// Bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bridge version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The loaded configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// A publisher sharing the bridge's session.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Spawn a named worker task; it is aborted on shutdown.
    pub fn spawn<F>(&mut self, worker: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let worker = worker.into();
        tracing::debug!(worker = %worker, "Spawning worker");
        self.workers.push((worker, tokio::spawn(future)));
    }

    /// Run until Ctrl+C, then shut down.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_with_metadata(None).await
    }

    /// Run until Ctrl+C, announcing `metadata` in the running status.
    pub async fn run_with_metadata(self, metadata: Option<serde_json::Value>) -> anyhow::Result<()> {
        if let Err(e) = self.status.publish_running(metadata).await {
            tracing::warn!(error = %e, "Failed to publish running status");
        }

        tracing::info!(
            bridge = %self.name,
            workers = self.workers.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for (worker, handle) in &self.workers {
            handle.abort();
            tracing::debug!(worker = %worker, "Worker aborted");
        }

        // Let aborted workers drop their device connections.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        if let Err(e) = self.status.publish_offline().await {
            tracing::warn!(error = %e, "Failed to publish offline status");
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(bridge = %self.name, "Bridge stopped");

        Ok(())
    }
}

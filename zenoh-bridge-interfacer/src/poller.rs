//! Device polling and payload publishing.

use std::sync::Arc;
use std::time::Duration;

use emonlink_bridge_framework::{Payload, Publisher};
use tracing::{debug, error, info, warn};

use crate::config::{InterfacerConfig, NodeTable};
use crate::connection::ConnectionManager;
use crate::error::{ConfigError, ConnectionError, PollError};
use crate::payload::PayloadAssembler;
use crate::resolver::NodeConfigResolver;
use crate::sanity::SanityFilter;
use crate::transport::Transport;

/// Polls every node behind one device link, one request at a time.
pub struct PollCycle<T: Transport> {
    name: String,
    node_ids: Vec<String>,
    channels: Vec<String>,
    interval: Duration,
    connection: ConnectionManager<T>,
    resolver: NodeConfigResolver,
    nodes: Arc<NodeTable>,
    sanity: SanityFilter,
    cycle: u64,
}

impl<T: Transport> PollCycle<T> {
    pub fn new(
        name: impl Into<String>,
        transport: T,
        node_ids: Vec<String>,
        nodes: Arc<NodeTable>,
        retry_cycles: u64,
    ) -> Self {
        Self {
            name: name.into(),
            node_ids,
            channels: Vec::new(),
            interval: Duration::ZERO,
            connection: ConnectionManager::new(transport),
            resolver: NodeConfigResolver::new(T::SCHEME, retry_cycles),
            nodes,
            sanity: SanityFilter::default(),
            cycle: 0,
        }
    }

    pub fn from_config(
        config: &InterfacerConfig,
        transport: T,
        nodes: Arc<NodeTable>,
        retry_cycles: u64,
    ) -> Self {
        Self::new(config.name.clone(), transport, config.node_ids(), nodes, retry_cycles)
            .with_channels(config.channels.clone())
            .with_interval(config.interval())
            .with_sanity_filter(SanityFilter::from_config(&config.quality))
    }

    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_sanity_filter(mut self, sanity: SanityFilter) -> Self {
        self.sanity = sanity;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn resolver(&self) -> &NodeConfigResolver {
        &self.resolver
    }

    /// Swap in a new node table; every node resolves again on its next poll.
    pub fn reload_nodes(&mut self, nodes: Arc<NodeTable>) {
        info!(interfacer = %self.name, "Node table reloaded");
        self.nodes = nodes;
        self.resolver.invalidate_all();
    }

    /// Poll every node once, in order. Returns one payload per node that
    /// completed cleanly.
    pub async fn poll_once(&mut self) -> Vec<Payload> {
        let mut payloads = Vec::with_capacity(self.node_ids.len());
        let node_ids = self.node_ids.clone();

        for node_id in &node_ids {
            match self.poll_node(node_id).await {
                Ok(payload) => {
                    debug!(
                        interfacer = %self.name,
                        node = %node_id,
                        bytes = payload.len(),
                        "Node polled"
                    );
                    payloads.push(payload);
                }
                Err(e) => self.report(node_id, &e),
            }
        }

        self.cycle += 1;
        payloads
    }

    async fn poll_node(&mut self, node_id: &str) -> Result<Payload, PollError> {
        if !self.connection.ensure_connected().await {
            return Err(ConnectionError::Unavailable {
                endpoint: self.connection.endpoint().to_string(),
            }
            .into());
        }

        let schema = self.resolver.resolve(node_id, &self.nodes, self.cycle)?;
        let mut assembler = PayloadAssembler::for_schema(&schema);

        for field in &schema.fields {
            let request = self.connection.transport().build_request(field)?;
            let raw = self.connection.send_and_receive(&request).await?;
            let value = match self.connection.transport().decode(field, &raw) {
                Ok(value) => value,
                Err(e) => {
                    // Leftover reply bytes would shift every later answer.
                    self.connection.disconnect().await;
                    return Err(PollError::decode(&field.name, e));
                }
            };
            self.sanity.check(&field.name, &value)?;
            assembler
                .push_value(&value)
                .map_err(|e| PollError::decode(&field.name, e))?;
        }

        assembler.finish(&self.name).map_err(PollError::from)
    }

    fn report(&self, node_id: &str, err: &PollError) {
        let interfacer = &self.name;
        match err {
            PollError::Config(
                e @ (ConfigError::AwaitingRetry { .. } | ConfigError::AwaitingReload),
            ) => {
                debug!(%interfacer, node = %node_id, reason = %e, "Node skipped");
            }
            PollError::Config(e) => {
                error!(%interfacer, node = %node_id, error = %e, "Node configuration rejected");
            }
            PollError::SanityVeto(e) => {
                info!(%interfacer, node = %node_id, reason = %e, "Payload discarded");
            }
            PollError::Connection(_) | PollError::Decode { .. } | PollError::IncompletePayload(_) => {
                warn!(%interfacer, node = %node_id, error = %err, "Node poll aborted");
            }
        }
    }

    /// Run the polling loop, publishing every payload to each channel.
    pub async fn run(mut self, publisher: Publisher) {
        info!(
            interfacer = %self.name,
            endpoint = %self.connection.endpoint(),
            nodes = ?self.node_ids,
            interval = ?self.interval,
            "Starting poll loop"
        );

        loop {
            for payload in self.poll_once().await {
                let stats = publisher.publish_payload(&payload, self.channels.as_slice()).await;
                if !stats.is_complete() {
                    warn!(
                        interfacer = %self.name,
                        node = %payload.node_id,
                        failed = stats.failed,
                        "Payload not published to every channel"
                    );
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

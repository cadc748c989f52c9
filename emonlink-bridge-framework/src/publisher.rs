//! Payload publisher for Zenoh.

use std::sync::Arc;

use emonlink_common::{Format, KeyExprBuilder, Payload, encode};

use crate::error::{BridgeError, Result};

/// Publishes node payloads to Zenoh.
///
/// Each payload is serialized once and put on one key per channel:
/// `<prefix>/<channel>/<node_id>`.
#[derive(Clone, Debug)]
pub struct Publisher {
    session: Arc<zenoh::Session>,
    keys: KeyExprBuilder,
    format: Format,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(session: Arc<zenoh::Session>, key_prefix: impl Into<String>, format: Format) -> Self {
        Self {
            session,
            keys: KeyExprBuilder::with_prefix(key_prefix),
            format,
        }
    }

    /// Get the key prefix.
    pub fn key_prefix(&self) -> &str {
        self.keys.prefix()
    }

    /// Get the serialization format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Key builder used for payload keys.
    pub fn keys(&self) -> &KeyExprBuilder {
        &self.keys
    }

    /// Publish one payload to every channel.
    ///
    /// Failures on one channel do not stop the others; they are logged and
    /// counted in the returned stats.
    pub async fn publish_payload<S: AsRef<str>>(
        &self,
        payload: &Payload,
        channels: &[S],
    ) -> PublishStats {
        let mut stats = PublishStats::default();

        let bytes = match encode(payload, self.format) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(node = %payload.node_id, error = %e, "Failed to encode payload");
                stats.failed = channels.len();
                return stats;
            }
        };

        for channel in channels {
            let key = self.keys.build(channel.as_ref(), &payload.node_id);
            match self.publish_raw(&key, bytes.clone(), self.format).await {
                Ok(()) => {
                    stats.success += 1;
                    tracing::debug!(key = %key, bytes = payload.len(), "Published payload");
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(error = %e, "Failed to publish payload");
                }
            }
        }

        stats
    }

    /// Publish already-encoded bytes to a key, tagged with the format's
    /// MIME type.
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>, format: Format) -> Result<()> {
        self.session
            .put(key, payload)
            .encoding(format.mime_type())
            .await
            .map_err(|e| BridgeError::Publish {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    /// Publish a JSON value to a key.
    pub async fn publish_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(key, payload, Format::Json).await
    }
}

/// Outcome of fanning one payload out to its channels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of channels the payload reached.
    pub success: usize,
    /// Number of channels that failed.
    pub failed: usize,
}

impl PublishStats {
    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Whether every channel received the payload.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

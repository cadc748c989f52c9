use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One node's assembled telemetry for a single poll cycle.
///
/// `data` is the node's byte payload in the hub's uniform binary-telegram
/// format: every field encoded little-endian with standard widths, laid out
/// in the order the node declares its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Unix epoch milliseconds when the payload was assembled.
    pub timestamp: i64,

    /// Name of the interfacer that polled the device.
    pub interfacer: String,

    /// Logical node identifier (e.g., "10").
    pub node_id: String,

    /// Encoded field bytes.
    pub data: Vec<u8>,
}

impl Payload {
    /// Create a new payload stamped with the current time.
    pub fn new(interfacer: impl Into<String>, node_id: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            interfacer: interfacer.into(),
            node_id: node_id.into(),
            data,
        }
    }

    /// Number of encoded bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Device protocol spoken by an interfacer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Register reads over Modbus TCP or RTU.
    Modbus,
    /// ASCII command/reply over TCP (HIOKI dataloggers).
    Hioki,
}

impl Protocol {
    /// Get the string representation used in logs and status messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Modbus => "modbus",
            Protocol::Hioki => "hioki",
        }
    }

    /// Default TCP port for this protocol.
    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Modbus => 502,
            Protocol::Hioki => 8802,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

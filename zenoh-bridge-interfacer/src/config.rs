//! Configuration for the interfacer bridge.
//!
//! Two tables live in one JSON5 file: `hub.interfacers` describes the
//! physical links to poll, and `nodes` maps node ids to their raw field
//! definitions. The raw `rx` records are kept as written; turning them into
//! a schema is the resolver's job.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use emonlink_bridge_framework::{
    BridgeConfig, BridgeError, Format, LoggingConfig, Protocol, ZenohConfig,
};
use emonlink_common::{KEY_PREFIX, validate_chunk};
use serde::{Deserialize, Serialize};

/// A config value written either as a single item or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items.clone(),
            OneOrMany::One(item) => vec![item.clone()],
        }
    }
}

/// A number or a string; `1` and `"1"` name the same unit id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigScalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ConfigScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigScalar::Integer(v) => write!(f, "{v}"),
            ConfigScalar::Float(v) => write!(f, "{v}"),
            ConfigScalar::Text(v) => f.write_str(v.trim()),
        }
    }
}

/// Raw `rx` section of a node, singular and plural keys side by side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNodeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, alias = "registers", skip_serializing_if = "Option::is_none")]
    pub addresses: Option<OneOrMany<ConfigScalar>>,
    #[serde(default, alias = "register", skip_serializing_if = "Option::is_none")]
    pub address: Option<ConfigScalar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<OneOrMany<ConfigScalar>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ConfigScalar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voices: Option<OneOrMany<ConfigScalar>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<ConfigScalar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacodes: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacode: Option<String>,

    #[serde(
        default,
        rename = "unitIds",
        alias = "unit_ids",
        skip_serializing_if = "Option::is_none"
    )]
    pub unit_ids: Option<OneOrMany<ConfigScalar>>,
    #[serde(
        default,
        rename = "unitId",
        alias = "unit_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub unit_id: Option<ConfigScalar>,
}

/// One entry of the node table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    #[serde(default)]
    pub rx: Option<RawNodeConfig>,
}

/// Node id to node entry.
pub type NodeTable = HashMap<String, NodeEntry>;

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfacerBridgeConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Envelope encoding for published payloads
    #[serde(default)]
    pub serialization: Format,

    /// Interfacer settings
    pub hub: HubConfig,

    /// Node field definitions
    #[serde(default)]
    pub nodes: NodeTable,
}

/// Hub-wide interfacer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Key expression prefix (default: "emonlink")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Physical links to poll
    pub interfacers: Vec<InterfacerConfig>,

    /// Cycles a node with a failed resolution is skipped (0 = until reload)
    #[serde(default = "default_config_retry_cycles")]
    pub config_retry_cycles: u64,
}

fn default_key_prefix() -> String {
    KEY_PREFIX.to_string()
}

fn default_config_retry_cycles() -> u64 {
    60
}

/// One physical device link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfacerConfig {
    /// Interfacer name (used in logs and payload envelopes)
    pub name: String,

    /// Device protocol: "modbus" or "hioki"
    pub protocol: Protocol,

    /// Connection type and address
    pub connection: ConnectionConfig,

    /// Modbus function code: 3 (holding) or 4 (input)
    #[serde(default = "default_function_code")]
    pub function_code: u8,

    /// Delay between poll cycles in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,

    /// Single node served by this device
    #[serde(default, alias = "nodeId")]
    pub node_id: Option<String>,

    /// Nodes served by a gateway device, polled in order
    #[serde(default, alias = "nodeIds")]
    pub node_ids: Vec<String>,

    /// Publish channels
    #[serde(default = "default_channels", alias = "pubchannels")]
    pub channels: Vec<String>,

    /// Connect and request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Signal-quality plausibility check
    #[serde(default)]
    pub quality: QualityConfig,
}

fn default_function_code() -> u8 {
    3
}

fn default_interval_secs() -> f64 {
    10.0
}

fn default_channels() -> Vec<String> {
    vec!["ToEmonCMS".to_string()]
}

fn default_timeout_ms() -> u64 {
    1000
}

impl InterfacerConfig {
    /// Nodes to poll, `node_ids` first then `node_id`, without repeats.
    pub fn node_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.node_ids
            .iter()
            .chain(self.node_id.iter())
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or(Duration::ZERO)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Connection configuration (TCP or RTU).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// TCP connection
    Tcp {
        /// Host address (IP or hostname)
        host: String,
        /// TCP port (default: 502 for Modbus, 8802 for HIOKI)
        #[serde(default)]
        port: Option<u16>,
    },
    /// Modbus RTU (serial) connection
    Rtu {
        /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1")
        port: String,
        /// Baud rate (default: 9600)
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        /// Data bits (default: 8)
        #[serde(default = "default_data_bits")]
        data_bits: u8,
        /// Parity: "none", "even", or "odd" (default: "none")
        #[serde(default = "default_parity")]
        parity: String,
        /// Stop bits: 1 or 2 (default: 1)
        #[serde(default = "default_stop_bits")]
        stop_bits: u8,
    },
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_parity() -> String {
    "none".to_string()
}

fn default_stop_bits() -> u8 {
    1
}

impl ConnectionConfig {
    /// Human-readable endpoint for logs.
    pub fn endpoint(&self, protocol: Protocol) -> String {
        match self {
            ConnectionConfig::Tcp { host, port } => {
                format!("{}:{}", host, port.unwrap_or(protocol.default_port()))
            }
            ConnectionConfig::Rtu {
                port, baud_rate, ..
            } => format!("{port}@{baud_rate}"),
        }
    }
}

/// Signal-quality plausibility settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Field name prefix marking a quality metric; empty disables the check
    #[serde(default = "default_quality_prefix")]
    pub prefix: String,

    /// Largest plausible reading
    #[serde(default = "default_quality_max")]
    pub max: f64,
}

fn default_quality_prefix() -> String {
    "RSSI".to_string()
}

fn default_quality_max() -> f64 {
    1500.0
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            prefix: default_quality_prefix(),
            max: default_quality_max(),
        }
    }
}

impl BridgeConfig for InterfacerBridgeConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.hub.key_prefix
    }

    fn format(&self) -> Format {
        self.serialization
    }

    fn validate(&self) -> Result<(), BridgeError> {
        validate_chunk(&self.hub.key_prefix)
            .map_err(|e| BridgeError::validation(format!("key_prefix: {e}")))?;

        if self.hub.interfacers.is_empty() {
            return Err(BridgeError::validation(
                "At least one interfacer must be configured",
            ));
        }

        let mut names = HashSet::new();
        for interfacer in &self.hub.interfacers {
            if interfacer.name.is_empty() {
                return Err(BridgeError::validation("Interfacer name cannot be empty"));
            }
            if !names.insert(interfacer.name.as_str()) {
                return Err(BridgeError::validation(format!(
                    "Duplicate interfacer name '{}'",
                    interfacer.name
                )));
            }
            interfacer.validate()?;
        }

        Ok(())
    }
}

impl InterfacerConfig {
    fn validate(&self) -> Result<(), BridgeError> {
        let name = &self.name;

        if self.node_ids().is_empty() {
            return Err(BridgeError::validation(format!(
                "Interfacer '{name}': must specify node_id or node_ids"
            )));
        }

        if self.channels.is_empty() {
            return Err(BridgeError::validation(format!(
                "Interfacer '{name}': at least one publish channel is required"
            )));
        }
        for channel in &self.channels {
            validate_chunk(channel).map_err(|e| {
                BridgeError::validation(format!("Interfacer '{name}': channel {e}"))
            })?;
        }

        if !self.interval_secs.is_finite() || self.interval_secs < 0.0 {
            return Err(BridgeError::validation(format!(
                "Interfacer '{name}': interval_secs must be a non-negative number"
            )));
        }

        if self.protocol == Protocol::Modbus && !matches!(self.function_code, 3 | 4) {
            return Err(BridgeError::validation(format!(
                "Interfacer '{name}': function_code must be 3 or 4, got {}",
                self.function_code
            )));
        }

        match &self.connection {
            ConnectionConfig::Rtu { .. } if self.protocol == Protocol::Hioki => {
                Err(BridgeError::validation(format!(
                    "Interfacer '{name}': hioki only supports tcp connections"
                )))
            }
            ConnectionConfig::Rtu { parity, .. } => match parity.to_lowercase().as_str() {
                "none" | "even" | "odd" => Ok(()),
                _ => Err(BridgeError::validation(format!(
                    "Interfacer '{name}': invalid parity '{parity}' (use none, even, or odd)"
                ))),
            },
            ConnectionConfig::Tcp { host, .. } if host.is_empty() => Err(
                BridgeError::validation(format!("Interfacer '{name}': host cannot be empty")),
            ),
            ConnectionConfig::Tcp { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> InterfacerBridgeConfig {
        json5::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_modbus_tcp() {
        let config = parse(
            r#"{
            hub: {
                interfacers: [
                    {
                        name: "SolarMeter",
                        protocol: "modbus",
                        connection: { type: "tcp", host: "192.168.1.10" },
                        node_id: "10",
                    }
                ]
            },
            nodes: {
                "10": {
                    rx: {
                        names: ["Power", "RSSI"],
                        registers: [100, 101],
                        datacodes: ["float32", "uint16"],
                        unitId: 1,
                    }
                }
            }
        }"#,
        );
        config.validate().unwrap();

        let interfacer = &config.hub.interfacers[0];
        assert_eq!(interfacer.protocol, Protocol::Modbus);
        assert_eq!(interfacer.function_code, 3);
        assert_eq!(interfacer.interval(), Duration::from_secs(10));
        assert_eq!(interfacer.timeout(), Duration::from_millis(1000));
        assert_eq!(interfacer.channels, vec!["ToEmonCMS"]);
        assert_eq!(interfacer.quality, QualityConfig::default());
        assert_eq!(
            interfacer.connection.endpoint(interfacer.protocol),
            "192.168.1.10:502"
        );

        let rx = config.nodes["10"].rx.as_ref().unwrap();
        assert_eq!(rx.names.as_ref().unwrap().to_vec(), vec!["Power", "RSSI"]);
        assert_eq!(
            rx.addresses.as_ref().unwrap().to_vec(),
            vec![ConfigScalar::Integer(100), ConfigScalar::Integer(101)]
        );
        assert_eq!(rx.unit_id, Some(ConfigScalar::Integer(1)));
        assert_eq!(config.hub.config_retry_cycles, 60);
        assert_eq!(config.key_prefix(), "emonlink");
    }

    #[test]
    fn test_parse_hioki_gateway_aliases() {
        let config = parse(
            r#"{
            serialization: "cbor",
            hub: {
                key_prefix: "site",
                interfacers: [
                    {
                        name: "logger",
                        protocol: "hioki",
                        connection: { type: "tcp", host: "10.0.0.5" },
                        nodeIds: ["20", "21"],
                        pubchannels: ["ToEmonCMS", "Local"],
                        interval_secs: 2.5,
                    }
                ]
            },
            nodes: {
                "20": { rx: { names: ["U1", "U2"], channels: [1, 1], voices: ["1", "2"] } },
                "21": { rx: { name: "I1", channel: "2", voice: 1 } },
            }
        }"#,
        );
        config.validate().unwrap();

        assert_eq!(config.format(), Format::Cbor);
        let interfacer = &config.hub.interfacers[0];
        assert_eq!(interfacer.node_ids(), vec!["20", "21"]);
        assert_eq!(interfacer.channels, vec!["ToEmonCMS", "Local"]);
        assert_eq!(interfacer.interval(), Duration::from_millis(2500));
        assert_eq!(
            interfacer.connection.endpoint(interfacer.protocol),
            "10.0.0.5:8802"
        );

        let rx = config.nodes["21"].rx.as_ref().unwrap();
        assert_eq!(rx.name.as_deref(), Some("I1"));
        assert_eq!(rx.channel, Some(ConfigScalar::Text("2".to_string())));
    }

    #[test]
    fn test_parse_rtu() {
        let config = parse(
            r#"{
            hub: {
                interfacers: [
                    {
                        name: "sdm120",
                        protocol: "modbus",
                        connection: {
                            type: "rtu",
                            port: "/dev/ttyUSB0",
                            baud_rate: 2400,
                            parity: "even"
                        },
                        function_code: 4,
                        node_id: "5",
                    }
                ]
            }
        }"#,
        );
        config.validate().unwrap();

        let interfacer = &config.hub.interfacers[0];
        assert_eq!(interfacer.function_code, 4);
        if let ConnectionConfig::Rtu {
            port,
            baud_rate,
            parity,
            stop_bits,
            ..
        } = &interfacer.connection
        {
            assert_eq!(port, "/dev/ttyUSB0");
            assert_eq!(*baud_rate, 2400);
            assert_eq!(parity, "even");
            assert_eq!(*stop_bits, 1);
        } else {
            panic!("Expected RTU connection");
        }
    }

    #[test]
    fn test_node_ids_merge_without_repeats() {
        let config = parse(
            r#"{ hub: { interfacers: [ {
                name: "gw", protocol: "modbus",
                connection: { type: "tcp", host: "gw" },
                node_ids: ["1", "2"], node_id: "1",
            } ] } }"#,
        );
        assert_eq!(config.hub.interfacers[0].node_ids(), vec!["1", "2"]);
    }

    #[test]
    fn test_validate_rejections() {
        let base = r#"name: "a", protocol: "modbus", connection: { type: "tcp", host: "h" }"#;
        let cases = [
            (r#"{ hub: { interfacers: [] } }"#.to_string(), "At least one"),
            (
                format!(r#"{{ hub: {{ interfacers: [ {{ {base} }} ] }} }}"#),
                "node_id",
            ),
            (
                format!(r#"{{ hub: {{ interfacers: [ {{ {base}, node_id: "1", function_code: 6 }} ] }} }}"#),
                "function_code",
            ),
            (
                format!(r#"{{ hub: {{ interfacers: [ {{ {base}, node_id: "1", interval_secs: -1 }} ] }} }}"#),
                "interval_secs",
            ),
            (
                format!(r#"{{ hub: {{ interfacers: [ {{ {base}, node_id: "1", channels: ["a/b"] }} ] }} }}"#),
                "channel",
            ),
            (
                format!(
                    r#"{{ hub: {{ interfacers: [ {{ {base}, node_id: "1" }}, {{ {base}, node_id: "2" }} ] }} }}"#
                ),
                "Duplicate",
            ),
            (
                r#"{ hub: { interfacers: [ { name: "h", protocol: "hioki", node_id: "1",
                    connection: { type: "rtu", port: "/dev/ttyS0" } } ] } }"#
                    .to_string(),
                "tcp",
            ),
            (
                r#"{ hub: { interfacers: [ { name: "m", protocol: "modbus", node_id: "1",
                    connection: { type: "rtu", port: "/dev/ttyS0", parity: "mark" } } ] } }"#
                    .to_string(),
                "parity",
            ),
        ];

        for (json, needle) in cases {
            let err = parse(&json).validate().unwrap_err();
            assert!(
                err.to_string().contains(needle),
                "expected '{needle}' in '{err}'"
            );
        }
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = InterfacerBridgeConfig::parse(include_str!("../interfacer.json5")).unwrap();
        assert_eq!(config.hub.interfacers.len(), 3);
        assert_eq!(config.nodes.len(), 4);
    }

    #[test]
    fn test_load_through_bridge_config() {
        let config = InterfacerBridgeConfig::parse(
            r#"{ hub: { interfacers: [ { name: "a", protocol: "modbus",
                connection: { type: "tcp", host: "h", port: 1502 }, node_id: "1" } ] } }"#,
        )
        .unwrap();
        assert_eq!(
            config.hub.interfacers[0].connection,
            ConnectionConfig::Tcp {
                host: "h".to_string(),
                port: Some(1502)
            }
        );
    }
}

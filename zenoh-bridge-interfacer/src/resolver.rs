//! Node configuration resolution.
//!
//! A raw `rx` record is normalized once into a [`NodeSchema`]: ordered
//! field specs with a concrete address, datacode and unit id each. The
//! [`NodeConfigResolver`] caches the outcome per node id so the normalization
//! happens lazily, on the first poll that reaches the node.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::codec::Datacode;
use crate::config::{ConfigScalar, NodeTable, OneOrMany, RawNodeConfig};
use crate::error::ConfigError;

/// Unit id used when a node names none.
pub const DEFAULT_UNIT_ID: u8 = 1;

/// How a transport addresses fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressScheme {
    /// 1-based register numbers (Modbus).
    Register,
    /// Channel/voice pairs (HIOKI).
    ChannelVoice,
}

/// Where a field's value lives on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAddress {
    /// Register number as declared, 1-based.
    Register(u16),
    Channel { channel: u16, voice: u16 },
}

impl FieldAddress {
    /// Zero-based register offset put on the wire.
    pub fn register_offset(&self) -> Option<u16> {
        match self {
            FieldAddress::Register(register) => register.checked_sub(1),
            FieldAddress::Channel { .. } => None,
        }
    }
}

/// One resolved field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub address: FieldAddress,
    pub datacode: Datacode,
    pub unit_id: u8,
}

/// The resolved, immutable field layout of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSchema {
    pub node_id: String,
    pub fields: Vec<FieldSpec>,
}

impl NodeSchema {
    /// Sum of field widths; the exact size of every payload for this node.
    pub fn expected_size(&self) -> usize {
        self.fields.iter().map(|f| f.datacode.width()).sum()
    }
}

fn pick<T: Clone>(
    plural: &Option<OneOrMany<T>>,
    singular: &Option<T>,
    keys: (&'static str, &'static str),
) -> Result<Vec<T>, ConfigError> {
    match (plural, singular) {
        (Some(many), _) => Ok(many.to_vec()),
        (None, Some(one)) => Ok(vec![one.clone()]),
        (None, None) => Err(ConfigError::MissingList {
            singular: keys.0,
            plural: keys.1,
        }),
    }
}

fn scalar_u16(what: &'static str, value: &ConfigScalar) -> Result<u16, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        what,
        value: value.to_string(),
    };

    match value {
        ConfigScalar::Integer(v) => u16::try_from(*v).map_err(|_| invalid()),
        ConfigScalar::Float(v) if v.fract() == 0.0 && (0.0..=65535.0).contains(v) => Ok(*v as u16),
        ConfigScalar::Float(_) => Err(invalid()),
        ConfigScalar::Text(s) => s.trim().parse().map_err(|_| invalid()),
    }
}

fn register(value: &ConfigScalar) -> Result<u16, ConfigError> {
    match scalar_u16("register", value)? {
        0 => Err(ConfigError::InvalidValue {
            what: "register",
            value: value.to_string(),
        }),
        register => Ok(register),
    }
}

fn unit_id(value: &ConfigScalar) -> Result<u8, ConfigError> {
    let id = scalar_u16("unit id", value)?;
    u8::try_from(id).map_err(|_| ConfigError::InvalidValue {
        what: "unit id",
        value: value.to_string(),
    })
}

/// An address entry as written; only entries that survive truncation are parsed.
enum RawAddress {
    Register(ConfigScalar),
    Channel(ConfigScalar, ConfigScalar),
}

impl RawAddress {
    fn parse(&self) -> Result<FieldAddress, ConfigError> {
        match self {
            RawAddress::Register(value) => register(value).map(FieldAddress::Register),
            RawAddress::Channel(channel, voice) => Ok(FieldAddress::Channel {
                channel: scalar_u16("channel", channel)?,
                voice: scalar_u16("voice", voice)?,
            }),
        }
    }
}

/// Normalize one node's raw record into a schema.
///
/// Names, addresses and datacodes are truncated to their shortest common
/// length. A single datacode is shared by every field and takes no part in
/// the truncation; unit ids are either one shared id or exactly one per field.
pub fn resolve_node(
    node_id: &str,
    raw: &RawNodeConfig,
    scheme: AddressScheme,
) -> Result<NodeSchema, ConfigError> {
    let names = pick(&raw.names, &raw.name, ("name", "names"))?;

    let raw_addresses: Vec<RawAddress> = match scheme {
        AddressScheme::Register => pick(&raw.addresses, &raw.address, ("register", "registers"))?
            .into_iter()
            .map(RawAddress::Register)
            .collect(),
        AddressScheme::ChannelVoice => {
            let channels = pick(&raw.channels, &raw.channel, ("channel", "channels"))?;
            let voices = pick(&raw.voices, &raw.voice, ("voice", "voices"))?;
            channels
                .into_iter()
                .zip(voices)
                .map(|(channel, voice)| RawAddress::Channel(channel, voice))
                .collect()
        }
    };

    let datacodes = match (scheme, pick(&raw.datacodes, &raw.datacode, ("datacode", "datacodes"))) {
        (_, Ok(codes)) => codes,
        (AddressScheme::ChannelVoice, Err(_)) => vec![Datacode::Float32.as_str().to_string()],
        (AddressScheme::Register, Err(e)) => return Err(e),
    };

    let mut len = names.len().min(raw_addresses.len());
    if datacodes.len() != 1 {
        len = len.min(datacodes.len());
    }
    if len == 0 {
        return Err(ConfigError::Empty);
    }

    let addresses: Vec<FieldAddress> = raw_addresses
        .iter()
        .take(len)
        .map(RawAddress::parse)
        .collect::<Result<_, _>>()?;

    let datacodes: Vec<Datacode> = datacodes
        .iter()
        .take(len)
        .map(|code| code.parse::<Datacode>())
        .collect::<Result<_, _>>()?;

    let mut unit_ids: Vec<u8> = match (&raw.unit_ids, &raw.unit_id) {
        (None, None) => Vec::new(),
        (plural, singular) => pick(plural, singular, ("unitId", "unitIds"))?
            .iter()
            .map(unit_id)
            .collect::<Result<_, _>>()?,
    };
    if unit_ids.is_empty() {
        unit_ids.push(DEFAULT_UNIT_ID);
    }
    if unit_ids.len() > 1 && unit_ids.len() != len {
        return Err(ConfigError::UnitIdCount {
            count: unit_ids.len(),
            fields: len,
        });
    }

    let fields = names
        .into_iter()
        .zip(addresses)
        .take(len)
        .enumerate()
        .map(|(idx, (name, address))| FieldSpec {
            name,
            address,
            datacode: datacodes.get(idx).copied().unwrap_or(datacodes[0]),
            unit_id: unit_ids.get(idx).copied().unwrap_or(unit_ids[0]),
        })
        .collect();

    Ok(NodeSchema {
        node_id: node_id.to_string(),
        fields,
    })
}

#[derive(Debug, Clone)]
enum CacheEntry {
    Resolved(Arc<NodeSchema>),
    Failed { retry_at: Option<u64> },
}

/// Lazily resolves and caches node schemas for one interfacer.
///
/// A successful resolution never changes afterwards. A failed one is
/// remembered and the node skipped until `retry_cycles` cycles have passed
/// (never, when `retry_cycles` is 0) or the cache is invalidated.
#[derive(Debug)]
pub struct NodeConfigResolver {
    scheme: AddressScheme,
    retry_cycles: u64,
    cache: HashMap<String, CacheEntry>,
}

impl NodeConfigResolver {
    pub fn new(scheme: AddressScheme, retry_cycles: u64) -> Self {
        Self {
            scheme,
            retry_cycles,
            cache: HashMap::new(),
        }
    }

    pub fn scheme(&self) -> AddressScheme {
        self.scheme
    }

    /// Resolve `node_id` against `nodes`, consulting the cache first.
    ///
    /// `cycle` is the caller's poll cycle counter, used to schedule retries.
    pub fn resolve(
        &mut self,
        node_id: &str,
        nodes: &NodeTable,
        cycle: u64,
    ) -> Result<Arc<NodeSchema>, ConfigError> {
        match self.cache.get(node_id) {
            Some(CacheEntry::Resolved(schema)) => return Ok(Arc::clone(schema)),
            Some(CacheEntry::Failed { retry_at: None }) => {
                return Err(ConfigError::AwaitingReload);
            }
            Some(CacheEntry::Failed {
                retry_at: Some(retry_at),
            }) if cycle < *retry_at => {
                return Err(ConfigError::AwaitingRetry {
                    cycles_left: retry_at - cycle,
                });
            }
            _ => {}
        }

        let outcome = nodes
            .get(node_id)
            .ok_or_else(|| ConfigError::UnknownNode(node_id.to_string()))
            .and_then(|entry| entry.rx.as_ref().ok_or(ConfigError::MissingRx))
            .and_then(|raw| resolve_node(node_id, raw, self.scheme));

        match outcome {
            Ok(schema) => {
                debug!(
                    node = %node_id,
                    fields = schema.fields.len(),
                    expected_size = schema.expected_size(),
                    "Node configuration resolved"
                );
                let schema = Arc::new(schema);
                self.cache
                    .insert(node_id.to_string(), CacheEntry::Resolved(Arc::clone(&schema)));
                Ok(schema)
            }
            Err(e) => {
                let retry_at = (self.retry_cycles > 0).then(|| cycle + self.retry_cycles);
                self.cache
                    .insert(node_id.to_string(), CacheEntry::Failed { retry_at });
                Err(e)
            }
        }
    }

    /// Cached schema for `node_id`, if it resolved.
    pub fn cached(&self, node_id: &str) -> Option<Arc<NodeSchema>> {
        match self.cache.get(node_id) {
            Some(CacheEntry::Resolved(schema)) => Some(Arc::clone(schema)),
            _ => None,
        }
    }

    /// Forget every resolution, successful or not.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }
}

//! Zenoh bridge for emonhub-style interfacers.
//!
//! This bridge polls field devices (Modbus TCP/RTU energy meters, HIOKI
//! dataloggers over TCP), assembles each node's fields into one binary
//! payload in the hub's telegram format and publishes it to Zenoh.
//!
//! A node's payload is all-or-nothing: any failed field (connection,
//! decode, implausible signal quality, size mismatch) drops the whole node
//! for that cycle, and the next cycle starts afresh.
//!
//! # Key Expressions
//!
//! ```text
//! emonlink/<channel>/<node_id>
//! emonlink/@/status
//! ```
//!
//! Where:
//! - `<channel>` - Publish channel from the interfacer configuration
//! - `<node_id>` - Node the payload belongs to

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod payload;
pub mod poller;
pub mod resolver;
pub mod sanity;
pub mod transport;

pub use codec::{Datacode, DecodedValue, Numeric, RawReading};
pub use config::{InterfacerBridgeConfig, InterfacerConfig, NodeTable};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::PollError;
pub use payload::PayloadAssembler;
pub use poller::PollCycle;
pub use resolver::{FieldSpec, NodeConfigResolver, NodeSchema};
pub use sanity::SanityFilter;
pub use transport::{HiokiTransport, ModbusTransport, Transport};

//! Device transports.
//!
//! A [`Transport`] owns one physical link and knows how to phrase a request
//! for a field and how to read the reply. Connection bookkeeping (state,
//! reconnects) lives in [`ConnectionManager`](crate::connection::ConnectionManager).

use std::fmt::Debug;
use std::future::Future;

use crate::codec::{DecodedValue, RawReading};
use crate::error::{ConfigError, DecodeError, TransportError};
use crate::resolver::{AddressScheme, FieldSpec};

pub mod hioki;
pub mod modbus;

pub use hioki::{HiokiQuery, HiokiTransport};
pub use modbus::{FunctionCode, ModbusTransport, RegisterRequest};

/// One request/reply link to a device.
///
/// Only one request is ever outstanding: callers await each reply before
/// sending the next.
pub trait Transport: Send {
    /// Device-specific request for a single field.
    type Request: Debug + Send + Sync;

    /// How fields handled by this transport are addressed.
    const SCHEME: AddressScheme;

    /// Target endpoint, for logs.
    fn endpoint(&self) -> &str;

    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Drop the link. Never fails; errors while closing are ignored.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    fn send(
        &mut self,
        request: &Self::Request,
    ) -> impl Future<Output = Result<RawReading, TransportError>> + Send;

    fn build_request(&self, field: &FieldSpec) -> Result<Self::Request, ConfigError>;

    fn decode(&self, field: &FieldSpec, raw: &RawReading) -> Result<DecodedValue, DecodeError>;
}

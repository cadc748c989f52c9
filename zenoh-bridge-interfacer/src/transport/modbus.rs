//! Modbus register transport over TCP or RTU.

use std::io;
use std::time::Duration;

use tokio_modbus::client::{Client as _, Context, Reader};
use tokio_modbus::client::{rtu, tcp};
use tokio_modbus::slave::{Slave, SlaveContext as _};
use tracing::{debug, info};

use crate::codec::{self, DecodedValue, RawReading};
use crate::config::{ConnectionConfig, InterfacerConfig};
use crate::error::{ConfigError, DecodeError, TransportError};
use crate::resolver::{AddressScheme, DEFAULT_UNIT_ID, FieldSpec};
use crate::transport::Transport;
use emonlink_common::Protocol;

/// Register read function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    ReadHoldingRegisters = 3,
    ReadInputRegisters = 4,
}

impl TryFrom<u8> for FunctionCode {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            3 => Ok(FunctionCode::ReadHoldingRegisters),
            4 => Ok(FunctionCode::ReadInputRegisters),
            other => Err(ConfigError::InvalidValue {
                what: "function code",
                value: other.to_string(),
            }),
        }
    }
}

/// A single register block read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRequest {
    pub function: FunctionCode,
    /// Zero-based wire address.
    pub address: u16,
    /// Register count.
    pub quantity: u16,
    pub unit_id: u8,
}

pub struct ModbusTransport {
    endpoint: String,
    connection: ConnectionConfig,
    function: FunctionCode,
    timeout: Duration,
    ctx: Option<Context>,
}

impl ModbusTransport {
    pub fn new(connection: ConnectionConfig, function: FunctionCode, timeout: Duration) -> Self {
        Self {
            endpoint: connection.endpoint(Protocol::Modbus),
            connection,
            function,
            timeout,
            ctx: None,
        }
    }

    pub fn from_config(config: &InterfacerConfig) -> Result<Self, ConfigError> {
        let function = FunctionCode::try_from(config.function_code)?;
        Ok(Self::new(config.connection.clone(), function, config.timeout()))
    }

    pub fn function(&self) -> FunctionCode {
        self.function
    }

    /// Open a client context. Takes the settings by value so the future
    /// never borrows the transport, whose `Context` is not `Sync`.
    async fn open(
        connection: ConnectionConfig,
        timeout: Duration,
    ) -> Result<Context, TransportError> {
        let slave = Slave(DEFAULT_UNIT_ID);

        match connection {
            ConnectionConfig::Tcp { host, port } => {
                let target = format!("{}:{}", host, port.unwrap_or(Protocol::Modbus.default_port()));
                let addr = tokio::net::lookup_host(&target)
                    .await?
                    .next()
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {target}"))
                    })?;

                let ctx = tokio::time::timeout(timeout, tcp::connect_slave(addr, slave))
                    .await
                    .map_err(|_| TransportError::Timeout(timeout))??;

                Ok(ctx)
            }
            ConnectionConfig::Rtu {
                port,
                baud_rate,
                data_bits,
                parity,
                stop_bits,
            } => {
                let parity = match parity.to_lowercase().as_str() {
                    "even" => tokio_serial::Parity::Even,
                    "odd" => tokio_serial::Parity::Odd,
                    _ => tokio_serial::Parity::None,
                };

                let stop_bits = match stop_bits {
                    2 => tokio_serial::StopBits::Two,
                    _ => tokio_serial::StopBits::One,
                };

                let data_bits = match data_bits {
                    5 => tokio_serial::DataBits::Five,
                    6 => tokio_serial::DataBits::Six,
                    7 => tokio_serial::DataBits::Seven,
                    _ => tokio_serial::DataBits::Eight,
                };

                let builder = tokio_serial::new(port, baud_rate)
                    .parity(parity)
                    .stop_bits(stop_bits)
                    .data_bits(data_bits)
                    .timeout(timeout);

                let serial = tokio_serial::SerialStream::open(&builder)
                    .map_err(|e| TransportError::Io(e.into()))?;

                Ok(rtu::attach_slave(serial, slave))
            }
        }
    }
}

impl Transport for ModbusTransport {
    type Request = RegisterRequest;

    const SCHEME: AddressScheme = AddressScheme::Register;

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.close().await;
        let ctx = Self::open(self.connection.clone(), self.timeout).await?;
        info!(endpoint = %self.endpoint, "Modbus link open");
        self.ctx = Some(ctx);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                debug!(endpoint = %self.endpoint, error = %e, "Error while closing Modbus link");
            }
        }
    }

    async fn send(&mut self, request: &RegisterRequest) -> Result<RawReading, TransportError> {
        let timeout = self.timeout;
        let ctx = self
            .ctx
            .as_mut()
            .ok_or_else(|| TransportError::Io(io::ErrorKind::NotConnected.into()))?;

        ctx.set_slave(Slave(request.unit_id));

        let read = async {
            match request.function {
                FunctionCode::ReadHoldingRegisters => {
                    ctx.read_holding_registers(request.address, request.quantity).await
                }
                FunctionCode::ReadInputRegisters => {
                    ctx.read_input_registers(request.address, request.quantity).await
                }
            }
        };

        let words = match tokio::time::timeout(timeout, read).await {
            Err(_) => return Err(TransportError::Timeout(timeout)),
            Ok(Err(tokio_modbus::Error::Transport(e))) => return Err(TransportError::Io(e)),
            Ok(Err(e)) => return Err(TransportError::Protocol(e.to_string())),
            Ok(Ok(Err(exception))) => {
                return Err(TransportError::Exception(format!("{exception:?}")));
            }
            Ok(Ok(Ok(words))) => words,
        };

        Ok(RawReading::from_registers(&words))
    }

    fn build_request(&self, field: &FieldSpec) -> Result<RegisterRequest, ConfigError> {
        let address = field
            .address
            .register_offset()
            .ok_or_else(|| ConfigError::AddressKind(field.name.clone()))?;

        Ok(RegisterRequest {
            function: self.function,
            address,
            quantity: field.datacode.registers(),
            unit_id: field.unit_id,
        })
    }

    fn decode(&self, field: &FieldSpec, raw: &RawReading) -> Result<DecodedValue, DecodeError> {
        codec::decode(field.datacode, raw.bytes())
    }
}

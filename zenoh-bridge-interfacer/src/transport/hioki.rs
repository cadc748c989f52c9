//! HIOKI datalogger transport: ASCII queries over TCP.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::codec::{self, ASCII_TERMINATOR, DecodedValue, RawReading};
use crate::config::{ConnectionConfig, InterfacerConfig};
use crate::error::{ConfigError, DecodeError, TransportError};
use crate::resolver::{AddressScheme, FieldAddress, FieldSpec};
use crate::transport::Transport;
use emonlink_common::Protocol;

/// Largest reply buffered for one query.
pub const REPLY_BUFFER_SIZE: usize = 1024;

/// Instantaneous-value query for one channel/voice pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HiokiQuery {
    pub channel: u16,
    pub voice: u16,
}

impl HiokiQuery {
    pub fn command(&self) -> String {
        format!(
            ":MEMory:AREAl? CH{}_{}{}",
            self.channel, self.voice, ASCII_TERMINATOR
        )
    }
}

pub struct HiokiTransport {
    endpoint: String,
    timeout: Duration,
    stream: Option<TcpStream>,
}

impl HiokiTransport {
    pub fn new(host: &str, port: Option<u16>, timeout: Duration) -> Self {
        Self {
            endpoint: format!("{}:{}", host, port.unwrap_or(Protocol::Hioki.default_port())),
            timeout,
            stream: None,
        }
    }

    pub fn from_config(config: &InterfacerConfig) -> Result<Self, ConfigError> {
        match &config.connection {
            ConnectionConfig::Tcp { host, port } => Ok(Self::new(host, *port, config.timeout())),
            ConnectionConfig::Rtu { .. } => Err(ConfigError::Interfacer(format!(
                "'{}': hioki only supports tcp connections",
                config.name
            ))),
        }
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = io::Result<T>>,
    ) -> Result<T, TransportError> {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(TransportError::from)
    }
}

/// Read until the reply terminator arrives or `REPLY_BUFFER_SIZE` bytes are
/// buffered. The device may split one reply across several segments.
async fn read_reply<R>(stream: &mut R, reply: &mut Vec<u8>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let terminator = ASCII_TERMINATOR.as_bytes();
    let mut chunk = [0u8; REPLY_BUFFER_SIZE];

    while reply.len() < REPLY_BUFFER_SIZE {
        let n = stream.read(&mut chunk[..REPLY_BUFFER_SIZE - reply.len()]).await?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }

        // Re-scan one byte back so a CR-LF split across segments is found.
        let scan_from = reply.len().saturating_sub(terminator.len() - 1);
        reply.extend_from_slice(&chunk[..n]);
        if reply[scan_from..].windows(terminator.len()).any(|w| w == terminator) {
            return Ok(());
        }
    }

    Ok(())
}

impl Transport for HiokiTransport {
    type Request = HiokiQuery;

    const SCHEME: AddressScheme = AddressScheme::ChannelVoice;

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.close().await;
        let stream = self.bounded(TcpStream::connect(self.endpoint.as_str())).await?;
        info!(endpoint = %self.endpoint, "HIOKI socket open");
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(endpoint = %self.endpoint, error = %e, "Error while closing HIOKI socket");
            }
        }
    }

    async fn send(&mut self, request: &HiokiQuery) -> Result<RawReading, TransportError> {
        let timeout = self.timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::Io(io::ErrorKind::NotConnected.into()))?;

        let command = request.command();
        tokio::time::timeout(timeout, stream.write_all(command.as_bytes()))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;

        let mut reply = Vec::with_capacity(64);
        let read = read_reply(stream, &mut reply);
        tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;

        Ok(RawReading::new(reply))
    }

    fn build_request(&self, field: &FieldSpec) -> Result<HiokiQuery, ConfigError> {
        match field.address {
            FieldAddress::Channel { channel, voice } => Ok(HiokiQuery { channel, voice }),
            FieldAddress::Register(_) => Err(ConfigError::AddressKind(field.name.clone())),
        }
    }

    fn decode(&self, field: &FieldSpec, raw: &RawReading) -> Result<DecodedValue, DecodeError> {
        codec::decode_ascii(field.datacode, raw.bytes())
    }
}

//! Connection state tracking around a [`Transport`].

use tracing::{debug, info, warn};

use crate::codec::RawReading;
use crate::error::ConnectionError;
use crate::transport::Transport;

/// Link state of a device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owns a transport and keeps its link state honest.
///
/// Any failed exchange leaves the manager `Disconnected`; reconnecting is the
/// next cycle's job, except after a broken pipe, which gets one immediate
/// reconnect and resend.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    state: ConnectionState,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Make one connect attempt if disconnected. Returns whether the link is up.
    pub async fn ensure_connected(&mut self) -> bool {
        if self.is_connected() {
            return true;
        }

        self.state = ConnectionState::Connecting;
        match self.transport.connect().await {
            Ok(()) => {
                info!(endpoint = %self.endpoint(), "Connected");
                self.state = ConnectionState::Connected;
                true
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint(), error = %e, "Connect failed, retrying next cycle");
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    /// Send one request and wait for its reply.
    pub async fn send_and_receive(
        &mut self,
        request: &T::Request,
    ) -> Result<RawReading, ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected);
        }

        let err = match self.transport.send(request).await {
            Ok(reading) => return Ok(reading),
            Err(e) => e,
        };

        if !err.is_broken_pipe() {
            self.disconnect().await;
            return Err(ConnectionError::Transport(err));
        }

        warn!(endpoint = %self.endpoint(), error = %err, "Link broken, reconnecting once");
        self.state = ConnectionState::Connecting;
        if let Err(e) = self.transport.connect().await {
            self.disconnect().await;
            return Err(ConnectionError::ReconnectFailed(e));
        }
        self.state = ConnectionState::Connected;

        match self.transport.send(request).await {
            Ok(reading) => {
                debug!(endpoint = %self.endpoint(), ?request, "Resend after reconnect succeeded");
                Ok(reading)
            }
            Err(e) => {
                self.disconnect().await;
                Err(ConnectionError::ResendFailed(e))
            }
        }
    }

    /// Close the link and mark the connection `Disconnected`.
    pub async fn disconnect(&mut self) {
        self.transport.close().await;
        self.state = ConnectionState::Disconnected;
    }
}

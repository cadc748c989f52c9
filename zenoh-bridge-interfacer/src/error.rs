//! Error types for the poll pipeline.
//!
//! Every stage returns its own error; [`PollError`] is what one node's poll
//! cycle ends with when it produces no payload.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::codec::Datacode;

/// A node's field configuration cannot be turned into a schema.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("node '{0}' is not in the node table")]
    UnknownNode(String),

    #[error("node has no rx section")]
    MissingRx,

    #[error("provide '{singular}' or a list of '{plural}'")]
    MissingList {
        singular: &'static str,
        plural: &'static str,
    },

    #[error("no complete field definition left after truncating to the shortest list")]
    Empty,

    #[error("unsupported datacode '{0}'")]
    UnsupportedDatacode(String),

    #[error("{count} unit ids given for {fields} fields (use one shared id or one per field)")]
    UnitIdCount { count: usize, fields: usize },

    #[error("invalid {what} '{value}'")]
    InvalidValue { what: &'static str, value: String },

    #[error("field '{0}' has no address usable by this transport")]
    AddressKind(String),

    #[error("previous resolution failed; retrying in {cycles_left} cycle(s)")]
    AwaitingRetry { cycles_left: u64 },

    #[error("previous resolution failed; reload the node table to retry")]
    AwaitingReload,

    #[error("interfacer settings: {0}")]
    Interfacer(String),
}

/// Raw reply bytes cannot be turned into a value, or a value into outbound bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{datacode} needs {expected} bytes, got {actual}")]
    WidthMismatch {
        datacode: Datacode,
        expected: usize,
        actual: usize,
    },

    #[error("{value} does not fit in {datacode}")]
    OutOfRange { datacode: Datacode, value: f64 },

    #[error("reply is missing its CR-LF terminator")]
    MissingTerminator,

    #[error("garbled reply: {0}")]
    Garbled(String),
}

/// A single request/connect on the device link failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("device exception: {0}")]
    Exception(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Failures meaning the peer dropped the link underneath us.
    ///
    /// These earn one immediate reconnect-and-resend.
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// The connection manager could not complete an exchange.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("device at {endpoint} is unreachable")]
    Unavailable { endpoint: String },

    #[error("not connected")]
    NotConnected,

    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),

    #[error("reconnect after broken link failed: {0}")]
    ReconnectFailed(#[source] TransportError),

    #[error("resend after reconnect failed: {0}")]
    ResendFailed(#[source] TransportError),
}

/// A signal-quality reading is implausible; the node's payload is dropped.
#[derive(Debug, Error)]
#[error("field '{field}' reads {value}, {reason}")]
pub struct SanityVetoError {
    pub field: String,
    pub value: f64,
    pub reason: &'static str,
}

/// The assembled payload is not the size the schema declares.
#[derive(Debug, Error)]
#[error("incorrect payload size: {observed} bytes, expecting {expected}")]
pub struct IncompletePayloadError {
    pub observed: usize,
    pub expected: usize,
}

/// Why a node produced no payload this cycle.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("field '{field}': {source}")]
    Decode {
        field: String,
        #[source]
        source: DecodeError,
    },

    #[error("sanity veto: {0}")]
    SanityVeto(#[from] SanityVetoError),

    #[error(transparent)]
    IncompletePayload(#[from] IncompletePayloadError),
}

impl PollError {
    /// Attach the field name to a decode failure.
    pub fn decode(field: impl Into<String>, source: DecodeError) -> Self {
        PollError::Decode {
            field: field.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broken_pipe_class() {
        for kind in [
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::UnexpectedEof,
        ] {
            assert!(TransportError::Io(io::Error::from(kind)).is_broken_pipe());
        }

        assert!(!TransportError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)).is_broken_pipe());
        assert!(!TransportError::Timeout(Duration::from_secs(1)).is_broken_pipe());
        assert!(!TransportError::Exception("IllegalDataAddress".to_string()).is_broken_pipe());
    }

    #[test]
    fn test_messages() {
        let err = PollError::decode(
            "Power",
            DecodeError::WidthMismatch {
                datacode: Datacode::Float32,
                expected: 4,
                actual: 2,
            },
        );
        assert_eq!(err.to_string(), "field 'Power': float32 needs 4 bytes, got 2");

        let err: PollError = IncompletePayloadError {
            observed: 4,
            expected: 6,
        }
        .into();
        assert_eq!(err.to_string(), "incorrect payload size: 4 bytes, expecting 6");
    }
}

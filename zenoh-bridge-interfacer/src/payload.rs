//! All-or-nothing payload assembly.

use emonlink_common::Payload;

use crate::codec::{self, DecodedValue};
use crate::error::{DecodeError, IncompletePayloadError};
use crate::resolver::NodeSchema;

/// Accumulates encoded field values for one node, in schema order.
///
/// The assembler is consumed by [`finish`](Self::finish); dropping it on an
/// error path discards everything pushed so far.
#[derive(Debug)]
pub struct PayloadAssembler {
    node_id: String,
    expected_size: usize,
    buffer: Vec<u8>,
}

impl PayloadAssembler {
    pub fn new(node_id: impl Into<String>, expected_size: usize) -> Self {
        Self {
            node_id: node_id.into(),
            expected_size,
            buffer: Vec::with_capacity(expected_size),
        }
    }

    pub fn for_schema(schema: &NodeSchema) -> Self {
        Self::new(schema.node_id.clone(), schema.expected_size())
    }

    /// Append already encoded bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Encode a decoded value in the hub format and append it.
    pub fn push_value(&mut self, value: &DecodedValue) -> Result<(), DecodeError> {
        let bytes = codec::encode(value.datacode, value.value)?;
        self.push(&bytes);
        Ok(())
    }

    pub fn observed_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn expected_size(&self) -> usize {
        self.expected_size
    }

    /// Seal the payload, checking its size against the schema.
    pub fn finish(self, interfacer: &str) -> Result<Payload, IncompletePayloadError> {
        if self.buffer.len() != self.expected_size {
            return Err(IncompletePayloadError {
                observed: self.buffer.len(),
                expected: self.expected_size,
            });
        }

        Ok(Payload::new(interfacer, self.node_id, self.buffer))
    }
}

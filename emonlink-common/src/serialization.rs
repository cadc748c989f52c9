use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Wire format for published payload envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON (readable by any subscriber, default).
    #[default]
    Json,

    /// CBOR (compact binary; `data` becomes a byte array).
    Cbor,
}

impl Format {
    /// MIME type advertised for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Cbor => "application/cbor",
        }
    }
}

/// Encode a value to bytes using the specified format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(Error::from),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
    }
}

/// Decode bytes to a value using the specified format.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(Error::from),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| Error::Cbor(e.to_string())),
    }
}

/// Guess the format of an encoded envelope.
///
/// Envelopes are always maps, so JSON starts with `{`; anything else is CBOR.
pub fn detect_format(data: &[u8]) -> Format {
    match data.first() {
        Some(b'{') => Format::Json,
        _ => Format::Cbor,
    }
}

/// Decode bytes, auto-detecting the format.
pub fn decode_auto<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    decode(data, detect_format(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Payload;

    fn sample() -> Payload {
        Payload::new("meter", "10", vec![0xA0, 0x0F, 0x00, 0x00, 0x2A, 0x00])
    }

    #[test]
    fn test_json_envelope() {
        let payload = sample();

        let encoded = encode(&payload, Format::Json).unwrap();
        let text = String::from_utf8(encoded.clone()).unwrap();
        assert!(text.contains("\"node_id\":\"10\""));
        assert!(text.contains("\"data\":[160,15,0,0,42,0]"));

        let decoded: Payload = decode(&encoded, Format::Json).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_cbor_envelope_is_smaller() {
        let payload = sample();

        let json = encode(&payload, Format::Json).unwrap();
        let cbor = encode(&payload, Format::Cbor).unwrap();
        assert!(cbor.len() < json.len(), "CBOR should be smaller than JSON");

        let decoded: Payload = decode(&cbor, Format::Cbor).unwrap();
        assert_eq!(decoded.data, payload.data);
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(Format::Json.mime_type(), "application/json");
        assert_eq!(Format::Cbor.mime_type(), "application/cbor");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(detect_format(b"{\"node_id\": \"10\"}"), Format::Json);
        assert_eq!(detect_format(b"\xa1\x63key\x65value"), Format::Cbor);
        assert_eq!(detect_format(b""), Format::Cbor);
    }

    #[test]
    fn test_auto_decode() {
        let payload = sample();

        let json = encode(&payload, Format::Json).unwrap();
        let decoded: Payload = decode_auto(&json).unwrap();
        assert_eq!(decoded.node_id, "10");

        let cbor = encode(&payload, Format::Cbor).unwrap();
        let decoded: Payload = decode_auto(&cbor).unwrap();
        assert_eq!(decoded.interfacer, "meter");
    }
}

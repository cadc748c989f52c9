//! Field value decoding and re-encoding.
//!
//! Devices speak their own byte order: Modbus registers are big-endian in
//! both word and byte order, HIOKI replies are decimal text. Whatever the
//! source, values leave through [`encode`] in the hub's uniform telegram
//! format: little-endian with standard widths, one fixed-width slot per field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DecodeError};

/// Multiplier this device family applies to float registers.
pub const FLOAT_REGISTER_SCALE: f64 = 10.0;

/// Divisor turning a HIOKI decimal reply into the physical value.
pub const ASCII_READING_DIVISOR: f64 = 100.0;

/// Terminator of every HIOKI reply.
pub const ASCII_TERMINATOR: &str = "\r\n";

/// Numeric wire encoding of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datacode {
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl Datacode {
    /// Width in 16-bit registers.
    pub fn registers(self) -> u16 {
        match self {
            Datacode::Int16 | Datacode::UInt16 => 1,
            Datacode::Int32 | Datacode::UInt32 | Datacode::Float32 => 2,
            Datacode::Int64 | Datacode::UInt64 | Datacode::Float64 => 4,
        }
    }

    /// Width in bytes, on the wire and in the outbound payload.
    pub fn width(self) -> usize {
        usize::from(self.registers()) * 2
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Datacode::Int16 => "int16",
            Datacode::UInt16 => "uint16",
            Datacode::Int32 => "int32",
            Datacode::UInt32 => "uint32",
            Datacode::Int64 => "int64",
            Datacode::UInt64 => "uint64",
            Datacode::Float32 => "float32",
            Datacode::Float64 => "float64",
        }
    }
}

impl fmt::Display for Datacode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Datacode {
    type Err = ConfigError;

    /// Accepts hub struct codes (`h H i l I L q Q f d`) and descriptive names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s.trim() {
            "h" => Datacode::Int16,
            "H" => Datacode::UInt16,
            "i" | "l" => Datacode::Int32,
            "I" | "L" => Datacode::UInt32,
            "q" => Datacode::Int64,
            "Q" => Datacode::UInt64,
            "f" => Datacode::Float32,
            "d" => Datacode::Float64,
            other => match other.to_ascii_lowercase().as_str() {
                "int16" | "i16" => Datacode::Int16,
                "uint16" | "u16" => Datacode::UInt16,
                "int32" | "i32" => Datacode::Int32,
                "uint32" | "u32" => Datacode::UInt32,
                "int64" | "i64" => Datacode::Int64,
                "uint64" | "u64" => Datacode::UInt64,
                "float32" | "f32" | "float" => Datacode::Float32,
                "float64" | "f64" | "double" => Datacode::Float64,
                _ => return Err(ConfigError::UnsupportedDatacode(s.to_string())),
            },
        };
        Ok(code)
    }
}

/// A decoded number, keeping full 64-bit integer precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Signed(v) => v as f64,
            Numeric::Unsigned(v) => v as f64,
            Numeric::Float(v) => v,
        }
    }
}

/// One field's value tagged with the datacode it was read as.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedValue {
    pub datacode: Datacode,
    pub value: Numeric,
}

impl DecodedValue {
    pub fn as_f64(&self) -> f64 {
        self.value.as_f64()
    }
}

/// Raw bytes returned for one field's address range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReading(Vec<u8>);

impl RawReading {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Flatten register words into big-endian bytes.
    pub fn from_registers(words: &[u16]) -> Self {
        Self(words.iter().flat_map(|w| w.to_be_bytes()).collect())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

fn fixed<const N: usize>(datacode: Datacode, raw: &[u8]) -> Result<[u8; N], DecodeError> {
    raw.try_into().map_err(|_| DecodeError::WidthMismatch {
        datacode,
        expected: datacode.width(),
        actual: raw.len(),
    })
}

/// Decode register bytes (big-endian word and byte order).
///
/// Float datacodes are scaled by [`FLOAT_REGISTER_SCALE`].
pub fn decode(datacode: Datacode, raw: &[u8]) -> Result<DecodedValue, DecodeError> {
    let value = match datacode {
        Datacode::Int16 => Numeric::Signed(i16::from_be_bytes(fixed(datacode, raw)?).into()),
        Datacode::UInt16 => Numeric::Unsigned(u16::from_be_bytes(fixed(datacode, raw)?).into()),
        Datacode::Int32 => Numeric::Signed(i32::from_be_bytes(fixed(datacode, raw)?).into()),
        Datacode::UInt32 => Numeric::Unsigned(u32::from_be_bytes(fixed(datacode, raw)?).into()),
        Datacode::Int64 => Numeric::Signed(i64::from_be_bytes(fixed(datacode, raw)?)),
        Datacode::UInt64 => Numeric::Unsigned(u64::from_be_bytes(fixed(datacode, raw)?)),
        Datacode::Float32 => Numeric::Float(
            f64::from(f32::from_be_bytes(fixed(datacode, raw)?)) * FLOAT_REGISTER_SCALE,
        ),
        Datacode::Float64 => {
            Numeric::Float(f64::from_be_bytes(fixed(datacode, raw)?) * FLOAT_REGISTER_SCALE)
        }
    };

    Ok(DecodedValue { datacode, value })
}

/// Decode a HIOKI reply: decimal text terminated by CR-LF, in hundredths.
pub fn decode_ascii(datacode: Datacode, raw: &[u8]) -> Result<DecodedValue, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|e| DecodeError::Garbled(e.to_string()))?;
    let (body, _) = text
        .split_once(ASCII_TERMINATOR)
        .ok_or(DecodeError::MissingTerminator)?;

    let reading: f64 = body
        .trim()
        .parse()
        .map_err(|_| DecodeError::Garbled(format!("'{}' is not a number", body.trim())))?;

    Ok(DecodedValue {
        datacode,
        value: Numeric::Float(reading / ASCII_READING_DIVISOR),
    })
}

fn integral(datacode: Datacode, value: Numeric) -> Result<i128, DecodeError> {
    match value {
        Numeric::Signed(v) => Ok(v.into()),
        Numeric::Unsigned(v) => Ok(v.into()),
        Numeric::Float(v) if v.is_finite() => Ok(v.round() as i128),
        Numeric::Float(v) => Err(DecodeError::OutOfRange { datacode, value: v }),
    }
}

fn narrow<T: TryFrom<i128>>(datacode: Datacode, value: Numeric) -> Result<T, DecodeError> {
    let wide = integral(datacode, value)?;
    T::try_from(wide).map_err(|_| DecodeError::OutOfRange {
        datacode,
        value: value.as_f64(),
    })
}

/// Encode a value into the hub's outbound format for `datacode`.
///
/// Integer datacodes round fractional values to the nearest integer.
pub fn encode(datacode: Datacode, value: Numeric) -> Result<Vec<u8>, DecodeError> {
    let bytes = match datacode {
        Datacode::Int16 => narrow::<i16>(datacode, value)?.to_le_bytes().to_vec(),
        Datacode::UInt16 => narrow::<u16>(datacode, value)?.to_le_bytes().to_vec(),
        Datacode::Int32 => narrow::<i32>(datacode, value)?.to_le_bytes().to_vec(),
        Datacode::UInt32 => narrow::<u32>(datacode, value)?.to_le_bytes().to_vec(),
        Datacode::Int64 => narrow::<i64>(datacode, value)?.to_le_bytes().to_vec(),
        Datacode::UInt64 => narrow::<u64>(datacode, value)?.to_le_bytes().to_vec(),
        Datacode::Float32 => {
            let wide = value.as_f64();
            let single = wide as f32;
            if wide.is_finite() && !single.is_finite() {
                return Err(DecodeError::OutOfRange {
                    datacode,
                    value: wide,
                });
            }
            single.to_le_bytes().to_vec()
        }
        Datacode::Float64 => value.as_f64().to_le_bytes().to_vec(),
    };

    Ok(bytes)
}

/// Decode one slot of an outbound payload; the inverse of [`encode`].
pub fn decode_outbound(datacode: Datacode, bytes: &[u8]) -> Result<DecodedValue, DecodeError> {
    let value = match datacode {
        Datacode::Int16 => Numeric::Signed(i16::from_le_bytes(fixed(datacode, bytes)?).into()),
        Datacode::UInt16 => Numeric::Unsigned(u16::from_le_bytes(fixed(datacode, bytes)?).into()),
        Datacode::Int32 => Numeric::Signed(i32::from_le_bytes(fixed(datacode, bytes)?).into()),
        Datacode::UInt32 => Numeric::Unsigned(u32::from_le_bytes(fixed(datacode, bytes)?).into()),
        Datacode::Int64 => Numeric::Signed(i64::from_le_bytes(fixed(datacode, bytes)?)),
        Datacode::UInt64 => Numeric::Unsigned(u64::from_le_bytes(fixed(datacode, bytes)?)),
        Datacode::Float32 => Numeric::Float(f32::from_le_bytes(fixed(datacode, bytes)?).into()),
        Datacode::Float64 => Numeric::Float(f64::from_le_bytes(fixed(datacode, bytes)?)),
    };

    Ok(DecodedValue { datacode, value })
}

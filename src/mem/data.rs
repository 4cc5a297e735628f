use crate::error::CodecError;

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;

const TEXT_PREFIX: &str = "string";

/// Longest text in bytes, the size of the whole 16-bit register address space.
pub const MAX_TEXT_LEN: usize = 2 * (u16::MAX as usize + 1);

/// Type descriptor of a register element.
///
/// Descriptors are parsed once from their configuration string. Anything that is not
/// recognized is kept as `Unknown` so the layout can still be polled; such elements occupy a
/// single word, decode to nothing and refuse to be encoded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Int16,
    #[default]
    UInt16,
    Int32,
    UInt32,
    Float,
    Int64,
    UInt64,
    Double,
    /// UTF-8 text with the declared length in bytes.
    Text(usize),
    Unknown(String),
}

impl FromStr for DataType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "int16" => DataType::Int16,
            "uint16" => DataType::UInt16,
            "int32" => DataType::Int32,
            "uint32" => DataType::UInt32,
            "float" => DataType::Float,
            "int64" => DataType::Int64,
            "uint64" => DataType::UInt64,
            "double" => DataType::Double,
            _ => match s.strip_prefix(TEXT_PREFIX) {
                Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                    match digits.parse::<usize>() {
                        Ok(n) if n <= MAX_TEXT_LEN => DataType::Text(n),
                        _ => DataType::Unknown(s.to_owned()),
                    }
                }
                _ => DataType::Unknown(s.to_owned()),
            },
        })
    }
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(t) => t,
            Err(e) => match e {},
        }
    }
}

impl From<DataType> for String {
    fn from(t: DataType) -> Self {
        t.to_string()
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Int16 => f.write_str("int16"),
            DataType::UInt16 => f.write_str("uint16"),
            DataType::Int32 => f.write_str("int32"),
            DataType::UInt32 => f.write_str("uint32"),
            DataType::Float => f.write_str("float"),
            DataType::Int64 => f.write_str("int64"),
            DataType::UInt64 => f.write_str("uint64"),
            DataType::Double => f.write_str("double"),
            DataType::Text(n) => write!(f, "{TEXT_PREFIX}{n}"),
            DataType::Unknown(s) => f.write_str(s),
        }
    }
}

/// Decoded value of a coil or register element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bit(bool),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bit(v) => write!(f, "{}", u8::from(*v)),
            Self::U16(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl Value {
    pub fn as_hex_str(&self) -> String {
        match self {
            Self::Bit(v) => format!("0x{:01$X}", u8::from(*v), 2),
            Self::U16(v) => format!("0x{:01$X}", v, 4),
            Self::I16(v) => format!("0x{:01$X}", v, 4),
            Self::U32(v) => format!("0x{:01$X}", v, 8),
            Self::I32(v) => format!("0x{:01$X}", v, 8),
            Self::U64(v) => format!("0x{:01$X}", v, 16),
            Self::I64(v) => format!("0x{:01$X}", v, 16),
            Self::F32(v) => format!("0x{:01$X}", v.to_bits(), 8),
            Self::F64(v) => format!("0x{:01$X}", v.to_bits(), 16),
            Self::Text(v) => v.bytes().fold(String::from("0x"), |mut s, b| {
                s.push_str(&format!("{:02X}", b));
                s
            }),
        }
    }

    /// Numeric view of the value as a double, lossy beyond 2^53 for the 64-bit kinds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bit(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::U16(v) => Some(*v as f64),
            Self::I16(v) => Some(*v as f64),
            Self::U32(v) => Some(*v as f64),
            Self::I32(v) => Some(*v as f64),
            Self::U64(v) => Some(*v as f64),
            Self::I64(v) => Some(*v as f64),
            Self::F32(v) => Some(*v as f64),
            Self::F64(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl DataType {
    /// The width in Modbus registers (u16) of the type
    pub fn word_size(&self) -> usize {
        match self {
            Self::Int16 | Self::UInt16 => 1,
            Self::Int32 | Self::UInt32 | Self::Float => 2,
            Self::Int64 | Self::UInt64 | Self::Double => 4,
            Self::Text(0) => 1,
            Self::Text(n) => n.div_ceil(2),
            Self::Unknown(_) => 1,
        }
    }

    /// The length in bytes (u8) of the type
    pub fn byte_size(&self) -> usize {
        self.word_size() * 2
    }

    /// Decode a big-endian buffer into a value.
    ///
    /// Text is decoded over the whole buffer, so padding of a word-aligned read is part of the
    /// result. Numeric kinds only look at the leading bytes of the buffer.
    pub fn decode(&self, bytes: &[u8]) -> Result<Option<Value>, CodecError> {
        let needed = match self {
            Self::Text(_) => {
                return Ok(Some(Value::Text(String::from_utf8_lossy(bytes).into_owned())))
            }
            Self::Unknown(_) => return Ok(None),
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float => 4,
            Self::Int64 | Self::UInt64 | Self::Double => 8,
        };
        if bytes.len() < needed {
            return Err(CodecError::InvalidInput {
                data_type: self.clone(),
                len: bytes.len(),
                needed,
            });
        }

        Ok(Some(match self {
            Self::UInt16 => Value::U16(BigEndian::read_u16(bytes)),
            Self::Int16 => Value::I16(BigEndian::read_i16(bytes)),
            Self::UInt32 => Value::U32(BigEndian::read_u32(bytes)),
            Self::Int32 => Value::I32(BigEndian::read_i32(bytes)),
            Self::UInt64 => Value::U64(BigEndian::read_u64(bytes)),
            Self::Int64 => Value::I64(BigEndian::read_i64(bytes)),
            Self::Float => Value::F32(BigEndian::read_f32(bytes)),
            Self::Double => Value::F64(BigEndian::read_f64(bytes)),
            Self::Text(_) | Self::Unknown(_) => unreachable!("handled above"),
        }))
    }

    /// Encode the textual representation of a value into a big-endian buffer.
    ///
    /// Returns `Ok(None)` if the input does not start with a number; the caller has to skip the
    /// write in that case.
    pub fn encode(&self, s: &str) -> Result<Option<Vec<u8>>, CodecError> {
        match self {
            Self::Text(n) if *n > MAX_TEXT_LEN => Err(CodecError::UnsupportedType(self.clone())),
            Self::Text(n) => {
                let mut buffer = vec![0u8; *n + n % 2];
                let bytes = s.as_bytes();
                let len = std::cmp::min(*n, bytes.len());
                buffer[..len].copy_from_slice(&bytes[..len]);
                Ok(Some(buffer))
            }
            Self::Unknown(_) => Err(CodecError::UnsupportedType(self.clone())),
            Self::Float => Ok(parse_float(s).map(|v| {
                let mut buffer = vec![0u8; 4];
                BigEndian::write_f32(&mut buffer, v as f32);
                buffer
            })),
            Self::Double => Ok(parse_float(s).map(|v| {
                let mut buffer = vec![0u8; 8];
                BigEndian::write_f64(&mut buffer, v);
                buffer
            })),
            _ => {
                let Some(v) = parse_int(s) else {
                    return Ok(None);
                };
                let out_of_range = || CodecError::OutOfRange {
                    data_type: self.clone(),
                    value: s.to_owned(),
                };
                let mut buffer = vec![0u8; self.byte_size()];
                match self {
                    Self::UInt16 => BigEndian::write_u16(
                        &mut buffer,
                        u16::try_from(v).map_err(|_| out_of_range())?,
                    ),
                    Self::Int16 => BigEndian::write_i16(
                        &mut buffer,
                        i16::try_from(v).map_err(|_| out_of_range())?,
                    ),
                    Self::UInt32 => BigEndian::write_u32(
                        &mut buffer,
                        u32::try_from(v).map_err(|_| out_of_range())?,
                    ),
                    Self::Int32 => BigEndian::write_i32(
                        &mut buffer,
                        i32::try_from(v).map_err(|_| out_of_range())?,
                    ),
                    Self::UInt64 => BigEndian::write_u64(
                        &mut buffer,
                        u64::try_from(v).map_err(|_| out_of_range())?,
                    ),
                    Self::Int64 => BigEndian::write_i64(
                        &mut buffer,
                        i64::try_from(v).map_err(|_| out_of_range())?,
                    ),
                    _ => unreachable!("non-integer types handled above"),
                }
                Ok(Some(buffer))
            }
        }
    }
}

/// Parse the leading integer of a string.
///
/// Accepts leading whitespace, a sign and a `0x` prefix and stops at the first character that
/// is not a digit, so `"12abc"` is 12 and `"3.9"` is 3. Magnitudes beyond `i128` saturate.
pub fn parse_int(s: &str) -> Option<i128> {
    let s = s.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, s) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, s),
    };
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }

    let magnitude = i128::from_str_radix(&s[..end], radix).unwrap_or(i128::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse the leading decimal floating point number of a string.
///
/// `"1.5V"` is 1.5, `"-Infinity"` is negative infinity and a string without leading number
/// yields `None`.
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        let inf = f64::INFINITY;
        return Some(if bytes[0] == b'-' { -inf } else { inf });
    }

    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };
    let int_digits = digits(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits(end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'-') | Some(b'+')) {
            exp += 1;
        }
        let exp_digits = digits(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    s[..end].parse().ok()
}
